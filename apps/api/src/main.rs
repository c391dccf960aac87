use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use calendar_cell::{AppointmentLifecycleService, AvailabilityService};
use calendar_cell::router::CalendarState;
use conversation_cell::{
    BookingStateMachine, ConversationStore, InMemoryConversationStore, SupabaseConversationStore,
};
use conversation_cell::router::ConversationAppState;
use shared_config::AppConfig;
use shared_database::{AppointmentStore, InMemoryStore, PatientStore, SupabaseStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic booking assistant");

    // Load configuration
    let config = AppConfig::from_env();

    // Persistence
    let (appointments, patients, conversations): (
        Arc<dyn AppointmentStore>,
        Arc<dyn PatientStore>,
        Arc<dyn ConversationStore>,
    ) = if config.is_configured() {
        let store = Arc::new(SupabaseStore::new(&config));
        (store.clone(), store, Arc::new(SupabaseConversationStore::new(&config)))
    } else {
        warn!("Supabase not configured, appointments and conversations are kept in memory");
        let store = Arc::new(InMemoryStore::new());
        (store.clone(), store, Arc::new(InMemoryConversationStore::new()))
    };

    // Calendar and conversation services
    let availability = Arc::new(AvailabilityService::from_config(&config, appointments.clone())?);
    let lifecycle = Arc::new(AppointmentLifecycleService::from_config(&config, appointments.clone()));
    let machine = BookingStateMachine::from_config(
        &config,
        availability.clone(),
        appointments,
        patients,
        conversations,
    );

    let calendar = Arc::new(CalendarState { availability, lifecycle });
    let conversation = Arc::new(ConversationAppState { machine: Arc::new(machine) });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(calendar, conversation)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
