use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::NaiveTime;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use calendar_cell::router::{calendar_routes, CalendarState};
use calendar_cell::{AppointmentLifecycleService, AvailabilityService};
use shared_config::AppConfig;
use shared_database::{AppointmentStore, InMemoryStore};
use shared_models::{Appointment, NewAppointment};

fn create_test_app(store: Arc<InMemoryStore>) -> Router {
    let config = AppConfig::default();
    let availability = AvailabilityService::from_config(&config, store.clone()).unwrap();
    let lifecycle = AppointmentLifecycleService::from_config(&config, store);

    calendar_routes(Arc::new(CalendarState {
        availability: Arc::new(availability),
        lifecycle: Arc::new(lifecycle),
    }))
}

async fn book(store: &InMemoryStore, time: &str) -> Appointment {
    store
        .create_appointment(NewAppointment {
            patient_id: Uuid::new_v4(),
            patient_name: Some("Taro".to_string()),
            date: "2025-05-01".parse().unwrap(),
            time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            reason: "routine checkup".to_string(),
        })
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn free_slots_exclude_booked_times() {
    let store = Arc::new(InMemoryStore::new());
    book(&store, "10:00").await;
    let app = create_test_app(store);

    let response = app
        .oneshot(Request::builder().uri("/slots?start=2025-05-01").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["timezone"], "Asia/Tokyo");

    let times: Vec<&str> = body["slots"].as_array().unwrap()
        .iter()
        .map(|s| s["time"].as_str().unwrap())
        .collect();
    assert_eq!(times.len(), 15);
    assert!(!times.contains(&"10:00"));
    assert!(times.contains(&"10:30"));
}

#[tokio::test]
async fn inverted_range_is_bad_request() {
    let app = create_test_app(Arc::new(InMemoryStore::new()));

    let response = app
        .oneshot(Request::builder().uri("/slots?start=2025-05-02&end=2025-05-01").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn integration_status_lists_every_source() {
    let app = create_test_app(Arc::new(InMemoryStore::new()));

    let response = app
        .oneshot(Request::builder().uri("/integrations").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(
        body["integrations"],
        json!([
            { "provider": "bookings", "enabled": true },
            { "provider": "google", "enabled": false },
            { "provider": "outlook", "enabled": false },
            { "provider": "ical", "enabled": false }
        ])
    );
}

#[tokio::test]
async fn status_update_confirms_then_rejects_going_back() {
    let store = Arc::new(InMemoryStore::new());
    let appointment = book(&store, "11:00").await;
    let app = create_test_app(store.clone());

    let confirm = Request::builder()
        .method("PATCH")
        .uri(format!("/appointments/{}/status", appointment.id))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "status": "confirmed" }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(confirm).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "confirmed");

    let back = Request::builder()
        .method("PATCH")
        .uri(format!("/appointments/{}/status", appointment.id))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "status": "pending" }).to_string()))
        .unwrap();
    let response = app.oneshot(back).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_appointment_is_not_found() {
    let app = create_test_app(Arc::new(InMemoryStore::new()));

    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/appointments/{}/status", Uuid::new_v4()))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "status": "cancelled" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
