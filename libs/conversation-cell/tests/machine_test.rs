use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Asia::Tokyo;
use uuid::Uuid;

use calendar_cell::AvailabilityService;
use conversation_cell::{
    BookingStateMachine, ConversationState, ConversationStore, Flow, InMemoryConversationStore, LoggingNotifier,
    Payload, Step,
};
use locale_cell::{Language, LocaleResolver, StaticCatalog};
use shared_config::AppConfig;
use shared_database::{AppointmentStore, InMemoryStore, PatientStore, StoreError};
use shared_models::{Appointment, AppointmentStatus, NewAppointment, NewPatient};
use shared_utils::FixedClock;

const USER: &str = "U100";

struct Harness {
    machine: Arc<BookingStateMachine>,
    store: Arc<InMemoryStore>,
    conversations: Arc<InMemoryConversationStore>,
}

impl Harness {
    fn new() -> Self {
        Self::with_appointments(None)
    }

    /// `appointments` replaces the store used for commits; availability
    /// always reads the in-memory store.
    fn with_appointments(appointments: Option<Arc<dyn AppointmentStore>>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let conversations = Arc::new(InMemoryConversationStore::new());
        let availability = AvailabilityService::from_config(&AppConfig::default(), store.clone()).unwrap();
        let locale = Arc::new(LocaleResolver::new(Arc::new(StaticCatalog::new()), Language::En));

        let machine = BookingStateMachine::new(
            Arc::new(availability),
            appointments.unwrap_or_else(|| store.clone() as Arc<dyn AppointmentStore>),
            store.clone(),
            conversations.clone(),
            locale,
            Arc::new(LoggingNotifier),
        )
        .with_clock(Arc::new(FixedClock::at_local(Tokyo, 2025, 4, 30, 10, 0)));

        Self {
            machine: Arc::new(machine),
            store,
            conversations,
        }
    }

    async fn register(&self, user_id: &str, name: &str) {
        self.store
            .create_patient(NewPatient {
                user_id: user_id.to_string(),
                name: name.to_string(),
                phone: "090-1234-5678".to_string(),
                preferred_language: Some("en".to_string()),
            })
            .await
            .unwrap();
    }

    async fn send(&self, text: &str) -> Vec<Payload> {
        self.machine.handle_message(USER, text).await
    }

    async fn state(&self) -> ConversationState {
        self.conversations.get_state(USER).await.unwrap().unwrap()
    }

    /// Known patient, English, up to the confirmation question for
    /// 2025-05-01 10:00.
    async fn reach_confirmation(&self) {
        self.send("lang:en").await;
        self.send("book").await;
        self.send("2025-05-01").await;
        self.send("10:00").await;
        self.send("routine checkup").await;
    }
}

fn values(payload: &Payload) -> Vec<String> {
    match payload {
        Payload::Choices { options, .. } => options.iter().map(|c| c.value.clone()).collect(),
        Payload::Text { .. } => Vec::new(),
    }
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[tokio::test]
async fn first_message_starts_language_selection() {
    let harness = Harness::new();

    let replies = harness.send("hello").await;

    assert_eq!(replies.len(), 1);
    let options = values(&replies[0]);
    assert_eq!(options.len(), 8);
    assert!(options.contains(&"lang:ja".to_string()));
    assert!(options.contains(&"lang:en".to_string()));

    let state = harness.state().await;
    assert_eq!(state.current_flow, Flow::LanguageSelect);
    assert!(state.language.is_none());
}

#[tokio::test]
async fn selecting_a_language_shows_the_menu() {
    let harness = Harness::new();

    let replies = harness.send("lang:en").await;

    assert_eq!(replies[0].body(), "Language set to English.");
    assert_eq!(values(&replies[1]), vec!["menu:book", "menu:info", "menu:talk", "menu:language"]);

    let state = harness.state().await;
    assert!(state.is_idle());
    assert_eq!(state.language, Some(Language::En));
}

#[tokio::test]
async fn known_patient_books_end_to_end() {
    let harness = Harness::new();
    harness.register(USER, "Taro Yamada").await;

    harness.send("lang:en").await;
    let replies = harness.send("book").await;

    // Contact details are skipped; the next seven open days follow today.
    let dates = values(&replies[0]);
    assert_eq!(dates.len(), 7);
    assert_eq!(dates[0], "date:2025-05-01");
    assert_eq!(dates[2], "date:2025-05-05");
    assert_eq!(harness.state().await.current_step, Step::AwaitDate);

    let replies = harness.send("2025-05-01").await;
    let times = values(&replies[0]);
    assert_eq!(times.len(), 16);
    assert_eq!(times[0], "time:09:00");
    assert!(!times.contains(&"time:12:00".to_string()));

    let replies = harness.send("10:00").await;
    assert_eq!(replies[0].body(), "Please briefly describe the reason for your visit.");

    let replies = harness.send("routine checkup").await;
    assert!(replies[0].body().contains("Name: Taro Yamada"));
    assert!(replies[0].body().contains("Time: 10:00"));
    assert_eq!(values(&replies[0]), vec!["confirm:yes", "confirm:no"]);

    let replies = harness.send("yes").await;
    assert_eq!(
        replies[0].body(),
        "Your appointment on 2025-05-01 at 10:00 has been requested. The clinic will confirm it soon."
    );

    let booked = harness.store.all_appointments().await;
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].date, date("2025-05-01"));
    assert_eq!(booked[0].time, hm(10, 0));
    assert_eq!(booked[0].reason, "routine checkup");
    assert_eq!(booked[0].status, AppointmentStatus::Pending);

    let state = harness.state().await;
    assert!(state.is_idle());
    assert!(state.draft.is_none());
}

#[tokio::test]
async fn new_patient_gives_contact_details_first() {
    let harness = Harness::new();
    harness.send("lang:en").await;

    let replies = harness.send("book").await;
    assert_eq!(replies[0].body(), "Please tell us your full name.");
    assert_eq!(harness.state().await.current_step, Step::AwaitPatientName);

    harness.send("Hanako Sato").await;
    assert_eq!(harness.state().await.current_step, Step::AwaitPhone);

    let replies = harness.send("12345").await;
    assert_eq!(replies[0].body(), "That doesn't look like a phone number. Please enter at least 7 digits.");
    assert_eq!(harness.state().await.current_step, Step::AwaitPhone);

    harness.send("090-9876-5432").await;
    assert_eq!(harness.state().await.current_step, Step::AwaitDate);

    let patient = harness.store.find_patient_by_user(USER).await.unwrap().unwrap();
    assert_eq!(patient.name, "Hanako Sato");
    assert_eq!(patient.preferred_language.as_deref(), Some("en"));
}

#[tokio::test]
async fn invalid_dates_and_times_do_not_advance() {
    let harness = Harness::new();
    harness.register(USER, "Taro Yamada").await;
    harness.send("lang:en").await;
    harness.send("book").await;

    for answer in ["tomorrow", "2025-05-03", "2025-04-29"] {
        let replies = harness.send(answer).await;
        assert!(replies[0].body().starts_with("Please choose one of the dates offered"));

        let state = harness.state().await;
        assert_eq!(state.current_step, Step::AwaitDate);
        assert!(state.draft.unwrap().date.is_none());
    }

    harness.send("2025-05-01").await;
    for answer in ["12:00", "10:15", "noon"] {
        let replies = harness.send(answer).await;
        assert_eq!(replies[0].body(), "That time is not available. Please choose one of the times offered.");
        assert_eq!(harness.state().await.current_step, Step::AwaitTime);
    }
}

#[tokio::test]
async fn cancel_and_menu_work_at_every_step() {
    let harness = Harness::new();
    harness.send("lang:en").await;

    let steps = ["book", "Hanako Sato", "090-9876-5432", "2025-05-01", "10:00", "checkup"];
    for depth in 1..=steps.len() {
        harness.machine.handle_message(USER, "menu").await;
        for answer in &steps[..depth] {
            harness.send(answer).await;
        }
        assert_eq!(harness.state().await.current_flow, Flow::Booking);

        let replies = harness.send("cancel").await;
        assert_eq!(replies[0].body(), "Booking cancelled. Nothing was saved.");
        assert_eq!(values(&replies[1])[0], "menu:book");

        let state = harness.state().await;
        assert!(state.is_idle());
        assert!(state.draft.is_none());
        assert_eq!(state.language, Some(Language::En));
    }

    harness.send("book").await;
    let replies = harness.send("menu").await;
    assert_eq!(replies.len(), 1);
    assert!(harness.state().await.is_idle());
    assert_eq!(harness.store.appointment_count().await, 0);
}

#[tokio::test]
async fn declining_the_summary_saves_nothing() {
    let harness = Harness::new();
    harness.register(USER, "Taro Yamada").await;
    harness.reach_confirmation().await;

    let replies = harness.send("maybe").await;
    assert_eq!(replies[0].body(), "Please answer yes to confirm or no to cancel.");
    assert_eq!(harness.state().await.current_step, Step::AwaitConfirm);

    let replies = harness.send("confirm:no").await;
    assert_eq!(replies[0].body(), "Booking cancelled. Nothing was saved.");
    assert!(harness.state().await.is_idle());
    assert_eq!(harness.store.appointment_count().await, 0);
}

#[tokio::test]
async fn slot_taken_before_confirmation_goes_back_to_dates() {
    let harness = Harness::new();
    harness.register(USER, "Taro Yamada").await;
    harness.reach_confirmation().await;

    harness.store
        .create_appointment(NewAppointment {
            patient_id: Uuid::new_v4(),
            patient_name: Some("Someone Else".to_string()),
            date: date("2025-05-01"),
            time: hm(10, 0),
            reason: "walk-in".to_string(),
        })
        .await
        .unwrap();

    let replies = harness.send("yes").await;
    assert_eq!(replies[0].body(), "Sorry, that time was just taken. Please choose another date.");
    assert_eq!(values(&replies[1])[0], "date:2025-05-01");

    let state = harness.state().await;
    assert_eq!(state.current_step, Step::AwaitDate);
    let draft = state.draft.unwrap();
    assert!(draft.date.is_none());
    assert!(draft.time.is_none());
    assert_eq!(draft.reason.as_deref(), Some("routine checkup"));
    assert_eq!(harness.store.appointment_count().await, 1);

    // The taken time is no longer offered.
    let replies = harness.send("2025-05-01").await;
    assert!(!values(&replies[0]).contains(&"time:10:00".to_string()));
}

struct FailingAppointments;

#[async_trait]
impl AppointmentStore for FailingAppointments {
    async fn create_appointment(&self, _data: NewAppointment) -> Result<Appointment, StoreError> {
        Err(StoreError::Unavailable("connection reset".to_string()))
    }

    async fn get_appointments_by_range(&self, _start: NaiveDate, _end: NaiveDate) -> Result<Vec<Appointment>, StoreError> {
        Ok(Vec::new())
    }

    async fn get_appointment(&self, _id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(None)
    }

    async fn update_status(&self, _id: Uuid, _status: AppointmentStatus) -> Result<bool, StoreError> {
        Ok(false)
    }
}

#[tokio::test]
async fn persistence_failure_keeps_the_draft() {
    let harness = Harness::with_appointments(Some(Arc::new(FailingAppointments)));
    harness.register(USER, "Taro Yamada").await;
    harness.reach_confirmation().await;

    let replies = harness.send("yes").await;
    assert_eq!(
        replies[0].body(),
        "We could not save your appointment right now. Please try confirming again in a moment."
    );
    assert_eq!(values(&replies[1]), vec!["confirm:yes", "confirm:no"]);

    let state = harness.state().await;
    assert_eq!(state.current_flow, Flow::Booking);
    assert_eq!(state.current_step, Step::AwaitConfirm);
    let draft = state.draft.unwrap();
    assert_eq!(draft.date, Some(date("2025-05-01")));
    assert_eq!(draft.time, Some(hm(10, 0)));
}

#[tokio::test]
async fn concurrent_confirmations_for_one_slot_book_once() {
    let harness = Harness::new();
    for user in ["UA", "UB"] {
        harness.register(user, user).await;
        for text in ["lang:en", "book", "2025-05-01", "10:00", "checkup"] {
            harness.machine.handle_message(user, text).await;
        }
    }

    let (a, b) = tokio::join!(
        harness.machine.handle_message("UA", "yes"),
        harness.machine.handle_message("UB", "yes"),
    );

    assert_eq!(harness.store.appointment_count().await, 1);

    let booked = [&a, &b]
        .iter()
        .filter(|replies| replies[0].body().starts_with("Your appointment on"))
        .count();
    let taken = [&a, &b]
        .iter()
        .filter(|replies| replies[0].body().starts_with("Sorry, that time was just taken"))
        .count();
    assert_eq!((booked, taken), (1, 1));
}

#[tokio::test]
async fn idle_commands() {
    let harness = Harness::new();
    harness.send("lang:en").await;

    let replies = harness.send("myid").await;
    assert!(replies[0].body().contains(USER));

    let replies = harness.send("menu:info").await;
    assert!(replies[0].body().contains("Mon 09:00-12:00, 13:00-18:00"));
    assert!(!replies[0].body().contains("Sat"));

    let replies = harness.send("what is the weather").await;
    assert_eq!(replies[0].body(), "Sorry, I didn't understand that.");
    assert!(harness.state().await.is_idle());

    harness.send("menu:language").await;
    assert_eq!(harness.state().await.current_flow, Flow::LanguageChange);
    let replies = harness.send("lang:ja").await;
    assert_eq!(replies[0].body(), "言語を日本語に設定しました。");
    assert_eq!(harness.state().await.language, Some(Language::Ja));
}

#[tokio::test]
async fn foreign_script_while_idle_suggests_switching() {
    let harness = Harness::new();
    harness.send("lang:en").await;

    let replies = harness.send("こんにちは、よろしく").await;

    let suggestion = replies.last().unwrap();
    assert_eq!(values(suggestion), vec!["lang:ja", "menu:main"]);
    assert_eq!(harness.state().await.language, Some(Language::En));
}

#[tokio::test]
async fn answers_inside_a_flow_are_not_language_checked() {
    let harness = Harness::new();
    harness.send("lang:en").await;
    harness.send("book").await;

    let replies = harness.send("田中 花子").await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].body(), "Please tell us a phone number where we can reach you.");
    assert_eq!(harness.state().await.draft.unwrap().patient_name.as_deref(), Some("田中 花子"));
}

struct BrokenConversations;

#[async_trait]
impl ConversationStore for BrokenConversations {
    async fn get_state(&self, _user_id: &str) -> Result<Option<ConversationState>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn set_state(&self, _user_id: &str, _state: &ConversationState) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

#[tokio::test]
async fn failures_still_produce_a_reply() {
    let store = Arc::new(InMemoryStore::new());
    let availability = AvailabilityService::from_config(&AppConfig::default(), store.clone()).unwrap();
    let machine = BookingStateMachine::new(
        Arc::new(availability),
        store.clone(),
        store,
        Arc::new(BrokenConversations),
        Arc::new(LocaleResolver::new(Arc::new(StaticCatalog::new()), Language::En)),
        Arc::new(LoggingNotifier),
    );

    let replies = machine.handle_message(USER, "book").await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].body(), "Sorry, something went wrong.");
    assert_eq!(values(&replies[0]), vec!["nav:language", "nav:menu"]);
    assert_matches!(machine.conversation_state(USER).await, Err(_));
}
