use assert_matches::assert_matches;
use chrono::NaiveTime;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::{AppointmentStore, PatientStore, StoreError, SupabaseStore};
use shared_models::{AppointmentStatus, NewAppointment};

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        ..AppConfig::default()
    }
}

fn appointment_row(id: Uuid, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "patient_id": Uuid::new_v4(),
        "patient_name": "Taro",
        "date": "2025-05-01",
        "time": "10:00:00",
        "reason": "routine checkup",
        "status": status,
        "created_at": "2025-04-28T01:00:00Z"
    })
}

fn new_appointment() -> NewAppointment {
    NewAppointment {
        patient_id: Uuid::new_v4(),
        patient_name: Some("Taro".to_string()),
        date: "2025-05-01".parse().unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        reason: "routine checkup".to_string(),
    }
}

#[tokio::test]
async fn create_appointment_returns_stored_row() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("apikey", "test-anon-key"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([appointment_row(id, "pending")])))
        .expect(1)
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let appointment = store.create_appointment(new_appointment()).await.unwrap();

    assert_eq!(appointment.id, id);
    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
}

#[tokio::test]
async fn unique_violation_maps_to_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_active_slot\""
        })))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let result = store.create_appointment(new_appointment()).await;

    assert_matches!(result, Err(StoreError::Conflict(_)));
}

#[tokio::test]
async fn server_error_maps_to_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let result = store
        .get_appointments_by_range("2025-05-01".parse().unwrap(), "2025-05-02".parse().unwrap())
        .await;

    assert_matches!(result, Err(StoreError::Unavailable(_)));
}

#[tokio::test]
async fn range_query_uses_half_open_date_filter() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("order", "date.asc,time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(id, "confirmed")])))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let found = store
        .get_appointments_by_range("2025-05-01".parse().unwrap(), "2025-05-02".parse().unwrap())
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].status, AppointmentStatus::Confirmed);

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(query.contains("date=gte.2025-05-01"));
    assert!(query.contains("date=lt.2025-05-02"));
}

#[tokio::test]
async fn update_status_reports_missing_rows() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let updated = store.update_status(Uuid::new_v4(), AppointmentStatus::Confirmed).await.unwrap();

    assert!(!updated);
}

#[tokio::test]
async fn patient_lookup_by_chat_user() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("user_id", "eq.U123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "user_id": "U123",
            "name": "Hanako",
            "phone": "090-1234-5678",
            "preferred_language": "ja",
            "created_at": "2025-04-01T00:00:00Z"
        }])))
        .mount(&server)
        .await;

    let store = SupabaseStore::new(&config_for(&server));
    let patient = store.find_patient_by_user("U123").await.unwrap();

    assert_matches!(patient, Some(p) if p.name == "Hanako");
}
