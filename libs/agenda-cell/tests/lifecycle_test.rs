use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use agenda_cell::models::{AgendaError, AppointmentStatus};
use agenda_cell::services::lifecycle::{allowed_transitions, StatusService};
use shared_config::AppConfig;

fn service(server: &MockServer) -> StatusService {
    StatusService::new(&AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-key".to_string(),
    })
}

fn appointment_row(id: Uuid, clinic_id: Uuid, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "clinic_id": clinic_id,
        "date": "2024-03-12",
        "start_time": "09:00:00",
        "end_time": "09:30:00",
        "status": status,
        "patient_id": Uuid::new_v4(),
        "patient_name": "Alice Martin",
    })
}

async fn mount_get(server: &MockServer, id: Uuid, clinic_id: Uuid, status: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([appointment_row(id, clinic_id, status)])),
        )
        .mount(server)
        .await;
}

#[test]
fn transition_table_shape() {
    use AppointmentStatus::*;

    assert!(allowed_transitions(Scheduled).contains(&Confirmed));
    assert!(allowed_transitions(Scheduled).contains(&Canceled));
    assert!(allowed_transitions(Scheduled).contains(&NoShow));
    assert!(!allowed_transitions(Scheduled).contains(&InProgress));

    assert!(allowed_transitions(Confirmed).contains(&InProgress));
    assert!(allowed_transitions(InProgress).contains(&Done));
    assert!(allowed_transitions(InProgress).contains(&Canceled));

    // done is terminal; cancellations and no-shows can be rebooked.
    assert!(allowed_transitions(Done).is_empty());
    assert_eq!(allowed_transitions(Canceled), &[Scheduled]);
    assert_eq!(allowed_transitions(NoShow), &[Scheduled]);

    // Never a self-transition.
    for status in [Scheduled, Confirmed, InProgress, Done, Canceled, NoShow] {
        assert!(!allowed_transitions(status).contains(&status));
    }
}

#[tokio::test]
async fn legal_transition_updates_and_audits() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();
    let actor_id = Uuid::new_v4();

    mount_get(&server, id, clinic_id, "scheduled").await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([appointment_row(id, clinic_id, "confirmed")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    // The audit row carries who moved what from where to where.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointment_status_audit"))
        .and(body_partial_json(json!({
            "appointment_id": id,
            "from_status": "scheduled",
            "to_status": "confirmed",
            "actor_id": actor_id,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let updated = service(&server)
        .transition(id, clinic_id, AppointmentStatus::Confirmed, actor_id, "token")
        .await
        .unwrap();

    assert_eq!(updated.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn illegal_transition_is_rejected_before_any_write() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();

    mount_get(&server, id, clinic_id, "scheduled").await;

    // Scheduled cannot jump straight to in_progress. No PATCH or audit
    // mock is mounted; a write attempt would fail the test.
    let result = service(&server)
        .transition(id, clinic_id, AppointmentStatus::InProgress, Uuid::new_v4(), "token")
        .await;

    assert_matches!(
        result,
        Err(AgendaError::IllegalTransition {
            from: AppointmentStatus::Scheduled,
            to: AppointmentStatus::InProgress,
        })
    );
}

#[tokio::test]
async fn done_is_terminal() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();

    mount_get(&server, id, clinic_id, "done").await;

    let service = service(&server);
    for target in [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Canceled,
        AppointmentStatus::NoShow,
    ] {
        let result = service
            .transition(id, clinic_id, target, Uuid::new_v4(), "token")
            .await;
        assert_matches!(result, Err(AgendaError::IllegalTransition { .. }));
    }
}

#[tokio::test]
async fn lost_race_surfaces_as_conflict_and_skips_audit() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();

    mount_get(&server, id, clinic_id, "scheduled").await;
    // Another actor moved the row between read and write: the filtered
    // update matches nothing.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointment_status_audit"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let result = service(&server)
        .transition(id, clinic_id, AppointmentStatus::Confirmed, Uuid::new_v4(), "token")
        .await;

    assert_matches!(result, Err(AgendaError::Conflict(_)));
}

#[tokio::test]
async fn audit_failure_does_not_fail_the_transition() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let clinic_id = Uuid::new_v4();

    mount_get(&server, id, clinic_id, "canceled").await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([appointment_row(id, clinic_id, "scheduled")])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointment_status_audit"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let updated = service(&server)
        .transition(id, clinic_id, AppointmentStatus::Scheduled, Uuid::new_v4(), "token")
        .await
        .unwrap();

    assert_eq!(updated.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn missing_appointment_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = service(&server)
        .transition(
            Uuid::new_v4(),
            Uuid::new_v4(),
            AppointmentStatus::Confirmed,
            Uuid::new_v4(),
            "token",
        )
        .await;

    assert_matches!(result, Err(AgendaError::NotFound));
}
