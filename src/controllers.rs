use crate::errors::MessageError;
use crate::messages;
use crate::models::Role;
use crate::saga::{self, SagaOutcome};
use crate::state::Clinic;
use crate::storage::Storage;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

pub const REPLY_SENT_NOTICE: &str = "Your reply was sent!";
pub const REPLY_FAILED_NOTICE: &str = "Your reply was not sent. Please try again";
pub const PENDING_NOTICE: &str = "Pending payment! Bear with us while we process your request.";

#[derive(Debug, Deserialize)]
pub struct ReplyForm {
    pub body: String,
    #[serde(default)]
    pub original_message_id: String,
}

pub async fn health() -> &'static str {
    "OK"
}

// ── index ────────────────────────────────────────────────────────────────────
// Minimal status view: the three mailboxes with their counts, plus the
// patient's inbox contents. No pagination, no search.
pub async fn index(Extension(clinic): Extension<Clinic>) -> Response {
    let mailboxes: Vec<_> = Role::ALL
        .iter()
        .map(|role| {
            let inbox_id = clinic.directory.inbox_of(*role);
            json!({
                "owner": role.as_str(),
                "messages": clinic.storage.messages_in(&inbox_id).len(),
                "unread_count": clinic.storage.inbox(&inbox_id).and_then(|i| i.unread_count),
            })
        })
        .collect();
    let patient_inbox = clinic
        .storage
        .messages_in(&clinic.directory.inbox_of(Role::Patient));

    Json(json!({
        "mailboxes": mailboxes,
        "patient_inbox": patient_inbox,
        "payments": clinic.storage.payment_count(),
    }))
    .into_response()
}

// ── show ─────────────────────────────────────────────────────────────────────
// Viewing a message is what marks it read; the transition happens once.
pub async fn show_message(
    Extension(clinic): Extension<Clinic>,
    Path(id): Path<String>,
) -> Response {
    match messages::mark_read(&clinic, &id) {
        Ok(message) => Json(json!({ "message": message })).into_response(),
        Err(e) => error_response(e),
    }
}

// ── create ───────────────────────────────────────────────────────────────────
// The current user replies to a doctor-originated conversation. Verification
// failures map to 404/403; a rejected write re-prompts with 422.
pub async fn create_message(
    Extension(clinic): Extension<Clinic>,
    Json(form): Json<ReplyForm>,
) -> Response {
    match messages::create_reply(&clinic, Role::Patient, &form.body, &form.original_message_id) {
        Ok(message) => (
            StatusCode::CREATED,
            Json(json!({ "message": message, "notice": REPLY_SENT_NOTICE })),
        )
            .into_response(),
        Err(e @ MessageError::SaveRejected(_)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string(), "notice": REPLY_FAILED_NOTICE })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

// ── prescription ─────────────────────────────────────────────────────────────
// Deferral is not an error: the caller sees a neutral pending notice while
// the retry pipeline finishes the job.
pub async fn request_prescription(
    Extension(clinic): Extension<Clinic>,
    Path(id): Path<String>,
) -> Response {
    match saga::request_prescription(&clinic, &id) {
        Ok(SagaOutcome::Completed(result)) => Json(json!({
            "reference": result.reference,
            "notice": result.notice,
        }))
        .into_response(),
        Ok(SagaOutcome::Deferred) => (
            StatusCode::ACCEPTED,
            Json(json!({ "notice": PENDING_NOTICE })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(error: MessageError) -> Response {
    let status = match error {
        MessageError::ReferenceMissing | MessageError::NotFound(_) => StatusCode::NOT_FOUND,
        MessageError::HackAttempt => StatusCode::FORBIDDEN,
        MessageError::SaveRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use crate::provider::{CardProvider, PaymentProvider};
    use crate::scheduler::RetryRequest;
    use crate::storage::{MemoryStore, Storage};
    use chrono::Utc;
    use crossbeam_channel::{bounded, Receiver};
    use std::sync::Arc;

    struct DecliningProvider;

    impl PaymentProvider for DecliningProvider {
        fn debit(&self, _payer: Role) -> bool {
            false
        }
    }

    fn test_clinic() -> (Clinic, Receiver<RetryRequest>) {
        let (tx, rx) = bounded(16);
        let clinic = Clinic::new(Arc::new(MemoryStore::new()), Arc::new(CardProvider), tx);
        (clinic, rx)
    }

    /// Helper: a doctor→patient message created `age_days` ago, stored.
    fn seeded_original(clinic: &Clinic, age_days: i64) -> Message {
        let mut message = Message::new(
            "Thanks for your order",
            clinic.directory.inbox_of(Role::Patient),
            clinic.directory.outbox_of(Role::Doctor),
        );
        message.created_at = Utc::now() - chrono::Duration::days(age_days);
        clinic.storage.insert_message(message.clone()).unwrap();
        message
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_answers_ok() {
        assert_eq!(health().await, "OK");
    }

    #[tokio::test]
    async fn show_marks_the_message_read() {
        let (clinic, _rx) = test_clinic();
        let original = seeded_original(&clinic, 1);

        let response = show_message(Extension(clinic.clone()), Path(original.id.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["message"]["read"], true);
        assert!(clinic.storage.find_message(&original.id).unwrap().read);
    }

    #[tokio::test]
    async fn show_unknown_message_is_404() {
        let (clinic, _rx) = test_clinic();
        let response = show_message(Extension(clinic), Path("missing".into())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reply_to_fresh_conversation_is_created() {
        let (clinic, _rx) = test_clinic();
        let original = seeded_original(&clinic, 3);

        let response = create_message(
            Extension(clinic.clone()),
            Json(ReplyForm {
                body: "thanks".into(),
                original_message_id: original.id,
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["notice"], REPLY_SENT_NOTICE);
        assert_eq!(
            body["message"]["inbox_id"],
            clinic.directory.inbox_of(Role::Doctor)
        );
    }

    #[tokio::test]
    async fn reply_with_unknown_reference_is_404() {
        let (clinic, _rx) = test_clinic();
        let response = create_message(
            Extension(clinic),
            Json(ReplyForm {
                body: "hi".into(),
                original_message_id: "no-such-message".into(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reply_to_foreign_conversation_is_403() {
        let (clinic, _rx) = test_clinic();
        let foreign = Message::new(
            "internal note",
            clinic.directory.inbox_of(Role::Admin),
            clinic.directory.outbox_of(Role::Doctor),
        );
        clinic.storage.insert_message(foreign.clone()).unwrap();

        let response = create_message(
            Extension(clinic),
            Json(ReplyForm {
                body: "let me in".into(),
                original_message_id: foreign.id,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn rejected_reply_reprompts_with_422() {
        let (clinic, _rx) = test_clinic();
        let original = seeded_original(&clinic, 1);

        let response = create_message(
            Extension(clinic),
            Json(ReplyForm {
                body: "".into(),
                original_message_id: original.id,
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["notice"], REPLY_FAILED_NOTICE);
    }

    #[tokio::test]
    async fn completed_prescription_returns_the_reference() {
        let (clinic, _rx) = test_clinic();
        let original = seeded_original(&clinic, 2);

        let response =
            request_prescription(Extension(clinic.clone()), Path(original.id.clone())).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["reference"], original.id);
        assert_eq!(body["notice"], saga::SUCCESS_NOTICE);
    }

    #[tokio::test]
    async fn deferred_prescription_shows_the_pending_notice() {
        let (tx, _rx) = bounded(16);
        let clinic = Clinic::new(
            Arc::new(MemoryStore::new()),
            Arc::new(DecliningProvider),
            tx,
        );
        let original = seeded_original(&clinic, 2);

        let response = request_prescription(Extension(clinic), Path(original.id)).await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["notice"], PENDING_NOTICE);
    }

    #[tokio::test]
    async fn prescription_for_unknown_reference_is_404() {
        let (clinic, _rx) = test_clinic();
        let response = request_prescription(Extension(clinic), Path("missing".into())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn index_reports_the_three_mailboxes() {
        let (clinic, _rx) = test_clinic();
        seeded_original(&clinic, 1);

        let response = index(Extension(clinic)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["mailboxes"].as_array().unwrap().len(), 3);
        assert_eq!(body["patient_inbox"].as_array().unwrap().len(), 1);
        assert_eq!(body["payments"], 0);
    }
}
