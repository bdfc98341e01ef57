use crate::config::Settings;
use crate::errors::{AppError, AppResult};
use crate::models::{
    ActionOutcome, ActionRequest, AssetUpload, NotificationSpec, Record, STATUS_FIELD, UPDATED_AT_FIELD,
};
use crate::session::ViewSession;
use crate::store::{AssetUploader, DataStore};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub const FEEDBACK_RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub status: String,
    pub rating: u8,
    pub comment: String,
    pub attachment: Option<AssetUpload>,
}

/// Applies user actions to single records: one remote update, then a local patch
/// of the owning view once the store has confirmed the write.
#[derive(Clone)]
pub struct ActionDispatcher {
    store: Arc<dyn DataStore>,
    uploader: Option<Arc<dyn AssetUploader>>,
    notifications_collection: String,
}

impl ActionDispatcher {
    pub fn new(store: Arc<dyn DataStore>, settings: &Settings) -> Self {
        Self {
            store,
            uploader: None,
            notifications_collection: settings.notifications_collection.clone(),
        }
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn AssetUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Checks that the record is loaded in `session` and that `new_status` is one of its kind's
    /// statuses. Returns the canonical status label.
    fn validate(session: &ViewSession, record_id: &str, new_status: &str) -> AppResult<&'static str> {
        let kind = session.kind();
        if session.record(record_id).is_none() {
            return Err(AppError::NotFound(format!(
                "{} '{}' is not loaded in view '{}'",
                kind.as_str(),
                record_id,
                session.name()
            )));
        }
        kind.resolve_status(new_status).ok_or_else(|| {
            AppError::InvalidInput(format!("'{}' is not a valid {} status", new_status, kind.as_str()))
        })
    }

    /// On a failed remote write the session is left exactly as it was.
    /// A failed notification write is logged and reported in the outcome only.
    pub async fn apply_action(&self, session: &mut ViewSession, request: ActionRequest) -> AppResult<ActionOutcome> {
        let collection = session.scope().collection.clone();
        let status = Self::validate(session, &request.record_id, &request.new_status)?;

        let mut patch = request.extra_fields.clone();
        patch.insert(STATUS_FIELD.to_string(), Value::String(status.to_string()));
        patch.insert(UPDATED_AT_FIELD.to_string(), Value::String(Utc::now().to_rfc3339()));

        if let Err(error) = self.store.update(&collection, &request.record_id, &patch).await {
            tracing::warn!(
                collection = %collection,
                record_id = %request.record_id,
                status,
                error = %error,
                "action update failed"
            );
            return Err(AppError::Action(format!("{}/{}: {}", collection, request.record_id, error)));
        }

        let record = session
            .patch_record(&request.record_id, &patch)
            .ok_or_else(|| AppError::Internal(format!("record '{}' vanished from view", request.record_id)))?;
        tracing::info!(collection = %collection, record_id = %record.id, status, "action applied");

        let (notification_id, notification_error) = match request.notification.as_ref() {
            Some(notice) => match self.notify(session, &collection, &record, notice).await {
                Ok(id) => (Some(id), None),
                Err(error) => {
                    tracing::warn!(
                        collection = %self.notifications_collection,
                        record_id = %record.id,
                        error = %error,
                        "notification write failed"
                    );
                    (None, Some(error.to_string()))
                }
            },
            None => (None, None),
        };

        Ok(ActionOutcome {
            record,
            notification_id,
            notification_error,
        })
    }

    pub async fn approve(&self, session: &mut ViewSession, record_id: &str) -> AppResult<ActionOutcome> {
        self.apply_action(session, ActionRequest::new(record_id, "approved")).await
    }

    pub async fn reject(
        &self,
        session: &mut ViewSession,
        record_id: &str,
        reason: Option<String>,
    ) -> AppResult<ActionOutcome> {
        let mut request = ActionRequest::new(record_id, "rejected");
        if let Some(reason) = reason {
            request = request.with_field("rejectionReason", reason);
        }
        self.apply_action(session, request).await
    }

    pub async fn request_changes(
        &self,
        session: &mut ViewSession,
        record_id: &str,
        feedback: impl Into<String>,
    ) -> AppResult<ActionOutcome> {
        let request = ActionRequest::new(record_id, "changes_requested").with_field("feedback", feedback.into());
        self.apply_action(session, request).await
    }

    pub async fn revoke(&self, session: &mut ViewSession, record_id: &str) -> AppResult<ActionOutcome> {
        let request = ActionRequest::new(record_id, "revoked").with_field("revokedAt", Utc::now().to_rfc3339());
        self.apply_action(session, request).await
    }

    /// Uploads the optional attachment first; an upload failure aborts before any record write.
    pub async fn submit_feedback(
        &self,
        session: &mut ViewSession,
        record_id: &str,
        feedback: Feedback,
    ) -> AppResult<ActionOutcome> {
        if !FEEDBACK_RATING_RANGE.contains(&feedback.rating) {
            return Err(AppError::InvalidInput(format!(
                "rating must be between {} and {}, got {}",
                FEEDBACK_RATING_RANGE.start(),
                FEEDBACK_RATING_RANGE.end(),
                feedback.rating
            )));
        }
        Self::validate(session, record_id, &feedback.status)?;

        let mut request = ActionRequest::new(record_id, feedback.status)
            .with_field("rating", feedback.rating)
            .with_field("feedback", feedback.comment)
            .with_field("feedbackAt", Utc::now().to_rfc3339());

        if let Some(attachment) = feedback.attachment {
            let Some(uploader) = self.uploader.as_ref() else {
                return Err(AppError::Action("no asset uploader configured for attachments".to_string()));
            };
            let file_name = attachment.file_name.clone();
            let uploaded = uploader.upload(attachment).await.map_err(|error| {
                tracing::warn!(record_id, file = %file_name, error = %error, "feedback attachment upload failed");
                AppError::Action(format!("attachment upload failed: {}", error))
            })?;
            request = request
                .with_field("attachmentUrl", uploaded.url)
                .with_field("attachmentMetadata", uploaded.metadata);
        }

        self.apply_action(session, request).await
    }

    /// Built from the post-patch record so the message reflects the new status.
    async fn notify(
        &self,
        session: &ViewSession,
        collection: &str,
        record: &Record,
        notice: &NotificationSpec,
    ) -> AppResult<String> {
        let kind = session.kind();
        let fields: Map<String, Value> = match json!({
            "type": notice.kind,
            "message": notice.message,
            "recipientId": notice.recipient_id,
            "recordId": record.id,
            "recordTitle": kind.display_title(record),
            "collection": collection,
            "status": kind.canonical_status(record),
            "read": false,
            "createdAt": Utc::now().to_rfc3339(),
        }) {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };

        self.store
            .create(&self.notifications_collection, fields)
            .await
            .map_err(|error| AppError::SecondaryWrite(error.to_string()))
    }
}
