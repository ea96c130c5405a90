//! Pub/Sub push envelopes carrying Cloud Storage notifications.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Body of a Pub/Sub push request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushEnvelope {
    #[serde(default)]
    pub message: Option<PushMessage>,
    #[serde(default)]
    pub subscription: Option<String>,
}

/// A single pushed Pub/Sub message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushMessage {
    /// Base64-encoded payload.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(rename = "messageId", default)]
    pub message_id: Option<String>,
    #[serde(rename = "publishTime", default)]
    pub publish_time: Option<String>,
}

/// The fields of a Cloud Storage object notification the pipeline needs.
#[derive(Debug, Clone, Default, Deserialize)]
struct ObjectPayload {
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// A decoded notification that an object landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message_id: Option<String>,
    pub bucket: String,
    pub name: String,
}

/// Why a push request could not be turned into a [`Notification`].
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("invalid Pub/Sub message format")]
    Malformed(#[source] serde_json::Error),

    #[error("invalid Pub/Sub message format")]
    MissingMessage,

    #[error("invalid Pub/Sub message: data property is not valid base64 encoded JSON")]
    InvalidData(#[source] BoxedError),

    #[error("invalid Cloud Storage notification: expected name and bucket properties")]
    MissingObject,
}

impl PushEnvelope {
    /// Parses a raw push request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, NotificationError> {
        serde_json::from_slice(body).map_err(NotificationError::Malformed)
    }

    /// Decodes the carried Cloud Storage notification.
    pub fn notification(&self) -> Result<Notification, NotificationError> {
        let message = self
            .message
            .as_ref()
            .ok_or(NotificationError::MissingMessage)?;

        let data = message.data.as_deref().unwrap_or_default();
        let decoded = STANDARD
            .decode(data)
            .map_err(|e| NotificationError::InvalidData(Box::new(e)))?;
        let payload: ObjectPayload = serde_json::from_slice(&decoded)
            .map_err(|e| NotificationError::InvalidData(Box::new(e)))?;

        match (payload.bucket, payload.name) {
            (Some(bucket), Some(name)) if !bucket.is_empty() && !name.is_empty() => {
                Ok(Notification {
                    message_id: message.message_id.clone(),
                    bucket,
                    name,
                })
            }
            _ => Err(NotificationError::MissingObject),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(payload: serde_json::Value) -> PushEnvelope {
        PushEnvelope {
            message: Some(PushMessage {
                data: Some(STANDARD.encode(payload.to_string())),
                message_id: Some("42".to_owned()),
                ..PushMessage::default()
            }),
            subscription: None,
        }
    }

    #[test]
    fn decodes_storage_notification() {
        let notification = envelope(json!({
            "bucket": "ingest",
            "name": "clients0.avro",
            "contentType": "application/octet-stream",
        }))
        .notification()
        .unwrap();

        assert_eq!(notification.bucket, "ingest");
        assert_eq!(notification.name, "clients0.avro");
        assert_eq!(notification.message_id.as_deref(), Some("42"));
    }

    #[test]
    fn accepts_both_message_id_spellings() {
        let body = json!({
            "message": {
                "data": STANDARD.encode(r#"{"bucket":"ingest","name":"a.avro"}"#),
                "messageId": "7",
                "message_id": "7",
                "publishTime": "2024-01-01T00:00:00Z",
                "publish_time": "2024-01-01T00:00:00Z",
            },
            "subscription": "projects/acme/subscriptions/ingest",
        });
        let envelope = PushEnvelope::from_slice(body.to_string().as_bytes()).unwrap();
        assert_eq!(envelope.notification().unwrap().name, "a.avro");
    }

    #[test]
    fn missing_message() {
        let err = PushEnvelope::default().notification().unwrap_err();
        assert!(matches!(err, NotificationError::MissingMessage));
        assert_eq!(err.to_string(), "invalid Pub/Sub message format");
    }

    #[test]
    fn data_is_not_base64() {
        let envelope = PushEnvelope {
            message: Some(PushMessage {
                data: Some("%%%".to_owned()),
                ..PushMessage::default()
            }),
            subscription: None,
        };
        assert!(matches!(
            envelope.notification(),
            Err(NotificationError::InvalidData(_))
        ));
    }

    #[test]
    fn null_name_is_missing() {
        let err = envelope(json!({"bucket": "ingest", "name": null}))
            .notification()
            .unwrap_err();
        assert!(matches!(err, NotificationError::MissingObject));
    }
}
