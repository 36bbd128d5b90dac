use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The transport a notification is delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Email,
    Slack,
}

impl Channel {
    /// All known channels, in a stable order. Used to drive broker topology
    /// declaration at startup.
    pub const ALL: [Channel; 3] = [Channel::Sms, Channel::Email, Channel::Slack];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Email => "email",
            Channel::Slack => "slack",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sms" => Ok(Channel::Sms),
            "email" => Ok(Channel::Email),
            "slack" => Ok(Channel::Slack),
            other => Err(UnknownChannel(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown channel: {0}")]
pub struct UnknownChannel(pub String);

/// Lifecycle status of a notification's datastore record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Sent,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Sent => "sent",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The central entity: a single notification submission and its current
/// delivery state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub channel: Channel,
    pub recipient: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    pub status: Status,
    pub attempts: i32,
    #[serde(rename = "lastError", skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(rename = "lastTried", skip_serializing_if = "Option::is_none")]
    pub last_tried: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Shape of a client submission to `POST /notifications`; server fields
/// (`id`, `status`, `attempts`, `created_at`) are assigned on intake.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRequest {
    pub channel: Channel,
    pub recipient: String,
    pub message: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl NotificationRequest {
    /// Assign server-side fields and produce a fresh `pending` record.
    pub fn into_pending(self) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            channel: self.channel,
            recipient: self.recipient,
            message: self.message,
            metadata: self.metadata,
            status: Status::Pending,
            attempts: 0,
            last_error: None,
            last_tried: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_round_trips_through_str() {
        for ch in Channel::ALL {
            let parsed: Channel = ch.as_str().parse().unwrap();
            assert_eq!(parsed.as_str(), ch.as_str());
        }
    }

    #[test]
    fn unknown_channel_is_rejected() {
        assert!("carrier-pigeon".parse::<Channel>().is_err());
    }

    #[test]
    fn notification_json_uses_lower_camel_wire_names() {
        let mut n = NotificationRequest {
            channel: Channel::Sms,
            recipient: "+15551234567".into(),
            message: "hi".into(),
            metadata: HashMap::new(),
        }
        .into_pending();
        n.last_error = Some("boom".into());
        n.last_tried = Some(Utc::now());

        let json = serde_json::to_value(&n).unwrap();
        assert!(json.get("lastError").is_some());
        assert!(json.get("lastTried").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("last_error").is_none());
    }
}
