use async_trait::async_trait;
use nd_common::Notification;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::StoreError;
use crate::{NotificationStore, Result};

/// In-memory `NotificationStore` used by unit and integration tests.
#[derive(Default)]
pub struct InMemoryNotificationStore {
    rows: Mutex<HashMap<Uuid, Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn save(&self, notification: &Notification) -> Result<()> {
        let mut rows = self.rows.lock();
        if rows.contains_key(&notification.id) {
            return Err(StoreError::Duplicate(notification.id));
        }
        rows.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn update_status(&self, notification: &Notification) -> Result<()> {
        let mut rows = self.rows.lock();
        let existing = rows
            .get_mut(&notification.id)
            .ok_or(StoreError::NotFound(notification.id))?;
        existing.status = notification.status;
        existing.attempts = notification.attempts;
        existing.last_error = notification.last_error.clone();
        existing.last_tried = notification.last_tried;
        existing.metadata = notification.metadata.clone();
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Notification> {
        self.rows.lock().get(&id).cloned().ok_or(StoreError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_common::{Channel, NotificationRequest};
    use std::collections::HashMap as Map;

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let store = InMemoryNotificationStore::new();
        let n = NotificationRequest {
            channel: Channel::Sms,
            recipient: "+15551234567".into(),
            message: "hi".into(),
            metadata: Map::new(),
        }
        .into_pending();
        store.save(&n).await.unwrap();
        let fetched = store.get_by_id(n.id).await.unwrap();
        assert_eq!(fetched.recipient, n.recipient);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryNotificationStore::new();
        assert!(store.get_by_id(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn save_rejects_duplicate_id() {
        let store = InMemoryNotificationStore::new();
        let n = NotificationRequest {
            channel: Channel::Sms,
            recipient: "+15551234567".into(),
            message: "hi".into(),
            metadata: Map::new(),
        }
        .into_pending();
        store.save(&n).await.unwrap();
        let err = store.save(&n).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id == n.id));
    }
}
