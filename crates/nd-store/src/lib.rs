//! Datastore gateway: persists notifications and their delivery status.

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::StoreError;
pub use memory::InMemoryNotificationStore;
pub use postgres::PgNotificationStore;

use async_trait::async_trait;
use nd_common::Notification;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Datastore operations. All implementations must be safe to call
/// concurrently from many tasks.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert a freshly created (`pending`) notification. Fails on duplicate
    /// `id` or transport error.
    async fn save(&self, notification: &Notification) -> Result<()>;

    /// Overwrite `status`, `attempts`, `last_error`, `last_tried`, and
    /// `metadata` for the given notification's `id`. Safe to call more than
    /// once for the same id.
    async fn update_status(&self, notification: &Notification) -> Result<()>;

    /// Look up a notification by id.
    async fn get_by_id(&self, id: Uuid) -> Result<Notification>;
}
