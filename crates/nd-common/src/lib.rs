//! Shared types for the notification dispatcher: the `Notification` entity,
//! its `Channel`/`Status` enums, and the ambient logging initializer.

pub mod logging;
pub mod notification;

pub use notification::{Channel, Notification, Status};
