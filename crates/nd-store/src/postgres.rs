use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nd_common::{Channel, Notification, Status};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::{NotificationStore, Result};

/// PostgreSQL-backed `NotificationStore`.
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notifications (
                id UUID PRIMARY KEY,
                channel TEXT NOT NULL,
                recipient TEXT NOT NULL,
                message TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{}',
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                last_tried TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn parse_row(row: &PgRow) -> Result<Notification> {
        let channel_str: String = row.try_get("channel")?;
        let status_str: String = row.try_get("status")?;
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, String> = serde_json::from_value(metadata_json)?;

        Ok(Notification {
            id: row.try_get("id")?,
            channel: Channel::from_str(&channel_str)
                .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?,
            recipient: row.try_get("recipient")?,
            message: row.try_get("message")?,
            metadata,
            status: parse_status(&status_str)?,
            attempts: row.try_get("attempts")?,
            last_error: row.try_get("last_error").ok(),
            last_tried: row.try_get::<Option<DateTime<Utc>>, _>("last_tried").ok().flatten(),
            created_at: row.try_get("created_at")?,
        })
    }
}

fn parse_status(s: &str) -> Result<Status> {
    match s {
        "pending" => Ok(Status::Pending),
        "sent" => Ok(Status::Sent),
        "failed" => Ok(Status::Failed),
        other => Err(StoreError::Database(sqlx::Error::Decode(
            format!("unknown status: {other}").into(),
        ))),
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn save(&self, notification: &Notification) -> Result<()> {
        let metadata = serde_json::to_value(&notification.metadata)?;
        sqlx::query(
            "INSERT INTO notifications
                (id, channel, recipient, message, metadata, status, attempts, last_error, last_tried, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(notification.id)
        .bind(notification.channel.as_str())
        .bind(&notification.recipient)
        .bind(&notification.message)
        .bind(metadata)
        .bind(notification.status.as_str())
        .bind(notification.attempts)
        .bind(&notification.last_error)
        .bind(notification.last_tried)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %notification.id, "saved notification");
        Ok(())
    }

    async fn update_status(&self, notification: &Notification) -> Result<()> {
        let metadata = serde_json::to_value(&notification.metadata)?;
        sqlx::query(
            "UPDATE notifications
                SET status = $1, attempts = $2, last_error = $3, last_tried = $4, metadata = $5
             WHERE id = $6",
        )
        .bind(notification.status.as_str())
        .bind(notification.attempts)
        .bind(&notification.last_error)
        .bind(notification.last_tried)
        .bind(metadata)
        .bind(notification.id)
        .execute(&self.pool)
        .await?;

        debug!(id = %notification.id, status = %notification.status, "updated notification status");
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Notification> {
        let row = sqlx::query(
            "SELECT id, channel, recipient, message, metadata, status, attempts, last_error, last_tried, created_at
             FROM notifications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        Self::parse_row(&row)
    }
}
