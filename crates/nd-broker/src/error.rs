use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("channel not configured: {0}")]
    ChannelNotConfigured(String),

    #[error("broker is stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, BrokerError>;
