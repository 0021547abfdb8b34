use thiserror::Error;

pub type AdPilotResult<T> = Result<T, AdPilotError>;

#[derive(Error, Debug)]
pub enum AdPilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ad platform error: {0}")]
    Platform(String),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(uuid::Uuid),

    #[error("Campaign has no external platform id: {0}")]
    NoExternalId(uuid::Uuid),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
