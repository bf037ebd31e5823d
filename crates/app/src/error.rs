use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("ingest error: {0}")]
    Ingest(#[from] ingest::IngestError),
    #[error("pricing error: {0}")]
    Pricing(#[from] usage_core::PricingError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
