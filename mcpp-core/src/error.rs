use mcpp_types::ErrorCode;
use thiserror::Error;

use crate::policy::ValidationDetails;

/// Every failure mode the engine can produce, each carrying the wire
/// `ErrorCode` the dispatcher should report. Cache misses and policy
/// decisions are expected outcomes here, not panics.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("no cached entry for call_id {0}")]
    DataNotFound(String),

    #[error("entry for call_id {0} is not a table")]
    NotATable(String),

    #[error("column {column} not found in call_id {call_id}")]
    UnknownColumn { call_id: String, column: String },

    #[error("no match for keyword above the similarity threshold (best: {best_similarity:.3})")]
    ReferenceNotFound { best_similarity: f64 },

    #[error("permission denied: {reason}")]
    InsufficientPermissions { reason: String, validation_details: ValidationDetails },

    #[error("data usage {0} is not permitted for this tool")]
    InvalidDataUsage(String),

    #[error("consent required")]
    ConsentRequired,

    #[error("consent was denied")]
    ConsentDenied,

    #[error("consent request timed out")]
    ConsentTimeout,

    #[error("unparseable target specification: {0}")]
    InvalidTarget(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub const fn wire_code(&self) -> ErrorCode {
        match self {
            CoreError::DataNotFound(_) => ErrorCode::DataNotFound,
            CoreError::NotATable(_) | CoreError::UnknownColumn { .. } => ErrorCode::InvalidParams,
            CoreError::ReferenceNotFound { .. } => ErrorCode::ReferenceNotFound,
            CoreError::InsufficientPermissions { .. } => ErrorCode::InsufficientPermissions,
            CoreError::InvalidDataUsage(_) => ErrorCode::InvalidDataUsage,
            CoreError::ConsentRequired => ErrorCode::ConsentRequired,
            CoreError::ConsentDenied => ErrorCode::ConsentDenied,
            CoreError::ConsentTimeout => ErrorCode::ConsentTimeout,
            CoreError::InvalidTarget(_) => ErrorCode::InvalidTarget,
            CoreError::InvalidParams(_) => ErrorCode::InvalidParams,
            CoreError::Toml(_) | CoreError::Io(_) => ErrorCode::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
