//! Error taxonomy for chart storage operations
//!
//! Validation failures (missing/invalid parameters, schema conflicts, unknown
//! devices) are reported to the caller as-is and never retried. Storage
//! failures propagate unmasked through the `Database` / `Io` variants.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChartsError>;

/// Disagreement between a device's stored layout and an incoming write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaConflict {
    /// Device was registered for another event kind
    EventKind { expected: String, actual: String },
    /// Device was registered with another number of values
    Width {
        event_kind: String,
        expected: usize,
        actual: usize,
    },
}

impl std::fmt::Display for SchemaConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaConflict::EventKind { expected, actual } => write!(
                f,
                "cannot store values from event {} (stored for event {})",
                actual, expected
            ),
            SchemaConflict::Width {
                event_kind,
                expected,
                actual,
            } => write!(
                f,
                "event {} is supposed to store {} values not {}",
                event_kind, expected, actual
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChartsError {
    #[error("Parameter \"{parameter}\" is missing")]
    MissingParameter { parameter: &'static str },

    #[error("Invalid parameter \"{parameter}\": {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },

    #[error("Device {device_id}: {conflict}")]
    Conflict {
        device_id: String,
        conflict: SchemaConflict,
    },

    #[error("Device {device_id} not found")]
    NotFound { device_id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage handle lock poisoned")]
    LockPoisoned,
}

impl ChartsError {
    pub(crate) fn missing(parameter: &'static str) -> Self {
        ChartsError::MissingParameter { parameter }
    }

    pub(crate) fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        ChartsError::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }

    /// True for caller mistakes, false for storage-level failures
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChartsError::MissingParameter { .. }
                | ChartsError::InvalidParameter { .. }
                | ChartsError::Conflict { .. }
                | ChartsError::NotFound { .. }
        )
    }
}
