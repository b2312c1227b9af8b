use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("unsupported storage schema version {found} in {path} (expected {expected}); delete it to reset")]
    SchemaMismatch {
        path: String,
        found: u32,
        expected: u32,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid cache key: {0}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NavError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidKey(_) => "invalid_key",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, NavError>;

/// Recoverable navigation faults. The engine handles every one of these
/// locally; they surface only in step reports and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathFault {
    /// Origin or goal outside the world; the search was skipped.
    InvalidEndpoint,
    /// Stored next step is not adjacent to the agent.
    PathDesync,
    /// A committed move was accepted but the agent never arrived.
    GhostBlock,
    /// A non-passable structure now sits on the next step.
    HardObstacle,
    /// Another agent reserved the next step earlier this tick.
    ReservationConflict,
}

impl PathFault {
    pub const fn label(self) -> &'static str {
        match self {
            PathFault::InvalidEndpoint => "invalidEndpoint",
            PathFault::PathDesync => "pathDesync",
            PathFault::GhostBlock => "ghostBlock",
            PathFault::HardObstacle => "hardObstacle",
            PathFault::ReservationConflict => "reservationConflict",
        }
    }
}

impl fmt::Display for PathFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
