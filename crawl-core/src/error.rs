//! Error taxonomy for engine operations.
//!
//! Every failure is a rejected operation: validation happens before any
//! session state is touched, so an `Err` never leaves a partial mutation.

use crate::dice::DiceError;
use thiserror::Error;

/// Errors from `WorldEngine` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Malformed caller input: direction, dice notation, event id, flags.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown session, NPC, or no active session to fall back to.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation does not apply in the session's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl EngineError {
    pub(crate) fn no_active_session() -> Self {
        EngineError::NotFound(
            "No active session. Call start_session() or pass session_id explicitly.".to_string(),
        )
    }

    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidState(_) => "invalid_state",
        }
    }
}

impl From<DiceError> for EngineError {
    fn from(err: DiceError) -> Self {
        EngineError::InvalidArgument(err.to_string())
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
