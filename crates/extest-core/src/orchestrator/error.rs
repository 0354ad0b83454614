use thiserror::Error;

use super::types::OrchestratorState;
use crate::tree::TreeError;

/// Errors that can occur in orchestrator operations.
///
/// Runner failures are not here: they are reported per project next to
/// whatever results were produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("Orchestrator is busy ({state})")]
    Busy { state: OrchestratorState },

    #[error("{target} does not belong to a loaded project")]
    OutsideProject { target: String },
}
