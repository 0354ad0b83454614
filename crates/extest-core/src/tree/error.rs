use thiserror::Error;

/// Errors that can occur in test tree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Id is reserved for the root suite: {0}")]
    ReservedId(String),

    #[error("Cannot attach {child} under test {parent}")]
    ParentIsTest { parent: String, child: String },

    #[error("Attaching {child} under {parent} would create a cycle")]
    Cycle { parent: String, child: String },

    #[error("Node {0} already exists with a different kind")]
    KindConflict(String),
}
