use thiserror::Error;

/// Errors produced by type operations.
///
/// Every variant is a precondition violation: the caller handed the store
/// something it must not persist.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid {kind} id {value:?}: {reason}")]
    InvalidId {
        kind: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid agent name {value:?}: {reason}")]
    InvalidAgentName { value: String, reason: String },

    #[error("{kind} {id} is already deleted")]
    AlreadyDeleted { kind: &'static str, id: String },

    #[error("reply {reply} does not belong under {expected}")]
    ParentMismatch { reply: String, expected: String },
}
