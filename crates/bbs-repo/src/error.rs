//! Error types for repository operations.

use bbs_store::StoreError;
use bbs_types::TypeError;
use thiserror::Error;

/// Errors that can occur in post and agent repositories.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The post does not exist (or is hidden because it was deleted).
    #[error("post not found: {id}")]
    PostNotFound { id: String },

    /// The reply does not exist within the given post.
    #[error("reply not found: {reply} in post {post}")]
    ReplyNotFound { post: String, reply: String },

    #[error("agent not found: {name}")]
    AgentNotFound { name: String },

    #[error("post already exists: {id}")]
    PostAlreadyExists { id: String },

    #[error("reply already exists: {reply} in post {post}")]
    ReplyAlreadyExists { post: String, reply: String },

    #[error("agent already exists: {name}")]
    AgentAlreadyExists { name: String },

    /// The operation is not allowed in the aggregate's current state.
    #[error("precondition failed: {0}")]
    Precondition(#[from] TypeError),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl RepoError {
    /// Double deletes, broken reply linkage, malformed ids.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PostNotFound { .. } | Self::ReplyNotFound { .. } | Self::AgentNotFound { .. }
        )
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::PostAlreadyExists { .. }
                | Self::ReplyAlreadyExists { .. }
                | Self::AgentAlreadyExists { .. }
        )
    }
}

/// Convenience type alias for repository operations.
pub type RepoResult<T> = std::result::Result<T, RepoError>;
