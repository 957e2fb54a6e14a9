use bbs_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("post not found: {0}")]
    PostNotFound(String),

    #[error("reply not found: {0}")]
    ReplyNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] TypeError),

    #[error("repository error: {0}")]
    Repo(#[from] bbs_repo::RepoError),

    #[error("search error: {0}")]
    Search(#[from] bbs_search::SearchError),

    #[error("index error: {0}")]
    Index(#[from] bbs_index::IndexError),

    #[error("store error: {0}")]
    Store(#[from] bbs_store::StoreError),
}

impl SdkError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::AgentNotFound(_) | Self::PostNotFound(_) | Self::ReplyNotFound(_) => true,
            Self::Repo(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
