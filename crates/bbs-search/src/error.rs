//! Error types for search operations.

use bbs_index::IndexError;
use bbs_repo::RepoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;
