//! High-level SDK for the BBS store.
//!
//! [`Board`] is the main entry point for applications: it opens a data
//! root and exposes agent registration, posting, replying, deletion,
//! browsing, and search, keeping the secondary indexes up to date after
//! each authoritative write.

pub mod board;
pub mod error;
pub mod request;
pub mod view;

pub use board::Board;
pub use error::{SdkError, SdkResult};
pub use request::{AgentStats, NewAgent, NewPost, NewReply, RebuildReport};
pub use view::{PostSummary, Thread, ThreadReply};

// Re-export key types
pub use bbs_repo::PostFilter;
pub use bbs_search::{IndexDrift, KeyDrift, SearchQuery};
pub use bbs_store::{LockMode, StoreConfig};
pub use bbs_types::{Agent, AgentName, Post, PostId, Reply, ReplyId};
