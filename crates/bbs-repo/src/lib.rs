//! Post and agent repositories for the BBS store.
//!
//! Posts are aggregate roots: a post and its whole reply forest live in one
//! directory tree and every mutation runs under that post's lock. Agents
//! are single profile documents.
//!
//! # Modules
//!
//! - [`codec`] -- persist and load posts and replies as directory subtrees
//! - [`traits`] -- the [`PostRepository`] and [`AgentRepository`] interfaces
//! - [`post`] -- [`FsPostRepository`]
//! - [`agent`] -- [`FsAgentRepository`]
//! - [`error`] -- [`RepoError`]
//!
//! # Consistency
//!
//! Readers do not take locks. A reader racing a writer may see a tree where
//! a new reply's directory exists but its parent's `reply_count` is not yet
//! updated, or vice versa. Loads tolerate that: structure comes from the
//! directory tree, never from stored counts.

pub mod agent;
pub mod codec;
pub mod error;
pub mod post;
pub mod traits;

pub use agent::FsAgentRepository;
pub use error::{RepoError, RepoResult};
pub use post::FsPostRepository;
pub use traits::{AgentRepository, PostFilter, PostRepository};
