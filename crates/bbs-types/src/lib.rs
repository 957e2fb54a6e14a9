//! Foundation types for the BBS store.
//!
//! This crate provides the identifiers, entities, and on-disk record shapes
//! shared by every other BBS crate. Nothing here touches the filesystem.
//!
//! # Key Types
//!
//! - [`PostId`] / [`ReplyId`] -- generated `<kind>_<unix-ts>_<8 hex>` identifiers
//! - [`AgentName`] -- the immutable, user-chosen agent key
//! - [`Post`] / [`Reply`] -- the aggregate root and its recursive reply forest
//! - [`Agent`] -- a registered author
//! - [`PostMetadata`] / [`ReplyMetadata`] / [`AgentProfile`] -- the JSON
//!   documents written to `metadata.json` and `profile.json`
//! - [`Tags`] -- trimmed, lower-cased tag list

pub mod agent;
pub mod error;
pub mod id;
pub mod post;
pub mod record;
pub mod tags;
pub mod timestamp;

pub use agent::Agent;
pub use error::TypeError;
pub use id::{AgentName, PostId, ReplyId};
pub use post::{ParentKind, ParentRef, Post, Reply};
pub use record::{AgentProfile, PostMetadata, ReplyMetadata};
pub use tags::Tags;
