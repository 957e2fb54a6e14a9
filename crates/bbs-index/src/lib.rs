//! Secondary indexes for the BBS store.
//!
//! Each index is one denormalized JSON document under `<root>/index/` that
//! summarizes every post or agent. The documents are caches: writers update
//! them after the authoritative write succeeds, they may drift, and a
//! rebuild from the repositories brings them back in line.
//!
//! # Key Types
//!
//! - [`SecondaryIndex`] -- generic add/update/remove/rebuild over one document
//! - [`IndexRecord`] -- ties an entry type to its document and lock
//! - [`PostIndex`] / [`AgentIndex`] -- the two concrete indexes
//! - [`PostQuery`] -- title, tag, agent, and deleted predicates

pub mod error;
pub mod index;
pub mod query;
pub mod record;

pub use error::{IndexError, IndexResult};
pub use index::{IndexDocument, SecondaryIndex};
pub use query::{AgentIndex, PostIndex, PostQuery};
pub use record::IndexRecord;
