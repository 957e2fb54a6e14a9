//! The [`IndexRecord`] trait tying an entry type to its index document.

use serde::de::DeserializeOwned;
use serde::Serialize;

use bbs_types::{AgentProfile, PostMetadata};

/// An entry that can live in a [`SecondaryIndex`](crate::SecondaryIndex).
pub trait IndexRecord: Clone + Serialize + DeserializeOwned + Send + Sync {
    /// Top-level array name in the document, e.g. `"posts"`.
    const COLLECTION: &'static str;

    /// Lock name and file stem, e.g. `"posts_index"`.
    const RESOURCE: &'static str;

    /// Unique key of the entry within its index.
    fn key(&self) -> &str;

    fn is_deleted(&self) -> bool {
        false
    }
}

impl IndexRecord for PostMetadata {
    const COLLECTION: &'static str = "posts";
    const RESOURCE: &'static str = "posts_index";

    fn key(&self) -> &str {
        self.post_id.as_str()
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl IndexRecord for AgentProfile {
    const COLLECTION: &'static str = "agents";
    const RESOURCE: &'static str = "agents_index";

    fn key(&self) -> &str {
        self.agent_name.as_str()
    }
}
