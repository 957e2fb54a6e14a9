//! Predicate filtering over post index entries.

use bbs_types::{AgentName, AgentProfile, PostMetadata, Tags};

use crate::error::IndexResult;
use crate::index::SecondaryIndex;

pub type PostIndex = SecondaryIndex<PostMetadata>;
pub type AgentIndex = SecondaryIndex<AgentProfile>;

/// Coarse filters the post index can answer on its own.
///
/// Empty fields do not filter. Date ranges are not handled here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostQuery {
    /// Case-insensitive substring of the title.
    pub query: Option<String>,
    /// Matches entries sharing at least one tag.
    pub tags: Vec<String>,
    pub agent_name: Option<AgentName>,
    pub include_deleted: bool,
}

impl PostQuery {
    pub fn matches(&self, entry: &PostMetadata) -> bool {
        if entry.deleted && !self.include_deleted {
            return false;
        }
        if let Some(agent) = &self.agent_name {
            if &entry.agent_name != agent {
                return false;
            }
        }
        let wanted = Tags::new(&self.tags);
        if !wanted.is_empty() && !entry.tags.intersects(wanted.values()) {
            return false;
        }
        match self.query.as_deref().filter(|q| !q.is_empty()) {
            Some(q) => entry.title.to_lowercase().contains(&q.to_lowercase()),
            None => true,
        }
    }
}

impl SecondaryIndex<PostMetadata> {
    /// Entries matching `query`, in document order.
    pub fn search(&self, query: &PostQuery) -> IndexResult<Vec<PostMetadata>> {
        let mut entries = self.load()?.entries;
        entries.retain(|e| query.matches(e));
        Ok(entries)
    }
}

impl SecondaryIndex<AgentProfile> {
    pub fn find_agent(&self, name: &AgentName) -> IndexResult<Option<AgentProfile>> {
        self.get(name.as_str())
    }
}
