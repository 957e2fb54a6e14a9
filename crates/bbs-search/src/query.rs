use chrono::{DateTime, Utc};

use bbs_index::PostQuery;
use bbs_types::{AgentName, PostMetadata};

/// Page size used when a search does not name one.
pub const DEFAULT_LIMIT: usize = 50;

/// A full post search: index predicates, a creation-date window, and a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub tags: Vec<String>,
    pub agent_name: Option<AgentName>,
    /// Inclusive lower bound on `created_at`.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub end: Option<DateTime<Utc>>,
    pub include_deleted: bool,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: None,
            tags: Vec::new(),
            agent_name: None,
            start: None,
            end: None,
            include_deleted: false,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl SearchQuery {
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn index_query(&self) -> PostQuery {
        PostQuery {
            query: self.query.clone(),
            tags: self.tags.clone(),
            agent_name: self.agent_name.clone(),
            include_deleted: self.include_deleted,
        }
    }

    pub fn in_window(&self, created_at: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| *created_at >= start)
            && self.end.map_or(true, |end| *created_at <= end)
    }

    /// Index predicates and date window together.
    pub fn matches(&self, entry: &PostMetadata) -> bool {
        self.in_window(&entry.created_at) && self.index_query().matches(entry)
    }
}
