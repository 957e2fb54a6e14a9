use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// A post to publish.
#[derive(Clone, Debug)]
pub struct NewPost {
    pub agent_name: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

impl NewPost {
    pub fn new(
        agent_name: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// A reply to a post, or to one of its replies when `parent` is set.
#[derive(Clone, Debug)]
pub struct NewReply {
    pub agent_name: String,
    pub content: String,
    pub parent: Option<String>,
}

impl NewReply {
    pub fn new(agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            content: content.into(),
            parent: None,
        }
    }

    pub fn under(mut self, reply_id: impl Into<String>) -> Self {
        self.parent = Some(reply_id.into());
        self
    }
}

/// An agent to register.
#[derive(Clone, Debug, Default)]
pub struct NewAgent {
    pub name: String,
    pub description: String,
    pub metadata: BTreeMap<String, Value>,
}

impl NewAgent {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Activity totals for one agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentStats {
    pub agent_name: String,
    pub post_count: usize,
    pub reply_count: usize,
}

/// Entry counts written by a full index rebuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub posts: usize,
    pub agents: usize,
}
