//! The JSON documents written next to each node on disk.
//!
//! Field order matches the documents produced by earlier versions of the
//! store, and every optional field tolerates absence on read.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::Agent;
use crate::id::{AgentName, PostId, ReplyId};
use crate::post::{ParentKind, ParentRef, Post, Reply};
use crate::tags::Tags;
use crate::timestamp;

/// `posts/<id>/metadata.json`, also the entry shape of `posts_index.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostMetadata {
    pub post_id: PostId,
    pub title: String,
    pub agent_name: AgentName,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, with = "timestamp::option")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Tags,
    /// Direct children only. Informational; never read back as truth.
    #[serde(default)]
    pub reply_count: usize,
}

/// `.../replies/<id>/metadata.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyMetadata {
    pub reply_id: ReplyId,
    pub post_id: PostId,
    pub parent_id: String,
    pub parent_type: ParentKind,
    pub agent_name: AgentName,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, with = "timestamp::option")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reply_count: usize,
}

impl ReplyMetadata {
    pub fn parent(&self) -> ParentRef {
        ParentRef {
            id: self.parent_id.clone(),
            kind: self.parent_type,
        }
    }
}

/// `agents/<name>/profile.json`, also the entry shape of `agents_index.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_name: AgentName,
    pub description: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// The metadata document for this post, without its replies.
    pub fn metadata(&self) -> PostMetadata {
        PostMetadata {
            post_id: self.id.clone(),
            title: self.title.clone(),
            agent_name: self.agent_name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted: self.deleted,
            deleted_at: self.deleted_at,
            tags: self.tags.clone(),
            reply_count: self.replies.len(),
        }
    }

    /// Rebuild a post (with an empty forest) from its stored parts.
    pub fn from_metadata(meta: PostMetadata, content: String) -> Self {
        Self {
            id: meta.post_id,
            title: meta.title,
            agent_name: meta.agent_name,
            content,
            tags: meta.tags,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
            deleted: meta.deleted,
            deleted_at: meta.deleted_at,
            replies: Vec::new(),
        }
    }
}

impl Reply {
    pub fn metadata(&self) -> ReplyMetadata {
        ReplyMetadata {
            reply_id: self.id.clone(),
            post_id: self.post_id.clone(),
            parent_id: self.parent.id.clone(),
            parent_type: self.parent.kind,
            agent_name: self.agent_name.clone(),
            created_at: self.created_at,
            deleted: self.deleted,
            deleted_at: self.deleted_at,
            reply_count: self.replies.len(),
        }
    }

    pub fn from_metadata(meta: ReplyMetadata, content: String) -> Self {
        let parent = meta.parent();
        Self {
            id: meta.reply_id,
            post_id: meta.post_id,
            parent,
            agent_name: meta.agent_name,
            content,
            created_at: meta.created_at,
            deleted: meta.deleted,
            deleted_at: meta.deleted_at,
            replies: Vec::new(),
        }
    }
}

impl Agent {
    pub fn profile(&self) -> AgentProfile {
        AgentProfile {
            agent_name: self.name.clone(),
            description: self.description.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
        }
    }

    pub fn from_profile(profile: AgentProfile) -> Self {
        Self {
            name: profile.agent_name,
            description: profile.description,
            metadata: profile.metadata,
            created_at: profile.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str) -> AgentName {
        AgentName::new(name).unwrap()
    }

    #[test]
    fn post_metadata_counts_direct_children_only() {
        let mut post = Post::new("t", agent("alice"), "c", Tags::default());
        let mut r1 = Reply::new(post.id.clone(), ParentRef::post(&post.id), agent("bob"), "a");
        let r2 = Reply::new(post.id.clone(), ParentRef::reply(&r1.id), agent("bob"), "b");
        r1.add_reply(r2).unwrap();
        post.add_reply(r1).unwrap();

        assert_eq!(post.metadata().reply_count, 1);
        assert_eq!(post.reply_count(), 2);
    }

    #[test]
    fn post_metadata_field_order_and_shape() {
        let post = Post::new("Hello", agent("alice"), "body", Tags::new(["X"]));
        let json = serde_json::to_value(post.metadata()).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        for key in [
            "post_id", "title", "agent_name", "created_at", "updated_at", "deleted",
            "deleted_at", "tags", "reply_count",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert!(json["deleted_at"].is_null());
        assert_eq!(json["tags"], serde_json::json!(["x"]));
    }

    #[test]
    fn reads_documents_from_earlier_writers() {
        let raw = r#"{
          "reply_id": "reply_1700000000_0a1b2c3d",
          "post_id": "post_1700000000_deadbeef",
          "parent_id": "post_1700000000_deadbeef",
          "parent_type": "post",
          "agent_name": "alice",
          "created_at": "2023-11-14T22:13:20.500000",
          "deleted": false,
          "deleted_at": null,
          "reply_count": 0
        }"#;
        let meta: ReplyMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.parent().kind, ParentKind::Post);
        let reply = Reply::from_metadata(meta.clone(), "text".into());
        assert_eq!(reply.metadata(), meta);
    }

    #[test]
    fn deleted_state_survives_round_trip() {
        let mut post = Post::new("t", agent("alice"), "c", Tags::default());
        post.soft_delete().unwrap();
        let json = serde_json::to_string(&post.metadata()).unwrap();
        let back: PostMetadata = serde_json::from_str(&json).unwrap();
        let restored = Post::from_metadata(back, "c".into());
        assert!(restored.is_deleted());
        assert_eq!(restored.deleted_at(), post.deleted_at());
    }

    #[test]
    fn agent_profile_tolerates_missing_metadata() {
        let raw = r#"{"agent_name":"alice","description":"d","created_at":"2024-01-01T00:00:00"}"#;
        let profile: AgentProfile = serde_json::from_str(raw).unwrap();
        let agent = Agent::from_profile(profile);
        assert!(agent.metadata.is_empty());
        assert_eq!(agent.profile().agent_name.as_str(), "alice");
    }
}
