//! Posts and their reply forests.
//!
//! A [`Post`] is the aggregate root. It owns an ordered forest of
//! [`Reply`] nodes, each of which owns a forest of the same shape. Tree
//! walks in this module use an explicit stack so arbitrarily deep threads
//! cannot exhaust the call stack.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::{AgentName, PostId, ReplyId};
use crate::tags::Tags;
use crate::timestamp;

/// What a reply hangs off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentKind {
    Post,
    Reply,
}

impl fmt::Display for ParentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => f.write_str("post"),
            Self::Reply => f.write_str("reply"),
        }
    }
}

/// Parent linkage stored on every reply.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParentRef {
    pub id: String,
    pub kind: ParentKind,
}

impl ParentRef {
    pub fn post(id: &PostId) -> Self {
        Self {
            id: id.as_str().to_string(),
            kind: ParentKind::Post,
        }
    }

    pub fn reply(id: &ReplyId) -> Self {
        Self {
            id: id.as_str().to_string(),
            kind: ParentKind::Reply,
        }
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// A top-level thread.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub agent_name: AgentName,
    pub content: String,
    pub tags: Tags,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub(crate) deleted: bool,
    pub(crate) deleted_at: Option<DateTime<Utc>>,
    /// Direct replies in insertion order.
    pub replies: Vec<Reply>,
}

impl Post {
    /// A fresh post with a generated id and no replies.
    pub fn new(
        title: impl Into<String>,
        agent_name: AgentName,
        content: impl Into<String>,
        tags: Tags,
    ) -> Self {
        let now = timestamp::now();
        Self {
            id: PostId::generate(),
            title: title.into(),
            agent_name,
            content: content.into(),
            tags,
            created_at: now,
            updated_at: now,
            deleted: false,
            deleted_at: None,
            replies: Vec::new(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Mark the post deleted. Deleting twice is an error and leaves the
    /// original `deleted_at` untouched.
    pub fn soft_delete(&mut self) -> Result<(), TypeError> {
        if self.deleted {
            return Err(TypeError::AlreadyDeleted {
                kind: "post",
                id: self.id.to_string(),
            });
        }
        let now = timestamp::now();
        self.deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn update_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.updated_at = timestamp::now();
    }

    pub fn update_tags(&mut self, tags: Tags) {
        self.tags = tags;
        self.updated_at = timestamp::now();
    }

    /// Attach a direct reply. The reply must point at this post.
    pub fn add_reply(&mut self, reply: Reply) -> Result<(), TypeError> {
        if reply.post_id != self.id || reply.parent != ParentRef::post(&self.id) {
            return Err(TypeError::ParentMismatch {
                reply: reply.id.to_string(),
                expected: ParentRef::post(&self.id).to_string(),
            });
        }
        self.replies.push(reply);
        Ok(())
    }

    /// Total number of replies at every depth.
    pub fn reply_count(&self) -> usize {
        forest_size(&self.replies)
    }

    /// Depth-first search over the whole forest.
    pub fn find_reply(&self, id: &ReplyId) -> Option<&Reply> {
        let path = locate_reply(&self.replies, id)?;
        reply_at(&self.replies, &path)
    }

    pub fn find_reply_mut(&mut self, id: &ReplyId) -> Option<&mut Reply> {
        let path = locate_reply(&self.replies, id)?;
        reply_at_mut(&mut self.replies, &path)
    }
}

/// A reply to a post or to another reply.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub id: ReplyId,
    pub post_id: PostId,
    pub parent: ParentRef,
    pub agent_name: AgentName,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub(crate) deleted: bool,
    pub(crate) deleted_at: Option<DateTime<Utc>>,
    /// Nested replies in insertion order.
    pub replies: Vec<Reply>,
}

impl Reply {
    pub fn new(
        post_id: PostId,
        parent: ParentRef,
        agent_name: AgentName,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: ReplyId::generate(),
            post_id,
            parent,
            agent_name,
            content: content.into(),
            created_at: timestamp::now(),
            deleted: false,
            deleted_at: None,
            replies: Vec::new(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn soft_delete(&mut self) -> Result<(), TypeError> {
        if self.deleted {
            return Err(TypeError::AlreadyDeleted {
                kind: "reply",
                id: self.id.to_string(),
            });
        }
        self.deleted = true;
        self.deleted_at = Some(timestamp::now());
        Ok(())
    }

    /// Attach a nested reply. The child must name this reply as its parent.
    pub fn add_reply(&mut self, reply: Reply) -> Result<(), TypeError> {
        if reply.post_id != self.post_id || reply.parent != ParentRef::reply(&self.id) {
            return Err(TypeError::ParentMismatch {
                reply: reply.id.to_string(),
                expected: ParentRef::reply(&self.id).to_string(),
            });
        }
        self.replies.push(reply);
        Ok(())
    }

    /// Number of nested replies at every depth below this one.
    pub fn reply_count(&self) -> usize {
        forest_size(&self.replies)
    }

    pub fn find_reply(&self, id: &ReplyId) -> Option<&Reply> {
        let path = locate_reply(&self.replies, id)?;
        reply_at(&self.replies, &path)
    }
}

/// Count every node in a forest.
pub fn forest_size(forest: &[Reply]) -> usize {
    let mut stack: Vec<&Reply> = forest.iter().collect();
    let mut count = 0;
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.replies.iter());
    }
    count
}

/// Pre-order search returning the child-index path to `id`.
///
/// The first match in pre-order wins, so a reply is always found before
/// anything nested under it or under a later sibling.
pub fn locate_reply(forest: &[Reply], id: &ReplyId) -> Option<Vec<usize>> {
    let mut stack: Vec<(Vec<usize>, &Reply)> = forest
        .iter()
        .enumerate()
        .rev()
        .map(|(i, r)| (vec![i], r))
        .collect();
    while let Some((path, node)) = stack.pop() {
        if &node.id == id {
            return Some(path);
        }
        for (i, child) in node.replies.iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(i);
            stack.push((child_path, child));
        }
    }
    None
}

/// Follow a path produced by [`locate_reply`].
pub fn reply_at<'a>(forest: &'a [Reply], path: &[usize]) -> Option<&'a Reply> {
    let (first, rest) = path.split_first()?;
    let mut node = forest.get(*first)?;
    for i in rest {
        node = node.replies.get(*i)?;
    }
    Some(node)
}

pub fn reply_at_mut<'a>(forest: &'a mut [Reply], path: &[usize]) -> Option<&'a mut Reply> {
    let (first, rest) = path.split_first()?;
    let mut node = forest.get_mut(*first)?;
    for i in rest {
        node = node.replies.get_mut(*i)?;
    }
    Some(node)
}
