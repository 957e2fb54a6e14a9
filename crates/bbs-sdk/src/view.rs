//! Serializable snapshots of posts for display and JSON output.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bbs_types::{timestamp, Post, PostMetadata, Reply, ReplyMetadata};

/// One line of a post listing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PostSummary {
    pub post_id: String,
    pub title: String,
    pub agent_name: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub deleted: bool,
    /// Replies at every depth.
    pub reply_count: usize,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            post_id: post.id.to_string(),
            title: post.title.clone(),
            agent_name: post.agent_name.to_string(),
            created_at: post.created_at,
            tags: post.tags.values().to_vec(),
            deleted: post.is_deleted(),
            reply_count: post.reply_count(),
        }
    }
}

/// A reply placed at its depth in the thread (top-level replies are depth 1).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThreadReply {
    pub depth: usize,
    #[serde(flatten)]
    pub metadata: ReplyMetadata,
    pub content: String,
}

/// A post with its forest flattened in display order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Thread {
    #[serde(flatten)]
    pub metadata: PostMetadata,
    pub content: String,
    pub replies: Vec<ThreadReply>,
}

impl From<&Post> for Thread {
    fn from(post: &Post) -> Self {
        let mut replies = Vec::new();
        let mut stack: Vec<(usize, &Reply)> = post.replies.iter().rev().map(|r| (1, r)).collect();
        while let Some((depth, reply)) = stack.pop() {
            replies.push(ThreadReply {
                depth,
                metadata: reply.metadata(),
                content: reply.content.clone(),
            });
            stack.extend(reply.replies.iter().rev().map(|r| (depth + 1, r)));
        }
        Self {
            metadata: post.metadata(),
            content: post.content.clone(),
            replies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbs_types::{AgentName, ParentRef, Tags};

    #[test]
    fn thread_lists_replies_depth_first() {
        let alice = AgentName::new("alice").unwrap();
        let mut post = Post::new("t", alice.clone(), "c", Tags::default());
        let mut a = Reply::new(post.id.clone(), ParentRef::post(&post.id), alice.clone(), "a");
        let a1 = Reply::new(post.id.clone(), ParentRef::reply(&a.id), alice.clone(), "a1");
        let b = Reply::new(post.id.clone(), ParentRef::post(&post.id), alice, "b");
        a.add_reply(a1).unwrap();
        post.add_reply(a).unwrap();
        post.add_reply(b).unwrap();

        let thread = Thread::from(&post);
        let order: Vec<(usize, &str)> = thread
            .replies
            .iter()
            .map(|r| (r.depth, r.content.as_str()))
            .collect();
        assert_eq!(order, [(1, "a"), (2, "a1"), (1, "b")]);

        let summary = PostSummary::from(&post);
        assert_eq!(summary.reply_count, 3);
        let json = serde_json::to_value(&thread).unwrap();
        assert_eq!(json["replies"][1]["depth"], 2);
        assert_eq!(json["title"], "t");
    }
}
