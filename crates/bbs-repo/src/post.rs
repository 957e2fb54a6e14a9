//! Filesystem-backed [`PostRepository`].

use std::cmp::Reverse;
use std::sync::Arc;

use bbs_store::{FileStorage, StoreError};
use bbs_types::post::{locate_reply, reply_at, reply_at_mut};
use chrono::Duration;
use bbs_types::{ParentKind, Post, PostId, Reply, ReplyId};
use tracing::{debug, info};

use crate::codec::{self, REPLIES_DIR};
use crate::error::{RepoError, RepoResult};
use crate::traits::{PostFilter, PostRepository};

/// Posts stored as directory trees under `<root>/posts/`.
#[derive(Debug, Clone)]
pub struct FsPostRepository {
    storage: Arc<FileStorage>,
}

impl FsPostRepository {
    pub fn new(storage: Arc<FileStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    fn lock_name(id: &PostId) -> String {
        format!("post_{id}")
    }

    fn post_not_found(id: &PostId) -> RepoError {
        RepoError::PostNotFound { id: id.to_string() }
    }

    fn reply_not_found(post_id: &PostId, reply_id: &str) -> RepoError {
        RepoError::ReplyNotFound {
            post: post_id.to_string(),
            reply: reply_id.to_string(),
        }
    }
}

impl PostRepository for FsPostRepository {
    fn save(&self, post: &Post) -> RepoResult<()> {
        let _guard = self.storage.lock(&Self::lock_name(&post.id))?;
        let dir = codec::post_dir(&self.storage, &post.id);
        self.storage.create_dir_exclusive(&dir).map_err(|e| match e {
            StoreError::AlreadyExists(_) => RepoError::PostAlreadyExists {
                id: post.id.to_string(),
            },
            other => other.into(),
        })?;
        codec::persist_post(&self.storage, &dir, post)?;
        info!(post_id = %post.id, agent = %post.agent_name, "post created");
        Ok(())
    }

    fn find_by_id(&self, id: &PostId, include_deleted: bool) -> RepoResult<Option<Post>> {
        let dir = codec::post_dir(&self.storage, id);
        Ok(codec::load_post(&self.storage, &dir, include_deleted))
    }

    fn find_all(&self, filter: &PostFilter) -> RepoResult<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .storage
            .list_subdirectories(self.storage.posts_dir())?
            .iter()
            .filter_map(|dir| codec::load_post(&self.storage, dir, filter.include_deleted))
            .filter(|post| {
                filter
                    .agent_name
                    .as_ref()
                    .map_or(true, |name| &post.agent_name == name)
            })
            .collect();

        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(posts.into_iter().skip(filter.offset).take(limit).collect())
    }

    fn delete(&self, id: &PostId) -> RepoResult<Post> {
        let _guard = self.storage.lock(&Self::lock_name(id))?;
        let dir = codec::post_dir(&self.storage, id);
        let mut post =
            codec::load_post(&self.storage, &dir, true).ok_or_else(|| Self::post_not_found(id))?;
        post.soft_delete()?;
        codec::persist_post(&self.storage, &dir, &post)?;
        info!(post_id = %id, "post deleted");
        Ok(post)
    }

    fn save_reply(&self, post_id: &PostId, reply: &Reply) -> RepoResult<Reply> {
        let _guard = self.storage.lock(&Self::lock_name(post_id))?;
        let dir = codec::post_dir(&self.storage, post_id);
        let mut post = codec::load_post(&self.storage, &dir, true)
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| Self::post_not_found(post_id))?;

        if post.find_reply(&reply.id).is_some() {
            return Err(RepoError::ReplyAlreadyExists {
                post: post_id.to_string(),
                reply: reply.id.to_string(),
            });
        }

        let parent_path = match reply.parent.kind {
            ParentKind::Post => Vec::new(),
            ParentKind::Reply => {
                let parent_id = ReplyId::parse(reply.parent.id.as_str())?;
                locate_reply(&post.replies, &parent_id)
                    .ok_or_else(|| Self::reply_not_found(post_id, parent_id.as_str()))?
            }
        };
        let parent_dir = codec::reply_dir(&dir, &post, &parent_path)
            .ok_or_else(|| Self::reply_not_found(post_id, &reply.parent.id))?;

        let siblings = if parent_path.is_empty() {
            &post.replies
        } else {
            &reply_at(&post.replies, &parent_path)
                .ok_or_else(|| Self::reply_not_found(post_id, &reply.parent.id))?
                .replies
        };
        let mut stored = reply.clone();
        if let Some(newest) = siblings.iter().map(|r| r.created_at).max() {
            if stored.created_at <= newest {
                stored.created_at = newest + Duration::microseconds(1);
            }
        }

        // Linkage is checked in memory before anything touches disk.
        if parent_path.is_empty() {
            post.add_reply(stored.clone())?;
        } else {
            reply_at_mut(&mut post.replies, &parent_path)
                .ok_or_else(|| Self::reply_not_found(post_id, &reply.parent.id))?
                .add_reply(stored.clone())?;
        }
        codec::persist_reply(&self.storage, &parent_dir.join(REPLIES_DIR), &stored)?;
        debug!(post_id = %post_id, reply_id = %stored.id, parent = %stored.parent, "reply saved");
        Ok(stored)
    }

    fn find_reply_by_id(&self, post_id: &PostId, reply_id: &ReplyId) -> RepoResult<Option<Reply>> {
        Ok(self
            .find_by_id(post_id, true)?
            .and_then(|post| post.find_reply(reply_id).cloned()))
    }

    fn delete_reply(&self, post_id: &PostId, reply_id: &ReplyId) -> RepoResult<Reply> {
        let _guard = self.storage.lock(&Self::lock_name(post_id))?;
        let dir = codec::post_dir(&self.storage, post_id);
        let mut post = codec::load_post(&self.storage, &dir, true)
            .ok_or_else(|| Self::post_not_found(post_id))?;

        let path = locate_reply(&post.replies, reply_id)
            .ok_or_else(|| Self::reply_not_found(post_id, reply_id.as_str()))?;
        let (_, parent_path) = path
            .split_last()
            .ok_or_else(|| Self::reply_not_found(post_id, reply_id.as_str()))?;
        let replies_dir = codec::reply_dir(&dir, &post, parent_path)
            .ok_or_else(|| Self::reply_not_found(post_id, reply_id.as_str()))?
            .join(REPLIES_DIR);

        let reply = reply_at_mut(&mut post.replies, &path)
            .ok_or_else(|| Self::reply_not_found(post_id, reply_id.as_str()))?;
        reply.soft_delete()?;
        codec::persist_reply(&self.storage, &replies_dir, reply)?;
        info!(post_id = %post_id, reply_id = %reply_id, "reply deleted");
        Ok(reply.clone())
    }
}
