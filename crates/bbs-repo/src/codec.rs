//! Mapping between posts/replies and directory subtrees.
//!
//! ```text
//! posts/<post-id>/
//!   metadata.json
//!   content.md
//!   replies/<reply-id>/
//!     metadata.json
//!     content.md
//!     replies/<reply-id>/...
//! ```
//!
//! Loading never fails as a whole: a node whose documents are missing,
//! unparsable, or linked to the wrong parent is dropped together with its
//! subtree and logged, and its siblings are still returned.

use std::path::{Path, PathBuf};

use bbs_store::{FileStorage, StoreError, StoreResult};
use bbs_types::{ParentRef, Post, PostId, PostMetadata, Reply, ReplyMetadata};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

pub const METADATA_FILE: &str = "metadata.json";
pub const CONTENT_FILE: &str = "content.md";
pub const REPLIES_DIR: &str = "replies";

pub fn post_dir(storage: &FileStorage, id: &PostId) -> PathBuf {
    storage.posts_dir().join(id.as_str())
}

/// Directory of the reply reached by following `path` (child indexes, as
/// returned by [`bbs_types::post::locate_reply`]) from `post`.
pub fn reply_dir(post_dir: &Path, post: &Post, path: &[usize]) -> Option<PathBuf> {
    let mut dir = post_dir.to_path_buf();
    let mut forest = &post.replies;
    for i in path {
        let node = forest.get(*i)?;
        dir = dir.join(REPLIES_DIR).join(node.id.as_str());
        forest = &node.replies;
    }
    Some(dir)
}

// ---------------------------------------------------------------------------
// Persist
// ---------------------------------------------------------------------------

/// Write the post and its whole forest under `dir`.
pub fn persist_post(storage: &FileStorage, dir: &Path, post: &Post) -> StoreResult<()> {
    storage.write_text(&dir.join(CONTENT_FILE), &post.content)?;
    storage.write_json(&dir.join(METADATA_FILE), &post.metadata())?;
    let replies_dir = dir.join(REPLIES_DIR);
    for reply in &post.replies {
        persist_reply(storage, &replies_dir, reply)?;
    }
    debug!(post_id = %post.id, replies = post.reply_count(), "post persisted");
    Ok(())
}

/// Write `reply` into `replies_dir/<id>/` and its descendants below it,
/// parents before children.
pub fn persist_reply(storage: &FileStorage, replies_dir: &Path, reply: &Reply) -> StoreResult<()> {
    let mut stack = vec![(replies_dir.join(reply.id.as_str()), reply)];
    while let Some((dir, node)) = stack.pop() {
        write_reply_node(storage, &dir, node)?;
        let children = dir.join(REPLIES_DIR);
        for child in node.replies.iter().rev() {
            stack.push((children.join(child.id.as_str()), child));
        }
    }
    Ok(())
}

// Content first: a node becomes visible once its metadata exists.
fn write_reply_node(storage: &FileStorage, dir: &Path, reply: &Reply) -> StoreResult<()> {
    storage.write_text(&dir.join(CONTENT_FILE), &reply.content)?;
    storage.write_json(&dir.join(METADATA_FILE), &reply.metadata())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load the post stored in `dir`.
///
/// Returns `None` when the directory holds no readable post, when its id
/// does not match the directory name, or when it is deleted and
/// `include_deleted` is false.
pub fn load_post(storage: &FileStorage, dir: &Path, include_deleted: bool) -> Option<Post> {
    let (meta, content) = match read_node::<PostMetadata>(storage, dir) {
        Ok(node) => node,
        Err(e) if e.is_not_found() => return None,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "skipping unreadable post");
            return None;
        }
    };
    if !dir_name_is(dir, meta.post_id.as_str()) {
        warn!(
            dir = %dir.display(),
            post_id = %meta.post_id,
            "skipping post stored under a foreign directory"
        );
        return None;
    }
    if meta.deleted && !include_deleted {
        return None;
    }

    let mut post = Post::from_metadata(meta, content);
    post.replies = load_forest(
        storage,
        &dir.join(REPLIES_DIR),
        &post.id,
        ParentRef::post(&post.id),
        include_deleted,
    );
    Some(post)
}

struct Slot {
    reply: Reply,
    parent: Option<usize>,
}

/// Load every reply below `replies_dir` whose linkage checks out.
///
/// Nodes are collected into an arena with parent links, then assembled
/// bottom-up. Siblings are ordered by `(created_at, id)`; the repository
/// keeps `created_at` increasing in write order among siblings.
pub fn load_forest(
    storage: &FileStorage,
    replies_dir: &Path,
    post_id: &PostId,
    parent: ParentRef,
    include_deleted: bool,
) -> Vec<Reply> {
    let mut arena: Vec<Slot> = Vec::new();
    let mut pending: Vec<(PathBuf, Option<usize>, ParentRef)> =
        vec![(replies_dir.to_path_buf(), None, parent)];

    while let Some((dir, parent_slot, expected)) = pending.pop() {
        let children = match storage.list_subdirectories(&dir) {
            Ok(children) => children,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot list replies");
                continue;
            }
        };
        for child_dir in children {
            let Some(reply) = load_reply_node(storage, &child_dir, post_id, &expected) else {
                continue;
            };
            if reply.is_deleted() && !include_deleted {
                continue;
            }
            let next_parent = ParentRef::reply(&reply.id);
            arena.push(Slot {
                reply,
                parent: parent_slot,
            });
            pending.push((child_dir.join(REPLIES_DIR), Some(arena.len() - 1), next_parent));
        }
    }

    // Children always sit after their parent in the arena.
    let mut roots = Vec::new();
    while let Some(Slot { mut reply, parent }) = arena.pop() {
        sort_siblings(&mut reply.replies);
        match parent.and_then(|i| arena.get_mut(i)) {
            Some(slot) => slot.reply.replies.push(reply),
            None => roots.push(reply),
        }
    }
    sort_siblings(&mut roots);
    roots
}

fn load_reply_node(
    storage: &FileStorage,
    dir: &Path,
    post_id: &PostId,
    expected: &ParentRef,
) -> Option<Reply> {
    let (meta, content) = match read_node::<ReplyMetadata>(storage, dir) {
        Ok(node) => node,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "dropping unreadable reply");
            return None;
        }
    };
    if !dir_name_is(dir, meta.reply_id.as_str())
        || &meta.post_id != post_id
        || &meta.parent() != expected
    {
        warn!(
            dir = %dir.display(),
            reply_id = %meta.reply_id,
            found = %meta.parent(),
            expected = %expected,
            "dropping reply with mismatched linkage"
        );
        return None;
    }
    Some(Reply::from_metadata(meta, content))
}

fn sort_siblings(forest: &mut [Reply]) {
    forest.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.as_str().cmp(b.id.as_str()))
    });
}

fn read_node<M: DeserializeOwned>(storage: &FileStorage, dir: &Path) -> StoreResult<(M, String)> {
    let meta = storage.read_json(&dir.join(METADATA_FILE))?;
    let content = storage.read_text(&dir.join(CONTENT_FILE))?;
    Ok((meta, content))
}

fn dir_name_is(dir: &Path, id: &str) -> bool {
    dir.file_name().and_then(|n| n.to_str()) == Some(id)
}

// ---------------------------------------------------------------------------
// Raw walk
// ---------------------------------------------------------------------------

/// Visit the metadata of every parsable reply below `post_dir`, including
/// deleted replies and replies under deleted parents. Content is not read.
pub fn walk_reply_metadata(
    storage: &FileStorage,
    post_dir: &Path,
    mut visit: impl FnMut(&ReplyMetadata),
) -> StoreResult<()> {
    let mut pending = vec![post_dir.join(REPLIES_DIR)];
    while let Some(dir) = pending.pop() {
        for child in storage.list_subdirectories(&dir)? {
            match storage.read_json::<ReplyMetadata>(&child.join(METADATA_FILE)) {
                Ok(meta) => visit(&meta),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => warn!(dir = %child.display(), error = %e, "skipping unreadable reply"),
            }
            pending.push(child.join(REPLIES_DIR));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbs_store::StoreConfig;
    use bbs_types::{AgentName, Tags};
    use std::fs;

    fn open_temp() -> (tempfile::TempDir, FileStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(&StoreConfig::at(dir.path())).unwrap();
        (dir, storage)
    }

    fn agent(name: &str) -> AgentName {
        AgentName::new(name).unwrap()
    }

    fn new_post() -> Post {
        Post::new("Hello", agent("alice"), "body", Tags::new(["x"]))
    }

    fn child_of(parent: &Reply, content: &str) -> Reply {
        Reply::new(
            parent.post_id.clone(),
            ParentRef::reply(&parent.id),
            agent("bob"),
            content,
        )
    }

    /// post -> r0 -> r1 -> ... -> r{depth-1}, plus a second top-level reply.
    fn threaded_post(depth: usize) -> Post {
        let mut post = new_post();
        let mut chain = vec![Reply::new(
            post.id.clone(),
            ParentRef::post(&post.id),
            agent("bob"),
            "level 0",
        )];
        for level in 1..depth {
            let next = child_of(chain.last().unwrap(), &format!("level {level}"));
            chain.push(next);
        }
        let mut node = chain.pop().unwrap();
        while let Some(mut parent) = chain.pop() {
            parent.add_reply(node).unwrap();
            node = parent;
        }
        post.add_reply(node).unwrap();
        let mut sibling =
            Reply::new(post.id.clone(), ParentRef::post(&post.id), agent("carol"), "side");
        sibling.created_at = post.replies[0].created_at + chrono::Duration::seconds(1);
        post.add_reply(sibling).unwrap();
        post
    }

    #[test]
    fn five_level_tree_round_trips() {
        let (_dir, storage) = open_temp();
        let post = threaded_post(5);
        let dir = post_dir(&storage, &post.id);
        persist_post(&storage, &dir, &post).unwrap();

        let loaded = load_post(&storage, &dir, false).unwrap();
        assert_eq!(loaded, post);
        assert_eq!(loaded.reply_count(), 6);
    }

    #[test]
    fn files_land_in_nested_layout() {
        let (_dir, storage) = open_temp();
        let post = threaded_post(2);
        let dir = post_dir(&storage, &post.id);
        persist_post(&storage, &dir, &post).unwrap();

        let r0 = &post.replies[0];
        let r1 = &r0.replies[0];
        let nested = dir
            .join(REPLIES_DIR)
            .join(r0.id.as_str())
            .join(REPLIES_DIR)
            .join(r1.id.as_str());
        assert!(nested.join(METADATA_FILE).is_file());
        assert_eq!(fs::read_to_string(nested.join(CONTENT_FILE)).unwrap(), "level 1");
        assert_eq!(reply_dir(&dir, &post, &[0, 0]), Some(nested));
    }

    #[test]
    fn deleted_reply_hides_its_subtree() {
        let (_dir, storage) = open_temp();
        let mut post = threaded_post(2);
        post.replies[0].soft_delete().unwrap();
        let dir = post_dir(&storage, &post.id);
        persist_post(&storage, &dir, &post).unwrap();

        let hidden = load_post(&storage, &dir, false).unwrap();
        assert_eq!(hidden.reply_count(), 1);
        assert_eq!(hidden.replies[0].content, "side");

        let all = load_post(&storage, &dir, true).unwrap();
        assert_eq!(all.reply_count(), 3);
    }

    #[test]
    fn deleted_post_is_hidden_unless_requested() {
        let (_dir, storage) = open_temp();
        let mut post = new_post();
        post.soft_delete().unwrap();
        let dir = post_dir(&storage, &post.id);
        persist_post(&storage, &dir, &post).unwrap();

        assert!(load_post(&storage, &dir, false).is_none());
        assert!(load_post(&storage, &dir, true).unwrap().is_deleted());
    }

    #[test]
    fn corrupt_reply_is_dropped_but_siblings_survive() {
        let (_dir, storage) = open_temp();
        let post = threaded_post(3);
        let dir = post_dir(&storage, &post.id);
        persist_post(&storage, &dir, &post).unwrap();

        let broken = dir.join(REPLIES_DIR).join(post.replies[0].id.as_str());
        fs::write(broken.join(METADATA_FILE), "{ not json").unwrap();

        let loaded = load_post(&storage, &dir, true).unwrap();
        assert_eq!(loaded.replies.len(), 1);
        assert_eq!(loaded.replies[0].content, "side");
    }

    #[test]
    fn missing_content_drops_the_node() {
        let (_dir, storage) = open_temp();
        let post = threaded_post(1);
        let dir = post_dir(&storage, &post.id);
        persist_post(&storage, &dir, &post).unwrap();

        let victim = dir.join(REPLIES_DIR).join(post.replies[1].id.as_str());
        fs::remove_file(victim.join(CONTENT_FILE)).unwrap();

        let loaded = load_post(&storage, &dir, true).unwrap();
        assert_eq!(loaded.reply_count(), 1);
        assert_eq!(loaded.replies[0].id, post.replies[0].id);
    }

    #[test]
    fn reply_under_wrong_parent_is_dropped() {
        let (_dir, storage) = open_temp();
        let post = threaded_post(2);
        let dir = post_dir(&storage, &post.id);
        persist_post(&storage, &dir, &post).unwrap();

        // Move the nested reply up to the top level; its stored parent is
        // now the wrong kind for this position.
        let r0 = &post.replies[0];
        let r1 = &r0.replies[0];
        let from = dir
            .join(REPLIES_DIR)
            .join(r0.id.as_str())
            .join(REPLIES_DIR)
            .join(r1.id.as_str());
        let to = dir.join(REPLIES_DIR).join(r1.id.as_str());
        fs::rename(from, to).unwrap();

        let loaded = load_post(&storage, &dir, true).unwrap();
        assert_eq!(loaded.reply_count(), 2);
        assert!(loaded.find_reply(&r1.id).is_none());
    }

    #[test]
    fn post_under_foreign_directory_is_skipped() {
        let (_dir, storage) = open_temp();
        let post = new_post();
        let wrong = storage.posts_dir().join("post_0_00000000");
        persist_post(&storage, &wrong, &post).unwrap();
        assert!(load_post(&storage, &wrong, true).is_none());
    }

    #[test]
    fn long_chain_round_trips() {
        let (_dir, storage) = open_temp();
        let post = threaded_post(50);
        let dir = post_dir(&storage, &post.id);
        persist_post(&storage, &dir, &post).unwrap();
        let loaded = load_post(&storage, &dir, false).unwrap();
        assert_eq!(loaded.reply_count(), 51);
        assert_eq!(loaded, post);
    }

    #[test]
    fn raw_walk_sees_replies_under_deleted_parents() {
        let (_dir, storage) = open_temp();
        let mut post = threaded_post(3);
        post.replies[0].soft_delete().unwrap();
        let dir = post_dir(&storage, &post.id);
        persist_post(&storage, &dir, &post).unwrap();

        let mut seen = Vec::new();
        walk_reply_metadata(&storage, &dir, |meta| seen.push(meta.reply_id.clone())).unwrap();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn raw_walk_skips_unreadable_reply_but_keeps_descending() {
        let (_dir, storage) = open_temp();
        let post = threaded_post(3);
        let dir = post_dir(&storage, &post.id);
        persist_post(&storage, &dir, &post).unwrap();

        let broken = dir.join(REPLIES_DIR).join(post.replies[0].id.as_str());
        fs::write(broken.join(METADATA_FILE), "{ not json").unwrap();

        let mut seen = Vec::new();
        walk_reply_metadata(&storage, &dir, |meta| seen.push(meta.reply_id.clone())).unwrap();
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&post.replies[0].id));
    }
}
