//! The repository traits defining aggregate persistence.
//!
//! Any backend implements these to store posts (with their reply forests)
//! and agents. Read paths report absence as `Ok(None)`; errors are reserved
//! for storage failures and for operations whose target must exist.

use bbs_types::{Agent, AgentName, Post, PostId, Reply, ReplyId};

use crate::error::RepoResult;

/// Filters and paging for [`PostRepository::find_all`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub agent_name: Option<AgentName>,
    pub include_deleted: bool,
    /// `None` means no limit.
    pub limit: Option<usize>,
    pub offset: usize,
}

impl PostFilter {
    pub fn by_agent(agent_name: AgentName) -> Self {
        Self {
            agent_name: Some(agent_name),
            ..Self::default()
        }
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }
}

/// Storage for posts and their replies.
///
/// Every mutation holds the post's lock for its whole read-modify-write,
/// so two mutators of one post are fully serialized.
pub trait PostRepository: Send + Sync {
    /// Persist a new post. Fails if a post with this id already exists.
    fn save(&self, post: &Post) -> RepoResult<()>;

    /// Load a post with its reply forest.
    fn find_by_id(&self, id: &PostId, include_deleted: bool) -> RepoResult<Option<Post>>;

    /// Scan every post, newest first, then apply `offset` and `limit`.
    fn find_all(&self, filter: &PostFilter) -> RepoResult<Vec<Post>>;

    /// Soft-delete a post and return its new state.
    fn delete(&self, id: &PostId) -> RepoResult<Post>;

    /// Attach a new reply under the parent it names and return it as stored.
    ///
    /// Only the new reply's own subtree is written; the parent's files are
    /// left as they are. `created_at` is moved past the newest sibling if
    /// needed, so loaded sibling order follows write order.
    fn save_reply(&self, post_id: &PostId, reply: &Reply) -> RepoResult<Reply>;

    /// Find a reply anywhere in a post's forest, deleted nodes included.
    fn find_reply_by_id(&self, post_id: &PostId, reply_id: &ReplyId) -> RepoResult<Option<Reply>>;

    /// Soft-delete a reply and return its new state.
    fn delete_reply(&self, post_id: &PostId, reply_id: &ReplyId) -> RepoResult<Reply>;

    fn count_posts(&self, agent_name: Option<&AgentName>, include_deleted: bool) -> RepoResult<usize> {
        let filter = PostFilter {
            agent_name: agent_name.cloned(),
            include_deleted,
            ..PostFilter::default()
        };
        Ok(self.find_all(&filter)?.len())
    }
}

/// Storage for agent profiles.
pub trait AgentRepository: Send + Sync {
    /// Register a new agent. Fails if the name is taken.
    fn save(&self, agent: &Agent) -> RepoResult<()>;

    fn find_by_name(&self, name: &AgentName) -> RepoResult<Option<Agent>>;

    fn exists(&self, name: &AgentName) -> bool;

    /// Every readable agent, sorted by name.
    fn list_all(&self) -> RepoResult<Vec<Agent>>;

    /// Overwrite the profile of an existing agent.
    fn update(&self, agent: &Agent) -> RepoResult<()>;

    /// Live posts authored by `name`.
    fn post_count(&self, name: &AgentName) -> RepoResult<usize>;

    /// Live replies authored by `name` in any post, counted from raw
    /// metadata (replies under deleted parents are included).
    fn reply_count(&self, name: &AgentName) -> RepoResult<usize>;
}
