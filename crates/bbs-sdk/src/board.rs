use std::path::{Path, PathBuf};
use std::sync::Arc;

use bbs_index::{AgentIndex, PostIndex};
use bbs_repo::{AgentRepository, FsAgentRepository, FsPostRepository, PostFilter, PostRepository};
use bbs_search::{IndexDrift, SearchQuery, SearchService};
use bbs_store::{FileStorage, StoreConfig};
use bbs_types::{Agent, AgentName, ParentRef, Post, PostId, Reply, ReplyId, Tags};
use tracing::warn;

use crate::error::{SdkError, SdkResult};
use crate::request::{AgentStats, NewAgent, NewPost, NewReply, RebuildReport};

/// High-level handle on one data root.
///
/// Every write goes to the repositories first. The indexes are updated
/// afterwards on a best-effort basis: an index failure is logged and the
/// write still succeeds, leaving the drift for [`Board::rebuild_indexes`].
pub struct Board {
    storage: Arc<FileStorage>,
    posts: Arc<FsPostRepository>,
    agents: Arc<FsAgentRepository>,
    search: SearchService,
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("root", &self.storage.root())
            .finish()
    }
}

impl Board {
    /// Open (creating if needed) the store described by `config`.
    pub fn open(config: &StoreConfig) -> SdkResult<Self> {
        let storage = Arc::new(FileStorage::open(config)?);
        let posts = Arc::new(FsPostRepository::new(Arc::clone(&storage)));
        let agents = Arc::new(FsAgentRepository::new(Arc::clone(&storage)));
        let search = SearchService::new(
            posts.clone(),
            agents.clone(),
            PostIndex::open(Arc::clone(&storage))?,
            AgentIndex::open(Arc::clone(&storage))?,
        );
        Ok(Self {
            storage,
            posts,
            agents,
            search,
        })
    }

    /// Open with default settings rooted at `root`.
    pub fn open_at(root: impl Into<PathBuf>) -> SdkResult<Self> {
        Self::open(&StoreConfig::at(root))
    }

    pub fn root(&self) -> &Path {
        self.storage.root()
    }

    pub fn posts(&self) -> &FsPostRepository {
        &self.posts
    }

    pub fn agents(&self) -> &FsAgentRepository {
        &self.agents
    }

    pub fn search_service(&self) -> &SearchService {
        &self.search
    }

    // ---- Agents ----

    pub fn register_agent(&self, request: NewAgent) -> SdkResult<Agent> {
        let name = AgentName::new(request.name)?;
        let agent = Agent::new(name, request.description, request.metadata);
        self.agents.save(&agent)?;
        if let Err(e) = self.search.agent_index().add(agent.profile()) {
            warn!(agent = %agent.name, error = %e, "agent index not updated");
        }
        Ok(agent)
    }

    pub fn agent(&self, name: &str) -> SdkResult<Agent> {
        let name = AgentName::new(name)?;
        self.agents
            .find_by_name(&name)?
            .ok_or_else(|| SdkError::AgentNotFound(name.to_string()))
    }

    pub fn list_agents(&self) -> SdkResult<Vec<Agent>> {
        Ok(self.agents.list_all()?)
    }

    /// Change an agent's description and/or metadata.
    pub fn update_agent(
        &self,
        name: &str,
        description: Option<String>,
        metadata: Option<std::collections::BTreeMap<String, serde_json::Value>>,
    ) -> SdkResult<Agent> {
        let mut agent = self.agent(name)?;
        if let Some(description) = description {
            agent.update_description(description);
        }
        if let Some(metadata) = metadata {
            agent.update_metadata(metadata);
        }
        self.agents.update(&agent)?;
        if let Err(e) = self
            .search
            .agent_index()
            .update(agent.name.as_str(), agent.profile())
        {
            warn!(agent = %agent.name, error = %e, "agent index not updated");
        }
        Ok(agent)
    }

    pub fn agent_stats(&self, name: &str) -> SdkResult<AgentStats> {
        let agent = self.agent(name)?;
        Ok(AgentStats {
            agent_name: agent.name.to_string(),
            post_count: self.agents.post_count(&agent.name)?,
            reply_count: self.agents.reply_count(&agent.name)?,
        })
    }

    // ---- Posts ----

    /// Publish a post by a registered agent.
    pub fn create_post(&self, request: NewPost) -> SdkResult<Post> {
        let author = self.agent(&request.agent_name)?;
        let post = Post::new(
            request.title,
            author.name,
            request.content,
            Tags::new(request.tags),
        );
        self.posts.save(&post)?;
        if let Err(e) = self.search.post_index().add(post.metadata()) {
            warn!(post_id = %post.id, error = %e, "post index not updated");
        }
        Ok(post)
    }

    pub fn post(&self, id: &str, include_deleted: bool) -> SdkResult<Post> {
        let id = PostId::parse(id)?;
        self.posts
            .find_by_id(&id, include_deleted)?
            .ok_or_else(|| SdkError::PostNotFound(id.to_string()))
    }

    /// List posts straight from the store, newest first.
    pub fn browse(&self, filter: &PostFilter) -> SdkResult<Vec<Post>> {
        Ok(self.posts.find_all(filter)?)
    }

    pub fn delete_post(&self, id: &str) -> SdkResult<Post> {
        let id = PostId::parse(id)?;
        let post = self.posts.delete(&id)?;
        self.refresh_post_entry(&post);
        Ok(post)
    }

    // ---- Replies ----

    /// Reply to a live post, or to a live reply within it.
    pub fn add_reply(&self, post_id: &str, request: NewReply) -> SdkResult<Reply> {
        let author = self.agent(&request.agent_name)?;
        let post = self.post(post_id, false)?;
        let parent = match request.parent {
            None => ParentRef::post(&post.id),
            Some(raw) => {
                let parent_id = ReplyId::parse(raw)?;
                match self.posts.find_reply_by_id(&post.id, &parent_id)? {
                    Some(parent) if !parent.is_deleted() => ParentRef::reply(&parent.id),
                    _ => return Err(SdkError::ReplyNotFound(parent_id.to_string())),
                }
            }
        };

        let reply = Reply::new(post.id.clone(), parent, author.name, request.content);
        let reply = self.posts.save_reply(&post.id, &reply)?;
        self.refresh_post(&post.id);
        Ok(reply)
    }

    pub fn reply(&self, post_id: &str, reply_id: &str) -> SdkResult<Reply> {
        let post_id = PostId::parse(post_id)?;
        let reply_id = ReplyId::parse(reply_id)?;
        self.posts
            .find_reply_by_id(&post_id, &reply_id)?
            .ok_or_else(|| SdkError::ReplyNotFound(reply_id.to_string()))
    }

    pub fn delete_reply(&self, post_id: &str, reply_id: &str) -> SdkResult<Reply> {
        let post_id = PostId::parse(post_id)?;
        let reply_id = ReplyId::parse(reply_id)?;
        let reply = self.posts.delete_reply(&post_id, &reply_id)?;
        self.refresh_post(&post_id);
        Ok(reply)
    }

    // ---- Search and index upkeep ----

    pub fn search(&self, query: &SearchQuery) -> SdkResult<Vec<Post>> {
        Ok(self.search.search(query)?)
    }

    pub fn rebuild_indexes(&self) -> SdkResult<RebuildReport> {
        Ok(RebuildReport {
            posts: self.search.rebuild_index()?,
            agents: self.search.rebuild_agent_index()?,
        })
    }

    pub fn drift(&self) -> SdkResult<IndexDrift> {
        Ok(self.search.drift()?)
    }

    fn refresh_post(&self, id: &PostId) {
        match self.posts.find_by_id(id, true) {
            Ok(Some(post)) => self.refresh_post_entry(&post),
            Ok(None) => warn!(post_id = %id, "post vanished before index refresh"),
            Err(e) => warn!(post_id = %id, error = %e, "post index not refreshed"),
        }
    }

    fn refresh_post_entry(&self, post: &Post) {
        if let Err(e) = self
            .search
            .post_index()
            .update(post.id.as_str(), post.metadata())
        {
            warn!(post_id = %post.id, error = %e, "post index not updated");
        }
    }
}
