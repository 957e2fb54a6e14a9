//! The [`SearchService`]: index-driven search plus index repair.

use std::collections::BTreeMap;
use std::sync::Arc;

use bbs_index::{AgentIndex, PostIndex};
use bbs_repo::{AgentRepository, PostFilter, PostRepository};
use bbs_types::{AgentProfile, Post, PostMetadata};
use tracing::{debug, info};

use crate::drift::{IndexDrift, KeyDrift};
use crate::error::SearchResult;
use crate::query::SearchQuery;

/// Search over the post index, hydrated from the post repository.
pub struct SearchService {
    posts: Arc<dyn PostRepository>,
    agents: Arc<dyn AgentRepository>,
    post_index: PostIndex,
    agent_index: AgentIndex,
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService")
            .field("post_index", &self.post_index)
            .field("agent_index", &self.agent_index)
            .finish()
    }
}

impl SearchService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        agents: Arc<dyn AgentRepository>,
        post_index: PostIndex,
        agent_index: AgentIndex,
    ) -> Self {
        Self {
            posts,
            agents,
            post_index,
            agent_index,
        }
    }

    pub fn post_index(&self) -> &PostIndex {
        &self.post_index
    }

    pub fn agent_index(&self) -> &AgentIndex {
        &self.agent_index
    }

    /// Run a search.
    ///
    /// Candidates come from the index, are narrowed to the date window,
    /// sorted newest first, and paged. Each survivor is then loaded from the
    /// repository; an entry whose post has vanished or no longer matches is
    /// dropped, so a page may come back short while the index is stale.
    pub fn search(&self, query: &SearchQuery) -> SearchResult<Vec<Post>> {
        let mut candidates = self.post_index.search(&query.index_query())?;
        candidates.retain(|entry| query.in_window(&entry.created_at));
        sort_newest_first(&mut candidates);

        let mut posts = Vec::new();
        for entry in candidates.into_iter().skip(query.offset).take(query.limit) {
            match self.posts.find_by_id(&entry.post_id, query.include_deleted)? {
                Some(post) if query.matches(&post.metadata()) => posts.push(post),
                _ => debug!(post_id = %entry.post_id, "dropping stale index entry"),
            }
        }
        Ok(posts)
    }

    /// Replace the post index with summaries of every stored post,
    /// deleted ones included. Returns the number of entries written.
    pub fn rebuild_index(&self) -> SearchResult<usize> {
        let entries = self.store_posts()?;
        let count = self.post_index.rebuild(entries)?;
        info!(entries = count, "post index rebuilt from store");
        Ok(count)
    }

    pub fn rebuild_agent_index(&self) -> SearchResult<usize> {
        let entries = self.store_agents()?;
        let count = self.agent_index.rebuild(entries)?;
        info!(entries = count, "agent index rebuilt from store");
        Ok(count)
    }

    /// Compare both indexes against the repositories without changing
    /// anything.
    pub fn drift(&self) -> SearchResult<IndexDrift> {
        let posts = KeyDrift::between(
            &keyed(self.store_posts()?, |m: &PostMetadata| m.post_id.to_string()),
            &keyed(self.post_index.all(true)?, |m: &PostMetadata| m.post_id.to_string()),
        );
        let agents = KeyDrift::between(
            &keyed(self.store_agents()?, |p: &AgentProfile| p.agent_name.to_string()),
            &keyed(self.agent_index.all(true)?, |p: &AgentProfile| p.agent_name.to_string()),
        );
        Ok(IndexDrift { posts, agents })
    }

    fn store_posts(&self) -> SearchResult<Vec<PostMetadata>> {
        let all = self.posts.find_all(&PostFilter::default().include_deleted(true))?;
        Ok(all.iter().map(Post::metadata).collect())
    }

    fn store_agents(&self) -> SearchResult<Vec<AgentProfile>> {
        Ok(self
            .agents
            .list_all()?
            .iter()
            .map(|agent| agent.profile())
            .collect())
    }
}

fn sort_newest_first(entries: &mut [PostMetadata]) {
    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.post_id.as_str().cmp(b.post_id.as_str()))
    });
}

fn keyed<T>(items: Vec<T>, key: impl Fn(&T) -> String) -> BTreeMap<String, T> {
    items.into_iter().map(|item| (key(&item), item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbs_repo::{FsAgentRepository, FsPostRepository};
    use bbs_store::{FileStorage, StoreConfig};
    use bbs_types::{Agent, AgentName, ParentRef, Reply, Tags};
    use chrono::Duration;
    use std::collections::BTreeMap;

    struct Fixture {
        _dir: tempfile::TempDir,
        posts: Arc<FsPostRepository>,
        agents: Arc<FsAgentRepository>,
        service: SearchService,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FileStorage::open(&StoreConfig::at(dir.path())).unwrap());
        let posts = Arc::new(FsPostRepository::new(storage.clone()));
        let agents = Arc::new(FsAgentRepository::new(storage.clone()));
        let service = SearchService::new(
            posts.clone(),
            agents.clone(),
            PostIndex::open(storage.clone()).unwrap(),
            AgentIndex::open(storage).unwrap(),
        );
        Fixture {
            _dir: dir,
            posts,
            agents,
            service,
        }
    }

    fn name(value: &str) -> AgentName {
        AgentName::new(value).unwrap()
    }

    impl Fixture {
        /// Save a post and index it, `age_secs` seconds in the past.
        fn publish(&self, title: &str, tags: &[&str], age_secs: i64) -> Post {
            let mut post = Post::new(title, name("alice"), "body", Tags::new(tags.iter().copied()));
            post.created_at = post.created_at - Duration::seconds(age_secs);
            post.updated_at = post.created_at;
            self.posts.save(&post).unwrap();
            self.service.post_index().add(post.metadata()).unwrap();
            post
        }
    }

    fn titles(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn search_filters_by_title_tags_and_agent() {
        let fx = fixture();
        fx.publish("Hello", &["x"], 20);
        fx.publish("World", &["y"], 10);

        assert_eq!(titles(&fx.service.search(&SearchQuery::text("hel")).unwrap()), ["Hello"]);
        let tagged = SearchQuery {
            tags: vec!["y".into()],
            ..SearchQuery::default()
        };
        assert_eq!(titles(&fx.service.search(&tagged).unwrap()), ["World"]);
        let stranger = SearchQuery {
            agent_name: Some(name("nobody")),
            ..SearchQuery::default()
        };
        assert!(fx.service.search(&stranger).unwrap().is_empty());
    }

    #[test]
    fn search_sorts_pages_and_windows() {
        let fx = fixture();
        let old = fx.publish("old", &[], 300);
        let mid = fx.publish("mid", &[], 200);
        fx.publish("new", &[], 100);

        let all = fx.service.search(&SearchQuery::default()).unwrap();
        assert_eq!(titles(&all), ["new", "mid", "old"]);

        let page = SearchQuery {
            limit: 1,
            offset: 1,
            ..SearchQuery::default()
        };
        assert_eq!(titles(&fx.service.search(&page).unwrap()), ["mid"]);

        let window = SearchQuery {
            start: Some(old.created_at),
            end: Some(mid.created_at),
            ..SearchQuery::default()
        };
        assert_eq!(titles(&fx.service.search(&window).unwrap()), ["mid", "old"]);
    }

    #[test]
    fn stale_entries_are_dropped_on_hydration() {
        let fx = fixture();
        let post = fx.publish("Hello", &[], 10);
        // Deleted in the store but the index was never told.
        fx.posts.delete(&post.id).unwrap();
        assert!(fx.service.search(&SearchQuery::default()).unwrap().is_empty());

        let ghost = Post::new("Ghost", name("alice"), "b", Tags::default());
        fx.service.post_index().add(ghost.metadata()).unwrap();
        assert!(fx.service.search(&SearchQuery::text("ghost")).unwrap().is_empty());
    }

    #[test]
    fn rebuild_restores_a_lost_index() {
        let fx = fixture();
        let kept = fx.publish("kept", &[], 20);
        let gone = fx.publish("gone", &[], 10);
        fx.posts.delete(&gone.id).unwrap();
        std::fs::remove_file(fx.service.post_index().path()).unwrap();

        assert_eq!(fx.service.rebuild_index().unwrap(), 2);
        let live = fx.service.post_index().all(false).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].post_id, kept.id);
        assert!(fx.service.drift().unwrap().posts.is_clean());
    }

    #[test]
    fn rebuild_twice_is_byte_identical_apart_from_timestamp() {
        let fx = fixture();
        let post = fx.publish("a", &["t"], 30);
        fx.publish("b", &[], 20);
        let reply = Reply::new(post.id.clone(), ParentRef::post(&post.id), name("bob"), "r");
        fx.posts.save_reply(&post.id, &reply).unwrap();

        let read = || {
            fx.service.rebuild_index().unwrap();
            std::fs::read_to_string(fx.service.post_index().path())
                .unwrap()
                .lines()
                .filter(|l| !l.contains("\"last_updated\""))
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        assert_eq!(read(), read());
    }

    #[test]
    fn drift_reports_missing_orphaned_and_stale() {
        let fx = fixture();
        let indexed = fx.publish("indexed", &[], 30);
        let unindexed = Post::new("unindexed", name("alice"), "b", Tags::default());
        fx.posts.save(&unindexed).unwrap();
        let orphan = Post::new("orphan", name("alice"), "b", Tags::default());
        fx.service.post_index().add(orphan.metadata()).unwrap();
        fx.posts.delete(&indexed.id).unwrap();

        fx.agents
            .save(&Agent::new(name("alice"), "d", BTreeMap::new()))
            .unwrap();

        let drift = fx.service.drift().unwrap();
        assert_eq!(drift.posts.missing, [unindexed.id.to_string()]);
        assert_eq!(drift.posts.orphaned, [orphan.id.to_string()]);
        assert_eq!(drift.posts.stale, [indexed.id.to_string()]);
        assert_eq!(drift.agents.missing, ["alice"]);

        fx.service.rebuild_index().unwrap();
        fx.service.rebuild_agent_index().unwrap();
        assert!(fx.service.drift().unwrap().is_clean());
    }
}
