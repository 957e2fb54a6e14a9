//! Filesystem-backed [`AgentRepository`].

use std::path::PathBuf;
use std::sync::Arc;

use bbs_store::{FileStorage, StoreError};
use bbs_types::{Agent, AgentName, AgentProfile, PostMetadata};
use tracing::{info, warn};

use crate::codec::{self, METADATA_FILE};
use crate::error::{RepoError, RepoResult};
use crate::traits::AgentRepository;

pub const PROFILE_FILE: &str = "profile.json";

/// Agents stored as `<root>/agents/<name>/profile.json`.
#[derive(Debug, Clone)]
pub struct FsAgentRepository {
    storage: Arc<FileStorage>,
}

impl FsAgentRepository {
    pub fn new(storage: Arc<FileStorage>) -> Self {
        Self { storage }
    }

    fn lock_name(name: &AgentName) -> String {
        format!("agent_{name}")
    }

    fn profile_path(&self, name: &AgentName) -> PathBuf {
        self.storage.agents_dir().join(name.as_str()).join(PROFILE_FILE)
    }

    fn read_profile(&self, path: &std::path::Path) -> RepoResult<Option<Agent>> {
        match self.storage.read_json::<AgentProfile>(path) {
            Ok(profile) => Ok(Some(Agent::from_profile(profile))),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e @ StoreError::Serialization { .. }) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable agent profile");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl AgentRepository for FsAgentRepository {
    fn save(&self, agent: &Agent) -> RepoResult<()> {
        let _guard = self.storage.lock(&Self::lock_name(&agent.name))?;
        self.storage
            .create_json(&self.profile_path(&agent.name), &agent.profile())
            .map_err(|e| match e {
                StoreError::AlreadyExists(_) => RepoError::AgentAlreadyExists {
                    name: agent.name.to_string(),
                },
                other => other.into(),
            })?;
        info!(agent = %agent.name, "agent registered");
        Ok(())
    }

    fn find_by_name(&self, name: &AgentName) -> RepoResult<Option<Agent>> {
        self.read_profile(&self.profile_path(name))
    }

    fn exists(&self, name: &AgentName) -> bool {
        self.storage.file_exists(&self.profile_path(name))
    }

    fn list_all(&self) -> RepoResult<Vec<Agent>> {
        let mut agents = Vec::new();
        for dir in self.storage.list_subdirectories(self.storage.agents_dir())? {
            if let Some(agent) = self.read_profile(&dir.join(PROFILE_FILE))? {
                agents.push(agent);
            }
        }
        agents.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));
        Ok(agents)
    }

    fn update(&self, agent: &Agent) -> RepoResult<()> {
        let _guard = self.storage.lock(&Self::lock_name(&agent.name))?;
        let path = self.profile_path(&agent.name);
        if !self.storage.file_exists(&path) {
            return Err(RepoError::AgentNotFound {
                name: agent.name.to_string(),
            });
        }
        self.storage.write_json(&path, &agent.profile())?;
        info!(agent = %agent.name, "agent updated");
        Ok(())
    }

    fn post_count(&self, name: &AgentName) -> RepoResult<usize> {
        let mut count = 0;
        for dir in self.storage.list_subdirectories(self.storage.posts_dir())? {
            match self.storage.read_json::<PostMetadata>(&dir.join(METADATA_FILE)) {
                Ok(meta) if &meta.agent_name == name && !meta.deleted => count += 1,
                Ok(_) | Err(StoreError::NotFound(_)) | Err(StoreError::Serialization { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(count)
    }

    fn reply_count(&self, name: &AgentName) -> RepoResult<usize> {
        let mut count = 0;
        for dir in self.storage.list_subdirectories(self.storage.posts_dir())? {
            codec::walk_reply_metadata(&self.storage, &dir, |meta| {
                if &meta.agent_name == name && !meta.deleted {
                    count += 1;
                }
            })?;
        }
        Ok(count)
    }
}
