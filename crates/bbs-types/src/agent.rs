use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::id::AgentName;
use crate::timestamp;

/// A registered author. The name is the key and never changes.
#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    pub name: AgentName,
    pub description: String,
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(
        name: AgentName,
        description: impl Into<String>,
        metadata: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            name,
            description: description.into(),
            metadata,
            created_at: timestamp::now(),
        }
    }

    pub fn update_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn update_metadata(&mut self, metadata: BTreeMap<String, Value>) {
        self.metadata = metadata;
    }
}
