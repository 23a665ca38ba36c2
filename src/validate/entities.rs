//! Known-entity snapshot
//!
//! Loaded once per run from a JSON export of Knesset members and never
//! mutated afterwards.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A Knesset member as seen by the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    pub name: String,
    /// Business grouping used for eligibility (e.g. "coalition")
    #[serde(alias = "coalitionStatus", alias = "coalition_status")]
    pub category: String,
}

/// Read-only id → entity lookup
#[derive(Debug, Clone, Default)]
pub struct EntityCache {
    entities: HashMap<u32, Entity>,
}

impl EntityCache {
    /// Build a cache from a list of entities; later duplicates replace earlier ones
    pub fn new(entities: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            entities: entities.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    /// Parse a JSON array of entities
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entities: Vec<Entity> = serde_json::from_str(json)
            .map_err(|e| Error::entities(format!("Invalid entity snapshot: {e}")))?;
        Ok(Self::new(entities))
    }

    /// Load a JSON snapshot from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::entities(format!("Failed to read {}: {e}", path.display()))
        })?;
        let cache = Self::from_json_str(&contents)?;

        tracing::info!(path = %path.display(), entities = cache.len(), "Loaded entity snapshot");
        Ok(cache)
    }

    pub fn get(&self, id: u32) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
