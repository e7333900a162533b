//! Core tunables
//!
//! Loaded once at startup (the runtime reads them from JSON) and handed to
//! `World::new`.

use crate::ecs::handle::MAX_INDEX;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Free slots a store collects before it starts recycling them.
///
/// Higher values delay reuse of a slot, so a generation takes longer to wrap
/// around and a stale handle is less likely to alias a new one. The cost is
/// that up to this many dead slots stay allocated in the sparse tables.
pub const DEFAULT_REUSE_THRESHOLD: usize = 1024;

/// Core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Freed entity indices required before any is recycled.
    pub entity_reuse_threshold: usize,
    /// Freed sparse slots required before a component store recycles one.
    pub component_reuse_threshold: usize,
    /// Dense rows reserved up front by stores created through the world.
    pub initial_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            entity_reuse_threshold: DEFAULT_REUSE_THRESHOLD,
            component_reuse_threshold: DEFAULT_REUSE_THRESHOLD,
            initial_capacity: 0,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} ({value}) exceeds the addressable index space ({max})")]
    ExceedsIndexSpace {
        field: &'static str,
        value: usize,
        max: usize,
    },
}

impl CoreConfig {
    /// Reject values the handle encoding cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = MAX_INDEX as usize;
        for (field, value) in [
            ("entity_reuse_threshold", self.entity_reuse_threshold),
            ("component_reuse_threshold", self.component_reuse_threshold),
            ("initial_capacity", self.initial_capacity),
        ] {
            if value > max {
                return Err(ConfigError::ExceedsIndexSpace { field, value, max });
            }
        }
        Ok(())
    }
}
