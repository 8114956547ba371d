//! Global configuration model for a stevedore project.

use serde::{Deserialize, Serialize};

/// Settings that apply to every service of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StevedoreConfig {
    /// Project name, the first component of every container name.
    pub project: String,
    /// Whether pulls may fall back to plain HTTP registries.
    pub insecure_registry: bool,
}

impl Default for StevedoreConfig {
    fn default() -> Self {
        Self {
            project: crate::constants::DEFAULT_PROJECT.to_string(),
            insecure_registry: false,
        }
    }
}
