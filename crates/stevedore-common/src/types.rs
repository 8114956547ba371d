//! Identifiers and states reported by the container engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Length of the abbreviated form of engine identifiers.
const SHORT_ID_LEN: usize = 12;

fn abbreviate(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// Engine-assigned identifier of a container. Lookups by container name
/// use the same type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Wraps an identifier or name reported by the engine.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh 32-character hex identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// The identifier as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve characters, as engines print them.
    #[must_use]
    pub fn short(&self) -> &str {
        abbreviate(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content-addressed image identifier, `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Builds the identifier for a hex-encoded SHA-256 digest.
    #[must_use]
    pub fn from_digest(hex: &str) -> Self {
        Self(format!("sha256:{hex}"))
    }

    /// The identifier as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First twelve characters of the digest, without the algorithm.
    #[must_use]
    pub fn short(&self) -> &str {
        abbreviate(self.0.strip_prefix("sha256:").unwrap_or(&self.0))
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a container as last reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Created and never started.
    Created,
    /// Running.
    Running,
    /// Exited or stopped.
    Stopped,
}

impl ContainerState {
    /// Whether the container counts as running for listings.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_container_ids_are_distinct() {
        let a = ContainerId::generate();
        let b = ContainerId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn short_ids_tolerate_short_input() {
        assert_eq!(ContainerId::new("abc").short(), "abc");
        let image = ImageId::from_digest("0123456789abcdef0123");
        assert_eq!(image.as_str(), "sha256:0123456789abcdef0123");
        assert_eq!(image.short(), "0123456789ab");
    }

    #[test]
    fn container_state_serializes_lowercase() {
        assert_eq!(ContainerState::Running.to_string(), "running");
        let state: ContainerState = serde_yaml::from_str("stopped").unwrap();
        assert_eq!(state, ContainerState::Stopped);
        assert!(!state.is_running());
    }
}
