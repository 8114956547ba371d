//! Handle on a container reported by the engine.

use std::collections::BTreeMap;

use stevedore_common::error::Result;
use stevedore_common::types::{ContainerId, ContainerState};
use stevedore_compose::naming::ContainerName;

use crate::backend::{ContainerEngine, ContainerSummary};

/// A container as last observed through the engine.
///
/// This is a snapshot: it is not refreshed when the engine state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Engine-assigned identifier.
    pub id: ContainerId,
    /// Name without the engine's leading `/`.
    pub name: String,
    /// Image reference the container was created from.
    pub image: String,
    /// State at the time of observation.
    pub state: ContainerState,
}

impl Container {
    /// Builds a handle from a listing entry.
    #[must_use]
    pub fn from_summary(summary: &ContainerSummary) -> Self {
        Self {
            id: summary.id.clone(),
            name: summary.name.trim_start_matches('/').to_string(),
            image: summary.image.clone(),
            state: summary.state,
        }
    }

    /// Decoded canonical name, if the container has one.
    #[must_use]
    pub fn container_name(&self) -> Option<ContainerName> {
        ContainerName::parse(&self.name)
    }

    /// Instance number, if the name is canonical.
    #[must_use]
    pub fn number(&self) -> Option<u32> {
        self.container_name().map(|name| name.number)
    }

    /// `service_number` for canonical names, the full name otherwise.
    #[must_use]
    pub fn name_without_project(&self) -> String {
        self.container_name()
            .map_or_else(|| self.name.clone(), |name| name.name_without_project())
    }

    /// Whether the container was running when observed.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Container path to storage location of every mounted volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine no longer knows the container.
    pub fn volumes(&self, engine: &dyn ContainerEngine) -> Result<BTreeMap<String, String>> {
        Ok(engine.inspect_container(&self.id)?.volumes)
    }

    pub(crate) fn with_state(mut self, state: ContainerState) -> Self {
        self.state = state;
        self
    }
}
