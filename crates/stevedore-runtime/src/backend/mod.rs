//! Container engine abstraction.
//!
//! The orchestrator never talks to a daemon directly. Everything it needs
//! from the engine goes through [`ContainerEngine`], so a remote client or
//! the bundled [`memory::InMemoryEngine`] can stand behind it.

pub mod memory;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use stevedore_common::error::Result;
use stevedore_common::types::{ContainerId, ContainerState, ImageId};
use stevedore_compose::config::StringOrList;
use stevedore_compose::port::PortBindings;
use stevedore_compose::volume::VolumeBindingTable;

/// Options for the engine's create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateOptions {
    /// Image reference to create from.
    pub image: String,
    /// Container name; the engine picks one when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Hostname inside the container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Domain name inside the container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domainname: Option<String>,
    /// Fully resolved environment.
    #[serde(rename = "Env")]
    pub environment: BTreeMap<String, String>,
    /// Container ports to expose, with protocol suffix where given.
    #[serde(rename = "ExposedPorts")]
    pub ports: Vec<String>,
    /// Container paths that get a volume.
    pub volumes: Vec<String>,
    /// Command override.
    #[serde(rename = "Cmd", skip_serializing_if = "Option::is_none")]
    pub command: Option<StringOrList>,
    /// Entrypoint override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<StringOrList>,
    /// Working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// User to run as.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Allocate a pseudo-TTY.
    pub tty: bool,
    /// Keep stdin open.
    pub open_stdin: bool,
}

/// One `(container, alias)` pair exposed to a new container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkEntry {
    /// Name of the target container.
    pub container: String,
    /// Alias the target is reachable under.
    pub alias: String,
}

impl LinkEntry {
    /// Builds a link entry.
    #[must_use]
    pub fn new(container: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            alias: alias.into(),
        }
    }
}

/// Options for the engine's start call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartOptions {
    /// Bind mounts.
    pub binds: VolumeBindingTable,
    /// Container port to host bindings.
    pub port_bindings: PortBindings,
    /// Links to other containers.
    pub links: Vec<LinkEntry>,
    /// Containers whose volumes are mounted too.
    pub volumes_from: Vec<ContainerId>,
    /// Run with extended privileges.
    pub privileged: bool,
    /// Network mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    /// DNS servers.
    pub dns: Vec<String>,
}

/// Options for the engine's pull call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// Allow plain-HTTP registries.
    pub insecure_registry: bool,
    /// Stream progress while pulling.
    pub stream: bool,
}

/// Which containers a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    /// Running containers only.
    Running,
    /// Every container regardless of state.
    All,
}

/// A container as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    /// Engine-assigned identifier.
    pub id: ContainerId,
    /// Name, possibly with the engine's leading `/`.
    pub name: String,
    /// Image reference it was created from.
    pub image: String,
    /// Current state.
    pub state: ContainerState,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A container as reported by inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetails {
    /// Listing-level information.
    pub summary: ContainerSummary,
    /// Container path to storage location of every mounted volume.
    pub volumes: BTreeMap<String, String>,
}

/// An image as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    /// Engine-assigned identifier.
    pub id: ImageId,
    /// `repository:tag` references pointing at this image.
    pub tags: Vec<String>,
}

/// The narrow interface the orchestrator needs from a container engine.
///
/// Errors are returned as [`stevedore_common::error::StevedoreError::Engine`]
/// and are not interpreted by the caller beyond the missing-image case.
pub trait ContainerEngine: Send + Sync {
    /// Lists containers.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    fn list_containers(&self, filter: ListFilter) -> Result<Vec<ContainerSummary>>;

    /// Inspects a container by ID or name.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist.
    fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails>;

    /// Creates a container, returning its ID.
    ///
    /// # Errors
    ///
    /// Returns a missing-image error if the image is not present locally.
    fn create_container(&self, options: &CreateOptions) -> Result<ContainerId>;

    /// Starts a created or stopped container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    fn start_container(&self, id: &ContainerId, options: &StartOptions) -> Result<()>;

    /// Stops a running container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist.
    fn stop_container(&self, id: &ContainerId) -> Result<()>;

    /// Removes a container that is not running.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist or is running.
    fn remove_container(&self, id: &ContainerId) -> Result<()>;

    /// Pulls `repository:tag`; an empty tag means the default tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be fetched.
    fn pull_image(&self, repository: &str, tag: &str, options: PullOptions) -> Result<()>;

    /// Builds an image from a context directory and tags it.
    ///
    /// # Errors
    ///
    /// Returns an error if the build fails.
    fn build_image(&self, context: &Path, tag: &str) -> Result<ImageId>;

    /// Lists images whose repository is `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    fn list_images(&self, name: &str) -> Result<Vec<ImageSummary>>;
}
