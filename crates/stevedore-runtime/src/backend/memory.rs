//! In-process container engine.
//!
//! Keeps containers and images in a mutex-guarded table and records every
//! call it receives. Used for dry runs and as the engine behind the test
//! suites; it never starts a process.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use sha2::{Digest, Sha256};
use stevedore_common::constants::{DEFAULT_TAG, VOLUME_STORAGE_DIR};
use stevedore_common::error::{EngineError, Result};
use stevedore_common::types::{ContainerId, ContainerState, ImageId};
use stevedore_compose::image::parse_repository_tag;

use super::{
    ContainerDetails, ContainerEngine, ContainerSummary, CreateOptions, ImageSummary, ListFilter,
    PullOptions, StartOptions,
};

/// A call received by the engine, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `list_containers`.
    ListContainers(ListFilter),
    /// `inspect_container`.
    Inspect(ContainerId),
    /// `create_container`, with the requested name.
    Create(Option<String>),
    /// `start_container`.
    Start(ContainerId),
    /// `stop_container`.
    Stop(ContainerId),
    /// `remove_container`.
    Remove(ContainerId),
    /// `pull_image`.
    Pull {
        /// `repository:tag` as requested.
        reference: String,
        /// Pull options.
        options: PullOptions,
    },
    /// `build_image`.
    Build {
        /// Build context.
        context: PathBuf,
        /// Tag applied to the result.
        tag: String,
    },
    /// `list_images`.
    ListImages(String),
}

#[derive(Debug, Clone)]
struct ContainerRecord {
    summary: ContainerSummary,
    create: CreateOptions,
    start: Option<StartOptions>,
    volumes: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct ImageRecord {
    id: ImageId,
    tags: Vec<String>,
}

#[derive(Debug, Default)]
struct EngineState {
    containers: Vec<ContainerRecord>,
    images: Vec<ImageRecord>,
    registry: BTreeSet<String>,
    journal: Vec<EngineCall>,
}

impl EngineState {
    fn find(&self, id: &ContainerId) -> Option<usize> {
        self.containers.iter().position(|c| {
            c.summary.id == *id || c.summary.name.trim_start_matches('/') == id.as_str()
        })
    }

    fn get(&self, id: &ContainerId) -> Result<usize> {
        self.find(id)
            .ok_or_else(|| EngineError::NoSuchContainer(id.to_string()).into())
    }

    fn has_image(&self, reference: &str) -> bool {
        let reference = normalize_reference(reference);
        self.images
            .iter()
            .any(|image| image.id.as_str() == reference || image.tags.contains(&reference))
    }

    fn tag_image(&mut self, id: ImageId, reference: String) {
        for image in &mut self.images {
            image.tags.retain(|t| *t != reference);
        }
        self.images.retain(|image| !image.tags.is_empty());
        self.images.push(ImageRecord {
            id,
            tags: vec![reference],
        });
    }
}

fn normalize_reference(reference: &str) -> String {
    let (repository, tag) = parse_repository_tag(reference);
    if tag.is_empty() {
        format!("{repository}:{DEFAULT_TAG}")
    } else {
        format!("{repository}:{tag}")
    }
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())
}

/// Engine that lives entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: Mutex<EngineState>,
}

impl InMemoryEngine {
    /// Creates an engine with no containers, images or registry entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `reference` available locally.
    #[must_use]
    pub fn with_image(self, reference: &str) -> Self {
        {
            let mut state = self.lock();
            let reference = normalize_reference(reference);
            let id = ImageId::from_digest(&digest(&["image", reference.as_str()]));
            state.tag_image(id, reference);
        }
        self
    }

    /// Makes `reference` pullable from the simulated registry.
    #[must_use]
    pub fn with_registry_image(self, reference: &str) -> Self {
        let _ = self.lock().registry.insert(normalize_reference(reference));
        self
    }

    /// Registers an existing container, as if created by another session.
    ///
    /// `volumes` maps container paths to storage locations.
    pub fn add_container(
        &self,
        name: &str,
        image: &str,
        state: ContainerState,
        volumes: BTreeMap<String, String>,
    ) -> ContainerId {
        let id = ContainerId::generate();
        self.lock().containers.push(ContainerRecord {
            summary: ContainerSummary {
                id: id.clone(),
                name: format!("/{name}"),
                image: image.to_string(),
                state,
                created_at: chrono::Utc::now(),
            },
            create: CreateOptions {
                image: image.to_string(),
                name: Some(name.to_string()),
                volumes: volumes.keys().cloned().collect(),
                ..CreateOptions::default()
            },
            start: None,
            volumes,
        });
        id
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().journal.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.lock().journal.clear();
    }

    /// Whether `reference` is present locally.
    pub fn has_image(&self, reference: &str) -> bool {
        self.lock().has_image(reference)
    }

    /// Options a container was created with.
    pub fn create_options(&self, id: &ContainerId) -> Option<CreateOptions> {
        let state = self.lock();
        state.find(id).map(|idx| state.containers[idx].create.clone())
    }

    /// Options a container was last started with.
    pub fn start_options(&self, id: &ContainerId) -> Option<StartOptions> {
        let state = self.lock();
        state
            .find(id)
            .and_then(|idx| state.containers[idx].start.clone())
    }
}

impl ContainerEngine for InMemoryEngine {
    fn list_containers(&self, filter: ListFilter) -> Result<Vec<ContainerSummary>> {
        let mut state = self.lock();
        state.journal.push(EngineCall::ListContainers(filter));
        Ok(state
            .containers
            .iter()
            .filter(|c| filter == ListFilter::All || c.summary.state.is_running())
            .map(|c| c.summary.clone())
            .collect())
    }

    fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails> {
        let mut state = self.lock();
        state.journal.push(EngineCall::Inspect(id.clone()));
        let idx = state.get(id)?;
        let record = &state.containers[idx];
        Ok(ContainerDetails {
            summary: record.summary.clone(),
            volumes: record.volumes.clone(),
        })
    }

    fn create_container(&self, options: &CreateOptions) -> Result<ContainerId> {
        let mut state = self.lock();
        state.journal.push(EngineCall::Create(options.name.clone()));

        if !state.has_image(&options.image) {
            return Err(EngineError::NoSuchImage(options.image.clone()).into());
        }
        let id = ContainerId::generate();
        let name = options.name.clone().unwrap_or_else(|| id.to_string());
        if state.find(&ContainerId::new(name.clone())).is_some() {
            return Err(EngineError::Conflict(format!("name \"{name}\" is already in use")).into());
        }

        tracing::debug!(id = %id.short(), name = %name, "in-memory container created");
        state.containers.push(ContainerRecord {
            summary: ContainerSummary {
                id: id.clone(),
                name: format!("/{name}"),
                image: options.image.clone(),
                state: ContainerState::Created,
                created_at: chrono::Utc::now(),
            },
            create: options.clone(),
            start: None,
            volumes: BTreeMap::new(),
        });
        Ok(id)
    }

    fn start_container(&self, id: &ContainerId, options: &StartOptions) -> Result<()> {
        let mut state = self.lock();
        state.journal.push(EngineCall::Start(id.clone()));
        let idx = state.get(id)?;

        let mut volumes = state.containers[idx].volumes.clone();
        for (host, binding) in &options.binds {
            let _ = volumes.insert(binding.bind.clone(), host.clone());
        }
        for source in &options.volumes_from {
            let source_idx = state.get(source)?;
            for (path, storage) in &state.containers[source_idx].volumes {
                let _ = volumes
                    .entry(path.clone())
                    .or_insert_with(|| storage.clone());
            }
        }
        let record = &state.containers[idx];
        for path in &record.create.volumes {
            let _ = volumes.entry(path.clone()).or_insert_with(|| {
                format!(
                    "{VOLUME_STORAGE_DIR}/{}",
                    digest(&[record.summary.id.as_str(), path.as_str()])
                )
            });
        }

        let record = &mut state.containers[idx];
        record.volumes = volumes;
        record.start = Some(options.clone());
        record.summary.state = ContainerState::Running;
        Ok(())
    }

    fn stop_container(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.lock();
        state.journal.push(EngineCall::Stop(id.clone()));
        let idx = state.get(id)?;
        let record = &mut state.containers[idx];
        if record.summary.state.is_running() {
            record.summary.state = ContainerState::Stopped;
        }
        Ok(())
    }

    fn remove_container(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.lock();
        state.journal.push(EngineCall::Remove(id.clone()));
        let idx = state.get(id)?;
        if state.containers[idx].summary.state.is_running() {
            return Err(EngineError::Conflict(format!(
                "container {id} is running; stop it before removing"
            ))
            .into());
        }
        let _ = state.containers.remove(idx);
        Ok(())
    }

    fn pull_image(&self, repository: &str, tag: &str, options: PullOptions) -> Result<()> {
        let reference = if tag.is_empty() {
            repository.to_string()
        } else {
            format!("{repository}:{tag}")
        };
        let mut state = self.lock();
        state.journal.push(EngineCall::Pull {
            reference: reference.clone(),
            options,
        });

        let normalized = normalize_reference(&reference);
        if !state.registry.contains(&normalized) {
            return Err(EngineError::NoSuchImage(reference).into());
        }
        let id = ImageId::from_digest(&digest(&["image", normalized.as_str()]));
        state.tag_image(id, normalized);
        Ok(())
    }

    fn build_image(&self, context: &Path, tag: &str) -> Result<ImageId> {
        let mut state = self.lock();
        state.journal.push(EngineCall::Build {
            context: context.to_path_buf(),
            tag: tag.to_string(),
        });
        let reference = normalize_reference(tag);
        let context_path = context.to_string_lossy();
        let id = ImageId::from_digest(&digest(&["build", &*context_path, reference.as_str()]));
        state.tag_image(id.clone(), reference);
        Ok(id)
    }

    fn list_images(&self, name: &str) -> Result<Vec<ImageSummary>> {
        let mut state = self.lock();
        state.journal.push(EngineCall::ListImages(name.to_string()));
        Ok(state
            .images
            .iter()
            .filter(|image| {
                image
                    .tags
                    .iter()
                    .any(|t| parse_repository_tag(t).0 == name)
            })
            .map(|image| ImageSummary {
                id: image.id.clone(),
                tags: image.tags.clone(),
            })
            .collect())
    }
}
