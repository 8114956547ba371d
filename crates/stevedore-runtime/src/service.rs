//! The service orchestrator.
//!
//! A [`Service`] holds one validated service configuration and reconciles it
//! against the containers the engine currently reports. Nothing is cached:
//! every operation lists the engine's containers again before acting, so
//! concurrent callers must serialize their calls if they need atomicity.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use stevedore_common::constants::{DEFAULT_PROJECT, INTERMEDIATE_ENTRYPOINT, NAME_SEPARATOR};
use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::{ContainerId, ContainerState, ImageId};
use stevedore_compose::config::{ServiceConfig, StringOrList};
use stevedore_compose::env::{EnvLookup, ProcessEnv};
use stevedore_compose::environment::{merge_environment, resolve_environment};
use stevedore_compose::image::{parse_repository_tag, resolve_image_name};
use stevedore_compose::naming::{self, ContainerName, validate_name};
use stevedore_compose::port::{PortSpec, build_port_bindings};
use stevedore_compose::volume::{VolumeSpec, parse_volume_spec, volume_bindings};

use crate::backend::{
    ContainerEngine, CreateOptions, LinkEntry, ListFilter, PullOptions, StartOptions,
};
use crate::container::Container;
use crate::links::{Link, LinkTarget, VolumesFromSource};

/// Splits `name.domain` into hostname and domainname.
///
/// Only a hostname without an explicitly configured domainname is split,
/// at its first `.`.
///
/// # Errors
///
/// Returns [`StevedoreError::Config`] when splitting would leave either part
/// empty, as for `"name."` or `".domain"`.
pub fn split_hostname(
    hostname: Option<&str>,
    domainname: Option<&str>,
) -> Result<(Option<String>, Option<String>)> {
    match (hostname, domainname) {
        (Some(host), None) => match host.split_once('.') {
            Some((name, domain)) if name.is_empty() || domain.is_empty() => {
                Err(StevedoreError::config(format!(
                    "hostname: \"{host}\" cannot be split into hostname and domainname"
                )))
            }
            Some((name, domain)) => Ok((Some(name.to_string()), Some(domain.to_string()))),
            None => Ok((Some(host.to_string()), None)),
        },
        (host, domain) => Ok((host.map(ToString::to_string), domain.map(ToString::to_string))),
    }
}

/// Builder for a [`Service`].
pub struct ServiceBuilder {
    name: String,
    project: String,
    config: ServiceConfig,
    links: Vec<Link>,
    volumes_from: Vec<VolumesFromSource>,
    env: Arc<dyn EnvLookup>,
    insecure_registry: bool,
}

impl ServiceBuilder {
    /// Starts a service in the default project, reading the process
    /// environment.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project: DEFAULT_PROJECT.to_string(),
            config: ServiceConfig::default(),
            links: Vec::new(),
            volumes_from: Vec::new(),
            env: Arc::new(ProcessEnv),
            insecure_registry: false,
        }
    }

    /// Sets the project name.
    #[must_use]
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Sets the service configuration.
    #[must_use]
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a link.
    #[must_use]
    pub fn link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// Adds a volumes-from source.
    #[must_use]
    pub fn volumes_from(mut self, source: VolumesFromSource) -> Self {
        self.volumes_from.push(source);
        self
    }

    /// Sets the environment used for `${VAR}`, `~` and deferred values.
    #[must_use]
    pub fn env(mut self, env: Arc<dyn EnvLookup>) -> Self {
        self.env = env;
        self
    }

    /// Sets whether pulls may use plain-HTTP registries by default.
    #[must_use]
    pub const fn insecure_registry(mut self, insecure: bool) -> Self {
        self.insecure_registry = insecure;
        self
    }

    /// Validates everything that does not need the engine and builds the
    /// service.
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::Config`] for an invalid service or project
    /// name, malformed ports or environment entries, malformed volumes, or a
    /// hostname that cannot be split.
    pub fn build(self, engine: Arc<dyn ContainerEngine>) -> Result<Service> {
        validate_name("service", &self.name)?;
        validate_name("project", &self.project)?;
        self.config.validate()?;
        for spec in &self.config.volumes {
            let _ = parse_volume_spec(spec, self.env.as_ref())?;
        }
        let _ = split_hostname(
            self.config.hostname.as_deref(),
            self.config.domainname.as_deref(),
        )?;

        Ok(Service {
            name: self.name,
            project: self.project,
            config: self.config,
            links: self.links,
            volumes_from: self.volumes_from,
            engine,
            env: self.env,
            insecure_registry: self.insecure_registry,
        })
    }
}

impl fmt::Debug for ServiceBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBuilder")
            .field("name", &self.name)
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

/// One logical service and the containers that run it.
pub struct Service {
    name: String,
    project: String,
    config: ServiceConfig,
    links: Vec<Link>,
    volumes_from: Vec<VolumesFromSource>,
    engine: Arc<dyn ContainerEngine>,
    env: Arc<dyn EnvLookup>,
    insecure_registry: bool,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("project", &self.project)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Project name.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Declared links.
    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// `{project}_{service}`, the repository built images are tagged with.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}{NAME_SEPARATOR}{}", self.project, self.name)
    }

    /// Containers whose canonical name places them in this service, in
    /// instance-number order.
    ///
    /// # Errors
    ///
    /// Propagates engine listing failures.
    pub fn containers(&self, include_stopped: bool) -> Result<Vec<Container>> {
        let filter = if include_stopped {
            ListFilter::All
        } else {
            ListFilter::Running
        };
        let mut containers: Vec<Container> = self
            .engine
            .list_containers(filter)?
            .iter()
            .map(Container::from_summary)
            .filter(|c| {
                c.container_name()
                    .is_some_and(|name| name.belongs_to(&self.project, &self.name))
            })
            .collect();
        containers.sort_by_key(Container::number);
        Ok(containers)
    }

    /// The running container with instance `number`.
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::Config`] for `0` and
    /// [`StevedoreError::NotFound`] if no such container is running.
    pub fn get_container(&self, number: u32) -> Result<Container> {
        if number == 0 {
            return Err(StevedoreError::config(
                "container numbers start at 1".to_string(),
            ));
        }
        self.containers(false)?
            .into_iter()
            .find(|c| c.number() == Some(number))
            .ok_or_else(|| StevedoreError::NotFound {
                kind: "container",
                id: ContainerName::new(&self.project, &self.name, number).to_string(),
            })
    }

    /// Number the next container of this service gets.
    ///
    /// Stopped containers count, so a stopped instance's name is never
    /// reused while it still exists.
    ///
    /// # Errors
    ///
    /// Propagates engine listing failures.
    pub fn next_container_number(&self) -> Result<u32> {
        let names: Vec<ContainerName> = self
            .containers(true)?
            .iter()
            .filter_map(Container::container_name)
            .collect();
        Ok(naming::next_container_number(&names))
    }

    /// Image reference containers are created from, resolved against the
    /// current environment with the tag defaulted.
    #[must_use]
    pub fn image_name(&self) -> String {
        let reference = self
            .config
            .image
            .clone()
            .unwrap_or_else(|| self.full_name());
        resolve_image_name(&reference, self.env.as_ref())
    }

    /// Whether a build context is configured.
    #[must_use]
    pub const fn can_be_built(&self) -> bool {
        self.config.build.is_some()
    }

    /// Whether more than one instance can run at once. Any port mapping
    /// with a host side rules it out.
    #[must_use]
    pub fn can_be_scaled(&self) -> bool {
        self.config
            .ports
            .iter()
            .all(|port| PortSpec::parse(port).is_ok_and(|spec| spec.host.is_none()))
    }

    fn volume_specs(&self) -> Result<Vec<VolumeSpec>> {
        self.config
            .volumes
            .iter()
            .map(|spec| parse_volume_spec(spec, self.env.as_ref()))
            .collect()
    }

    /// Options for the engine's create call, without a name.
    ///
    /// Reads env files but does not contact the engine.
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::Config`] for malformed configuration and
    /// [`StevedoreError::Io`] for unreadable env files.
    pub fn container_create_options(&self) -> Result<CreateOptions> {
        let (hostname, domainname) = split_hostname(
            self.config.hostname.as_deref(),
            self.config.domainname.as_deref(),
        )?;
        let vars = merge_environment(&self.config.env_files(), self.config.environment.as_ref())?;

        let mut ports = Vec::new();
        for port in self.config.ports.iter().chain(&self.config.expose) {
            let container_port = PortSpec::parse(port)?.container_port;
            if !ports.contains(&container_port) {
                ports.push(container_port);
            }
        }

        Ok(CreateOptions {
            image: self.image_name(),
            name: None,
            hostname,
            domainname,
            environment: resolve_environment(&vars, self.env.as_ref()),
            ports,
            volumes: self
                .volume_specs()?
                .into_iter()
                .map(|spec| spec.container_path)
                .collect(),
            command: self.config.command.clone(),
            entrypoint: self.config.entrypoint.clone(),
            working_dir: self.config.working_dir.clone(),
            user: self.config.user.clone(),
            tty: self.config.tty,
            open_stdin: self.config.stdin_open,
        })
    }

    /// Creates the next container of this service.
    ///
    /// With `do_build` set and a build context configured, the image is
    /// built first unless the engine already has one for this service. A
    /// create that fails on a missing image pulls it once and retries once.
    ///
    /// # Errors
    ///
    /// Configuration errors are reported before the engine is contacted.
    /// Engine errors other than the first missing image propagate unchanged.
    pub fn create_container(
        &self,
        do_build: bool,
        insecure_registry: Option<bool>,
    ) -> Result<Container> {
        let mut options = self.container_create_options()?;
        let number = self.next_container_number()?;
        let name = ContainerName::new(&self.project, &self.name, number).to_string();
        options.name = Some(name);

        if do_build && self.can_be_built() {
            let (repository, _) = parse_repository_tag(&options.image);
            if self.engine.list_images(&repository)?.is_empty() {
                let _ = self.build()?;
            }
        }

        self.create_with_pull(&options, insecure_registry)
    }

    fn create_with_pull(
        &self,
        options: &CreateOptions,
        insecure_registry: Option<bool>,
    ) -> Result<Container> {
        let name = options.name.clone().unwrap_or_default();
        tracing::info!(service = %self.name, container = %name, "Creating {name}...");

        let id = match self.engine.create_container(options) {
            Ok(id) => id,
            Err(e) if e.is_missing_image() => {
                let image = &options.image;
                tracing::info!(service = %self.name, image = %image, "Pulling image {image}...");
                let (repository, tag) = parse_repository_tag(image);
                self.engine.pull_image(
                    &repository,
                    &tag,
                    PullOptions {
                        insecure_registry: insecure_registry.unwrap_or(self.insecure_registry),
                        stream: true,
                    },
                )?;
                self.engine.create_container(options)?
            }
            Err(e) => return Err(e),
        };

        Ok(Container {
            id,
            name,
            image: options.image.clone(),
            state: ContainerState::Created,
        })
    }

    /// Options for the engine's start call.
    ///
    /// Volumes held by `intermediate` are rebound at their original paths.
    /// Linked services and volumes-from services with nothing running get a
    /// container created and started first.
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::Config`] for malformed volumes or ports and
    /// propagates engine errors.
    pub fn container_start_options(&self, intermediate: Option<&Container>) -> Result<StartOptions> {
        let specs = self.volume_specs()?;
        let port_bindings = build_port_bindings(&self.config.ports)?;

        let previous = intermediate
            .map(|c| c.volumes(self.engine.as_ref()))
            .transpose()?;
        Ok(StartOptions {
            binds: volume_bindings(&specs, previous.as_ref())?,
            port_bindings,
            links: self.link_entries(true)?,
            volumes_from: self.volumes_from_ids()?,
            privileged: self.config.privileged,
            network_mode: self.config.net.clone(),
            dns: self.config.dns_servers(),
        })
    }

    /// Starts `container` and returns it as running.
    ///
    /// # Errors
    ///
    /// See [`Service::container_start_options`]; engine start failures
    /// propagate.
    pub fn start_container(
        &self,
        container: &Container,
        intermediate: Option<&Container>,
    ) -> Result<Container> {
        let options = self.container_start_options(intermediate)?;
        let name = &container.name;
        tracing::info!(service = %self.name, container = %name, "Starting {name}...");
        self.engine.start_container(&container.id, &options)?;
        Ok(container.clone().with_state(ContainerState::Running))
    }

    /// Link entries for a new container, three per resolved target
    /// container, in declaration order.
    ///
    /// # Errors
    ///
    /// Propagates engine errors from listing, or from creating dependency
    /// containers when `create_dependencies` is set.
    pub fn link_entries(&self, create_dependencies: bool) -> Result<Vec<LinkEntry>> {
        let mut entries = Vec::new();
        for link in &self.links {
            match &link.target {
                LinkTarget::Service(service) => {
                    let alias = link.alias.as_deref().unwrap_or(&service.name);
                    for container in service.running_or_created(create_dependencies)? {
                        push_link_rows(&mut entries, &container, alias);
                    }
                }
                LinkTarget::Container(container) => {
                    let fallback = container
                        .container_name()
                        .map_or_else(|| container.name.clone(), |name| name.service);
                    let alias = link.alias.as_deref().unwrap_or(&fallback);
                    push_link_rows(&mut entries, container, alias);
                }
            }
        }
        Ok(entries)
    }

    fn running_or_created(&self, create: bool) -> Result<Vec<Container>> {
        let running = self.containers(false)?;
        if !running.is_empty() || !create {
            return Ok(running);
        }
        let container = self.create_container(true, None)?;
        Ok(vec![self.start_container(&container, None)?])
    }

    /// Container IDs whose volumes are mounted into new containers.
    ///
    /// A service source contributes its first running container, created
    /// and started on demand.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn volumes_from_ids(&self) -> Result<Vec<ContainerId>> {
        let mut ids = Vec::new();
        for source in &self.volumes_from {
            match source {
                VolumesFromSource::Container(id) => ids.push(id.clone()),
                VolumesFromSource::Service(service) => {
                    if let Some(container) = service.running_or_created(true)?.into_iter().next() {
                        ids.push(container.id);
                    }
                }
            }
        }
        Ok(ids)
    }

    /// Starts every stopped container.
    ///
    /// # Errors
    ///
    /// Propagates the first failure.
    pub fn start(&self) -> Result<Vec<Container>> {
        self.containers(true)?
            .iter()
            .filter(|c| !c.is_running())
            .map(|c| self.start_container(c, None))
            .collect()
    }

    /// Stops every running container.
    ///
    /// # Errors
    ///
    /// Propagates the first failure.
    pub fn stop(&self) -> Result<()> {
        for container in self.containers(false)? {
            let name = &container.name;
            tracing::info!(service = %self.name, container = %name, "Stopping {name}...");
            self.engine.stop_container(&container.id)?;
        }
        Ok(())
    }

    /// Removes every container that is not running.
    ///
    /// # Errors
    ///
    /// Propagates the first failure.
    pub fn remove_stopped(&self) -> Result<()> {
        for container in self.containers(true)?.iter().filter(|c| !c.is_running()) {
            let name = &container.name;
            tracing::info!(service = %self.name, container = %name, "Removing {name}...");
            self.engine.remove_container(&container.id)?;
        }
        Ok(())
    }

    /// Replaces `container` with a fresh one of the same name, keeping the
    /// data in its engine-managed volumes.
    ///
    /// An intermediate container takes the old container's volumes while it
    /// is removed, and hands them to the replacement.
    ///
    /// The intermediate is removed whether or not the replacement comes up.
    /// `insecure_registry` applies to the pull after a missing image.
    ///
    /// # Errors
    ///
    /// Configuration errors are reported before the engine is contacted.
    /// A failure to create or start the replacement is returned after the
    /// intermediate has been cleaned up.
    pub fn recreate_container(
        &self,
        container: &Container,
        insecure_registry: Option<bool>,
    ) -> Result<Container> {
        let mut options = self.container_create_options()?;
        options.name = Some(container.name.clone());

        let intermediate_id = self.engine.create_container(&CreateOptions {
            image: container.image.clone(),
            entrypoint: Some(StringOrList::List(vec![INTERMEDIATE_ENTRYPOINT.to_string()])),
            ..CreateOptions::default()
        })?;
        self.engine.start_container(
            &intermediate_id,
            &StartOptions {
                volumes_from: vec![container.id.clone()],
                ..StartOptions::default()
            },
        )?;
        let intermediate = Container {
            id: intermediate_id,
            name: String::new(),
            image: container.image.clone(),
            state: ContainerState::Running,
        };

        let name = &container.name;
        tracing::info!(service = %self.name, container = %name, "Recreating {name}...");
        if container.is_running() {
            self.engine.stop_container(&container.id)?;
        }
        self.engine.remove_container(&container.id)?;

        let replacement = self.replace_from(&options, &intermediate, insecure_registry);

        let cleanup = self
            .engine
            .stop_container(&intermediate.id)
            .and_then(|()| self.engine.remove_container(&intermediate.id));
        if let Err(e) = &cleanup {
            tracing::warn!(
                service = %self.name,
                container = %intermediate.id.short(),
                error = %e,
                "failed to remove intermediate container"
            );
        }
        let replacement = replacement?;
        cleanup?;
        Ok(replacement)
    }

    fn replace_from(
        &self,
        options: &CreateOptions,
        intermediate: &Container,
        insecure_registry: Option<bool>,
    ) -> Result<Container> {
        let replacement = self.create_with_pull(options, insecure_registry)?;
        self.start_container(&replacement, Some(intermediate))
    }

    /// Recreates every container, or creates and starts one if there are
    /// none.
    ///
    /// # Errors
    ///
    /// Propagates the first failure.
    pub fn recreate_containers(&self, insecure_registry: Option<bool>) -> Result<Vec<Container>> {
        let existing = self.containers(true)?;
        if existing.is_empty() {
            let container = self.create_container(true, insecure_registry)?;
            return Ok(vec![self.start_container(&container, None)?]);
        }
        existing
            .iter()
            .map(|c| self.recreate_container(c, insecure_registry))
            .collect()
    }

    /// Starts stopped containers, or creates and starts one if there are
    /// none.
    ///
    /// # Errors
    ///
    /// Propagates the first failure.
    pub fn start_or_create_containers(
        &self,
        insecure_registry: Option<bool>,
    ) -> Result<Vec<Container>> {
        let existing = self.containers(true)?;
        if existing.is_empty() {
            let container = self.create_container(true, insecure_registry)?;
            return Ok(vec![self.start_container(&container, None)?]);
        }
        existing
            .iter()
            .map(|c| {
                if c.is_running() {
                    Ok(c.clone())
                } else {
                    self.start_container(c, None)
                }
            })
            .collect()
    }

    /// Brings the number of running containers to exactly `desired`.
    ///
    /// Stopped containers are started before new ones are created; extras
    /// are stopped from the highest number down and then removed.
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::CannotScale`] if any port binds a host
    /// port, otherwise propagates the first failure.
    pub fn scale(&self, desired: usize) -> Result<()> {
        if !self.can_be_scaled() {
            return Err(StevedoreError::CannotScale {
                service: self.name.clone(),
            });
        }
        tracing::info!(service = %self.name, desired, "scaling service");

        let all = self.containers(true)?;
        let mut running = all.iter().filter(|c| c.is_running()).count();
        for stopped in all.iter().filter(|c| !c.is_running()) {
            if running >= desired {
                break;
            }
            let _ = self.start_container(stopped, None)?;
            running += 1;
        }
        while running < desired {
            let container = self.create_container(true, None)?;
            let _ = self.start_container(&container, None)?;
            running += 1;
        }

        let mut running = self.containers(false)?;
        if running.len() > desired {
            running.sort_by_key(|c| std::cmp::Reverse(c.number()));
            let extra = running.len() - desired;
            for container in running.iter().take(extra) {
                let name = &container.name;
                tracing::info!(service = %self.name, container = %name, "Stopping {name}...");
                self.engine.stop_container(&container.id)?;
            }
        }
        self.remove_stopped()
    }

    /// Builds the service image from its context and tags it with
    /// [`Service::image_name`].
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::Config`] if no build context is configured
    /// and propagates engine build failures.
    pub fn build(&self) -> Result<ImageId> {
        let context = self.config.build.as_deref().ok_or_else(|| {
            StevedoreError::config(format!("service \"{}\" has no build context", self.name))
        })?;
        let name = &self.name;
        tracing::info!(service = %name, context = %context.display(), "Building {name}...");
        self.build_from(context)
    }

    fn build_from(&self, context: &Path) -> Result<ImageId> {
        let id = self.engine.build_image(context, &self.image_name())?;
        tracing::debug!(service = %self.name, image = %id.short(), "image built");
        Ok(id)
    }

    /// Pulls the configured image. Services without an `image` have
    /// nothing to pull.
    ///
    /// # Errors
    ///
    /// Propagates engine pull failures.
    pub fn pull(&self, insecure_registry: Option<bool>) -> Result<()> {
        if self.config.image.is_none() {
            return Ok(());
        }
        let image = self.image_name();
        let name = &self.name;
        tracing::info!(service = %name, image = %image, "Pulling {name} ({image})...");
        let (repository, tag) = parse_repository_tag(&image);
        self.engine.pull_image(
            &repository,
            &tag,
            PullOptions {
                insecure_registry: insecure_registry.unwrap_or(self.insecure_registry),
                stream: false,
            },
        )
    }
}

fn push_link_rows(entries: &mut Vec<LinkEntry>, container: &Container, alias: &str) {
    entries.push(LinkEntry::new(&container.name, alias));
    entries.push(LinkEntry::new(&container.name, &container.name));
    entries.push(LinkEntry::new(
        &container.name,
        container.name_without_project(),
    ));
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::backend::memory::{EngineCall, InMemoryEngine};

    fn engine() -> Arc<InMemoryEngine> {
        Arc::new(InMemoryEngine::new())
    }

    fn service(name: &str, config: ServiceConfig, engine: &Arc<InMemoryEngine>) -> Result<Service> {
        ServiceBuilder::new(name)
            .config(config)
            .env(Arc::new(BTreeMap::<String, String>::new()))
            .build(engine.clone())
    }

    fn image(reference: &str) -> ServiceConfig {
        ServiceConfig {
            image: Some(reference.into()),
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn name_validations() {
        let engine = engine();
        for bad in ["", " ", "/", "!", "\u{e2}", "_", "____", "foo_bar", "__foo_bar__"] {
            assert!(
                service(bad, ServiceConfig::default(), &engine).is_err(),
                "{bad:?} should be rejected"
            );
        }
        assert!(service("a", ServiceConfig::default(), &engine).is_ok());
        assert!(service("foo", ServiceConfig::default(), &engine).is_ok());
    }

    #[test]
    fn project_validation() {
        let engine = engine();
        let bad = ServiceBuilder::new("foo").project("_").build(engine.clone());
        assert!(bad.is_err());
        let good = ServiceBuilder::new("foo").project("bar").build(engine);
        assert_eq!(good.unwrap().full_name(), "bar_foo");
    }

    #[test]
    fn config_validation_happens_before_engine_calls() {
        let engine = engine();
        let bad = ServiceConfig {
            volumes: vec!["one:two:three:four".into()],
            ..ServiceConfig::default()
        };
        assert!(service("foo", bad, &engine).is_err());
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn split_domainname_none() {
        assert_eq!(
            split_hostname(Some("name"), None).unwrap(),
            (Some("name".into()), None)
        );
    }

    #[test]
    fn split_domainname_fqdn() {
        assert_eq!(
            split_hostname(Some("name.domain.tld"), None).unwrap(),
            (Some("name".into()), Some("domain.tld".into()))
        );
    }

    #[test]
    fn split_domainname_both() {
        assert_eq!(
            split_hostname(Some("name"), Some("domain.tld")).unwrap(),
            (Some("name".into()), Some("domain.tld".into()))
        );
    }

    #[test]
    fn split_domainname_weird() {
        assert_eq!(
            split_hostname(Some("name.sub"), Some("domain.tld")).unwrap(),
            (Some("name.sub".into()), Some("domain.tld".into()))
        );
    }

    #[test]
    fn split_domainname_ambiguous() {
        assert!(split_hostname(Some("name."), None).is_err());
        assert!(split_hostname(Some(".domain"), None).is_err());
    }

    #[test]
    fn image_name_uses_environment_and_default_tag() {
        let engine = engine();
        let env: BTreeMap<String, String> = [("USE_TAG".to_string(), "12345".to_string())].into();
        let svc = ServiceBuilder::new("foo")
            .config(image("something:${USE_TAG}"))
            .env(Arc::new(env))
            .build(engine.clone())
            .unwrap();
        assert_eq!(svc.image_name(), "something:12345");

        let svc = service("foo", ServiceConfig::default(), &engine).unwrap();
        assert_eq!(svc.image_name(), "default_foo:latest");
    }

    #[test]
    fn scalability_depends_on_host_ports() {
        let engine = engine();
        let mut config = ServiceConfig {
            ports: vec!["8000".into()],
            ..ServiceConfig::default()
        };
        assert!(service("web", config.clone(), &engine).unwrap().can_be_scaled());
        config.ports.push("127.0.0.1::9000".into());
        assert!(!service("web", config, &engine).unwrap().can_be_scaled());
    }

    #[test]
    fn create_options_include_exposed_ports_once() {
        let engine = engine();
        let config = ServiceConfig {
            image: Some("busybox".into()),
            ports: vec!["8000:8000".into(), "53/udp".into()],
            expose: vec!["8000".into(), "9000".into()],
            volumes: vec!["/data".into(), "/host:/etc/app:ro".into()],
            command: Some(StringOrList::Single("top".into())),
            tty: true,
            ..ServiceConfig::default()
        };
        let options = service("web", config, &engine)
            .unwrap()
            .container_create_options()
            .unwrap();
        assert_eq!(options.image, "busybox:latest");
        assert_eq!(options.ports, vec!["8000", "53/udp", "9000"]);
        assert_eq!(options.volumes, vec!["/data", "/etc/app"]);
        assert_eq!(options.command, Some(StringOrList::Single("top".into())));
        assert!(options.tty);
        assert!(options.name.is_none());
    }

    #[test]
    fn get_container_rejects_zero() {
        let engine = engine();
        let svc = service("foo", ServiceConfig::default(), &engine).unwrap();
        let err = svc.get_container(0).unwrap_err();
        assert!(matches!(err, StevedoreError::Config { .. }));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn links_to_bare_containers_use_their_name() {
        let engine = engine();
        let registry = Container {
            id: ContainerId::new("abc"),
            name: "registry".into(),
            image: "registry:2".into(),
            state: ContainerState::Running,
        };
        let svc = ServiceBuilder::new("web")
            .link(Link::container(registry, None))
            .build(engine.clone())
            .unwrap();
        let entries = svc.link_entries(false).unwrap();
        assert_eq!(
            entries,
            vec![
                LinkEntry::new("registry", "registry"),
                LinkEntry::new("registry", "registry"),
                LinkEntry::new("registry", "registry"),
            ]
        );
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn build_without_context_is_a_config_error() {
        let engine = engine();
        let svc = service("foo", image("busybox"), &engine).unwrap();
        assert!(matches!(svc.build(), Err(StevedoreError::Config { .. })));
        assert!(!engine.calls().iter().any(|c| matches!(c, EngineCall::Build { .. })));
    }
}
