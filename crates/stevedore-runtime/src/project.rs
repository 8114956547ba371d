//! A set of services brought up together.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use stevedore_common::config::StevedoreConfig;
use stevedore_common::error::{Result, StevedoreError};
use stevedore_common::types::ContainerId;
use stevedore_compose::config::ServiceConfig;
use stevedore_compose::env::EnvLookup;
use stevedore_compose::graph::DependencyGraph;

use crate::backend::ContainerEngine;
use crate::container::Container;
use crate::links::{Link, VolumesFromSource};
use crate::service::{Service, ServiceBuilder};

/// Services of one project, ordered so that every service comes after the
/// services it links to or takes volumes from.
#[derive(Debug)]
pub struct Project {
    name: String,
    services: Vec<Arc<Service>>,
}

impl Project {
    /// Builds every service in dependency order.
    ///
    /// `volumes_from` entries that do not name a service are taken as
    /// container IDs or names.
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::Config`] for links to undefined services,
    /// circular dependencies, and anything [`ServiceBuilder::build`] rejects.
    pub fn from_configs(
        config: &StevedoreConfig,
        services: &BTreeMap<String, ServiceConfig>,
        engine: Arc<dyn ContainerEngine>,
        env: Arc<dyn EnvLookup>,
    ) -> Result<Self> {
        let mut graph = DependencyGraph::new();
        for name in services.keys() {
            let _ = graph.add_service(name);
        }
        for (name, service) in services {
            for link in service.link_specs()? {
                graph.add_dependency(name, &link.service)?;
            }
            for source in &service.volumes_from {
                if services.contains_key(source) {
                    graph.add_dependency(name, source)?;
                }
            }
        }
        let order = graph.resolve_order()?;
        tracing::debug!(project = %config.project, order = ?order, "resolved service order");

        let mut built: HashMap<String, Arc<Service>> = HashMap::new();
        let mut ordered = Vec::with_capacity(order.len());
        for name in order {
            let Some(service_config) = services.get(&name) else {
                continue;
            };
            let mut builder = ServiceBuilder::new(name.as_str())
                .project(config.project.as_str())
                .config(service_config.clone())
                .env(Arc::clone(&env))
                .insecure_registry(config.insecure_registry);
            for link in service_config.link_specs()? {
                let target = lookup(&built, &link.service)?;
                builder = builder.link(Link::service(target, link.alias));
            }
            for source in &service_config.volumes_from {
                let source = built.get(source).map_or_else(
                    || VolumesFromSource::Container(ContainerId::new(source.as_str())),
                    |service| VolumesFromSource::Service(Arc::clone(service)),
                );
                builder = builder.volumes_from(source);
            }
            let service = Arc::new(builder.build(Arc::clone(&engine))?);
            let _ = built.insert(name, Arc::clone(&service));
            ordered.push(service);
        }

        Ok(Self {
            name: config.project.clone(),
            services: ordered,
        })
    }

    /// Project name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Services in dependency order.
    #[must_use]
    pub fn services(&self) -> &[Arc<Service>] {
        &self.services
    }

    /// Looks a service up by name.
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::NotFound`] if there is no such service.
    pub fn get_service(&self, name: &str) -> Result<Arc<Service>> {
        self.services
            .iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| StevedoreError::NotFound {
                kind: "service",
                id: name.to_string(),
            })
    }

    /// Brings every service up in dependency order.
    ///
    /// With `recreate`, existing containers are replaced; otherwise stopped
    /// ones are started. Services with no containers get one either way.
    ///
    /// # Errors
    ///
    /// Stops at the first service that fails.
    pub fn up(&self, recreate: bool) -> Result<Vec<Container>> {
        let mut containers = Vec::new();
        for service in &self.services {
            let started = if recreate {
                service.recreate_containers(None)?
            } else {
                service.start_or_create_containers(None)?
            };
            containers.extend(started);
        }
        Ok(containers)
    }

    /// Pulls the image of every service that has one.
    ///
    /// # Errors
    ///
    /// Stops at the first failed pull.
    pub fn pull(&self) -> Result<()> {
        self.services.iter().try_for_each(|s| s.pull(None))
    }

    /// Builds every service that has a build context.
    ///
    /// # Errors
    ///
    /// Stops at the first failed build.
    pub fn build(&self) -> Result<()> {
        for service in self.services.iter().filter(|s| s.can_be_built()) {
            let _ = service.build()?;
        }
        Ok(())
    }

    /// Stops every service, dependents first.
    ///
    /// # Errors
    ///
    /// Stops at the first failure.
    pub fn stop(&self) -> Result<()> {
        self.services.iter().rev().try_for_each(|s| s.stop())
    }

    /// Containers of every service, in service order.
    ///
    /// # Errors
    ///
    /// Propagates engine listing failures.
    pub fn containers(&self, include_stopped: bool) -> Result<Vec<Container>> {
        let mut containers = Vec::new();
        for service in &self.services {
            containers.extend(service.containers(include_stopped)?);
        }
        Ok(containers)
    }
}

fn lookup(built: &HashMap<String, Arc<Service>>, name: &str) -> Result<Arc<Service>> {
    built.get(name).cloned().ok_or_else(|| {
        StevedoreError::config(format!("service \"{name}\" is linked to but not defined"))
    })
}
