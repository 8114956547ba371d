//! References from one service to other services or containers.

use std::sync::Arc;

use stevedore_common::types::ContainerId;

use crate::container::Container;
use crate::service::Service;

/// What a link points at.
#[derive(Debug, Clone)]
pub enum LinkTarget {
    /// Every running container of another service.
    Service(Arc<Service>),
    /// One container not managed by any service.
    Container(Container),
}

/// A declared link with its optional alias.
#[derive(Debug, Clone)]
pub struct Link {
    /// The linked service or container.
    pub target: LinkTarget,
    /// Alias replacing the service name in the first emitted entry.
    pub alias: Option<String>,
}

impl Link {
    /// Links to a service.
    #[must_use]
    pub const fn service(service: Arc<Service>, alias: Option<String>) -> Self {
        Self {
            target: LinkTarget::Service(service),
            alias,
        }
    }

    /// Links to a bare container.
    #[must_use]
    pub const fn container(container: Container, alias: Option<String>) -> Self {
        Self {
            target: LinkTarget::Container(container),
            alias,
        }
    }
}

/// Where inherited volumes come from.
#[derive(Debug, Clone)]
pub enum VolumesFromSource {
    /// The first running container of a service.
    Service(Arc<Service>),
    /// A container referenced by ID or name.
    Container(ContainerId),
}
