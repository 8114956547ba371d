//! Canonical container names: `{project}_{service}_{number}`.
//!
//! Instance numbers are never stored anywhere. The next number is derived
//! from the names of the containers the engine currently reports.

use std::fmt;

use stevedore_common::constants::NAME_SEPARATOR;
use stevedore_common::error::{Result, StevedoreError};

/// Checks that a project or service name can be embedded in a container
/// name and used as a DNS alias.
///
/// Allowed: ASCII letters and digits, plus `-` between them. `_` is
/// reserved as the container-name separator.
///
/// # Errors
///
/// Returns [`StevedoreError::Config`] naming `kind` and the offending value.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(StevedoreError::config(format!(
            "invalid {kind} name \"{name}\": only [a-zA-Z0-9] and inner '-' are allowed"
        )))
    }
}

fn is_valid_name(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric())
}

/// Decoded form of a canonical container name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerName {
    /// Project the container belongs to.
    pub project: String,
    /// Service the container belongs to.
    pub service: String,
    /// 1-based instance number.
    pub number: u32,
}

impl ContainerName {
    /// Builds a name from its parts.
    #[must_use]
    pub fn new(project: impl Into<String>, service: impl Into<String>, number: u32) -> Self {
        Self {
            project: project.into(),
            service: service.into(),
            number,
        }
    }

    /// Decodes `project_service_number`, tolerating the leading `/` the
    /// engine puts on listed names. Project and service must pass
    /// [`validate_name`] and the number is written without leading zeros.
    /// Anything else yields `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.strip_prefix('/').unwrap_or(name);
        let parts: Vec<&str> = name.split(NAME_SEPARATOR).collect();
        let [project, service, number] = parts.as_slice() else {
            return None;
        };
        if !is_valid_name(project) || !is_valid_name(service) {
            return None;
        }
        if number.starts_with('0') || !number.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let number: u32 = number.parse().ok().filter(|n| *n > 0)?;
        Some(Self::new(*project, *service, number))
    }

    /// `service_number`, the alias a container is reachable under from
    /// other containers of the same project.
    #[must_use]
    pub fn name_without_project(&self) -> String {
        format!("{}{NAME_SEPARATOR}{}", self.service, self.number)
    }

    /// Whether this container belongs to `project`/`service`.
    #[must_use]
    pub fn belongs_to(&self, project: &str, service: &str) -> bool {
        self.project == project && self.service == service
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{NAME_SEPARATOR}{}{NAME_SEPARATOR}{}",
            self.project, self.service, self.number
        )
    }
}

/// `max(existing) + 1`, or 1 when nothing exists yet.
pub fn next_container_number<'a>(existing: impl IntoIterator<Item = &'a ContainerName>) -> u32 {
    existing
        .into_iter()
        .map(|name| name.number)
        .max()
        .map_or(1, |max| max.saturating_add(1))
}
