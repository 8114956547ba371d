//! Per-service configuration.
//!
//! [`ServiceConfig`] lists every recognized option key. Unknown keys are
//! rejected when the config is deserialized, so a misspelled `port:` never
//! silently does nothing.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use stevedore_common::error::{Result, StevedoreError};

use crate::environment::{RawEnvironment, parse_environment};
use crate::port::PortSpec;

/// A value that may be written as one string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    /// A single string, e.g. a shell-form command.
    Single(String),
    /// A list of strings, e.g. an exec-form command.
    List(Vec<String>),
}

impl StringOrList {
    /// The value as a list; a single string becomes a one-element list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Single(s) => vec![s.clone()],
            Self::List(items) => items.clone(),
        }
    }
}

/// Port entries may be bare integers (`- 8000`) or strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(u64),
    Text(String),
}

fn scalar_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Scalar>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|v| match v {
            Scalar::Int(n) => n.to_string(),
            Scalar::Text(s) => s,
        })
        .collect())
}

/// Declarative description of one service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Image reference, may contain `${VAR}`.
    pub image: Option<String>,
    /// Build context directory.
    pub build: Option<PathBuf>,
    /// Command override.
    pub command: Option<StringOrList>,
    /// Entrypoint override.
    pub entrypoint: Option<StringOrList>,
    /// Port mappings, `[host_ip:][host_port:]container_port[/protocol]`.
    #[serde(deserialize_with = "scalar_strings")]
    pub ports: Vec<String>,
    /// Container ports exposed without host bindings.
    #[serde(deserialize_with = "scalar_strings")]
    pub expose: Vec<String>,
    /// Volume specs, `[host_path:]container_path[:mode]`.
    pub volumes: Vec<String>,
    /// Services or containers whose volumes are mounted too.
    pub volumes_from: Vec<String>,
    /// Linked services, `service` or `service:alias`.
    pub links: Vec<String>,
    /// Inline environment.
    pub environment: Option<RawEnvironment>,
    /// Env files, applied in order before `environment`.
    pub env_file: Option<StringOrList>,
    /// Container hostname; `name.domain` is split if no domainname is set.
    pub hostname: Option<String>,
    /// Container domain name.
    pub domainname: Option<String>,
    /// Working directory inside the container.
    pub working_dir: Option<String>,
    /// User the process runs as.
    pub user: Option<String>,
    /// Network mode.
    pub net: Option<String>,
    /// DNS servers.
    pub dns: Option<StringOrList>,
    /// Run with extended privileges.
    pub privileged: bool,
    /// Allocate a pseudo-TTY.
    pub tty: bool,
    /// Keep stdin open.
    pub stdin_open: bool,
}

/// A parsed `links` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    /// Name of the linked service.
    pub service: String,
    /// Alias to expose it under, defaulting to the service name.
    pub alias: Option<String>,
}

impl ServiceConfig {
    /// Runs every check that does not depend on the ambient environment.
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::Config`] for malformed ports, exposed
    /// ports, inline environment entries or links.
    pub fn validate(&self) -> Result<()> {
        for port in self.ports.iter().chain(&self.expose) {
            let _ = PortSpec::parse(port)?;
        }
        let _ = parse_environment(self.environment.as_ref())?;
        let _ = self.link_specs()?;
        Ok(())
    }

    /// Env file paths in declaration order.
    #[must_use]
    pub fn env_files(&self) -> Vec<PathBuf> {
        self.env_file
            .as_ref()
            .map(|files| files.to_vec().into_iter().map(PathBuf::from).collect())
            .unwrap_or_default()
    }

    /// DNS servers in declaration order.
    #[must_use]
    pub fn dns_servers(&self) -> Vec<String> {
        self.dns.as_ref().map(StringOrList::to_vec).unwrap_or_default()
    }

    /// Parses `links` into service names and optional aliases.
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::Config`] for empty parts or more than one `:`.
    pub fn link_specs(&self) -> Result<Vec<LinkSpec>> {
        self.links
            .iter()
            .map(|link| {
                let parts: Vec<&str> = link.split(':').collect();
                let (service, alias) = match parts.as_slice() {
                    [service] => (*service, None),
                    [service, alias] => (*service, Some(*alias)),
                    _ => ("", None),
                };
                if service.is_empty() || alias.is_some_and(str::is_empty) {
                    return Err(StevedoreError::config(format!(
                        "links: \"{link}\" is not of the form service[:alias]"
                    )));
                }
                Ok(LinkSpec {
                    service: service.to_string(),
                    alias: alias.map(ToString::to_string),
                })
            })
            .collect()
    }
}
