//! Port mapping parser.
//!
//! Accepts `[host_ip:][host_port:]container_port[/protocol]` and groups the
//! host side of each mapping by container port for the engine's start call.

use std::collections::BTreeMap;

use serde::Serialize;
use stevedore_common::error::{Result, StevedoreError};

/// Host side of a port mapping. Both fields empty lets the engine choose.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostBinding {
    /// Interface address to bind on the host.
    pub host_ip: Option<String>,
    /// Host port; `None` lets the engine pick a free one.
    pub host_port: Option<String>,
}

impl HostBinding {
    fn port(port: &str) -> Self {
        Self {
            host_ip: None,
            host_port: Some(port.to_string()),
        }
    }

    fn ip_and_port(ip: &str, port: &str) -> Self {
        Self {
            host_ip: Some(ip.to_string()),
            host_port: (!port.is_empty()).then(|| port.to_string()),
        }
    }
}

/// A parsed port mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    /// Container port including any `/protocol` suffix, e.g. `"53/udp"`.
    pub container_port: String,
    /// Host side of the mapping, absent for container-only ports.
    pub host: Option<HostBinding>,
}

impl PortSpec {
    /// Parses a single port mapping.
    ///
    /// # Errors
    ///
    /// Returns [`StevedoreError::Config`] if the mapping has more than three
    /// colon-separated segments, an empty container port, or a protocol
    /// other than `tcp` or `udp`.
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (container_port, host) = match parts.as_slice() {
            [container] => (*container, None),
            [host_port, container] => (*container, Some(HostBinding::port(host_port))),
            [ip, host_port, container] => {
                (*container, Some(HostBinding::ip_and_port(ip, host_port)))
            }
            _ => {
                return Err(StevedoreError::config(format!(
                    "ports: invalid port \"{spec}\", expected [host_ip:][host_port:]container_port[/protocol]"
                )));
            }
        };

        validate_container_port(spec, container_port)?;
        Ok(Self {
            container_port: container_port.to_string(),
            host,
        })
    }
}

fn validate_container_port(spec: &str, container_port: &str) -> Result<()> {
    let (port, protocol) = match container_port.split_once('/') {
        Some((port, protocol)) => (port, Some(protocol)),
        None => (container_port, None),
    };
    if port.is_empty() {
        return Err(StevedoreError::config(format!(
            "ports: \"{spec}\" has an empty container port"
        )));
    }
    match protocol {
        None | Some("tcp" | "udp") => Ok(()),
        Some(other) => Err(StevedoreError::config(format!(
            "ports: \"{spec}\" has unknown protocol \"{other}\" (expected tcp or udp)"
        ))),
    }
}

/// Splits a port mapping into its container port and host binding.
///
/// # Errors
///
/// See [`PortSpec::parse`].
pub fn split_port(spec: &str) -> Result<(String, Option<HostBinding>)> {
    let parsed = PortSpec::parse(spec)?;
    Ok((parsed.container_port, parsed.host))
}

/// Container port (with protocol suffix) to the host bindings that target it.
pub type PortBindings = BTreeMap<String, Vec<HostBinding>>;

/// Groups port mappings by container port, preserving input order.
///
/// Container-only ports map to an empty [`HostBinding`], which asks the
/// engine to publish them on an arbitrary host port.
///
/// # Errors
///
/// Fails on the first malformed mapping.
pub fn build_port_bindings<S: AsRef<str>>(ports: &[S]) -> Result<PortBindings> {
    let mut bindings = PortBindings::new();
    for port in ports {
        let (internal, external) = split_port(port.as_ref())?;
        bindings
            .entry(internal)
            .or_default()
            .push(external.unwrap_or_default());
    }
    Ok(bindings)
}
