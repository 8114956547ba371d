//! Volume spec parser and bind-mount table construction.
//!
//! A volume spec is `container_path`, `host_path:container_path` or
//! `host_path:container_path:mode`. Recreating a container keeps the data of
//! its engine-managed volumes by binding the previous incarnation's storage
//! back into the same container paths.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use stevedore_common::error::{Result, StevedoreError};

use crate::env::{EnvLookup, expand_home, interpolate};

/// Access mode of a mounted volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum VolumeMode {
    /// Read-write (`rw`).
    #[default]
    ReadWrite,
    /// Read-only (`ro`).
    ReadOnly,
}

impl VolumeMode {
    fn parse(mode: &str, spec: &str) -> Result<Self> {
        match mode {
            "rw" => Ok(Self::ReadWrite),
            "ro" => Ok(Self::ReadOnly),
            other => Err(StevedoreError::config(format!(
                "volumes: \"{spec}\" has invalid mode \"{other}\", expected \"rw\" or \"ro\""
            ))),
        }
    }
}

impl fmt::Display for VolumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadWrite => write!(f, "rw"),
            Self::ReadOnly => write!(f, "ro"),
        }
    }
}

/// A parsed volume declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Host side of the mount. `None` declares an anonymous, engine-managed volume.
    pub host_path: Option<String>,
    /// Mount point inside the container.
    pub container_path: String,
    /// Access mode.
    pub mode: VolumeMode,
}

/// Parses a volume declaration. Only the host path has `${VAR}` references
/// and a leading `~` expanded; the container path and mode are taken as
/// written.
///
/// # Errors
///
/// Returns [`StevedoreError::Config`] when the spec has more than three
/// segments, an empty path, or a mode other than `rw`/`ro`.
pub fn parse_volume_spec(spec: &str, env: &dyn EnvLookup) -> Result<VolumeSpec> {
    let parts: Vec<&str> = spec.split(':').collect();

    let (host_path, container_path, mode) = match parts.as_slice() {
        [container] => (None, *container, VolumeMode::ReadWrite),
        [host, container] => (Some(*host), *container, VolumeMode::ReadWrite),
        [host, container, mode] => (Some(*host), *container, VolumeMode::parse(mode, spec)?),
        _ => {
            return Err(StevedoreError::config(format!(
                "volumes: \"{spec}\" has too many segments, expected [host_path:]container_path[:mode]"
            )));
        }
    };

    if container_path.is_empty() || host_path.is_some_and(str::is_empty) {
        return Err(StevedoreError::config(format!(
            "volumes: \"{spec}\" contains an empty path"
        )));
    }

    Ok(VolumeSpec {
        host_path: host_path.map(|host| expand_home(&interpolate(host, env), env)),
        container_path: container_path.to_string(),
        mode,
    })
}

/// Where a host-side path is mounted in the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeBinding {
    /// Mount point inside the container.
    pub bind: String,
    /// Whether the mount is read-only.
    pub ro: bool,
}

/// Host path (or engine storage location) to its container mount.
pub type VolumeBindingTable = BTreeMap<String, VolumeBinding>;

/// Converts a spec that names a host path into a bind-table entry.
///
/// The host path is lexically normalized (`.` and `..` resolved).
///
/// # Errors
///
/// Returns [`StevedoreError::Config`] for anonymous volumes, which have no
/// host side to bind.
pub fn build_volume_binding(spec: &VolumeSpec) -> Result<(String, VolumeBinding)> {
    let host = spec.host_path.as_deref().ok_or_else(|| {
        StevedoreError::config(format!(
            "volumes: \"{}\" has no host path to bind",
            spec.container_path
        ))
    })?;
    Ok((
        normalize(host),
        VolumeBinding {
            bind: spec.container_path.clone(),
            ro: spec.mode == VolumeMode::ReadOnly,
        },
    ))
}

fn normalize(path: &str) -> String {
    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        return ".".to_string();
    }
    out.to_string_lossy().into_owned()
}

/// Bindings that carry engine-managed volumes over from a previous container.
///
/// `previous` is the previous container's volume table (container path to
/// storage location). Only anonymous specs whose container path the previous
/// container already had are carried over, always read-write.
pub fn container_data_volumes(
    previous: &BTreeMap<String, String>,
    specs: &[VolumeSpec],
) -> VolumeBindingTable {
    specs
        .iter()
        .filter(|spec| spec.host_path.is_none())
        .filter_map(|spec| {
            previous.get(&spec.container_path).map(|storage| {
                (
                    storage.clone(),
                    VolumeBinding {
                        bind: spec.container_path.clone(),
                        ro: false,
                    },
                )
            })
        })
        .collect()
}

/// Final bind table for starting a container.
///
/// Inherited storage from `previous` is laid down first and explicit host
/// bindings from `specs` are overlaid on top.
pub fn volume_bindings(
    specs: &[VolumeSpec],
    previous: Option<&BTreeMap<String, String>>,
) -> Result<VolumeBindingTable> {
    let mut table = previous.map_or_else(VolumeBindingTable::new, |volumes| {
        container_data_volumes(volumes, specs)
    });
    for spec in specs.iter().filter(|spec| spec.host_path.is_some()) {
        let (host, binding) = build_volume_binding(spec)?;
        let _ = table.insert(host, binding);
    }
    Ok(table)
}
