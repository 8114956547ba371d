//! System-wide constants and defaults.

/// Project name used when none is configured.
pub const DEFAULT_PROJECT: &str = "default";

/// Tag appended to image references that do not carry one.
pub const DEFAULT_TAG: &str = "latest";

/// Separator between the parts of a canonical container name.
pub const NAME_SEPARATOR: char = '_';

/// Entrypoint of the throwaway container that holds volumes during a recreate.
pub const INTERMEDIATE_ENTRYPOINT: &str = "echo";

/// Directory under which engine-managed volume storage is allocated.
pub const VOLUME_STORAGE_DIR: &str = "/var/lib/stevedore/volumes";
