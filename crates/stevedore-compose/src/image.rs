//! Image reference handling.

use stevedore_common::constants::DEFAULT_TAG;

use crate::env::{EnvLookup, interpolate};

/// Splits `repository[:tag]` into its repository and tag.
///
/// The tag separator is the last `:` after the last `/`, so a registry
/// `host:port` prefix is never read as a tag. The tag is empty when absent.
#[must_use]
pub fn parse_repository_tag(reference: &str) -> (String, String) {
    match reference.rsplit_once(':') {
        Some((repository, tag)) if !tag.contains('/') => (repository.to_string(), tag.to_string()),
        _ => (reference.to_string(), String::new()),
    }
}

/// Concrete image name to create from: variables expanded, tag defaulted.
#[must_use]
pub fn resolve_image_name(reference: &str, env: &dyn EnvLookup) -> String {
    let expanded = interpolate(reference, env);
    let (repository, tag) = parse_repository_tag(&expanded);
    if tag.is_empty() {
        format!("{repository}:{DEFAULT_TAG}")
    } else {
        format!("{repository}:{tag}")
    }
}
