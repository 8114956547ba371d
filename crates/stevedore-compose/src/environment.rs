//! Environment variables for a service's containers.
//!
//! Values come from env files and inline entries. An entry that names a
//! variable without supplying a value is resolved against the ambient
//! environment when the container is created.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stevedore_common::error::{Result, StevedoreError};

use crate::env::EnvLookup;

/// Inline environment as written in a service config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawEnvironment {
    /// `NAME=VALUE` strings.
    List(Vec<String>),
    /// Names to values; a null value defers to the ambient environment.
    Map(BTreeMap<String, Option<String>>),
}

/// A configured environment value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    /// Use this exact value, which may be empty.
    Literal(String),
    /// Take the ambient value at creation time, or empty if undefined.
    Inherit,
}

impl From<Option<String>> for EnvValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Inherit, Self::Literal)
    }
}

/// Variable name to configured value.
pub type EnvironmentMap = BTreeMap<String, EnvValue>;

/// Normalizes inline environment entries.
///
/// List entries split on their first `=` so values may contain `=`; a
/// trailing `=` yields an empty value. `None` yields an empty map.
///
/// # Errors
///
/// Returns [`StevedoreError::Config`] for the first list entry without `=`
/// or with an empty name. Nothing is returned for earlier entries.
pub fn parse_environment(raw: Option<&RawEnvironment>) -> Result<EnvironmentMap> {
    match raw {
        None => Ok(EnvironmentMap::new()),
        Some(RawEnvironment::Map(map)) => Ok(map
            .iter()
            .map(|(name, value)| (name.clone(), EnvValue::from(value.clone())))
            .collect()),
        Some(RawEnvironment::List(entries)) => entries
            .iter()
            .map(|entry| {
                let (name, value) = entry.split_once('=').ok_or_else(|| {
                    StevedoreError::config(format!(
                        "environment: entry \"{entry}\" is not of the form NAME=VALUE"
                    ))
                })?;
                check_name(name, entry)?;
                Ok((name.to_string(), EnvValue::Literal(value.to_string())))
            })
            .collect(),
    }
}

fn check_name(name: &str, line: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StevedoreError::config(format!(
            "environment: entry \"{line}\" has an empty variable name"
        )));
    }
    Ok(())
}

/// Reads an env file of `NAME=VALUE` lines.
///
/// Blank lines and lines starting with `#` are skipped. A line holding only
/// a name defers that variable to the ambient environment.
///
/// # Errors
///
/// Returns [`StevedoreError::Io`] if the file cannot be read and
/// [`StevedoreError::Config`] for a line with an empty name.
pub fn parse_env_file(path: &Path) -> Result<EnvironmentMap> {
    tracing::debug!(path = %path.display(), "reading env file");
    let contents = std::fs::read_to_string(path).map_err(|e| StevedoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut vars = EnvironmentMap::new();
    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, value) = match line.split_once('=') {
            Some((name, value)) => (name, EnvValue::Literal(value.to_string())),
            None => (line, EnvValue::Inherit),
        };
        check_name(name, line)?;
        let _ = vars.insert(name.to_string(), value);
    }
    Ok(vars)
}

/// Layers env files in declaration order and inline entries on top.
///
/// # Errors
///
/// Propagates the first file or entry error.
pub fn merge_environment(
    env_files: &[PathBuf],
    inline: Option<&RawEnvironment>,
) -> Result<EnvironmentMap> {
    let mut merged = EnvironmentMap::new();
    for path in env_files {
        merged.extend(parse_env_file(path)?);
    }
    merged.extend(parse_environment(inline)?);
    Ok(merged)
}

/// Replaces every [`EnvValue::Inherit`] with its ambient value or `""`.
pub fn resolve_environment(
    vars: &EnvironmentMap,
    env: &dyn EnvLookup,
) -> BTreeMap<String, String> {
    vars.iter()
        .map(|(name, value)| {
            let resolved = match value {
                EnvValue::Literal(v) => v.clone(),
                EnvValue::Inherit => env.var(name).unwrap_or_default(),
            };
            (name.clone(), resolved)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn list(entries: &[&str]) -> RawEnvironment {
        RawEnvironment::List(entries.iter().map(|e| (*e).to_string()).collect())
    }

    fn literal(v: &str) -> EnvValue {
        EnvValue::Literal(v.into())
    }

    fn env_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn parse_environment_as_list() {
        let parsed =
            parse_environment(Some(&list(&["NORMAL=F1", "CONTAINS_EQUALS=F=2", "TRAILING_EQUALS="])))
                .unwrap();
        assert_eq!(parsed["NORMAL"], literal("F1"));
        assert_eq!(parsed["CONTAINS_EQUALS"], literal("F=2"));
        assert_eq!(parsed["TRAILING_EQUALS"], literal(""));
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn parse_environment_as_map() {
        let mut map = BTreeMap::new();
        let _ = map.insert("NORMAL".to_string(), Some("F1".to_string()));
        let _ = map.insert("CONTAINS_EQUALS".to_string(), Some("F=2".to_string()));
        let _ = map.insert("TRAILING_EQUALS".to_string(), None);

        let parsed = parse_environment(Some(&RawEnvironment::Map(map))).unwrap();
        assert_eq!(parsed["NORMAL"], literal("F1"));
        assert_eq!(parsed["CONTAINS_EQUALS"], literal("F=2"));
        assert_eq!(parsed["TRAILING_EQUALS"], EnvValue::Inherit);
    }

    #[test]
    fn parse_environment_invalid() {
        let err = parse_environment(Some(&list(&["GOOD=1", "a"]))).unwrap_err();
        assert!(matches!(err, StevedoreError::Config { .. }));
        assert!(err.to_string().contains("\"a\""), "got: {err}");
    }

    #[test]
    fn parse_environment_rejects_empty_name() {
        assert!(parse_environment(Some(&list(&["=value"]))).is_err());
    }

    #[test]
    fn parse_environment_empty() {
        assert!(parse_environment(None).unwrap().is_empty());
    }

    #[test]
    fn env_file_skips_comments_and_blank_lines() {
        let file = env_file("# leading comment\n\nONE=2\n  # indented comment\nTWO=1\nBARE\n");
        let parsed = parse_env_file(file.path()).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed["ONE"], literal("2"));
        assert_eq!(parsed["TWO"], literal("1"));
        assert_eq!(parsed["BARE"], EnvValue::Inherit);
    }

    #[test]
    fn missing_env_file_is_io_error() {
        let err = parse_env_file(Path::new("/nonexistent/stevedore.env")).unwrap_err();
        assert!(matches!(err, StevedoreError::Io { .. }));
    }

    #[test]
    fn later_files_override_earlier_and_inline_overrides_all() {
        let first = env_file("FOO=bar\nONE=1\n");
        let second = env_file("FOO=baz\nTWO=2\n");
        let files = vec![first.path().to_path_buf(), second.path().to_path_buf()];

        let merged = merge_environment(&files, Some(&list(&["TWO=inline"]))).unwrap();

        assert_eq!(merged["FOO"], literal("baz"));
        assert_eq!(merged["ONE"], literal("1"));
        assert_eq!(merged["TWO"], literal("inline"));
    }

    #[test]
    fn resolve_environment_consults_ambient_values() {
        let mut ambient = BTreeMap::new();
        let _ = ambient.insert("FILE_DEF".to_string(), "E1".to_string());
        let _ = ambient.insert("FILE_DEF_EMPTY".to_string(), "E2".to_string());
        let _ = ambient.insert("ENV_DEF".to_string(), "E3".to_string());

        let mut vars = EnvironmentMap::new();
        let _ = vars.insert("FILE_DEF".into(), literal("F1"));
        let _ = vars.insert("FILE_DEF_EMPTY".into(), literal(""));
        let _ = vars.insert("ENV_DEF".into(), EnvValue::Inherit);
        let _ = vars.insert("NO_DEF".into(), EnvValue::Inherit);

        let resolved = resolve_environment(&vars, &ambient);
        assert_eq!(resolved["FILE_DEF"], "F1");
        assert_eq!(resolved["FILE_DEF_EMPTY"], "");
        assert_eq!(resolved["ENV_DEF"], "E3");
        assert_eq!(resolved["NO_DEF"], "");
    }
}
