//! Ambient environment lookup and shell-style expansion.
//!
//! Nothing in this crate reads `std::env` directly. Every function that
//! needs a variable or the home directory takes an [`EnvLookup`], so
//! resolution is deterministic under test.

use std::collections::BTreeMap;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till1, take_while1},
    character::complete::char,
    combinator::map,
    multi::many0,
    sequence::{delimited, preceded},
};

/// Read access to an environment of named variables.
pub trait EnvLookup: Send + Sync {
    /// Returns the value of `name`, if defined.
    fn var(&self, name: &str) -> Option<String>;

    /// Returns the home directory used for `~` expansion.
    fn home_dir(&self) -> Option<String> {
        self.var("HOME")
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn home_dir(&self) -> Option<String> {
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
    }
}

impl EnvLookup for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// One lexical piece of a string being interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Variable(&'a str),
}

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `${NAME}`
fn braced(input: &str) -> IResult<&str, Segment<'_>> {
    map(
        delimited(tag("${"), take_till1(|c| c == '}'), char('}')),
        Segment::Variable,
    )
    .parse(input)
}

/// `$NAME`
fn bare(input: &str) -> IResult<&str, Segment<'_>> {
    map(preceded(char('$'), take_while1(is_name_char)), Segment::Variable).parse(input)
}

/// Any run of text up to the next `$`, or a `$` that starts no variable.
fn text(input: &str) -> IResult<&str, Segment<'_>> {
    alt((
        map(take_till1(|c| c == '$'), Segment::Text),
        map(tag("$"), Segment::Text),
    ))
    .parse(input)
}

fn segments(input: &str) -> IResult<&str, Vec<Segment<'_>>> {
    many0(alt((braced, bare, text))).parse(input)
}

/// Expands `$NAME` and `${NAME}` references against `env`.
///
/// References to undefined variables are left in place verbatim.
pub fn interpolate(input: &str, env: &dyn EnvLookup) -> String {
    let Ok((rest, parts)) = segments(input) else {
        return input.to_string();
    };

    let mut out = String::with_capacity(input.len());
    let mut offset = 0;
    for part in parts {
        match part {
            Segment::Text(t) => {
                out.push_str(t);
                offset += t.len();
            }
            Segment::Variable(name) => {
                let raw_len = reference_len(&input[offset..], name);
                match env.var(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&input[offset..offset + raw_len]),
                }
                offset += raw_len;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Length of the `$NAME` or `${NAME}` reference at the start of `input`.
fn reference_len(input: &str, name: &str) -> usize {
    if input.starts_with("${") {
        name.len() + 3
    } else {
        name.len() + 1
    }
}

/// Replaces a leading `~` or `~/` with the home directory from `env`.
///
/// `~user` forms are not expanded. If no home directory is known the path
/// is returned unchanged.
pub fn expand_home(path: &str, env: &dyn EnvLookup) -> String {
    let Some(rest) = path.strip_prefix('~') else {
        return path.to_string();
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        return path.to_string();
    }
    env.home_dir()
        .map_or_else(|| path.to_string(), |home| format!("{home}{rest}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn interpolates_braced_variable() {
        let vars = env(&[("USE_TAG", "12345")]);
        assert_eq!(interpolate("something:${USE_TAG}", &vars), "something:12345");
    }

    #[test]
    fn interpolates_bare_variable() {
        let vars = env(&[("VOLUME_PATH", "/opt")]);
        assert_eq!(interpolate("$VOLUME_PATH/data", &vars), "/opt/data");
    }

    #[test]
    fn leaves_undefined_variables_untouched() {
        let vars = env(&[]);
        assert_eq!(interpolate("${MISSING}:$ALSO_MISSING", &vars), "${MISSING}:$ALSO_MISSING");
    }

    #[test]
    fn keeps_lone_and_unterminated_dollars() {
        let vars = env(&[("A", "x")]);
        assert_eq!(interpolate("cost: 5$", &vars), "cost: 5$");
        assert_eq!(interpolate("${A", &vars), "${A");
        assert_eq!(interpolate("$-$A", &vars), "$-x");
    }

    #[test]
    fn interpolates_adjacent_references() {
        let vars = env(&[("A", "1"), ("B", "2")]);
        assert_eq!(interpolate("${A}${B}$A", &vars), "121");
    }

    #[test]
    fn expands_home_directory() {
        let vars = env(&[("HOME", "/home/user")]);
        assert_eq!(expand_home("~", &vars), "/home/user");
        assert_eq!(expand_home("~/data", &vars), "/home/user/data");
        assert_eq!(expand_home("~other/data", &vars), "~other/data");
        assert_eq!(expand_home("/abs/~", &vars), "/abs/~");
    }

    #[test]
    fn home_expansion_without_home_is_identity() {
        let vars = env(&[]);
        assert_eq!(expand_home("~/data", &vars), "~/data");
    }
}
