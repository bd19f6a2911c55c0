//! Module versions and version queries

use crate::error::{ParseError, ParseKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Token {
    Num(u64),
    Alpha(String),
}

type Component = Vec<Token>;

/// A module version such as `1.0`, `2.1.3-4` or `1.0r3`
///
/// Components are compared token by token, numbers numerically and letters
/// lexically. Trailing zero components are ignored, so `1`, `1.0` and
/// `1.0.0.0` are the same version. A version without a release part sorts
/// before the same version with one.
#[derive(Debug, Clone)]
pub struct Version {
    text: String,
    main: Vec<Component>,
    release: Option<Vec<Component>>,
}

impl Version {
    /// Parse a version string
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let text = s.trim();
        let err = |offending: &str, reason: &str| {
            ParseError::new(ParseKind::Version, s, offending, reason)
        };

        match text.chars().next() {
            None => return Err(err(s, "empty version")),
            Some(c) if !c.is_ascii_digit() => {
                return Err(err(text, "version must start with a digit"))
            }
            Some(_) => {}
        }

        let (main_text, release_text) = match text.split_once('-') {
            Some((main, release)) => (main, Some(release)),
            None => (text, None),
        };

        let main = parse_components(main_text).map_err(|bad| err(bad, "malformed component"))?;
        let release = match release_text {
            Some("") => return Err(err(text, "missing release after '-'")),
            Some(r) => Some(parse_components(r).map_err(|bad| err(bad, "malformed release"))?),
            None => None,
        };

        Ok(Version {
            text: text.to_string(),
            main: normalize(main),
            release: release.map(normalize),
        })
    }

    /// Whether this version carries a release part
    pub fn has_release(&self) -> bool {
        self.release.is_some()
    }

    /// The version text as written
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// A query matching exactly this version
    pub fn to_query(&self) -> VersionQuery {
        VersionQuery::exactly(self.clone())
    }

    /// One spelling shared by every equal version, e.g. `1` for `1.0.0`
    pub fn canonical(&self) -> String {
        let main = render_components(&self.main);
        match &self.release {
            Some(release) => format!("{}-{}", main, render_components(release)),
            None => main,
        }
    }
}

fn render_components(components: &[Component]) -> String {
    if components.is_empty() {
        return "0".to_string();
    }
    let rendered: Vec<String> = components
        .iter()
        .map(|tokens| {
            tokens
                .iter()
                .map(|token| match token {
                    Token::Num(n) => n.to_string(),
                    Token::Alpha(a) => a.clone(),
                })
                .collect()
        })
        .collect();
    rendered.join(".")
}

fn parse_components(s: &str) -> Result<Vec<Component>, &str> {
    s.split('.').map(parse_component).collect()
}

fn parse_component(s: &str) -> Result<Component, &str> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(s);
    }
    let mut tokens = Vec::new();
    let mut rest = s;
    while let Some(first) = rest.chars().next() {
        let numeric = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != numeric)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        if numeric {
            tokens.push(Token::Num(run.parse().map_err(|_| s)?));
        } else {
            tokens.push(Token::Alpha(run.to_string()));
        }
        rest = tail;
    }
    Ok(tokens)
}

fn normalize(mut components: Vec<Component>) -> Vec<Component> {
    while matches!(components.last().map(Vec::as_slice), Some([Token::Num(0)])) {
        components.pop();
    }
    components
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.main == other.main && self.release == other.release
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.main.hash(state);
        self.release.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.main
            .cmp(&other.main)
            .then_with(|| self.release.cmp(&other.release))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

/// Relation between a queried version and a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl Relation {
    /// Split a leading relation off a clause. Absent means `=`.
    fn split(s: &str) -> (Relation, &str) {
        if let Some(rest) = s.strip_prefix("<=") {
            (Relation::Le, rest)
        } else if let Some(rest) = s.strip_prefix(">=") {
            (Relation::Ge, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Relation::Lt, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (Relation::Gt, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (Relation::Eq, rest)
        } else {
            (Relation::Eq, s)
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Relation::Lt => ordering == Ordering::Less,
            Relation::Le => ordering != Ordering::Greater,
            Relation::Eq => ordering == Ordering::Equal,
            Relation::Ge => ordering != Ordering::Less,
            Relation::Gt => ordering == Ordering::Greater,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Lt => "<",
            Relation::Le => "<=",
            Relation::Eq => "=",
            Relation::Ge => ">=",
            Relation::Gt => ">",
        })
    }
}

/// A single `relation version` clause
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    pub relation: Relation,
    pub version: Version,
}

impl Clause {
    pub fn matches(&self, version: &Version) -> bool {
        self.relation.holds(version.cmp(&self.version))
    }
}

/// A version query: one or more clauses that must all match
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionQuery {
    clauses: Vec<Clause>,
}

impl VersionQuery {
    /// Parse a version query such as `>=1.2`, `>=1,<2` or `1.0 - 2.0`
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let normalized = normalize_version_query(s);
        let err = |offending: &str, reason: &str| {
            ParseError::new(ParseKind::VersionQuery, s, offending, reason)
        };

        if normalized.is_empty() {
            return Err(err(s, "empty version query"));
        }

        let mut clauses = Vec::new();
        for part in normalized.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(err(&normalized, "empty clause"));
            }
            let (relation, rest) = Relation::split(part);
            let rest = rest.trim();
            if rest.is_empty() {
                return Err(err(part, "incomplete version query"));
            }
            let version = Version::parse(rest).map_err(|e| err(&e.offending, &e.reason))?;
            clauses.push(Clause { relation, version });
        }

        Ok(VersionQuery { clauses })
    }

    /// A query matching exactly one version
    pub fn exactly(version: Version) -> Self {
        VersionQuery {
            clauses: vec![Clause {
                relation: Relation::Eq,
                version,
            }],
        }
    }

    /// Check whether a version satisfies every clause
    pub fn matches(&self, version: &Version) -> bool {
        self.clauses.iter().all(|c| c.matches(version))
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

/// Rewrite the `A - B` range form as `>=A,<=B`
fn normalize_version_query(s: &str) -> String {
    let trimmed = s.trim();
    if let Some((low, high)) = trimmed.split_once(" - ") {
        return format!(">={},<={}", low.trim(), high.trim());
    }
    trimmed.to_string()
}

impl fmt::Display for VersionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}{}", clause.relation, clause.version)?;
        }
        Ok(())
    }
}

impl FromStr for VersionQuery {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionQuery::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.text.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for VersionQuery {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VersionQuery {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        VersionQuery::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn q(s: &str) -> VersionQuery {
        VersionQuery::parse(s).unwrap()
    }

    #[test]
    fn test_parse_valid_versions() {
        for s in ["1.0", "1.0.1", "1", "1-1", "1.1-1", "1.0r3", "12.4.0b2"] {
            assert!(Version::parse(s).is_ok(), "{s} should parse");
        }
    }

    #[test]
    fn test_parse_invalid_versions() {
        for s in ["a.b.c", "1.0-", "-1", "foo", "", "1..2", "1.0.", "1.0-a..b"] {
            assert!(Version::parse(s).is_err(), "{s:?} should not parse");
        }
    }

    #[test]
    fn test_parse_error_reports_offending_text() {
        let err = Version::parse("1..2").unwrap_err();
        assert_eq!(err.kind, ParseKind::Version);
        assert_eq!(err.input, "1..2");
        assert_eq!(err.offending, "");

        let err = Version::parse("foo").unwrap_err();
        assert_eq!(err.offending, "foo");
    }

    #[test]
    fn test_version_ordering() {
        assert!(v("1.0") > v("0.9"));
        assert!(v("1.0.1") > v("1.0"));
        assert!(v("1b") > v("1a"));
        assert!(v("1.10") > v("1.1"));
        assert!(v("1.0.0.0.1") > v("1"));
        assert!(v("1a") > v("1"));
        assert!(v("1.0-1") > v("1.0"));
        assert!(v("1.0-2") > v("1.0-1"));
        assert!(v("2") > v("1.9-9"));
    }

    #[test]
    fn test_trailing_zeros_are_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1.0.0"), v("1.0.0.0"));
        assert_eq!(v("1"), v("1.0"));
        assert_ne!(v("1"), v("1.0.0.0.1"));
        assert_eq!(v("1.0").to_string(), "1.0");
    }

    #[test]
    fn test_canonical_spelling() {
        assert_eq!(v("1.0.0").canonical(), "1");
        assert_eq!(v("1.02.0r3").canonical(), "1.2.0r3");
        assert_eq!(v("0.0").canonical(), "0");
        assert_eq!(v("2.1-0.0").canonical(), "2.1-0");
        assert_eq!(v("2.1-1.0").canonical(), v("2.1.0-1").canonical());
        assert_ne!(v("1").canonical(), v("1-0").canonical());
    }

    #[test]
    fn test_query_parse() {
        for s in [">1.2", ">=1.2", "<1.2", "<=1.2", "=1.2", "1.2", ">=1,<2", "1.0 - 2.0"] {
            assert!(VersionQuery::parse(s).is_ok(), "{s} should parse");
        }
        for s in [">", "<", ">=", "<=", "=", "", ">=1,", ",1"] {
            assert!(VersionQuery::parse(s).is_err(), "{s:?} should not parse");
        }
    }

    #[test]
    fn test_query_matching() {
        assert!(q(">1.2").matches(&v("1.3")));
        assert!(q(">1.2").matches(&v("2")));
        assert!(!q(">1.2").matches(&v("1.2")));
        assert!(!q(">1.2").matches(&v("1.1")));

        assert!(q("<1.2").matches(&v("1.0")));
        assert!(!q("<1.2").matches(&v("1.4")));

        assert!(q("<=1.2").matches(&v("1.2")));
        assert!(!q("<=1.2").matches(&v("1.3")));

        assert!(!q(">=1.2").matches(&v("1")));
        assert!(q(">=1.2").matches(&v("1.3")));

        assert!(q("1.2").matches(&v("1.2.0.0.0.0")));
        assert!(!q("1.2").matches(&v("1.2.0.0.1")));
    }

    #[test]
    fn test_query_clauses_and_ranges() {
        let range = q("1.0 - 2.0");
        assert_eq!(range, q(">=1.0,<=2.0"));
        assert!(range.matches(&v("1.5")));
        assert!(range.matches(&v("2")));
        assert!(!range.matches(&v("2.0.1")));

        let window = q(">=1, <2");
        assert!(window.matches(&v("1.9")));
        assert!(!window.matches(&v("2.0")));
    }

    #[test]
    fn test_query_display_prefixes_relation() {
        assert_eq!(q("1.2").to_string(), "=1.2");
        assert_eq!(q(">= 3").to_string(), ">=3");
        assert_eq!(q(">=1,<2").to_string(), ">=1,<2");
        assert_eq!(v("4").to_query().to_string(), "=4");
    }

    #[test]
    fn test_serde_uses_text_form() {
        let json = serde_json::to_string(&q(">=1.0")).unwrap();
        assert_eq!(json, "\">=1.0\"");
        let back: VersionQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q(">=1.0"));
        assert!(serde_json::from_str::<Version>("\"x.y\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_trailing_zeros_never_change_identity(
            parts in prop::collection::vec(0u32..50, 1..5),
            zeros in 0usize..4,
        ) {
            let base = parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(".");
            let padded = format!("{}{}", base, ".0".repeat(zeros));
            prop_assert_eq!(v(&base), v(&padded));
            prop_assert_eq!(v(&base).cmp(&v(&padded)), Ordering::Equal);
            prop_assert_eq!(v(&base).canonical(), v(&padded).canonical());
        }

        #[test]
        fn prop_ordering_matches_numeric_tuples(a in 0u32..100, b in 0u32..100) {
            let va = v(&format!("1.{a}"));
            let vb = v(&format!("1.{b}"));
            prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
        }
    }
}
