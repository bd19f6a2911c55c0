//! Module identities and module-id queries

use crate::error::{ParseError, ParseKind};
use crate::version::{Version, VersionQuery};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Check that a module name is identifier-like
///
/// The first character must be alphabetic, `_` or `$`; the rest may also
/// contain digits and `.`.
pub fn check_module_name(name: &str) -> Result<&str, ParseError> {
    let err = |reason: &str| ParseError::new(ParseKind::ModuleName, name, name, reason);
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(err("empty module name")),
        Some(c) if !(c.is_alphabetic() || c == '_' || c == '$') => {
            return Err(err("illegal first character"))
        }
        Some(_) => {}
    }
    if let Some(pos) = name
        .char_indices()
        .skip(1)
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_' || c == '$' || c == '.'))
        .map(|(i, _)| i)
    {
        return Err(ParseError::new(
            ParseKind::ModuleName,
            name,
            &name[pos..],
            "illegal character",
        ));
    }
    Ok(name)
}

/// Split `name [@ rest]` text, tolerating spaces around the `@`
fn split_at_sign(s: &str, kind: ParseKind) -> Result<(&str, Option<&str>), ParseError> {
    let text = s.trim();
    let end = text.find(|c: char| c == ' ' || c == '@').unwrap_or(text.len());
    let (name, rest) = text.split_at(end);
    if name.is_empty() {
        return Err(ParseError::new(kind, s, text, "missing module name"));
    }
    let rest = rest.trim_start();
    if rest.is_empty() {
        return Ok((name, None));
    }
    let Some(tail) = rest.strip_prefix('@') else {
        return Err(ParseError::new(kind, s, rest, "expected '@'"));
    };
    let tail = tail.trim_start();
    if tail.is_empty() {
        return Err(ParseError::new(kind, s, rest, "missing version after '@'"));
    }
    Ok((name, Some(tail)))
}

/// A module identity: name plus optional version
///
/// Ordered by name, then by version; an absent version sorts before any
/// present version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId {
    name: String,
    version: Option<Version>,
}

impl ModuleId {
    /// Create a module id, checking the name
    pub fn new(name: impl Into<String>, version: Option<Version>) -> Result<Self, ParseError> {
        let name = name.into();
        check_module_name(&name)?;
        Ok(ModuleId { name, version })
    }

    /// Parse `name[@version]`
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let (name, version) = split_at_sign(s, ParseKind::ModuleId)?;
        check_module_name(name)?;
        let version = version.map(Version::parse).transpose()?;
        Ok(ModuleId {
            name: name.to_string(),
            version,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// A query matching exactly this id
    pub fn to_query(&self) -> ModuleIdQuery {
        ModuleIdQuery {
            name: self.name.clone(),
            version_query: self.version.as_ref().map(Version::to_query),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for ModuleId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleId::parse(s)
    }
}

/// A module query: name plus optional version query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleIdQuery {
    name: String,
    version_query: Option<VersionQuery>,
}

impl ModuleIdQuery {
    pub fn new(
        name: impl Into<String>,
        version_query: Option<VersionQuery>,
    ) -> Result<Self, ParseError> {
        let name = name.into();
        check_module_name(&name)?;
        Ok(ModuleIdQuery {
            name,
            version_query,
        })
    }

    /// Parse `name[@version-query]`
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let (name, query) = split_at_sign(s, ParseKind::ModuleIdQuery)?;
        check_module_name(name)?;
        let version_query = query.map(VersionQuery::parse).transpose()?;
        Ok(ModuleIdQuery {
            name: name.to_string(),
            version_query,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version_query(&self) -> Option<&VersionQuery> {
        self.version_query.as_ref()
    }

    /// Names equal, and the id's version satisfies the query if there is one
    pub fn matches(&self, id: &ModuleId) -> bool {
        if self.name != id.name {
            return false;
        }
        match (&self.version_query, &id.version) {
            (None, _) => true,
            (Some(vq), Some(v)) => vq.matches(v),
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for ModuleIdQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_query {
            Some(vq) => write!(f, "{}@{}", self.name, vq),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for ModuleIdQuery {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleIdQuery::parse(s)
    }
}

impl Serialize for ModuleId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ModuleId::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for ModuleIdQuery {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ModuleIdQuery {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ModuleIdQuery::parse(&s).map_err(serde::de::Error::custom)
    }
}
