//! Module model error types

use thiserror::Error;

/// Type alias for module model results
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors raised while building module identities and metadata
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// Malformed identity, query or version text
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A module declaration failed directive validation
    #[error(transparent)]
    Directive(#[from] DirectiveError),
}

/// What kind of text failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseKind {
    ModuleName,
    ModuleId,
    ModuleIdQuery,
    Version,
    VersionQuery,
}

impl std::fmt::Display for ParseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParseKind::ModuleName => "module name",
            ParseKind::ModuleId => "module id",
            ParseKind::ModuleIdQuery => "module-id query",
            ParseKind::Version => "version",
            ParseKind::VersionQuery => "version query",
        };
        f.write_str(s)
    }
}

/// Malformed text, with the offending substring
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {kind} {input:?}: {reason} at {offending:?}")]
pub struct ParseError {
    /// Kind of value being parsed
    pub kind: ParseKind,
    /// The complete input text
    pub input: String,
    /// The part of the input that could not be accepted
    pub offending: String,
    /// Human readable reason
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(
        kind: ParseKind,
        input: &str,
        offending: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            input: input.to_string(),
            offending: offending.to_string(),
            reason: reason.into(),
        }
    }
}

/// Directive kinds that may be declared at most once per target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Requires,
    RequiresService,
    Permits,
    Exports,
    Provides,
    ProvidesService,
    Entrypoint,
    View,
}

impl DirectiveKind {
    /// Diagnostic key in the `dupl.*` family
    pub fn diagnostic_key(&self) -> &'static str {
        match self {
            DirectiveKind::Requires => "dupl.requires",
            DirectiveKind::RequiresService => "dupl.requires.service",
            DirectiveKind::Permits => "dupl.permits",
            DirectiveKind::Exports => "dupl.exports",
            DirectiveKind::Provides => "dupl.provides",
            DirectiveKind::ProvidesService => "dupl.provides.service",
            DirectiveKind::Entrypoint => "dupl.entrypoint",
            DirectiveKind::View => "dupl.view",
        }
    }
}

/// Structural problems in a module's directive list
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    /// The same directive target appears twice
    #[error("{module}: {} {target}", kind.diagnostic_key())]
    Duplicate {
        /// Module whose declaration is invalid
        module: String,
        /// Kind of the repeated directive
        kind: DirectiveKind,
        /// The repeated target
        target: String,
    },

    /// A view declared inside another view
    #[error("{module}: nested view {view} not allowed")]
    NestedView {
        /// Module whose declaration is invalid
        module: String,
        /// Name of the nested view
        view: String,
    },

    /// A module-level directive placed inside a view
    #[error("{module}: {directive} not allowed in view {view}")]
    Misplaced {
        /// Module whose declaration is invalid
        module: String,
        /// Name of the view
        view: String,
        /// Rendered directive
        directive: String,
    },
}
