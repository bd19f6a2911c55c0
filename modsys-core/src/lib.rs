//! Core module model for the modsys module system
//!
//! This crate holds the value types the resolver works on:
//! - Module identities and module-id queries
//! - Versions and version queries
//! - Dependences and their modifiers
//! - Module views and module metadata
//! - Module declarations as directive lists, validated into metadata

pub mod dependence;
pub mod directive;
pub mod error;
pub mod module_id;
pub mod module_info;
pub mod version;

pub use dependence::{Dependence, Modifier, ServiceDependence};
pub use directive::{Directive, ModuleDeclaration};
pub use error::{DirectiveError, DirectiveKind, ModuleError, ParseError, ParseKind, Result};
pub use module_id::{check_module_name, ModuleId, ModuleIdQuery};
pub use module_info::{ModuleInfo, ModuleView};
pub use version::{Clause, Relation, Version, VersionQuery};
