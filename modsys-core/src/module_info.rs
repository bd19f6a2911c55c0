//! Per-module metadata: requires, views, exports and services

use crate::dependence::{Dependence, ServiceDependence};
use crate::module_id::ModuleId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One face of a module
///
/// Every module has a default view whose id is the module id. Named views
/// share the module's version and carry their own exports and permits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleView {
    id: ModuleId,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    aliases: BTreeSet<ModuleId>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    exports: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    permits: BTreeSet<String>,
    /// Service interface name to implementation classes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    services: BTreeMap<String, BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    main_class: Option<String>,
}

impl ModuleView {
    pub(crate) fn new(id: ModuleId) -> Self {
        ModuleView {
            id,
            aliases: BTreeSet::new(),
            exports: BTreeSet::new(),
            permits: BTreeSet::new(),
            services: BTreeMap::new(),
            main_class: None,
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Alias ids this view also answers to
    pub fn aliases(&self) -> &BTreeSet<ModuleId> {
        &self.aliases
    }

    /// Exported package names
    pub fn exports(&self) -> &BTreeSet<String> {
        &self.exports
    }

    /// Names of modules permitted to require this view
    pub fn permits(&self) -> &BTreeSet<String> {
        &self.permits
    }

    pub fn services(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.services
    }

    pub fn main_class(&self) -> Option<&str> {
        self.main_class.as_deref()
    }

    pub fn provides_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    /// Whether `id` names this view, directly or through an alias
    pub fn answers_to(&self, id: &ModuleId) -> bool {
        &self.id == id || self.aliases.contains(id)
    }

    pub(crate) fn add_alias(&mut self, id: ModuleId) -> bool {
        self.aliases.insert(id)
    }

    pub(crate) fn add_export(&mut self, package: String) -> bool {
        self.exports.insert(package)
    }

    pub(crate) fn add_permit(&mut self, name: String) -> bool {
        self.permits.insert(name)
    }

    pub(crate) fn add_service(&mut self, service: String, implementation: String) -> bool {
        self.services.entry(service).or_default().insert(implementation)
    }

    pub(crate) fn set_main_class(&mut self, class: String) -> bool {
        if self.main_class.is_some() {
            return false;
        }
        self.main_class = Some(class);
        true
    }
}

/// Immutable metadata for one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    id: ModuleId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    requires: Vec<Dependence>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    requires_services: Vec<ServiceDependence>,
    default_view: ModuleView,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    views: Vec<ModuleView>,
    /// Packages defined by the module, exported or not
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    packages: BTreeSet<String>,
    #[serde(default)]
    visible_to_all: bool,
}

impl ModuleInfo {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: ModuleId,
        requires: Vec<Dependence>,
        requires_services: Vec<ServiceDependence>,
        default_view: ModuleView,
        views: Vec<ModuleView>,
        packages: BTreeSet<String>,
        visible_to_all: bool,
    ) -> Self {
        ModuleInfo {
            id,
            requires,
            requires_services,
            default_view,
            views,
            packages,
            visible_to_all,
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn requires(&self) -> &[Dependence] {
        &self.requires
    }

    pub fn requires_services(&self) -> &[ServiceDependence] {
        &self.requires_services
    }

    pub fn default_view(&self) -> &ModuleView {
        &self.default_view
    }

    /// Default view first, then named views in declaration order
    pub fn views(&self) -> impl Iterator<Item = &ModuleView> {
        std::iter::once(&self.default_view).chain(self.views.iter())
    }

    /// Look up a named view by name
    pub fn view(&self, name: &str) -> Option<&ModuleView> {
        self.views().find(|v| v.id.name() == name)
    }

    /// Every id this module answers to: view ids and their aliases
    pub fn view_ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.views()
            .flat_map(|v| std::iter::once(&v.id).chain(v.aliases.iter()))
    }

    /// The view that supplies `id`, falling back to the default view
    pub fn view_for(&self, id: &ModuleId) -> &ModuleView {
        self.views()
            .find(|v| v.answers_to(id))
            .unwrap_or(&self.default_view)
    }

    /// Aliases declared by the default view
    pub fn provides(&self) -> &BTreeSet<ModuleId> {
        &self.default_view.aliases
    }

    pub fn permits(&self) -> &BTreeSet<String> {
        &self.default_view.permits
    }

    pub fn exports(&self) -> &BTreeSet<String> {
        &self.default_view.exports
    }

    pub fn main_class(&self) -> Option<&str> {
        self.default_view.main_class()
    }

    pub fn services(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.default_view.services
    }

    /// Whether any view provides the given service
    pub fn provides_service(&self, service: &str) -> bool {
        self.views().any(|v| v.provides_service(service))
    }

    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    /// Defined packages plus every package exported by a view
    pub fn owned_packages(&self) -> BTreeSet<&str> {
        self.packages
            .iter()
            .chain(self.views().flat_map(|v| v.exports.iter()))
            .map(String::as_str)
            .collect()
    }

    /// Classes in this module are accessible from anywhere
    pub fn visible_to_all(&self) -> bool {
        self.visible_to_all
    }

    /// The default view carries the module id
    pub fn is_well_formed(&self) -> bool {
        self.default_view.id == self.id
            && self.views.iter().all(|v| v.id.version() == self.id.version())
    }
}
