//! Class accessibility across modules
//!
//! A module sees its own exports plus, for each module it requires, the
//! exports of the supplying view and of everything that view's module
//! re-exports through public dependences. Plain dependences stop the chain.
//! Modules sharing a context see each other's packages without restriction.

use crate::configuration::Configuration;
use modsys_core::{ModuleId, ModuleInfo, ModuleView};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::trace;

/// Answers accessibility questions for one configuration
pub struct AccessChecker {
    /// Module name to module
    modules: FxHashMap<String, Arc<ModuleInfo>>,
    /// View and alias name to the module and the id it answers to
    views: FxHashMap<String, (Arc<ModuleInfo>, ModuleId)>,
    /// Package to the module that owns it
    owners: FxHashMap<String, Arc<ModuleInfo>>,
    /// Module name to the name of its context
    contexts: FxHashMap<String, String>,
    /// Visible packages per origin module name
    visible: RwLock<FxHashMap<String, Arc<FxHashSet<String>>>>,
}

impl AccessChecker {
    pub fn new(configuration: &Configuration) -> Self {
        let mut modules = FxHashMap::default();
        let mut views = FxHashMap::default();
        let mut owners = FxHashMap::default();
        for info in configuration.modules() {
            modules.insert(info.id().name().to_string(), Arc::clone(info));
            for id in info.view_ids() {
                views.insert(id.name().to_string(), (Arc::clone(info), id.clone()));
            }
            for package in info.owned_packages() {
                owners
                    .entry(package.to_string())
                    .or_insert_with(|| Arc::clone(info));
            }
        }
        let mut contexts = FxHashMap::default();
        for cx in configuration.contexts() {
            for info in cx.modules() {
                contexts.insert(info.id().name().to_string(), cx.name().to_string());
            }
        }
        Self {
            modules,
            views,
            owners,
            contexts,
            visible: RwLock::new(FxHashMap::default()),
        }
    }

    fn view(&self, name: &str) -> Option<(&ModuleInfo, &ModuleView)> {
        self.views
            .get(name)
            .map(|(info, id)| (info.as_ref(), info.view_for(id)))
    }

    /// Exports of `view` plus the re-exports reachable from its module
    fn closure(&self, view: &ModuleView, module: &ModuleInfo, into: &mut FxHashSet<String>) {
        let mut seen: FxHashSet<ModuleId> = FxHashSet::default();
        let mut work: Vec<(&ModuleInfo, &ModuleView)> = vec![(module, view)];
        while let Some((module, view)) = work.pop() {
            if !seen.insert(view.id().clone()) {
                continue;
            }
            into.extend(view.exports().iter().cloned());
            for dependence in module.requires().iter().filter(|d| d.is_public()) {
                if let Some(next) = self.view(dependence.query().name()) {
                    work.push(next);
                }
            }
        }
    }

    fn compute_visible(&self, from: &ModuleInfo) -> FxHashSet<String> {
        let mut visible: FxHashSet<String> = from.exports().iter().cloned().collect();
        for dependence in from.requires() {
            if let Some((module, view)) = self.view(dependence.query().name()) {
                self.closure(view, module, &mut visible);
            }
        }
        trace!("{} sees {} package(s)", from.id(), visible.len());
        visible
    }

    /// Packages visible to the named module, computed once per module
    pub fn visible_packages(&self, from: &str) -> Option<Arc<FxHashSet<String>>> {
        if let Some(cached) = self.visible.read().get(from) {
            return Some(Arc::clone(cached));
        }
        let module = self.modules.get(from)?;
        let computed = Arc::new(self.compute_visible(module));
        let mut cache = self.visible.write();
        let entry = cache
            .entry(from.to_string())
            .or_insert_with(|| Arc::clone(&computed));
        Some(Arc::clone(entry))
    }

    pub fn is_package_visible(&self, from: &str, package: &str) -> bool {
        self.visible_packages(from)
            .map_or(false, |visible| visible.contains(package))
    }

    /// The module owning a package
    pub fn owner(&self, package: &str) -> Option<&ModuleId> {
        self.owners.get(package).map(|info| info.id())
    }

    /// Whether both named modules were placed in the same context
    pub fn same_context(&self, a: &str, b: &str) -> bool {
        match (self.contexts.get(a), self.contexts.get(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Whether `class_name` may be used from the module named `from`
    pub fn is_accessible_to(&self, class_name: &str, from: &str) -> bool {
        let package = class_name
            .rsplit_once('.')
            .map_or("", |(package, _)| package);
        let Some(owner) = self.owners.get(package) else {
            return false;
        };
        if owner.id().name() == from || owner.visible_to_all() {
            return true;
        }
        if self.same_context(owner.id().name(), from) {
            return true;
        }
        self.is_package_visible(from, package)
    }
}
