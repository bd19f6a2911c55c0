//! Resolved configurations of path contexts

use crate::tarjan;
use indexmap::{IndexMap, IndexSet};
use modsys_core::{ModuleId, ModuleInfo};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// A set of modules sharing one linkage boundary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathContext {
    name: String,
    #[serde(skip)]
    module_infos: BTreeMap<ModuleId, Arc<ModuleInfo>>,
    local_path: Vec<ModuleId>,
    remote_contexts: BTreeSet<String>,
    re_exported: BTreeSet<String>,
}

impl PathContext {
    pub(crate) fn new(
        name: String,
        module_infos: BTreeMap<ModuleId, Arc<ModuleInfo>>,
        local_path: Vec<ModuleId>,
    ) -> Self {
        Self {
            name,
            module_infos,
            local_path,
            remote_contexts: BTreeSet::new(),
            re_exported: BTreeSet::new(),
        }
    }

    /// `+` followed by the member module names, sorted, joined by `+`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member modules in id order
    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleInfo>> {
        self.module_infos.values()
    }

    pub fn module_ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.module_infos.keys()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.module_infos.contains_key(id)
    }

    pub fn local_path(&self) -> &[ModuleId] {
        &self.local_path
    }

    /// Names of the contexts this context links against
    pub fn remote_contexts(&self) -> &BTreeSet<String> {
        &self.remote_contexts
    }

    /// Names of the contexts this context passes on to its own dependents
    pub fn re_exported(&self) -> &BTreeSet<String> {
        &self.re_exported
    }

    pub(crate) fn extend_remote(&mut self, names: impl IntoIterator<Item = String>) {
        self.remote_contexts.extend(names);
    }

    pub(crate) fn extend_re_exported(&mut self, names: impl IntoIterator<Item = String>) {
        self.re_exported.extend(names);
    }
}

impl fmt::Display for PathContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The outcome of configuring a set of root modules
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    roots: IndexSet<ModuleId>,
    contexts: IndexMap<String, PathContext>,
    context_for_module: IndexMap<String, String>,
}

impl Configuration {
    pub(crate) fn new(
        roots: IndexSet<ModuleId>,
        contexts: IndexMap<String, PathContext>,
        context_for_module: IndexMap<String, String>,
    ) -> Self {
        Self {
            roots,
            contexts,
            context_for_module,
        }
    }

    pub fn roots(&self) -> &IndexSet<ModuleId> {
        &self.roots
    }

    /// Contexts in name order
    pub fn contexts(&self) -> impl Iterator<Item = &PathContext> {
        self.contexts.values()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn context(&self, name: &str) -> Option<&PathContext> {
        self.contexts.get(name)
    }

    /// The context holding the module answering to `name`
    ///
    /// View names and aliases find their module's context.
    pub fn context_for_module_name(&self, name: &str) -> Option<&PathContext> {
        self.context_for_module
            .get(name)
            .and_then(|cx| self.contexts.get(cx))
    }

    /// The selected module answering to `name`
    pub fn module(&self, name: &str) -> Option<&Arc<ModuleInfo>> {
        self.context_for_module_name(name)?
            .modules()
            .find(|m| m.view_ids().any(|id| id.name() == name))
    }

    /// Every selected module, context by context
    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleInfo>> {
        self.contexts.values().flat_map(PathContext::modules)
    }

    fn root_contexts(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for root in &self.roots {
            if let Some(cx) = self.context_for_module_name(root.name()) {
                if !names.contains(&cx.name()) {
                    names.push(cx.name());
                }
            }
        }
        names
    }

    /// Contexts ordered dependents first
    ///
    /// Starts from the root contexts in root order; contexts reached only
    /// through service edges follow in name order.
    pub fn ordered_contexts(&self) -> Vec<&PathContext> {
        let mut starts = self.root_contexts();
        starts.extend(self.contexts.keys().map(String::as_str));
        let order = tarjan::list(starts, |name: &&str| {
            self.contexts
                .get(*name)
                .map(|cx| {
                    cx.remote_contexts()
                        .iter()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        });
        order
            .into_iter()
            .filter_map(|name| self.contexts.get(name))
            .collect()
    }

    /// Contexts ordered dependencies first
    pub fn instantiation_order(&self) -> Vec<&PathContext> {
        let mut order = self.ordered_contexts();
        order.reverse();
        order
    }

    /// Write a human-readable summary
    pub fn dump(&self, out: &mut impl Write) -> io::Result<()> {
        let roots: Vec<String> = self.roots.iter().map(ToString::to_string).collect();
        writeln!(out, "path configuration roots = [{}]", roots.join(", "))?;
        for cx in self.contexts.values() {
            writeln!(out, "  context {}", cx)?;
            for id in cx.module_ids() {
                writeln!(out, "    module {}", id)?;
            }
            if !cx.local_path.is_empty() {
                let local: Vec<String> = cx.local_path.iter().map(ToString::to_string).collect();
                writeln!(out, "    local  [{}]", local.join(", "))?;
            }
            if !cx.remote_contexts.is_empty() {
                let remote: Vec<&str> = cx.remote_contexts.iter().map(String::as_str).collect();
                writeln!(out, "    remote [{}]", remote.join(", "))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buffer = Vec::new();
        self.dump(&mut buffer).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buffer))
    }
}
