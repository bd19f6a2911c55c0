//! Partitioning resolved modules into path contexts

use crate::configuration::PathContext;
use crate::error::{Conflict, ResolutionError, Result};
use crate::resolver::Resolution;
use crate::tarjan::Components;
use indexmap::IndexMap;
use modsys_core::{ModuleId, ModuleInfo};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Contexts and the module-name lookup built from a resolution
#[derive(Debug, Default)]
pub(crate) struct Contexts {
    pub contexts: IndexMap<String, PathContext>,
    /// Every module, view and alias name to its context name
    pub context_for_name: IndexMap<String, String>,
}

/// Group modules joined by local dependences, then merge cyclic groups
pub(crate) struct ContextBuilder<'r> {
    resolution: &'r Resolution,
    /// Selected modules in id order
    modules: Vec<&'r Arc<ModuleInfo>>,
}

impl<'r> ContextBuilder<'r> {
    pub fn new(resolution: &'r Resolution) -> Self {
        let mut modules: Vec<&Arc<ModuleInfo>> = resolution.modules().collect();
        modules.sort_by(|a, b| a.id().cmp(b.id()));
        Self {
            resolution,
            modules,
        }
    }

    /// Suppliers of `info` that were resolved, keeping the edge's locality
    fn suppliers(&self, info: &ModuleInfo) -> Vec<(ModuleId, bool)> {
        info.requires()
            .iter()
            .filter_map(|dependence| {
                self.resolution
                    .supplier(info.id(), dependence)
                    .filter(|s| s.module.id() != info.id())
                    .map(|s| (s.module.id().clone(), dependence.is_local()))
            })
            .collect()
    }

    /// Locally-connected groups, each a sorted list of module ids
    fn local_groups(&self) -> (Vec<Vec<ModuleId>>, FxHashMap<ModuleId, usize>) {
        let mut adjacent: FxHashMap<&ModuleId, Vec<ModuleId>> = FxHashMap::default();
        for info in &self.modules {
            for (target, local) in self.suppliers(info) {
                if !local {
                    continue;
                }
                adjacent.entry(info.id()).or_default().push(target.clone());
                if let Some(target_info) = self.resolution.module(&target) {
                    adjacent
                        .entry(target_info.id())
                        .or_default()
                        .push(info.id().clone());
                }
            }
        }

        let mut group_of: FxHashMap<ModuleId, usize> = FxHashMap::default();
        let mut groups: Vec<Vec<ModuleId>> = Vec::new();
        for info in &self.modules {
            if group_of.contains_key(info.id()) {
                continue;
            }
            let group = groups.len();
            let mut members = Vec::new();
            let mut work = vec![info.id().clone()];
            while let Some(id) = work.pop() {
                if group_of.contains_key(&id) {
                    continue;
                }
                group_of.insert(id.clone(), group);
                if let Some(next) = adjacent.get(&id) {
                    work.extend(next.iter().cloned());
                }
                members.push(id);
            }
            members.sort();
            groups.push(members);
        }
        (groups, group_of)
    }

    pub fn build(self) -> Result<Contexts> {
        let (groups, group_of) = self.local_groups();

        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); groups.len()];
        for info in &self.modules {
            let Some(&from) = group_of.get(info.id()) else {
                continue;
            };
            for (target, _) in self.suppliers(info) {
                if let Some(&to) = group_of.get(&target) {
                    if to != from && !edges[from].contains(&to) {
                        edges[from].push(to);
                    }
                }
            }
        }

        let components = Components::compute(0..groups.len(), |g: &usize| edges[*g].clone());
        let mut result = Contexts::default();
        for members in components.components() {
            let mut module_ids: Vec<ModuleId> = members
                .iter()
                .flat_map(|&&g| groups[g].iter().cloned())
                .collect();
            module_ids.sort();
            if members.len() > 1 {
                debug!("Merging cyclic groups into one context: {:?}", module_ids);
            }
            let context = self.context(module_ids);
            self.claim_names(&context, &mut result.context_for_name)?;
            result.contexts.insert(context.name().to_string(), context);
        }

        result.contexts.sort_keys();
        result.context_for_name.sort_keys();
        debug!("Built {} context(s)", result.contexts.len());
        Ok(result)
    }

    fn context(&self, module_ids: Vec<ModuleId>) -> PathContext {
        let mut names: Vec<&str> = module_ids.iter().map(ModuleId::name).collect();
        names.sort_unstable();
        let name = format!("+{}", names.join("+"));

        let module_infos: BTreeMap<ModuleId, Arc<ModuleInfo>> = module_ids
            .iter()
            .filter_map(|id| self.resolution.module(id).map(|m| (id.clone(), Arc::clone(m))))
            .collect();
        trace!("Context {} holds {:?}", name, module_ids);
        PathContext::new(name, module_infos, module_ids)
    }

    fn claim_names(
        &self,
        context: &PathContext,
        claimed: &mut IndexMap<String, String>,
    ) -> Result<()> {
        for info in context.modules() {
            for id in info.view_ids() {
                let name = id.name();
                match claimed.get(name) {
                    Some(first) if first != context.name() => {
                        return Err(ResolutionError::ConfigurationConflict {
                            conflict: Conflict::DuplicateName {
                                name: name.to_string(),
                                first: first.clone(),
                                second: context.name().to_string(),
                            },
                            chain: Vec::new(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        claimed.insert(name.to_string(), context.name().to_string());
                    }
                }
            }
        }
        Ok(())
    }
}
