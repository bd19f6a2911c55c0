//! Linking path contexts to the contexts that supply them

use crate::configuration::PathContext;
use crate::resolver::Resolution;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Fill in each context's remote and re-exported contexts
///
/// A non-local dependence whose supplier lives in another context links
/// the two; a public one also re-exports the supplier's context. Re-exports
/// are then propagated until nothing changes.
pub(crate) fn link(
    resolution: &Resolution,
    contexts: &mut IndexMap<String, PathContext>,
    context_for_name: &IndexMap<String, String>,
) {
    for context in contexts.values_mut() {
        let mut remote = BTreeSet::new();
        let mut re_exported = BTreeSet::new();
        for info in context.modules() {
            for dependence in info.requires() {
                if dependence.is_local() {
                    continue;
                }
                let Some(supplier) = resolution.supplier(info.id(), dependence) else {
                    continue;
                };
                let Some(target) = context_for_name.get(supplier.module.id().name()) else {
                    continue;
                };
                if target == context.name() {
                    continue;
                }
                trace!("{} -> {} via {}", context.name(), target, dependence);
                remote.insert(target.clone());
                if dependence.is_public() {
                    re_exported.insert(target.clone());
                }
            }
        }
        context.extend_remote(remote);
        context.extend_re_exported(re_exported);
    }

    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut changed = false;
        for index in 0..contexts.len() {
            let Some((name, context)) = contexts.get_index(index) else {
                continue;
            };
            let mut remote = BTreeSet::new();
            for supplier in context.remote_contexts() {
                if let Some(s) = contexts.get(supplier) {
                    remote.extend(s.re_exported().iter().filter(|n| *n != name).cloned());
                }
            }
            let mut re_exported = BTreeSet::new();
            for supplier in context.re_exported() {
                if let Some(s) = contexts.get(supplier) {
                    re_exported.extend(s.re_exported().iter().filter(|n| *n != name).cloned());
                }
            }
            remote.retain(|n| !context.remote_contexts().contains(n));
            re_exported.retain(|n| !context.re_exported().contains(n));
            if remote.is_empty() && re_exported.is_empty() {
                continue;
            }

            changed = true;
            if let Some(context) = contexts.get_index_mut(index).map(|(_, c)| c) {
                context.extend_remote(remote);
                context.extend_re_exported(re_exported);
            }
        }
        if !changed {
            break;
        }
    }
    debug!("Linked {} context(s) in {} round(s)", contexts.len(), rounds);
}
