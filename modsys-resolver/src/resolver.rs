//! Module resolution
//!
//! Selects one module per name for a set of root queries. The search walks
//! the dependence graph breadth first from the roots. Every selection is
//! recorded on an undo trail so that a choice which later turns out to be
//! inconsistent can be taken back and the next-older candidate tried.

use crate::catalog::Catalog;
use crate::config::ResolverConfig;
use crate::error::{CatalogError, Conflict, ResolutionError, Result};
use indexmap::{IndexMap, IndexSet};
use modsys_core::{Dependence, Modifier, ModuleId, ModuleIdQuery, ModuleInfo, ModuleView};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Whether `view` accepts a dependence from `requester`
///
/// Root queries have no requester and are always accepted. A view with no
/// permits accepts every non-local requester; otherwise the requester must
/// be named.
pub fn permits(requester: Option<&ModuleId>, dependence: &Dependence, view: &ModuleView) -> bool {
    let Some(requester) = requester else {
        return true;
    };
    if view.permits().is_empty() && !dependence.is_local() {
        return true;
    }
    view.permits().contains(requester.name())
}

/// How a choice entered the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Declared,
    /// Synthesized toward a service provider; permits do not apply
    Service,
}

#[derive(Debug, Clone)]
struct Choice {
    requester: Option<ModuleId>,
    dependence: Dependence,
    origin: Origin,
}

/// A resolved name and the module answering to it
#[derive(Debug, Clone, PartialEq, Eq)]
struct Claim {
    /// The view or alias id carrying the name
    named: ModuleId,
    module: ModuleId,
}

#[derive(Debug)]
struct Selected {
    module: ModuleId,
    names: Vec<String>,
    /// Choices pushed onto the back of the frontier by this selection
    appended: usize,
}

#[derive(Debug)]
struct Frame {
    choice: Choice,
    /// Newest first
    candidates: Vec<ModuleId>,
    next: usize,
    selected: Option<Selected>,
}

#[derive(Debug)]
enum Step {
    /// The choice was met by an already resolved name
    Satisfied(Choice),
    Decision(Frame),
}

struct Search<'a> {
    catalog: &'a dyn Catalog,
    resolve_services: bool,
    limit: usize,
    steps: usize,
    frontier: VecDeque<Choice>,
    trail: Vec<Step>,
    names: IndexMap<String, Claim>,
    modules: IndexMap<ModuleId, Arc<ModuleInfo>>,
    required_by: FxHashMap<ModuleId, Option<ModuleId>>,
    providers: FxHashMap<String, Vec<ModuleIdQuery>>,
    failure: Option<ResolutionError>,
}

impl<'a> Search<'a> {
    fn new(catalog: &'a dyn Catalog, config: &ResolverConfig) -> Self {
        Self {
            catalog,
            resolve_services: config.resolve_services,
            limit: config.max_search_steps,
            steps: 0,
            frontier: VecDeque::new(),
            trail: Vec::new(),
            names: IndexMap::new(),
            modules: IndexMap::new(),
            required_by: FxHashMap::default(),
            providers: FxHashMap::default(),
            failure: None,
        }
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.limit {
            return Err(ResolutionError::SearchLimitExceeded { limit: self.limit });
        }
        Ok(())
    }

    /// Requiring modules of `requester`, root first, ending with it
    fn chain(&self, requester: Option<&ModuleId>) -> Vec<ModuleId> {
        let mut chain = Vec::new();
        let mut current = requester.cloned();
        while let Some(id) = current {
            // required_by always points at an earlier selection
            current = self.required_by.get(&id).cloned().flatten();
            chain.push(id);
        }
        chain.reverse();
        chain
    }

    fn fail(&mut self, error: ResolutionError) {
        debug!("Search failure: {}", error);
        if self.failure.is_none() {
            self.failure = Some(error);
        }
    }

    fn conflict(&mut self, requester: Option<&ModuleId>, conflict: Conflict) {
        let chain = self.chain(requester);
        self.fail(ResolutionError::ConfigurationConflict { conflict, chain });
    }

    /// The error to report once every alternative is used up
    fn exhausted(&mut self, query: ModuleIdQuery) -> ResolutionError {
        self.failure
            .take()
            .unwrap_or(ResolutionError::ModuleNotFound {
                query,
                chain: Vec::new(),
            })
    }

    /// Run until the frontier is empty or every alternative has failed
    fn run(&mut self) -> Result<()> {
        loop {
            self.tick()?;
            let Some(choice) = self.frontier.pop_front() else {
                return Ok(());
            };
            let query = choice.dependence.query();

            if let Some(claim) = self.names.get(query.name()) {
                let conflict = self.check_claim(&choice, claim);
                match conflict {
                    None => {
                        trace!("{} already resolved to {}", query, claim.named);
                        self.trail.push(Step::Satisfied(choice));
                    }
                    Some(conflict) => {
                        self.conflict(choice.requester.as_ref(), conflict);
                        let query = query.clone();
                        self.frontier.push_front(choice);
                        if !self.backtrack()? {
                            return Err(self.exhausted(query));
                        }
                    }
                }
                continue;
            }

            let candidates = self.catalog.find_module_ids(query)?;
            trace!("{} has candidates {:?}", query, candidates);
            if candidates.is_empty() && !choice.dependence.is_optional() {
                let chain = self.chain(choice.requester.as_ref());
                self.fail(ResolutionError::ModuleNotFound {
                    query: query.clone(),
                    chain,
                });
            }

            let mut frame = Frame {
                choice,
                candidates,
                next: 0,
                selected: None,
            };
            if self.advance(&mut frame)? {
                self.trail.push(Step::Decision(frame));
            } else {
                let query = frame.choice.dependence.query().clone();
                self.frontier.push_front(frame.choice);
                if !self.backtrack()? {
                    return Err(self.exhausted(query));
                }
            }
        }
    }

    fn check_claim(&self, choice: &Choice, claim: &Claim) -> Option<Conflict> {
        let query = choice.dependence.query();
        if !query.matches(&claim.named) {
            return Some(Conflict::Version {
                query: query.clone(),
                resolved: claim.named.clone(),
            });
        }
        if choice.origin == Origin::Service {
            return None;
        }
        let view = self.modules.get(&claim.module)?.view_for(&claim.named);
        if permits(choice.requester.as_ref(), &choice.dependence, view) {
            None
        } else {
            choice.requester.as_ref().map(|requester| Conflict::NotPermitted {
                requester: requester.clone(),
                view: view.id().clone(),
            })
        }
    }

    /// Try the frame's remaining alternatives until one is selected
    fn advance(&mut self, frame: &mut Frame) -> Result<bool> {
        while frame.next < frame.candidates.len() {
            let candidate = frame.candidates[frame.next].clone();
            frame.next += 1;
            if let Some(selected) = self.try_select(&frame.choice, &candidate)? {
                frame.selected = Some(selected);
                return Ok(true);
            }
        }
        if frame.next == frame.candidates.len() && frame.choice.dependence.is_optional() {
            frame.next += 1;
            debug!("Skipping optional {}", frame.choice.dependence.query());
            return Ok(true);
        }
        Ok(false)
    }

    fn try_select(&mut self, choice: &Choice, id: &ModuleId) -> Result<Option<Selected>> {
        let info = self.catalog.read_module_info(id)?.ok_or_else(|| {
            CatalogError::Inconsistent {
                catalog: self.catalog.name().to_string(),
                message: format!("{id} is listed but has no module info"),
            }
        })?;

        let view = info.view_for(id);
        if choice.origin == Origin::Declared
            && !permits(choice.requester.as_ref(), &choice.dependence, view)
        {
            if let Some(requester) = &choice.requester {
                let conflict = Conflict::NotPermitted {
                    requester: requester.clone(),
                    view: view.id().clone(),
                };
                self.conflict(Some(requester), conflict);
            }
            return Ok(None);
        }

        let collision = info.view_ids().find_map(|vid| {
            self.names.get(vid.name()).map(|claim| Conflict::NameCollision {
                name: vid.name().to_string(),
                existing: claim.module.clone(),
                candidate: info.id().clone(),
            })
        });
        if let Some(conflict) = collision {
            self.conflict(choice.requester.as_ref(), conflict);
            return Ok(None);
        }

        trace!("Selecting {} for {}", info.id(), choice.dependence.query());
        let module = info.id().clone();
        let mut names = Vec::new();
        for vid in info.view_ids() {
            self.names.insert(
                vid.name().to_string(),
                Claim {
                    named: vid.clone(),
                    module: module.clone(),
                },
            );
            names.push(vid.name().to_string());
        }
        self.modules.insert(module.clone(), Arc::clone(&info));
        self.required_by.insert(module.clone(), choice.requester.clone());

        let mut appended = 0;
        for dependence in info.requires() {
            self.frontier.push_back(Choice {
                requester: Some(module.clone()),
                dependence: dependence.clone(),
                origin: Origin::Declared,
            });
            appended += 1;
        }
        if self.resolve_services {
            for service in info.requires_services() {
                for query in self.providers_of(service.service())? {
                    self.frontier.push_back(Choice {
                        requester: Some(module.clone()),
                        dependence: Dependence::new(
                            [Modifier::Optional, Modifier::Synthetic],
                            query,
                        ),
                        origin: Origin::Service,
                    });
                    appended += 1;
                }
            }
        }

        Ok(Some(Selected {
            module,
            names,
            appended,
        }))
    }

    /// Unversioned queries on every view providing `service`, by view name
    fn providers_of(&mut self, service: &str) -> Result<Vec<ModuleIdQuery>> {
        if let Some(cached) = self.providers.get(service) {
            return Ok(cached.clone());
        }
        let mut names: IndexSet<String> = IndexSet::new();
        for id in self.catalog.list_module_ids()? {
            let Some(info) = self.catalog.read_module_info(&id)? else {
                continue;
            };
            let view = info.view_for(&id);
            if view.id() == &id && view.provides_service(service) {
                names.insert(id.name().to_string());
            }
        }
        let queries = names
            .into_iter()
            .map(|name| ModuleIdQuery::new(name, None))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Service {} provided by {} view(s)", service, queries.len());
        self.providers.insert(service.to_string(), queries.clone());
        Ok(queries)
    }

    fn undo(&mut self, selected: Selected) {
        trace!("Undoing selection of {}", selected.module);
        for _ in 0..selected.appended {
            self.frontier.pop_back();
        }
        for name in &selected.names {
            self.names.shift_remove(name);
        }
        self.modules.shift_remove(&selected.module);
        self.required_by.remove(&selected.module);
    }

    /// Unwind the trail to the most recent decision with an alternative left
    fn backtrack(&mut self) -> Result<bool> {
        while let Some(step) = self.trail.pop() {
            self.tick()?;
            match step {
                Step::Satisfied(choice) => self.frontier.push_front(choice),
                Step::Decision(mut frame) => {
                    if let Some(selected) = frame.selected.take() {
                        self.undo(selected);
                    }
                    if self.advance(&mut frame)? {
                        self.trail.push(Step::Decision(frame));
                        return Ok(true);
                    }
                    self.frontier.push_front(frame.choice);
                }
            }
        }
        Ok(false)
    }
}

/// The modules selected for a set of root queries
#[derive(Debug, Clone)]
pub struct Resolution {
    root_queries: Vec<ModuleIdQuery>,
    roots: Vec<ModuleId>,
    modules: IndexMap<ModuleId, Arc<ModuleInfo>>,
    names: IndexMap<String, Claim>,
    dropped_optional: Vec<(ModuleId, Dependence)>,
}

/// The module and view that satisfy a dependence
#[derive(Debug, Clone, Copy)]
pub struct Supplier<'r> {
    pub module: &'r Arc<ModuleInfo>,
    pub view: &'r ModuleView,
}

impl Resolution {
    pub fn root_queries(&self) -> &[ModuleIdQuery] {
        &self.root_queries
    }

    /// Modules the root queries resolved to, in query order
    pub fn root_ids(&self) -> &[ModuleId] {
        &self.roots
    }

    /// Selected modules in selection order
    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleInfo>> {
        self.modules.values()
    }

    pub fn module(&self, id: &ModuleId) -> Option<&Arc<ModuleInfo>> {
        self.modules.get(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// The module answering to a name, by module name, view name or alias
    pub fn module_for_name(&self, name: &str) -> Option<&Arc<ModuleInfo>> {
        self.names
            .get(name)
            .and_then(|claim| self.modules.get(&claim.module))
    }

    /// The selected module and view supplying `dependence` to `requester`
    ///
    /// `None` when the name is unresolved, the resolved id does not satisfy
    /// the query, or the supplying view does not permit the requester.
    pub fn supplier(&self, requester: &ModuleId, dependence: &Dependence) -> Option<Supplier<'_>> {
        let claim = self.names.get(dependence.query().name())?;
        if !dependence.query().matches(&claim.named) {
            return None;
        }
        let module = self.modules.get(&claim.module)?;
        let view = module.view_for(&claim.named);
        permits(Some(requester), dependence, view).then_some(Supplier { module, view })
    }

    /// Optional dependences left without a supplier
    pub fn dropped_optional(&self) -> &[(ModuleId, Dependence)] {
        &self.dropped_optional
    }

    fn check_services(&self) -> Result<()> {
        for info in self.modules.values() {
            for requirement in info.requires_services() {
                if requirement.is_optional() {
                    continue;
                }
                if !self
                    .modules
                    .values()
                    .any(|m| m.provides_service(requirement.service()))
                {
                    return Err(ResolutionError::MissingService {
                        service: requirement.service().to_string(),
                        module: info.id().clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Resolve root queries against a catalog
///
/// The newest consistent version of each module is chosen. Fails with the
/// first hard failure met during the search when no consistent selection
/// exists.
pub fn resolve(
    catalog: &dyn Catalog,
    root_queries: &[ModuleIdQuery],
    config: &ResolverConfig,
) -> Result<Resolution> {
    debug!(
        "Resolving {} root(s) against catalog {}",
        root_queries.len(),
        catalog.name()
    );
    let mut search = Search::new(catalog, config);
    for query in root_queries {
        search.frontier.push_back(Choice {
            requester: None,
            dependence: Dependence::plain(query.clone()),
            origin: Origin::Declared,
        });
    }

    search.run()?;
    debug!("Search finished after {} steps", search.steps);

    let mut roots: Vec<ModuleId> = Vec::new();
    for query in root_queries {
        if let Some(claim) = search.names.get(query.name()) {
            if !roots.contains(&claim.module) {
                roots.push(claim.module.clone());
            }
        }
    }

    let mut resolution = Resolution {
        root_queries: root_queries.to_vec(),
        roots,
        modules: search.modules,
        names: search.names,
        dropped_optional: Vec::new(),
    };

    let mut dropped = Vec::new();
    for info in resolution.modules.values() {
        for dependence in info.requires() {
            if dependence.is_optional() && resolution.supplier(info.id(), dependence).is_none() {
                debug!("{}: dropped {}", info.id(), dependence);
                dropped.push((info.id().clone(), dependence.clone()));
            }
        }
    }
    resolution.dropped_optional = dropped;

    if config.resolve_services {
        resolution.check_services()?;
    }
    debug!("Resolved {} module(s)", resolution.len());
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LocalCatalog;
    use modsys_core::{Directive, ModuleDeclaration};
    use pretty_assertions::assert_eq;

    const PLAIN: [Modifier; 0] = [];

    fn id(s: &str) -> ModuleId {
        ModuleId::parse(s).unwrap()
    }

    fn query(s: &str) -> ModuleIdQuery {
        ModuleIdQuery::parse(s).unwrap()
    }

    fn module(s: &str) -> ModuleDeclaration {
        ModuleDeclaration::new(id(s))
    }

    fn requires(s: &str) -> Directive {
        Directive::requires(PLAIN, query(s))
    }

    fn catalog(decls: &[ModuleDeclaration]) -> LocalCatalog {
        LocalCatalog::from_declarations("test", decls, None).unwrap()
    }

    fn selected(resolution: &Resolution) -> Vec<String> {
        let mut ids: Vec<String> = resolution.modules().map(|m| m.id().to_string()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_permits() {
        let open = catalog(&[module("y@1")]);
        let info = open.read_module_info(&id("y@1")).unwrap().unwrap();
        let plain = Dependence::plain(query("y"));
        let local = Dependence::new([Modifier::Local], query("y"));

        assert!(permits(None, &local, info.default_view()));
        assert!(permits(Some(&id("x@1")), &plain, info.default_view()));
        assert!(!permits(Some(&id("x@1")), &local, info.default_view()));

        let closed = catalog(&[module("y@1").directive(Directive::permits("x"))]);
        let info = closed.read_module_info(&id("y@1")).unwrap().unwrap();
        assert!(permits(Some(&id("x@1")), &local, info.default_view()));
        assert!(!permits(Some(&id("w@1")), &plain, info.default_view()));
    }

    #[test]
    fn test_newest_version_selected() {
        let cat = catalog(&[
            module("x@1").directive(requires("y")),
            module("y@1"),
            module("y@2"),
            module("y@1.5"),
        ]);
        let resolution = resolve(&cat, &[query("x")], &ResolverConfig::default()).unwrap();
        assert_eq!(selected(&resolution), vec!["x@1", "y@2"]);
        assert_eq!(resolution.root_ids(), &[id("x@1")]);
        assert_eq!(resolution.module_for_name("y").map(|m| m.id().clone()), Some(id("y@2")));
    }

    #[test]
    fn test_backtracks_to_older_candidate() {
        let cat = catalog(&[
            module("x@1").directive(requires("y@2")).directive(requires("w@4")),
            module("y@2").directive(requires("z@>=3")),
            module("w@4").directive(requires("z@<=4")),
            module("z@9"),
            module("z@4"),
            module("z@3"),
        ]);
        let resolution = resolve(&cat, &[query("x@1")], &ResolverConfig::default()).unwrap();
        assert_eq!(selected(&resolution), vec!["w@4", "x@1", "y@2", "z@4"]);
    }

    #[test]
    fn test_version_conflict_reports_chain() {
        let cat = catalog(&[
            module("x@1").directive(requires("y@2")).directive(requires("w@4")),
            module("y@2").directive(requires("z@<=3")),
            module("w@4").directive(requires("z@>=4")),
            module("z@3"),
            module("z@4"),
        ]);
        let err = resolve(&cat, &[query("x@1")], &ResolverConfig::default()).unwrap_err();
        match err {
            ResolutionError::ConfigurationConflict {
                conflict: Conflict::Version { query: q, resolved },
                chain,
            } => {
                assert_eq!(q, query("z@>=4"));
                assert_eq!(resolved, id("z@3"));
                assert_eq!(chain, vec![id("x@1"), id("w@4")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_module_reports_chain() {
        let cat = catalog(&[
            module("x@1").directive(requires("y@1")),
            module("y@1").directive(requires("z@1")),
        ]);
        let err = resolve(&cat, &[query("x@1")], &ResolverConfig::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Module not found: z@=1 (required by x@1 -> y@1)"
        );
    }

    #[test]
    fn test_missing_root() {
        let cat = catalog(&[]);
        let err = resolve(&cat, &[query("x")], &ResolverConfig::default()).unwrap_err();
        assert!(matches!(err, ResolutionError::ModuleNotFound { chain, .. } if chain.is_empty()));
    }

    #[test]
    fn test_optional_dependence_dropped() {
        let cat = catalog(&[module("n@1").directive(Directive::requires(
            [Modifier::Optional, Modifier::Local],
            query("p@9.0"),
        ))]);
        let resolution = resolve(&cat, &[query("n")], &ResolverConfig::default()).unwrap();
        assert_eq!(selected(&resolution), vec!["n@1"]);
        assert_eq!(resolution.dropped_optional().len(), 1);
        assert_eq!(resolution.dropped_optional()[0].0, id("n@1"));
    }

    #[test]
    fn test_missed_optional_stays_dropped_after_later_claim() {
        let cat = catalog(&[
            module("r@1").directive(requires("a@1")).directive(requires("b@1")),
            module("a@1").directive(Directive::requires([Modifier::Optional], query("p@2"))),
            module("b@1").directive(requires("p@1")),
            module("p@1"),
        ]);
        let resolution = resolve(&cat, &[query("r@1")], &ResolverConfig::default()).unwrap();
        assert_eq!(selected(&resolution), vec!["a@1", "b@1", "p@1", "r@1"]);
        let dropped: Vec<(String, String)> = resolution
            .dropped_optional()
            .iter()
            .map(|(m, d)| (m.to_string(), d.query().to_string()))
            .collect();
        assert_eq!(dropped, vec![("a@1".to_string(), "p@=2".to_string())]);
    }

    #[test]
    fn test_refused_candidate_falls_back() {
        // y@2 only permits w, so x ends up with y@1
        let cat = catalog(&[
            module("x@1").directive(requires("y")),
            module("y@2").directive(Directive::permits("w")),
            module("y@1"),
        ]);
        let resolution = resolve(&cat, &[query("x")], &ResolverConfig::default()).unwrap();
        assert_eq!(selected(&resolution), vec!["x@1", "y@1"]);
    }

    #[test]
    fn test_view_name_collision() {
        // y's view v collides with module v required alongside it
        let cat = catalog(&[
            module("x@1").directive(requires("v@2")).directive(requires("y")),
            module("v@2"),
            module("y@1").directive(Directive::view("v", vec![])),
        ]);
        let err = resolve(&cat, &[query("x")], &ResolverConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::ConfigurationConflict {
                conflict: Conflict::NameCollision { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_supplier_through_view() {
        let cat = catalog(&[
            module("x@1").directive(requires("yv@1")),
            module("y@1").directive(Directive::view("yv", vec![Directive::exports("y.api")])),
        ]);
        let resolution = resolve(&cat, &[query("x")], &ResolverConfig::default()).unwrap();
        let dependence = &resolution.module(&id("x@1")).unwrap().requires()[0];
        let supplier = resolution.supplier(&id("x@1"), dependence).unwrap();
        assert_eq!(supplier.module.id(), &id("y@1"));
        assert_eq!(supplier.view.id(), &id("yv@1"));
        assert!(supplier.view.exports().contains("y.api"));
    }

    #[test]
    fn test_services_disabled() {
        let cat = catalog(&[
            module("x@1").directive(Directive::requires_service(PLAIN, "s")),
            module("y@1").directive(Directive::provides_service("s", "y.Impl")),
        ]);
        let config = ResolverConfig {
            resolve_services: false,
            ..Default::default()
        };
        let resolution = resolve(&cat, &[query("x")], &config).unwrap();
        assert_eq!(selected(&resolution), vec!["x@1"]);

        let resolution = resolve(&cat, &[query("x")], &ResolverConfig::default()).unwrap();
        assert_eq!(selected(&resolution), vec!["x@1", "y@1"]);
    }

    #[test]
    fn test_search_limit() {
        let cat = catalog(&[
            module("a@1").directive(requires("b")),
            module("b@1").directive(requires("c")),
            module("c@1"),
        ]);
        let config = ResolverConfig {
            max_search_steps: 2,
            ..Default::default()
        };
        let err = resolve(&cat, &[query("a")], &config).unwrap_err();
        assert!(matches!(err, ResolutionError::SearchLimitExceeded { limit: 2 }));
    }

    #[test]
    fn test_no_roots() {
        let cat = catalog(&[module("a@1")]);
        let resolution = resolve(&cat, &[], &ResolverConfig::default()).unwrap();
        assert!(resolution.is_empty());
        assert!(resolution.root_ids().is_empty());
    }
}
