//! Module declarations as a list of directives, validated into `ModuleInfo`

use crate::dependence::{Dependence, Modifier, ServiceDependence};
use crate::error::{DirectiveError, DirectiveKind, Result};
use crate::module_id::{ModuleId, ModuleIdQuery};
use crate::module_info::{ModuleInfo, ModuleView};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tracing::trace;

/// A single module declaration directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    RequiresModule {
        query: ModuleIdQuery,
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        modifiers: BTreeSet<Modifier>,
    },
    RequiresService {
        service: String,
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        modifiers: BTreeSet<Modifier>,
    },
    ProvidesModule {
        id: ModuleId,
    },
    ProvidesService {
        service: String,
        implementation: String,
    },
    Exports {
        package: String,
    },
    Permits {
        module: String,
    },
    Entrypoint {
        class: String,
    },
    View {
        name: String,
        #[serde(default)]
        directives: Vec<Directive>,
    },
}

impl Directive {
    pub fn requires(modifiers: impl IntoIterator<Item = Modifier>, query: ModuleIdQuery) -> Self {
        Directive::RequiresModule {
            query,
            modifiers: modifiers.into_iter().collect(),
        }
    }

    pub fn requires_service(
        modifiers: impl IntoIterator<Item = Modifier>,
        service: impl Into<String>,
    ) -> Self {
        Directive::RequiresService {
            service: service.into(),
            modifiers: modifiers.into_iter().collect(),
        }
    }

    pub fn provides(id: ModuleId) -> Self {
        Directive::ProvidesModule { id }
    }

    pub fn provides_service(service: impl Into<String>, implementation: impl Into<String>) -> Self {
        Directive::ProvidesService {
            service: service.into(),
            implementation: implementation.into(),
        }
    }

    pub fn exports(package: impl Into<String>) -> Self {
        Directive::Exports {
            package: package.into(),
        }
    }

    pub fn permits(module: impl Into<String>) -> Self {
        Directive::Permits {
            module: module.into(),
        }
    }

    pub fn entrypoint(class: impl Into<String>) -> Self {
        Directive::Entrypoint {
            class: class.into(),
        }
    }

    pub fn view(name: impl Into<String>, directives: Vec<Directive>) -> Self {
        Directive::View {
            name: name.into(),
            directives,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::RequiresModule { query, modifiers } => {
                write!(f, "{}", Dependence::new(modifiers.iter().copied(), query.clone()))
            }
            Directive::RequiresService { service, modifiers } => {
                write!(f, "{}", ServiceDependence::new(modifiers.iter().copied(), service.clone()))
            }
            Directive::ProvidesModule { id } => write!(f, "provides {id}"),
            Directive::ProvidesService {
                service,
                implementation,
            } => write!(f, "provides service {service} with {implementation}"),
            Directive::Exports { package } => write!(f, "exports {package}"),
            Directive::Permits { module } => write!(f, "permits {module}"),
            Directive::Entrypoint { class } => write!(f, "class {class}"),
            Directive::View { name, .. } => write!(f, "view {name}"),
        }
    }
}

/// An unvalidated module declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDeclaration {
    pub id: ModuleId,
    #[serde(default)]
    pub directives: Vec<Directive>,
    /// Packages defined by the module
    #[serde(default)]
    pub packages: BTreeSet<String>,
    #[serde(default)]
    pub visible_to_all: bool,
}

impl ModuleDeclaration {
    pub fn new(id: ModuleId) -> Self {
        ModuleDeclaration {
            id,
            directives: Vec::new(),
            packages: BTreeSet::new(),
            visible_to_all: false,
        }
    }

    pub fn directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.packages.insert(package.into());
        self
    }

    pub fn visible_to_all(mut self, visible: bool) -> Self {
        self.visible_to_all = visible;
        self
    }

    /// Check the directive list and build the module's `ModuleInfo`
    ///
    /// When `base` is given, a synthetic requirement on it is added unless
    /// the module is the base module, already requires it, or provides it.
    pub fn validate(&self, base: Option<&ModuleIdQuery>) -> Result<ModuleInfo> {
        let module = self.id.to_string();
        let duplicate = |kind: DirectiveKind, target: String| DirectiveError::Duplicate {
            module: module.clone(),
            kind,
            target,
        };

        let mut requires = Vec::new();
        let mut required_names = HashSet::new();
        let mut requires_services = Vec::new();
        let mut required_services = HashSet::new();
        let mut aliases = HashSet::new();
        let mut view_names = HashSet::new();
        let mut default_view = ModuleView::new(self.id.clone());
        let mut views = Vec::new();

        view_names.insert(self.id.name().to_string());

        for directive in &self.directives {
            match directive {
                Directive::RequiresModule { query, modifiers } => {
                    if !required_names.insert(query.name().to_string()) {
                        let target = query.name().to_string();
                        return Err(duplicate(DirectiveKind::Requires, target).into());
                    }
                    requires.push(Dependence::new(modifiers.iter().copied(), query.clone()));
                }
                Directive::RequiresService { service, modifiers } => {
                    if !required_services.insert(service.clone()) {
                        let kind = DirectiveKind::RequiresService;
                        return Err(duplicate(kind, service.clone()).into());
                    }
                    requires_services.push(ServiceDependence::new(
                        modifiers.iter().copied(),
                        service.clone(),
                    ));
                }
                Directive::View { name, directives } => {
                    if !view_names.insert(name.clone()) {
                        return Err(duplicate(DirectiveKind::View, name.clone()).into());
                    }
                    let view_id = ModuleId::new(name.clone(), self.id.version().cloned())?;
                    let mut view = ModuleView::new(view_id);
                    for inner in directives {
                        match inner {
                            Directive::View { name: nested, .. } => {
                                return Err(DirectiveError::NestedView {
                                    module: module.clone(),
                                    view: nested.clone(),
                                }
                                .into());
                            }
                            Directive::RequiresModule { .. }
                            | Directive::RequiresService { .. } => {
                                return Err(DirectiveError::Misplaced {
                                    module: module.clone(),
                                    view: name.clone(),
                                    directive: inner.to_string(),
                                }
                                .into());
                            }
                            _ => apply_view_directive(&mut view, inner, &mut aliases, &duplicate)?,
                        }
                    }
                    views.push(view);
                }
                _ => apply_view_directive(&mut default_view, directive, &mut aliases, &duplicate)?,
            }
        }

        if let Some(base) = base {
            let exempt = self.id.name() == base.name()
                || required_names.contains(base.name())
                || view_names.contains(base.name())
                || aliases.iter().any(|a: &ModuleId| a.name() == base.name());
            if !exempt {
                trace!("{}: adding synthetic requirement on {}", module, base);
                requires.push(Dependence::new([Modifier::Synthetic], base.clone()));
            }
        }

        Ok(ModuleInfo::from_parts(
            self.id.clone(),
            requires,
            requires_services,
            default_view,
            views,
            self.packages.clone(),
            self.visible_to_all,
        ))
    }
}

fn apply_view_directive(
    view: &mut ModuleView,
    directive: &Directive,
    aliases: &mut HashSet<ModuleId>,
    duplicate: &dyn Fn(DirectiveKind, String) -> DirectiveError,
) -> std::result::Result<(), DirectiveError> {
    match directive {
        Directive::ProvidesModule { id } => {
            if !aliases.insert(id.clone()) || !view.add_alias(id.clone()) {
                return Err(duplicate(DirectiveKind::Provides, id.to_string()));
            }
        }
        Directive::ProvidesService {
            service,
            implementation,
        } => {
            if !view.add_service(service.clone(), implementation.clone()) {
                return Err(duplicate(
                    DirectiveKind::ProvidesService,
                    format!("{service} with {implementation}"),
                ));
            }
        }
        Directive::Exports { package } => {
            if !view.add_export(package.clone()) {
                return Err(duplicate(DirectiveKind::Exports, package.clone()));
            }
        }
        Directive::Permits { module } => {
            if !view.add_permit(module.clone()) {
                return Err(duplicate(DirectiveKind::Permits, module.clone()));
            }
        }
        Directive::Entrypoint { class } => {
            if !view.set_main_class(class.clone()) {
                return Err(duplicate(DirectiveKind::Entrypoint, class.clone()));
            }
        }
        // handled by the caller
        Directive::RequiresModule { .. }
        | Directive::RequiresService { .. }
        | Directive::View { .. } => {}
    }
    Ok(())
}
