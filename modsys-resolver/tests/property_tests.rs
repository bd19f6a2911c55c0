//! Properties of configurations over generated catalogs

use modsys_core::{Directive, Modifier, ModuleDeclaration, ModuleId, ModuleIdQuery};
use modsys_resolver::{configure_paths, Configuration, LocalCatalog, ResolverConfig};
use proptest::prelude::*;
use std::collections::HashMap;

const MODULES: usize = 6;

/// (versions, requires as (target, optional, version form))
type ModuleShape = (u8, Vec<(usize, bool, u8)>);

fn declarations(shapes: &[ModuleShape]) -> Vec<ModuleDeclaration> {
    let mut decls = Vec::new();
    for (i, (versions, requires)) in shapes.iter().enumerate() {
        for version in 1..=*versions {
            let id = ModuleId::parse(&format!("m{i}@{version}")).unwrap();
            let mut decl = ModuleDeclaration::new(id);
            let mut seen = Vec::new();
            for &(target, optional, form) in requires {
                if target == i || seen.contains(&target) {
                    continue;
                }
                seen.push(target);
                let text = match form {
                    0 => format!("m{target}"),
                    1 => format!("m{target}@1"),
                    _ => format!("m{target}@>=2"),
                };
                let modifiers: Vec<Modifier> = if optional {
                    vec![Modifier::Optional]
                } else {
                    Vec::new()
                };
                decl = decl.directive(Directive::requires(
                    modifiers,
                    ModuleIdQuery::parse(&text).unwrap(),
                ));
            }
            decls.push(decl);
        }
    }
    decls
}

fn arb_shapes() -> impl Strategy<Value = Vec<ModuleShape>> {
    prop::collection::vec(
        (
            1u8..=2,
            prop::collection::vec((0..MODULES, any::<bool>(), 0u8..3), 0..3),
        ),
        MODULES,
    )
}

fn configure(decls: &[ModuleDeclaration]) -> Result<Configuration, String> {
    let catalog = LocalCatalog::from_declarations("gen", decls, None).map_err(|e| e.to_string())?;
    configure_paths(
        &catalog,
        &[ModuleIdQuery::parse("m0").unwrap()],
        &ResolverConfig::default(),
    )
    .map_err(|e| e.to_string())
}

proptest! {
    #[test]
    fn prop_configuration_is_deterministic(shapes in arb_shapes()) {
        let decls = declarations(&shapes);
        let mut reversed = decls.clone();
        reversed.reverse();

        let first = configure(&decls);
        prop_assert_eq!(&first, &configure(&decls));
        prop_assert_eq!(&first, &configure(&reversed));
    }

    #[test]
    fn prop_required_modules_are_present_and_ordered(shapes in arb_shapes()) {
        let decls = declarations(&shapes);
        let Ok(cf) = configure(&decls) else {
            return Ok(());
        };

        for info in cf.modules() {
            let home = cf.context_for_module_name(info.id().name()).unwrap();
            for dependence in info.requires().iter().filter(|d| !d.is_optional()) {
                let target = cf.module(dependence.query().name());
                prop_assert!(target.is_some(), "{} unresolved", dependence);
                let target = target.unwrap();
                prop_assert!(dependence.query().matches(target.id()));

                let there = cf.context_for_module_name(target.id().name()).unwrap();
                prop_assert!(
                    there.name() == home.name() || home.remote_contexts().contains(there.name())
                );
            }
        }

        let order: HashMap<&str, usize> = cf
            .ordered_contexts()
            .iter()
            .enumerate()
            .map(|(i, cx)| (cx.name(), i))
            .collect();
        prop_assert_eq!(order.len(), cf.len());
        for cx in cf.contexts() {
            for remote in cx.remote_contexts() {
                prop_assert!(order[cx.name()] < order[remote.as_str()]);
            }
        }
    }
}
