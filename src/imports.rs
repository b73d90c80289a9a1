//! Import collection for one generated file.
//!
//! User imports (app level, the component and its inline definitions) are
//! registered first and checked for local-name conflicts. Implicit imports
//! added by the generator (hooks, runtime helpers, component references)
//! only fill local names the user left free. Names of the functions the file
//! declares are reserved for them.

use indexmap::IndexMap;
use std::fmt;

use crate::tree::{AppTree, ComponentNode, ImportKind, ImportSpec, NamedImport};
use crate::validate::{CompilerError, INV_IMPORT_ALIAS_CONFLICT};
use crate::visitor::{definitions_of, nodes_of};

/// Origin recorded on imports the generator adds on its own.
pub const GENERATED_IMPORT: &str = "(generated)";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Default,
    Namespace,
    Named(String),
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Default => f.write_str("default"),
            Symbol::Namespace => f.write_str("*"),
            Symbol::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone)]
struct Binding {
    source: String,
    symbol: Symbol,
    path: String,
}

/// Everything imported from one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceGroup {
    pub defaults: Vec<String>,
    pub namespaces: Vec<String>,
    /// (symbol, local)
    pub named: Vec<(String, String)>,
}

impl SourceGroup {
    fn add(&mut self, symbol: &Symbol, local: &str) {
        match symbol {
            Symbol::Default => push_unique(&mut self.defaults, local.to_string()),
            Symbol::Namespace => push_unique(&mut self.namespaces, local.to_string()),
            Symbol::Named(name) => push_unique(&mut self.named, (name.clone(), local.to_string())),
        }
    }

    fn render(&self, source: &str, out: &mut Vec<String>) {
        let named = self
            .named
            .iter()
            .map(|(symbol, local)| {
                if symbol == local {
                    symbol.clone()
                } else {
                    format!("{} as {}", symbol, local)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut defaults = self.defaults.iter();
        let head = match (defaults.next(), named.is_empty()) {
            (Some(d), true) => Some(d.clone()),
            (Some(d), false) => Some(format!("{}, {{ {} }}", d, named)),
            (None, false) => Some(format!("{{ {} }}", named)),
            (None, true) => None,
        };
        if let Some(head) = head {
            out.push(format!("import {} from '{}';", head, source));
        }
        for extra in defaults {
            out.push(format!("import {} from '{}';", extra, source));
        }
        for ns in &self.namespaces {
            out.push(format!("import * as {} from '{}';", ns, source));
        }
        if self.defaults.is_empty() && self.named.is_empty() && self.namespaces.is_empty() {
            out.push(format!("import '{}';", source));
        }
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// Deduplicated imports of one file, grouped by source in first-appearance order.
#[derive(Debug, Clone, Default)]
pub struct ImportBlock {
    pub groups: IndexMap<String, SourceGroup>,
    locals: IndexMap<String, Binding>,
}

impl ImportBlock {
    pub fn binds(&self, local: &str) -> bool {
        self.locals.contains_key(local)
    }

    pub fn render(&self) -> String {
        let mut lines = vec![];
        for (source, group) in &self.groups {
            group.render(source, &mut lines);
        }
        lines.join("\n")
    }
}

/// Flattens a spec into (symbol, local) pairs; empty for side-effect imports.
fn entries(spec: &ImportSpec) -> Vec<(Symbol, String)> {
    match &spec.kind {
        ImportKind::SideEffect => vec![],
        ImportKind::Default(local) => vec![(Symbol::Default, local.clone())],
        ImportKind::Namespace(local) => vec![(Symbol::Namespace, local.clone())],
        ImportKind::Named(items) => items
            .iter()
            .map(|i| (Symbol::Named(i.symbol.clone()), i.local().to_string()))
            .collect(),
    }
}

/// Build the import block of one file.
///
/// `user` specs are checked for conflicts: the same local name bound to two
/// different `(source, symbol)` pairs is a `ConflictError` naming both, and so
/// is a user import of a name in `reserved` (function name, definition path).
/// `implicit` specs whose local name is already taken are dropped.
/// Implicit sources are listed first.
pub fn collect_imports<'a>(
    user: impl IntoIterator<Item = &'a ImportSpec>,
    implicit: &[ImportSpec],
    reserved: &[(String, String)],
) -> Result<ImportBlock, Vec<CompilerError>> {
    let mut block = ImportBlock::default();
    let mut errors = vec![];
    let mut accepted: Vec<&ImportSpec> = vec![];

    for spec in user {
        let mut ok = true;
        for (symbol, local) in entries(spec) {
            if let Some((_, path)) = reserved.iter().find(|(name, _)| *name == local) {
                ok = false;
                errors.push(
                    CompilerError::conflict(
                        INV_IMPORT_ALIAS_CONFLICT,
                        &spec.path,
                        format!(
                            "local name '{}' imported from '{}' is already declared as a component function at {}",
                            local, spec.source, path
                        ),
                    )
                    .with_related(path.clone()),
                );
                continue;
            }
            match block.locals.get(&local) {
                Some(existing) if existing.source == spec.source && existing.symbol == symbol => {}
                Some(existing) => {
                    ok = false;
                    errors.push(
                        CompilerError::conflict(
                            INV_IMPORT_ALIAS_CONFLICT,
                            &spec.path,
                            format!(
                                "local name '{}' imports '{}' from '{}' but is already bound to '{}' from '{}' at {}",
                                local, symbol, spec.source, existing.symbol, existing.source, existing.path
                            ),
                        )
                        .with_related(existing.path.clone()),
                    );
                }
                None => {
                    block.locals.insert(
                        local,
                        Binding {
                            source: spec.source.clone(),
                            symbol,
                            path: spec.path.clone(),
                        },
                    );
                }
            }
        }
        if ok {
            accepted.push(spec);
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    for spec in implicit {
        let mut kept = vec![];
        for (symbol, local) in entries(spec) {
            if block.binds(&local) || reserved.iter().any(|(name, _)| *name == local) {
                continue;
            }
            block.locals.insert(
                local.clone(),
                Binding {
                    source: spec.source.clone(),
                    symbol: symbol.clone(),
                    path: spec.path.clone(),
                },
            );
            kept.push((symbol, local));
        }
        if kept.is_empty() && !matches!(spec.kind, ImportKind::SideEffect) {
            continue;
        }
        let group = block.groups.entry(spec.source.clone()).or_default();
        for (symbol, local) in kept {
            group.add(&symbol, &local);
        }
    }

    for spec in accepted {
        let group = block.groups.entry(spec.source.clone()).or_default();
        for (symbol, local) in entries(spec) {
            group.add(&symbol, &local);
        }
    }

    Ok(block)
}

/// User imports visible in the file of one top-level definition: the app's,
/// then those of every node of the definition in document order.
pub fn user_imports<'a>(app: &'a AppTree, component: &'a ComponentNode) -> Vec<&'a ImportSpec> {
    app.imports
        .iter()
        .chain(nodes_of(component).into_iter().flat_map(|n| n.imports.iter()))
        .collect()
}

/// Function names declared in the file of one top-level definition, with
/// the path of each definition. Unnamed definitions are skipped.
pub fn declared_functions(component: &ComponentNode) -> Vec<(String, String)> {
    definitions_of(component)
        .into_iter()
        .filter_map(|d| d.resolved_name().map(|n| (n.to_string(), d.path.clone())))
        .collect()
}

/// Checks the user imports of every file. App-level conflicts show up in
/// every file but are reported once.
pub fn check_app_imports(app: &AppTree) -> Vec<CompilerError> {
    let mut errors: Vec<CompilerError> = vec![];
    for component in &app.components {
        let reserved = declared_functions(component);
        if let Err(found) = collect_imports(user_imports(app, component), &[], &reserved) {
            for error in found {
                push_unique(&mut errors, error);
            }
        }
    }
    errors
}

/// Shorthand constructors for generated imports.
pub fn named_import(source: &str, symbols: &[&str]) -> ImportSpec {
    ImportSpec {
        source: source.to_string(),
        kind: ImportKind::Named(
            symbols
                .iter()
                .map(|s| NamedImport {
                    symbol: s.to_string(),
                    alias: None,
                })
                .collect(),
        ),
        path: GENERATED_IMPORT.to_string(),
    }
}

pub fn default_import(source: &str, local: &str) -> ImportSpec {
    ImportSpec {
        source: source.to_string(),
        kind: ImportKind::Default(local.to_string()),
        path: GENERATED_IMPORT.to_string(),
    }
}

pub fn side_effect_import(source: &str) -> ImportSpec {
    ImportSpec {
        source: source.to_string(),
        kind: ImportKind::SideEffect,
        path: GENERATED_IMPORT.to_string(),
    }
}
