//! Name resolution.
//!
//! Runs once, sequentially, before any per-component work. Explicit component
//! names are reserved first, then anonymous inline definitions and styled
//! nodes get names derived from their position in the tree. Results are
//! written into the single-assignment caches on the nodes themselves.

use indexmap::{IndexMap, IndexSet};
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::parse::is_identifier;
use crate::tree::{AppTree, ComponentNode};
use crate::validate::{CompilerError, INV_DUPLICATE_COMPONENT};
use crate::visitor::nodes_of;

lazy_static! {
    static ref NON_IDENT_RE: Regex = Regex::new(r"[^A-Za-z0-9_$]+").unwrap();
    static ref CAMEL_BOUNDARY_RE: Regex = Regex::new(r"([a-z0-9])([A-Z])").unwrap();
    static ref NON_CLASS_RE: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Set of identifiers taken in the generated program.
///
/// `claim` hands out `base`, then `base2`, `base3`, ... (with `separator`
/// between base and counter).
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    taken: IndexSet<String>,
    separator: &'static str,
}

impl NameRegistry {
    pub fn with_separator(separator: &'static str) -> Self {
        NameRegistry {
            taken: IndexSet::new(),
            separator,
        }
    }

    /// Returns false when the name is already taken.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.taken.insert(name.to_string())
    }

    pub fn claim(&mut self, base: &str) -> String {
        if self.reserve(base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}{}{}", base, self.separator, n);
            if self.reserve(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Where a component name resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEntry {
    pub identifier: String,
    /// Index of the top-level definition whose file holds the function.
    pub owner: usize,
    pub top_level: bool,
    pub path: String,
}

/// Frozen result of name resolution, shared read-only by later stages.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    /// Document name → entry, for explicitly named definitions.
    components: IndexMap<String, ComponentEntry>,
    identifiers: NameRegistry,
}

impl NameTable {
    /// Looks up an element `type` against the component registry.
    pub fn component(&self, type_name: &str) -> Option<&ComponentEntry> {
        self.components.get(type_name)
    }

    /// Claims a fresh program-level identifier (used for context objects).
    pub fn claim_identifier(&mut self, base: &str) -> String {
        self.identifiers.claim(base)
    }
}

/// `my card` -> `my_card`; leading digits get a `_` prefix.
pub fn to_identifier(name: &str) -> String {
    if is_identifier(name) {
        return name.to_string();
    }
    let cleaned = NON_IDENT_RE.replace_all(name.trim(), "_").to_string();
    match cleaned.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("_{}", cleaned),
        Some(_) => cleaned,
        None => "_".to_string(),
    }
}

/// `PrimaryButton` -> `primary-button`
pub fn to_kebab(name: &str) -> String {
    let split = CAMEL_BOUNDARY_RE.replace_all(name, "$1-$2").to_lowercase();
    let cleaned = NON_CLASS_RE.replace_all(&split, "-");
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "node".to_string()
    } else {
        trimmed.to_string()
    }
}

fn path_hash(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    format!("{:x}", digest)[..6].to_string()
}

/// Resolve every component identifier and generated class name in `app`.
pub fn resolve_names(app: &AppTree) -> Result<NameTable, Vec<CompilerError>> {
    let mut table = NameTable {
        components: IndexMap::new(),
        identifiers: NameRegistry::with_separator(""),
    };
    let mut errors = vec![];

    // Pass 1: explicit names, reserved in document order.
    for (owner, component) in app.components.iter().enumerate() {
        for def in nodes_of(component).into_iter().filter(|n| n.is_definition()) {
            let Some(name) = &def.name else { continue };
            if let Some(previous) = table.components.get(name) {
                errors.push(
                    CompilerError::conflict(
                        INV_DUPLICATE_COMPONENT,
                        &def.path,
                        format!("component name '{}' is already declared", name),
                    )
                    .with_related(previous.path.clone()),
                );
                continue;
            }
            let identifier = table.identifiers.claim(&to_identifier(name));
            def.assign_name(identifier.clone());
            table.components.insert(
                name.clone(),
                ComponentEntry {
                    identifier,
                    owner,
                    top_level: std::ptr::eq(def, component),
                    path: def.path.clone(),
                },
            );
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    // Pass 2: anonymous inline definitions, named after their owner and position.
    for component in &app.components {
        let owner = component.resolved_name().unwrap_or("Component").to_string();
        for def in nodes_of(component).into_iter().skip(1) {
            if !def.is_definition() || def.resolved_name().is_some() {
                continue;
            }
            let base = format!("{}Part{}", owner, relative_position(component, def));
            def.assign_name(table.identifiers.claim(&base));
        }
    }

    // Pass 3: class names for nodes carrying static style.
    let mut classes = NameRegistry::with_separator("-");
    for component in &app.components {
        let mut owner = component.resolved_name().unwrap_or("component");
        for node in nodes_of(component) {
            if node.is_definition() {
                owner = node.resolved_name().unwrap_or(owner);
            }
            if !node.has_static_style() {
                continue;
            }
            let stem = match (&node.name, node.is_definition()) {
                (Some(explicit), false) => to_kebab(explicit),
                _ => to_kebab(owner),
            };
            let class = classes.claim(&format!("{}-{}", stem, path_hash(&node.path)));
            node.assign_class_name(class);
        }
    }

    debug!(
        components = table.components.len(),
        classes = classes.taken.len(),
        "names resolved"
    );
    Ok(table)
}

fn relative_position(owner: &ComponentNode, node: &ComponentNode) -> String {
    node.position[owner.position.len().min(node.position.len())..]
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::load_app;
    use crate::tree::Child;
    use crate::validate::ErrorKind;
    use serde_json::json;

    fn inline(node: &ComponentNode, index: usize) -> &ComponentNode {
        match &node.children[index] {
            Child::Node(n) => n,
            other => panic!("expected node child, found {:?}", other),
        }
    }

    #[test]
    fn test_claim_suffixes() {
        let mut registry = NameRegistry::with_separator("");
        assert_eq!(registry.claim("Card"), "Card");
        assert_eq!(registry.claim("Card"), "Card2");
        assert_eq!(registry.claim("Card"), "Card3");
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(to_kebab("PrimaryButton"), "primary-button");
        assert_eq!(to_kebab("App_Part0_1"), "app-part0-1");
        assert_eq!(to_identifier("my card"), "my_card");
        assert_eq!(to_identifier("3d"), "_3d");
    }

    #[test]
    fn test_duplicate_component_names_conflict() {
        let app = load_app(&json!({"components": [
            {"name": "Card"},
            {"name": "Other", "children": [{"type": "Component", "name": "Card"}]}
        ]}))
        .unwrap();
        let errors = resolve_names(&app).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Conflict);
        assert_eq!(errors[0].path, "components[1].children[0]");
        assert_eq!(errors[0].related, vec!["components[0]".to_string()]);
    }

    #[test]
    fn test_anonymous_inline_names_avoid_explicit_ones() {
        let app = load_app(&json!({"components": [
            {"name": "App", "children": [
                {"type": "Component"},
                {"type": "div", "children": [{"type": "Component"}]}
            ]},
            {"name": "AppPart0"}
        ]}))
        .unwrap();
        resolve_names(&app).unwrap();
        let root = &app.components[0];
        assert_eq!(inline(root, 0).resolved_name(), Some("AppPart02"));
        assert_eq!(inline(inline(root, 1), 0).resolved_name(), Some("AppPart1_0"));
    }

    #[test]
    fn test_class_names_are_stable_and_unique() {
        let doc = json!({"components": [
            {"name": "Card", "style": ".x { color: red; }", "children": [
                {"type": "span", "style": [{"selector": "&:hover", "style": {"opacity": 1}}]},
                {"type": "span", "name": "Label", "style": ".y {}"},
                {"type": "span", "style": {"color": "red"}}
            ]}
        ]});
        let first = load_app(&doc).unwrap();
        resolve_names(&first).unwrap();
        let second = load_app(&doc).unwrap();
        resolve_names(&second).unwrap();

        let classes = |app: &AppTree| -> Vec<Option<String>> {
            nodes_of(&app.components[0])
                .iter()
                .map(|n| n.class_name().map(str::to_string))
                .collect()
        };
        let names = classes(&first);
        assert_eq!(names, classes(&second));
        assert!(names[0].as_deref().unwrap().starts_with("card-"));
        assert!(names[1].as_deref().unwrap().starts_with("card-"));
        assert_ne!(names[0], names[1]);
        assert!(names[2].as_deref().unwrap().starts_with("label-"));
        assert_eq!(names[3], None);
    }

    #[test]
    fn test_component_lookup() {
        let app = load_app(&json!({"components": [
            {"name": "App", "children": [{"type": "Component", "name": "Row"}]}
        ]}))
        .unwrap();
        let table = resolve_names(&app).unwrap();
        let row = table.component("Row").unwrap();
        assert_eq!(row.owner, 0);
        assert!(!row.top_level);
        assert!(table.component("App").unwrap().top_level);
        assert!(table.component("div").is_none());
    }
}
