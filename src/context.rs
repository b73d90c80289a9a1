//! Context binding.
//!
//! First pass registers every `provideContexts` name app-wide (at most one
//! provider per name), second pass resolves every `useContexts` against it.
//! The registry is frozen before code generation starts.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::renamer::NameTable;
use crate::tree::{AppTree, ComponentNode};
use crate::validate::{CompilerError, ErrorKind, INV_DUPLICATE_CONTEXT, INV_UNKNOWN_CONTEXT};
use crate::visitor::definitions_of;

pub const CREATE_CONTEXT: &str = "createContext";
pub const USE_CONTEXT: &str = "useContext";
/// Output path of the module creating every context, relative to the output root.
pub const CONTEXTS_MODULE: &str = "contexts.js";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSpec {
    pub name: String,
    /// Generated program identifier of the context object (`ThemeContext`).
    pub identifier: String,
    pub provider: String,
    pub path: String,
}

/// `<ThemeContext.Provider value={theme}>` around a component's markup.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvideWrap {
    pub identifier: String,
    pub value: String,
}

/// `const Theme = useContext(ThemeContext);` at the top of a component body.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumeBinding {
    pub local: String,
    pub identifier: String,
}

impl ConsumeBinding {
    /// `keyword` is `var` when the local is bound again in the same function.
    pub fn declare(&self, keyword: &str) -> String {
        format!("{} {} = {}({});", keyword, self.local, USE_CONTEXT, self.identifier)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextRegistry {
    contexts: IndexMap<String, ContextSpec>,
}

impl ContextRegistry {
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ContextSpec> {
        self.contexts.get(name)
    }

    pub fn provides(&self, node: &ComponentNode) -> Vec<ProvideWrap> {
        node.provide_contexts
            .iter()
            .filter_map(|p| {
                self.get(&p.name).map(|spec| ProvideWrap {
                    identifier: spec.identifier.clone(),
                    value: p.value.clone(),
                })
            })
            .collect()
    }

    pub fn consumes(&self, node: &ComponentNode) -> Vec<ConsumeBinding> {
        node.use_contexts
            .iter()
            .filter_map(|name| {
                self.get(name).map(|spec| ConsumeBinding {
                    local: name.clone(),
                    identifier: spec.identifier.clone(),
                })
            })
            .collect()
    }

    /// Source of the shared module creating every context, in declaration order.
    pub fn render_module(&self) -> String {
        let mut out = format!("import {{ {} }} from 'react';\n\n", CREATE_CONTEXT);
        for spec in self.contexts.values() {
            out.push_str(&format!(
                "export const {} = {}(undefined);\n",
                spec.identifier, CREATE_CONTEXT
            ));
        }
        out
    }
}

fn context_base(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("{}{}Context", first.to_uppercase(), chars.as_str()),
        None => "Context".to_string(),
    }
}

pub fn bind_contexts(
    app: &AppTree,
    names: &mut NameTable,
) -> Result<ContextRegistry, Vec<CompilerError>> {
    let mut registry = ContextRegistry::default();
    let mut errors = vec![];

    let definitions: Vec<&ComponentNode> = app
        .components
        .iter()
        .flat_map(definitions_of)
        .collect();

    for def in &definitions {
        for provision in &def.provide_contexts {
            if let Some(existing) = registry.contexts.get(&provision.name) {
                errors.push(
                    CompilerError::new(
                        ErrorKind::DuplicateContext,
                        INV_DUPLICATE_CONTEXT,
                        &def.path,
                        format!(
                            "context '{}' is provided by both '{}' and '{}'",
                            provision.name,
                            existing.provider,
                            def.display_name()
                        ),
                    )
                    .with_related(existing.path.clone()),
                );
                continue;
            }
            let identifier = names.claim_identifier(&context_base(&provision.name));
            registry.contexts.insert(
                provision.name.clone(),
                ContextSpec {
                    name: provision.name.clone(),
                    identifier,
                    provider: def.display_name().to_string(),
                    path: def.path.clone(),
                },
            );
        }
    }

    for def in &definitions {
        for (i, name) in def.use_contexts.iter().enumerate() {
            if !registry.contexts.contains_key(name) {
                errors.push(CompilerError::new(
                    ErrorKind::UnknownContext,
                    INV_UNKNOWN_CONTEXT,
                    &format!("{}.useContexts[{}]", def.path, i),
                    format!(
                        "component '{}' consumes context '{}' which no component provides",
                        def.display_name(),
                        name
                    ),
                ));
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    debug!(contexts = registry.contexts.len(), "contexts bound");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::load_app;
    use crate::renamer::resolve_names;
    use serde_json::{json, Value};

    fn bind(doc: Value) -> Result<ContextRegistry, Vec<CompilerError>> {
        let app = load_app(&doc).unwrap();
        let mut names = resolve_names(&app).unwrap();
        bind_contexts(&app, &mut names)
    }

    #[test]
    fn test_duplicate_provider_names_both_components() {
        let errors = bind(json!({"components": [
            {"name": "First", "provideContexts": ["X"]},
            {"name": "Second", "provideContexts": ["X"]}
        ]}))
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::DuplicateContext);
        assert!(errors[0].message.contains("First"));
        assert!(errors[0].message.contains("Second"));
        assert_eq!(errors[0].related, vec!["components[0]".to_string()]);
    }

    #[test]
    fn test_unknown_context_names_consumer() {
        let errors = bind(json!({"components": [
            {"name": "App", "useContexts": ["Theme"]}
        ]}))
        .unwrap_err();
        assert_eq!(errors[0].kind, ErrorKind::UnknownContext);
        assert_eq!(errors[0].path, "components[0].useContexts[0]");
        assert!(errors[0].message.contains("App"));
        assert!(errors[0].message.contains("Theme"));
    }

    #[test]
    fn test_provide_and_consume_wiring() {
        let app = load_app(&json!({"components": [
            {"name": "App", "provideContexts": {"theme": "currentTheme"}},
            {"name": "Button", "useContexts": ["theme"]}
        ]}))
        .unwrap();
        let mut names = resolve_names(&app).unwrap();
        let registry = bind_contexts(&app, &mut names).unwrap();

        let provides = registry.provides(&app.components[0]);
        assert_eq!(
            provides,
            vec![ProvideWrap {
                identifier: "ThemeContext".into(),
                value: "currentTheme".into()
            }]
        );
        let consumes = registry.consumes(&app.components[1]);
        assert_eq!(
            consumes[0].declare("const"),
            "const theme = useContext(ThemeContext);"
        );
        assert!(registry
            .render_module()
            .contains("export const ThemeContext = createContext(undefined);"));
    }

    #[test]
    fn test_context_identifier_avoids_component_names() {
        let app = load_app(&json!({"components": [
            {"name": "ThemeContext", "provideContexts": ["Theme"]}
        ]}))
        .unwrap();
        let mut names = resolve_names(&app).unwrap();
        let registry = bind_contexts(&app, &mut names).unwrap();
        assert_eq!(registry.get("Theme").unwrap().identifier, "ThemeContext2");
    }
}
