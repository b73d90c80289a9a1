//! Typed app tree.
//!
//! Everything here is built once by the loader (`parse.rs`) and never
//! restructured afterwards. The only writes after loading are the two
//! single-assignment caches on `ComponentNode` (resolved name and generated
//! class name), filled by the renamer before any per-component work starts.

use indexmap::IndexMap;
use serde_json::{Number, Value};
use std::sync::OnceLock;

use crate::config::Platform;

// ═══════════════════════════════════════════════════════════════════════════════
// VALUES AND SCRIPT REFERENCES
// ═══════════════════════════════════════════════════════════════════════════════

/// Returns the inner text of a `{…}` script reference.
pub fn script_ref(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('{') && trimmed.ends_with('}') {
        Some(trimmed[1..trimmed.len() - 1].trim())
    } else {
        None
    }
}

/// A value position: either opaque script or a JSON literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Script(String),
    Literal(Value),
}

impl ValueExpr {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => match script_ref(s) {
                Some(inner) => ValueExpr::Script(inner.to_string()),
                None => ValueExpr::Literal(value.clone()),
            },
            other => ValueExpr::Literal(other.clone()),
        }
    }

    /// Expression text for this value. Literals render as JSON, which is valid JS.
    pub fn to_code(&self) -> String {
        match self {
            ValueExpr::Script(code) => code.clone(),
            ValueExpr::Literal(v) => v.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DESTRUCTURING PATTERNS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    pub key: String,
    pub alias: Option<String>,
    pub default: Option<String>,
}

impl ObjectField {
    pub fn bound_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    pub name: String,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Name(String),
    Object {
        fields: Vec<ObjectField>,
        rest: Option<String>,
    },
    /// `None` items are holes (`[, second]`).
    Array {
        items: Vec<Option<ArrayItem>>,
        rest: Option<String>,
    },
}

impl Pattern {
    /// Names introduced by this pattern, in declaration order, rest last.
    pub fn bound_names(&self) -> Vec<String> {
        match self {
            Pattern::Name(name) => vec![name.clone()],
            Pattern::Object { fields, rest } => fields
                .iter()
                .map(|f| f.bound_name().to_string())
                .chain(rest.iter().cloned())
                .collect(),
            Pattern::Array { items, rest } => items
                .iter()
                .flatten()
                .map(|i| i.name.clone())
                .chain(rest.iter().cloned())
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Pattern::Name(name) => name.clone(),
            Pattern::Object { fields, rest } => {
                let mut parts: Vec<String> = fields
                    .iter()
                    .map(|f| {
                        let mut part = match &f.alias {
                            Some(alias) if alias != &f.key => format!("{}: {}", f.key, alias),
                            _ => f.key.clone(),
                        };
                        if let Some(default) = &f.default {
                            part.push_str(" = ");
                            part.push_str(default);
                        }
                        part
                    })
                    .collect();
                if let Some(rest) = rest {
                    parts.push(format!("...{}", rest));
                }
                format!("{{ {} }}", parts.join(", "))
            }
            Pattern::Array { items, rest } => {
                let mut parts: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Some(ArrayItem {
                            name,
                            default: Some(d),
                        }) => format!("{} = {}", name, d),
                        Some(ArrayItem { name, default: None }) => name.clone(),
                        None => String::new(),
                    })
                    .collect();
                if let Some(rest) = rest {
                    parts.push(format!("...{}", rest));
                }
                format!("[{}]", parts.join(", "))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    Script(String),
    State {
        getter: String,
        setter: String,
        initial: Option<ValueExpr>,
    },
    Var {
        pattern: Pattern,
        value: String,
    },
    Ref {
        name: String,
        initial: Option<ValueExpr>,
    },
    Effect {
        body: String,
        /// `None` means no dependency array: the effect runs after every render.
        dependencies: Option<Vec<String>>,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// STYLES
// ═══════════════════════════════════════════════════════════════════════════════

pub type StyleMap = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum StyleEntry {
    PlainObject(StyleMap),
    Conditional { predicate: String, style: StyleMap },
    Format { format: String, style: StyleMap },
    Selector { selector: String, style: StyleMap },
    StaticString(String),
    DynamicScript(String),
}

impl StyleEntry {
    /// Entries that can land in a generated stylesheet on at least one platform.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            StyleEntry::Format { .. } | StyleEntry::Selector { .. } | StyleEntry::StaticString(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }
}

/// Responsive condition referenced by `format:` style entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormatPredicate {
    pub min_width: Option<Number>,
    pub max_width: Option<Number>,
    pub min_height: Option<Number>,
    pub max_height: Option<Number>,
    pub orientation: Option<Orientation>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct NamedImport {
    pub symbol: String,
    pub alias: Option<String>,
}

impl NamedImport {
    pub fn local(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportKind {
    SideEffect,
    Default(String),
    Namespace(String),
    Named(Vec<NamedImport>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    pub source: String,
    pub kind: ImportKind,
    /// Location in the input document, or a synthetic origin for implicit imports.
    pub path: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum PropEntry {
    Attributes(IndexMap<String, ValueExpr>),
    Spread(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextProvision {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Component definition; `params` is the destructured props parameter.
    Component { params: Option<Pattern> },
    Element(String),
    Map {
        data: String,
        var: Pattern,
        index: Option<String>,
    },
    If {
        condition: String,
        otherwise: Vec<Child>,
    },
    Script(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Node(Box<ComponentNode>),
    Text(String),
    Primitive(Value),
    Script(String),
}

#[derive(Debug, Default)]
pub struct ComponentNode {
    pub name: Option<String>,
    pub kind: NodeKind,
    pub props: Vec<PropEntry>,
    pub children: Vec<Child>,
    pub expressions: Vec<ExpressionNode>,
    pub imports: Vec<ImportSpec>,
    pub style: Vec<StyleEntry>,
    pub provide_contexts: Vec<ContextProvision>,
    pub use_contexts: Vec<String>,
    pub style_sheet: Option<String>,
    pub style_module: Option<String>,
    /// Location in the input document (`components[0].children[2]`).
    pub path: String,
    /// Sibling indices from the app root down to this node.
    pub position: Vec<usize>,
    resolved_name: OnceLock<String>,
    class_name: OnceLock<String>,
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Component { params: None }
    }
}

impl Clone for ComponentNode {
    fn clone(&self) -> Self {
        ComponentNode {
            name: self.name.clone(),
            kind: self.kind.clone(),
            props: self.props.clone(),
            children: self.children.clone(),
            expressions: self.expressions.clone(),
            imports: self.imports.clone(),
            style: self.style.clone(),
            provide_contexts: self.provide_contexts.clone(),
            use_contexts: self.use_contexts.clone(),
            style_sheet: self.style_sheet.clone(),
            style_module: self.style_module.clone(),
            path: self.path.clone(),
            position: self.position.clone(),
            resolved_name: self.resolved_name.clone(),
            class_name: self.class_name.clone(),
        }
    }
}

impl PartialEq for ComponentNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.props == other.props
            && self.children == other.children
            && self.expressions == other.expressions
            && self.imports == other.imports
            && self.style == other.style
            && self.path == other.path
    }
}

impl ComponentNode {
    pub fn new(kind: NodeKind, path: impl Into<String>, position: Vec<usize>) -> Self {
        ComponentNode {
            kind,
            path: path.into(),
            position,
            ..Default::default()
        }
    }

    pub fn is_definition(&self) -> bool {
        matches!(self.kind, NodeKind::Component { .. })
    }

    /// The `type` string as written in the document.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            NodeKind::Component { .. } => "Component",
            NodeKind::Element(tag) => tag,
            NodeKind::Map { .. } => "Map",
            NodeKind::If { .. } => "If",
            NodeKind::Script(_) => "Script",
        }
    }

    pub fn has_static_style(&self) -> bool {
        self.style.iter().any(StyleEntry::is_static)
    }

    /// Final identifier; set once by the renamer for every definition.
    pub fn resolved_name(&self) -> Option<&str> {
        self.resolved_name.get().map(String::as_str)
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.get().map(String::as_str)
    }

    /// Returns false if a name was already assigned.
    pub(crate) fn assign_name(&self, name: String) -> bool {
        self.resolved_name.set(name).is_ok()
    }

    pub(crate) fn assign_class_name(&self, name: String) -> bool {
        self.class_name.set(name).is_ok()
    }

    /// Best available identifier for diagnostics.
    pub fn display_name(&self) -> &str {
        self.resolved_name()
            .or(self.name.as_deref())
            .unwrap_or(&self.path)
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = &ComponentNode> {
        let otherwise = match &self.kind {
            NodeKind::If { otherwise, .. } => otherwise.as_slice(),
            _ => &[],
        };
        self.children
            .iter()
            .chain(otherwise.iter())
            .filter_map(|c| match c {
                Child::Node(node) => Some(node.as_ref()),
                _ => None,
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// APP
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct AppTree {
    pub name: Option<String>,
    pub platform: Option<Platform>,
    pub dependencies: IndexMap<String, String>,
    pub imports: Vec<ImportSpec>,
    pub style_sheet: String,
    pub style_module: String,
    pub style_formats: IndexMap<String, FormatPredicate>,
    pub root_component: Option<String>,
    pub components: Vec<ComponentNode>,
}
