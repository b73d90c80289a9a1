//! Parse Module for the uitree compiler
//!
//! Turns the raw JSON document into a typed `AppTree`. Every JSON shorthand
//! (expressions, styles, imports, patterns, children) is decided here by a
//! single discriminating check, so later stages only ever match on enums.
//!
//! The loader never stops at the first problem: every structural error is
//! collected with its path and the whole list is returned.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Platform;
use crate::tree::{
    script_ref, AppTree, ArrayItem, Child, ComponentNode, ContextProvision, ExpressionNode,
    FormatPredicate, ImportKind, ImportSpec, NamedImport, NodeKind, ObjectField, Orientation,
    Pattern, PropEntry, StyleEntry, StyleMap, ValueExpr,
};
use crate::validate::{
    CompilerError, INV_INVALID_CHILD, INV_INVALID_DOCUMENT, INV_INVALID_EXPRESSION,
    INV_INVALID_FORMAT_PREDICATE, INV_INVALID_IMPORT, INV_INVALID_NODE_TYPE, INV_INVALID_STYLE,
    INV_MALFORMED_PATTERN, INV_MISPLACED_CONTEXT, INV_MISSING_NAME, INV_UNKNOWN_FORMAT,
    INV_UNKNOWN_ROOT,
};

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
    static ref NAMESPACE_IMPORT_RE: Regex =
        Regex::new(r"^\*\s+as\s+([A-Za-z_$][A-Za-z0-9_$]*)$").unwrap();
}

pub const COMPONENT_TYPE: &str = "Component";
const FORMAT_KEYS: [&str; 5] = ["minWidth", "maxWidth", "minHeight", "maxHeight", "orientation"];

pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Load and validate a whole document.
pub fn load_app(document: &Value) -> Result<AppTree, Vec<CompilerError>> {
    let mut loader = Loader::default();
    let app = loader.app(document);
    if loader.errors.is_empty() {
        debug!(components = app.components.len(), "document loaded");
        Ok(app)
    } else {
        Err(loader.errors)
    }
}

#[derive(Default)]
struct Loader {
    errors: Vec<CompilerError>,
    /// (format name, path of the referencing style entry)
    format_refs: Vec<(String, String)>,
}

impl Loader {
    fn error(&mut self, code: &str, path: &str, message: impl Into<String>) {
        self.errors.push(CompilerError::structural(code, path, message));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FIELD HELPERS
    // ═══════════════════════════════════════════════════════════════════════════

    fn opt_string(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.error(
                    INV_INVALID_DOCUMENT,
                    &format!("{}.{}", path, key),
                    format!("`{}` must be a string", key),
                );
                None
            }
        }
    }

    fn required_code(
        &mut self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
        code: &str,
        what: &str,
    ) -> Option<String> {
        match obj.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => {
                self.error(
                    code,
                    path,
                    format!("{} requires a non-empty `{}` script", what, key),
                );
                None
            }
        }
    }

    fn identifier(&mut self, value: &Value, path: &str, code: &str) -> Option<String> {
        match value {
            Value::String(s) if is_identifier(s) => Some(s.clone()),
            Value::String(s) => {
                self.error(code, path, format!("'{}' is not a valid identifier", s));
                None
            }
            _ => {
                self.error(code, path, "expected an identifier string");
                None
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // APP
    // ═══════════════════════════════════════════════════════════════════════════

    fn app(&mut self, document: &Value) -> AppTree {
        let mut app = AppTree::default();
        let Some(root) = document.as_object() else {
            self.error(INV_INVALID_DOCUMENT, "$", "document root must be an object");
            return app;
        };

        match root.get("type") {
            None | Some(Value::Null) => {}
            Some(Value::String(t)) if t == "app" => {}
            Some(other) => self.error(
                INV_INVALID_DOCUMENT,
                "type",
                format!("document type must be 'app', found {}", other),
            ),
        }

        app.name = self.opt_string(root, "name", "$");
        if let Some(p) = self.opt_string(root, "platform", "$") {
            match p.parse::<Platform>() {
                Ok(platform) => app.platform = Some(platform),
                Err(reason) => self.error(INV_INVALID_DOCUMENT, "platform", reason),
            }
        }

        match root.get("dependencies") {
            None | Some(Value::Null) => {}
            Some(Value::Object(deps)) => {
                for (pkg, version) in deps {
                    match version.as_str() {
                        Some(v) => {
                            app.dependencies.insert(pkg.clone(), v.to_string());
                        }
                        None => self.error(
                            INV_INVALID_DOCUMENT,
                            &format!("dependencies.{}", pkg),
                            "dependency versions must be strings",
                        ),
                    }
                }
            }
            Some(_) => self.error(
                INV_INVALID_DOCUMENT,
                "dependencies",
                "`dependencies` must be an object",
            ),
        }

        if let Some(imports) = root.get("imports") {
            app.imports = self.imports(imports, "imports");
        }
        app.style_sheet = self.opt_string(root, "styleSheet", "$").unwrap_or_default();
        app.style_module = self.opt_string(root, "styleModule", "$").unwrap_or_default();

        match root.get("styleFormats") {
            None | Some(Value::Null) => {}
            Some(Value::Object(formats)) => {
                for (name, predicate) in formats {
                    let path = format!("styleFormats.{}", name);
                    if let Some(p) = self.format_predicate(predicate, &path) {
                        app.style_formats.insert(name.clone(), p);
                    }
                }
            }
            Some(_) => self.error(
                INV_INVALID_DOCUMENT,
                "styleFormats",
                "`styleFormats` must be an object",
            ),
        }

        app.root_component = self.opt_string(root, "rootComponent", "$");

        match root.get("components") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    let path = format!("components[{}]", i);
                    if let Some(component) = self.definition(item, &path, vec![i]) {
                        app.components.push(component);
                    }
                }
            }
            Some(_) => self.error(
                INV_INVALID_DOCUMENT,
                "components",
                "`components` must be an array",
            ),
        }

        let refs = std::mem::take(&mut self.format_refs);
        for (format, path) in refs {
            if !app.style_formats.contains_key(&format) {
                self.error(
                    INV_UNKNOWN_FORMAT,
                    &path,
                    format!("style format '{}' is not declared in styleFormats", format),
                );
            }
        }

        if let Some(root_name) = &app.root_component {
            let declared = app
                .components
                .iter()
                .any(|c| c.name.as_deref() == Some(root_name.as_str()));
            if !declared {
                let message = format!("root component '{}' is not declared", root_name);
                self.error(INV_UNKNOWN_ROOT, "rootComponent", message);
            }
        }

        app
    }

    fn format_predicate(&mut self, value: &Value, path: &str) -> Option<FormatPredicate> {
        let Some(obj) = value.as_object() else {
            self.error(
                INV_INVALID_FORMAT_PREDICATE,
                path,
                "format predicate must be an object",
            );
            return None;
        };
        let mut predicate = FormatPredicate::default();
        let mut ok = true;
        for (key, v) in obj {
            let key_path = format!("{}.{}", path, key);
            match (key.as_str(), v) {
                ("orientation", Value::String(o)) if o == "portrait" => {
                    predicate.orientation = Some(Orientation::Portrait)
                }
                ("orientation", Value::String(o)) if o == "landscape" => {
                    predicate.orientation = Some(Orientation::Landscape)
                }
                ("minWidth", Value::Number(n)) => predicate.min_width = Some(n.clone()),
                ("maxWidth", Value::Number(n)) => predicate.max_width = Some(n.clone()),
                ("minHeight", Value::Number(n)) => predicate.min_height = Some(n.clone()),
                ("maxHeight", Value::Number(n)) => predicate.max_height = Some(n.clone()),
                (k, _) if FORMAT_KEYS.contains(&k) => {
                    ok = false;
                    self.error(
                        INV_INVALID_FORMAT_PREDICATE,
                        &key_path,
                        format!("invalid value {} for predicate key '{}'", v, k),
                    );
                }
                (k, _) => {
                    ok = false;
                    self.error(
                        INV_INVALID_FORMAT_PREDICATE,
                        &key_path,
                        format!(
                            "unknown predicate key '{}', expected one of {}",
                            k,
                            FORMAT_KEYS.join(", ")
                        ),
                    );
                }
            }
        }
        if ok && predicate == FormatPredicate::default() {
            self.error(
                INV_INVALID_FORMAT_PREDICATE,
                path,
                "format predicate must set at least one condition",
            );
            return None;
        }
        ok.then_some(predicate)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // NODES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Top-level entry of `components`.
    fn definition(&mut self, value: &Value, path: &str, position: Vec<usize>) -> Option<ComponentNode> {
        let Some(obj) = value.as_object() else {
            self.error(
                INV_INVALID_NODE_TYPE,
                path,
                "component definitions must be objects",
            );
            return None;
        };
        match obj.get("type") {
            None => {}
            Some(Value::String(t)) if t == COMPONENT_TYPE => {}
            Some(other) => self.error(
                INV_INVALID_NODE_TYPE,
                &format!("{}.type", path),
                format!(
                    "top-level entries must have type '{}', found {}",
                    COMPONENT_TYPE, other
                ),
            ),
        }
        match obj.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => {}
            _ => self.error(
                INV_MISSING_NAME,
                path,
                "component definition requires a non-empty `name`",
            ),
        }
        let params = self.params(obj, path);
        Some(self.node_body(obj, NodeKind::Component { params }, path, position))
    }

    fn node(&mut self, obj: &Map<String, Value>, path: &str, position: Vec<usize>) -> Option<ComponentNode> {
        let type_name = match obj.get("type") {
            Some(Value::String(t)) if !t.trim().is_empty() => t.as_str(),
            Some(_) => {
                self.error(
                    INV_INVALID_NODE_TYPE,
                    &format!("{}.type", path),
                    "node `type` must be a non-empty string",
                );
                return None;
            }
            None => {
                self.error(INV_INVALID_NODE_TYPE, path, "node requires a `type`");
                return None;
            }
        };

        let kind = match type_name {
            COMPONENT_TYPE => {
                if let Some(name) = obj.get("name") {
                    if !matches!(name, Value::String(n) if !n.trim().is_empty()) {
                        self.error(
                            INV_MISSING_NAME,
                            path,
                            "inline component `name`, when given, must be a non-empty string",
                        );
                    }
                }
                NodeKind::Component {
                    params: self.params(obj, path),
                }
            }
            "Map" => {
                let data = self.required_code(obj, "data", path, INV_INVALID_CHILD, "Map node");
                let var = match obj.get("var") {
                    Some(v) => self.pattern(v, &format!("{}.var", path)),
                    None => Some(Pattern::Name("item".to_string())),
                };
                let index = match obj.get("index") {
                    Some(v) => self.identifier(v, &format!("{}.index", path), INV_MALFORMED_PATTERN),
                    None => None,
                };
                NodeKind::Map {
                    data: data.unwrap_or_default(),
                    var: var.unwrap_or_else(|| Pattern::Name("item".to_string())),
                    index,
                }
            }
            "If" => {
                let condition =
                    self.required_code(obj, "condition", path, INV_INVALID_CHILD, "If node");
                let otherwise = match obj.get("else") {
                    Some(v) => {
                        let offset = child_count(obj.get("children"));
                        self.children(v, &format!("{}.else", path), &position, offset)
                    }
                    None => vec![],
                };
                NodeKind::If {
                    condition: condition.unwrap_or_default(),
                    otherwise,
                }
            }
            "Script" => {
                let code = self.required_code(obj, "code", path, INV_INVALID_CHILD, "Script node");
                NodeKind::Script(code.unwrap_or_default())
            }
            tag => NodeKind::Element(tag.to_string()),
        };

        Some(self.node_body(obj, kind, path, position))
    }

    /// Fields shared by every node kind.
    fn node_body(
        &mut self,
        obj: &Map<String, Value>,
        kind: NodeKind,
        path: &str,
        position: Vec<usize>,
    ) -> ComponentNode {
        let mut node = ComponentNode::new(kind, path, position);
        let is_definition = node.is_definition();

        node.name = match obj.get("name") {
            Some(Value::String(n)) if !n.trim().is_empty() => Some(n.trim().to_string()),
            _ => None,
        };

        if !is_definition {
            if let Some(props) = obj.get("props") {
                node.props = self.props(props, &format!("{}.props", path));
            }
        }
        if let Some(children) = obj.get("children") {
            node.children = self.children(children, &format!("{}.children", path), &node.position, 0);
        }
        if let Some(expressions) = obj.get("expressions") {
            if is_definition {
                node.expressions = self.expressions(expressions, &format!("{}.expressions", path));
            } else {
                self.error(
                    INV_INVALID_EXPRESSION,
                    &format!("{}.expressions", path),
                    format!(
                        "expressions are only allowed on component definitions, not on '{}'",
                        node.type_name()
                    ),
                );
            }
        }
        if let Some(imports) = obj.get("imports") {
            node.imports = self.imports(imports, &format!("{}.imports", path));
        }
        if let Some(style) = obj.get("style") {
            node.style = self.styles(style, &format!("{}.style", path));
        }

        for key in ["provideContexts", "useContexts"] {
            let Some(value) = obj.get(key) else { continue };
            let key_path = format!("{}.{}", path, key);
            if !is_definition {
                self.error(
                    INV_MISPLACED_CONTEXT,
                    &key_path,
                    format!("`{}` is only allowed on component definitions", key),
                );
                continue;
            }
            if key == "provideContexts" {
                node.provide_contexts = self.provisions(value, &key_path);
            } else {
                node.use_contexts = self.context_names(value, &key_path);
            }
        }

        for key in ["styleSheet", "styleModule"] {
            let Some(text) = self.opt_string(obj, key, path) else { continue };
            if !is_definition {
                self.error(
                    INV_INVALID_STYLE,
                    &format!("{}.{}", path, key),
                    format!("`{}` overrides are only allowed on component definitions", key),
                );
            } else if key == "styleSheet" {
                node.style_sheet = Some(text);
            } else {
                node.style_module = Some(text);
            }
        }

        node
    }

    /// `else` children are numbered after the regular ones so positions stay distinct.
    fn children(&mut self, value: &Value, path: &str, parent: &[usize], offset: usize) -> Vec<Child> {
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        let mut children = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let child_path = format!("{}[{}]", path, i);
            match item {
                Value::String(text) if text.trim_start().starts_with('{') => match script_ref(text) {
                    Some(code) if !code.is_empty() => children.push(Child::Script(code.to_string())),
                    _ => self.error(
                        INV_INVALID_CHILD,
                        &child_path,
                        format!("malformed script reference '{}'", text),
                    ),
                },
                Value::String(text) => children.push(Child::Text(text.clone())),
                Value::Number(_) | Value::Bool(_) | Value::Null => {
                    children.push(Child::Primitive(item.clone()))
                }
                Value::Object(obj) => {
                    let mut position = parent.to_vec();
                    position.push(offset + i);
                    if let Some(node) = self.node(obj, &child_path, position) {
                        children.push(Child::Node(Box::new(node)));
                    }
                }
                Value::Array(_) => self.error(
                    INV_INVALID_CHILD,
                    &child_path,
                    "nested child arrays are not allowed",
                ),
            }
        }
        children
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PROPS
    // ═══════════════════════════════════════════════════════════════════════════

    fn params(&mut self, obj: &Map<String, Value>, path: &str) -> Option<Pattern> {
        match obj.get("props") {
            None | Some(Value::Null) => None,
            Some(v) => self.pattern(v, &format!("{}.props", path)),
        }
    }

    fn props(&mut self, value: &Value, path: &str) -> Vec<PropEntry> {
        match value {
            Value::Null => vec![],
            Value::Object(map) => vec![PropEntry::Attributes(attributes(map))],
            Value::String(s) => self.spread(s, path).into_iter().collect(),
            Value::Array(items) => {
                let mut entries = vec![];
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    match item {
                        Value::Object(map) => entries.push(PropEntry::Attributes(attributes(map))),
                        Value::String(s) => entries.extend(self.spread(s, &item_path)),
                        _ => self.error(
                            INV_INVALID_CHILD,
                            &item_path,
                            "prop entries must be objects or `{…}` spread scripts",
                        ),
                    }
                }
                entries
            }
            _ => {
                self.error(
                    INV_INVALID_CHILD,
                    path,
                    "props must be an object or an array of entries",
                );
                vec![]
            }
        }
    }

    fn spread(&mut self, raw: &str, path: &str) -> Option<PropEntry> {
        match script_ref(raw) {
            Some(code) if !code.is_empty() => {
                let code = code.strip_prefix("...").unwrap_or(code).trim();
                Some(PropEntry::Spread(code.to_string()))
            }
            _ => {
                self.error(
                    INV_INVALID_CHILD,
                    path,
                    format!("spread prop entries must be `{{…}}` scripts, found '{}'", raw),
                );
                None
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // PATTERNS
    // ═══════════════════════════════════════════════════════════════════════════

    fn pattern(&mut self, value: &Value, path: &str) -> Option<Pattern> {
        let pattern = match value {
            Value::String(name) => {
                if name.starts_with("...") {
                    self.error(
                        INV_MALFORMED_PATTERN,
                        path,
                        "a rest capture must appear inside an object or array pattern",
                    );
                    return None;
                }
                Pattern::Name(self.identifier(value, path, INV_MALFORMED_PATTERN)?)
            }
            Value::Object(map) => self.object_pattern(map, path)?,
            Value::Array(items) => self.array_pattern(items, path)?,
            _ => {
                self.error(
                    INV_MALFORMED_PATTERN,
                    path,
                    "pattern must be a name, an object pattern or an array pattern",
                );
                return None;
            }
        };
        if pattern.bound_names().is_empty() {
            self.error(INV_MALFORMED_PATTERN, path, "pattern binds no names");
            return None;
        }
        Some(pattern)
    }

    fn object_pattern(&mut self, map: &Map<String, Value>, path: &str) -> Option<Pattern> {
        let mut fields = vec![];
        let mut rest: Option<String> = None;
        let mut ok = true;
        let last = map.len().saturating_sub(1);

        for (i, (key, value)) in map.iter().enumerate() {
            let field_path = format!("{}.{}", path, key);
            if let Some(rest_name) = key.strip_prefix("...") {
                let name = if rest_name.is_empty() {
                    self.identifier(value, &field_path, INV_MALFORMED_PATTERN)
                } else {
                    self.identifier(&Value::String(rest_name.to_string()), &field_path, INV_MALFORMED_PATTERN)
                };
                if rest.is_some() {
                    self.error(INV_MALFORMED_PATTERN, &field_path, "rest capture may appear at most once");
                    ok = false;
                } else if i != last {
                    self.error(INV_MALFORMED_PATTERN, &field_path, "rest capture must be the last entry");
                    ok = false;
                }
                match name {
                    Some(n) => rest = Some(n),
                    None => ok = false,
                }
                continue;
            }

            let (alias, default) = match value {
                Value::Null | Value::Bool(true) => (None, None),
                Value::Object(o) if o.is_empty() => (None, None),
                Value::String(_) => (self.identifier(value, &field_path, INV_MALFORMED_PATTERN), None),
                Value::Object(o) => {
                    let alias = match o.get("as") {
                        Some(a) => self.identifier(a, &format!("{}.as", field_path), INV_MALFORMED_PATTERN),
                        None => None,
                    };
                    let default = o.get("default").map(default_code);
                    (alias, default)
                }
                _ => {
                    self.error(
                        INV_MALFORMED_PATTERN,
                        &field_path,
                        "object pattern fields take null, an alias string or {as, default}",
                    );
                    ok = false;
                    continue;
                }
            };
            if alias.is_none() && !is_identifier(key) {
                self.error(
                    INV_MALFORMED_PATTERN,
                    &field_path,
                    format!("property '{}' needs an alias to be bound", key),
                );
                ok = false;
                continue;
            }
            fields.push(ObjectField {
                key: key.clone(),
                alias,
                default,
            });
        }
        ok.then_some(Pattern::Object { fields, rest })
    }

    fn array_pattern(&mut self, items: &[Value], path: &str) -> Option<Pattern> {
        let mut out = vec![];
        let mut rest: Option<String> = None;
        let mut ok = true;
        let last = items.len().saturating_sub(1);

        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", path, i);
            match item {
                Value::Null => out.push(None),
                Value::String(s) if s.starts_with("...") => {
                    let name = self.identifier(&Value::String(s[3..].to_string()), &item_path, INV_MALFORMED_PATTERN);
                    if rest.is_some() {
                        self.error(INV_MALFORMED_PATTERN, &item_path, "rest capture may appear at most once");
                        ok = false;
                    } else if i != last {
                        self.error(INV_MALFORMED_PATTERN, &item_path, "rest capture must be the last entry");
                        ok = false;
                    }
                    match name {
                        Some(n) => rest = Some(n),
                        None => ok = false,
                    }
                }
                Value::String(_) => match self.identifier(item, &item_path, INV_MALFORMED_PATTERN) {
                    Some(name) => out.push(Some(ArrayItem { name, default: None })),
                    None => ok = false,
                },
                Value::Object(o) => {
                    let name = match o.get("name") {
                        Some(n) => self.identifier(n, &format!("{}.name", item_path), INV_MALFORMED_PATTERN),
                        None => {
                            self.error(INV_MALFORMED_PATTERN, &item_path, "array pattern item requires a `name`");
                            None
                        }
                    };
                    match name {
                        Some(name) => out.push(Some(ArrayItem {
                            name,
                            default: o.get("default").map(default_code),
                        })),
                        None => ok = false,
                    }
                }
                _ => {
                    self.error(
                        INV_MALFORMED_PATTERN,
                        &item_path,
                        "array pattern items are names, null holes, {name, default} or '...rest'",
                    );
                    ok = false;
                }
            }
        }
        ok.then_some(Pattern::Array { items: out, rest })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPRESSIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn expressions(&mut self, value: &Value, path: &str) -> Vec<ExpressionNode> {
        let Some(items) = value.as_array() else {
            self.error(INV_INVALID_EXPRESSION, path, "`expressions` must be an array");
            return vec![];
        };
        items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| self.expression(item, &format!("{}[{}]", path, i)))
            .collect()
    }

    fn expression(&mut self, value: &Value, path: &str) -> Option<ExpressionNode> {
        let obj = match value {
            Value::String(code) => return Some(ExpressionNode::Script(code.clone())),
            Value::Object(obj) => obj,
            _ => {
                self.error(
                    INV_INVALID_EXPRESSION,
                    path,
                    "expressions are script strings or typed objects",
                );
                return None;
            }
        };
        let kind = obj.get("type").and_then(Value::as_str).unwrap_or_default();
        match kind {
            "script" => self
                .required_code(obj, "code", path, INV_INVALID_EXPRESSION, "script expression")
                .map(ExpressionNode::Script),
            "state" => {
                let var_path = format!("{}.var", path);
                let (getter, setter) = match obj.get("var") {
                    Some(Value::Array(pair)) if pair.len() == 2 => {
                        let getter = self.identifier(&pair[0], &format!("{}[0]", var_path), INV_MALFORMED_PATTERN);
                        let setter = self.identifier(&pair[1], &format!("{}[1]", var_path), INV_MALFORMED_PATTERN);
                        (getter?, setter?)
                    }
                    Some(single @ Value::String(_)) => {
                        let getter = self.identifier(single, &var_path, INV_MALFORMED_PATTERN)?;
                        let setter = setter_name(&getter);
                        (getter, setter)
                    }
                    _ => {
                        self.error(
                            INV_MALFORMED_PATTERN,
                            &var_path,
                            "state `var` must be a name or a [value, setter] pair",
                        );
                        return None;
                    }
                };
                Some(ExpressionNode::State {
                    getter,
                    setter,
                    initial: obj.get("initialState").map(ValueExpr::from_json),
                })
            }
            "var" => {
                let pattern = match obj.get("var") {
                    Some(v) => self.pattern(v, &format!("{}.var", path)),
                    None => {
                        self.error(INV_MALFORMED_PATTERN, path, "var expression requires a `var` pattern");
                        None
                    }
                };
                let value = match obj.get("value") {
                    Some(v) => Some(default_code(v)),
                    None => {
                        self.error(INV_INVALID_EXPRESSION, path, "var expression requires a `value`");
                        None
                    }
                };
                Some(ExpressionNode::Var {
                    pattern: pattern?,
                    value: value?,
                })
            }
            "ref" => {
                let name = match obj.get("var") {
                    Some(v) => self.identifier(v, &format!("{}.var", path), INV_MALFORMED_PATTERN),
                    None => {
                        self.error(INV_MALFORMED_PATTERN, path, "ref expression requires a `var` name");
                        None
                    }
                }?;
                Some(ExpressionNode::Ref {
                    name,
                    initial: obj.get("initialValue").map(ValueExpr::from_json),
                })
            }
            "effect" => {
                let body = self.required_code(obj, "effect", path, INV_INVALID_EXPRESSION, "effect expression")?;
                let dependencies = match obj.get("dependencies") {
                    None | Some(Value::Null) => None,
                    Some(Value::Array(deps)) => {
                        let mut out = vec![];
                        for (i, dep) in deps.iter().enumerate() {
                            match dep.as_str() {
                                Some(d) => out.push(d.to_string()),
                                None => self.error(
                                    INV_INVALID_EXPRESSION,
                                    &format!("{}.dependencies[{}]", path, i),
                                    "effect dependencies must be script strings",
                                ),
                            }
                        }
                        Some(out)
                    }
                    Some(_) => {
                        self.error(
                            INV_INVALID_EXPRESSION,
                            &format!("{}.dependencies", path),
                            "effect dependencies must be an array",
                        );
                        None
                    }
                };
                Some(ExpressionNode::Effect { body, dependencies })
            }
            other => {
                self.error(
                    INV_INVALID_EXPRESSION,
                    path,
                    format!(
                        "unknown expression type '{}', expected script, state, var, ref or effect",
                        other
                    ),
                );
                None
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STYLES
    // ═══════════════════════════════════════════════════════════════════════════

    fn styles(&mut self, value: &Value, path: &str) -> Vec<StyleEntry> {
        match value {
            Value::Null => vec![],
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| self.style_entry(item, &format!("{}[{}]", path, i)))
                .collect(),
            single => self.style_entry(single, path).into_iter().collect(),
        }
    }

    fn style_entry(&mut self, value: &Value, path: &str) -> Option<StyleEntry> {
        match value {
            Value::String(text) if text.trim_start().starts_with('{') => match script_ref(text) {
                Some(code) if !code.is_empty() => Some(StyleEntry::DynamicScript(code.to_string())),
                _ => {
                    self.error(
                        INV_INVALID_STYLE,
                        path,
                        format!("malformed dynamic style script '{}'", text),
                    );
                    None
                }
            },
            Value::String(text) => Some(StyleEntry::StaticString(text.clone())),
            Value::Object(obj) => {
                if let Some(format) = obj.get("format") {
                    let Some(format) = format.as_str() else {
                        self.error(INV_INVALID_STYLE, path, "`format` must name a style format");
                        return None;
                    };
                    self.format_refs.push((format.to_string(), path.to_string()));
                    let style = self.static_style_map(obj, path)?;
                    Some(StyleEntry::Format {
                        format: format.to_string(),
                        style,
                    })
                } else if let Some(selector) = obj.get("selector") {
                    let Some(selector) = selector.as_str().filter(|s| !s.trim().is_empty()) else {
                        self.error(INV_INVALID_STYLE, path, "`selector` must be a non-empty string");
                        return None;
                    };
                    let style = self.static_style_map(obj, path)?;
                    Some(StyleEntry::Selector {
                        selector: selector.to_string(),
                        style,
                    })
                } else if obj.contains_key("condition") {
                    let predicate = self.required_code(obj, "condition", path, INV_INVALID_STYLE, "conditional style")?;
                    let style = self.style_map(obj, path)?;
                    Some(StyleEntry::Conditional { predicate, style })
                } else if obj.contains_key("script") {
                    self.required_code(obj, "script", path, INV_INVALID_STYLE, "dynamic style")
                        .map(StyleEntry::DynamicScript)
                } else {
                    Some(StyleEntry::PlainObject(
                        obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                    ))
                }
            }
            _ => {
                self.error(
                    INV_INVALID_STYLE,
                    path,
                    "style entries must be objects or strings",
                );
                None
            }
        }
    }

    fn style_map(&mut self, obj: &Map<String, Value>, path: &str) -> Option<StyleMap> {
        match obj.get("style") {
            Some(Value::Object(map)) => Some(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            _ => {
                self.error(
                    INV_INVALID_STYLE,
                    &format!("{}.style", path),
                    "style entry requires a `style` object",
                );
                None
            }
        }
    }

    /// Format and selector maps may become stylesheet text, so values must be literals.
    fn static_style_map(&mut self, obj: &Map<String, Value>, path: &str) -> Option<StyleMap> {
        let map = self.style_map(obj, path)?;
        let mut ok = true;
        for (key, value) in &map {
            if let Some(text) = value.as_str().filter(|t| script_ref(t).is_some()) {
                ok = false;
                self.error(
                    INV_INVALID_STYLE,
                    &format!("{}.style.{}", path, key),
                    format!("static style values cannot be scripts, found '{}'", text),
                );
            }
        }
        ok.then_some(map)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // IMPORTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn imports(&mut self, value: &Value, path: &str) -> Vec<ImportSpec> {
        let items: Vec<&Value> = match value {
            Value::Null => return vec![],
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        let mut specs = vec![];
        for (i, item) in items.into_iter().enumerate() {
            let item_path = if value.is_array() {
                format!("{}[{}]", path, i)
            } else {
                path.to_string()
            };
            specs.extend(self.import_entry(item, &item_path));
        }
        specs
    }

    fn import_entry(&mut self, value: &Value, path: &str) -> Vec<ImportSpec> {
        let spec = |source: &str, kind: ImportKind| ImportSpec {
            source: source.to_string(),
            kind,
            path: path.to_string(),
        };
        let obj = match value {
            Value::String(source) if !source.trim().is_empty() => {
                return vec![spec(source, ImportKind::SideEffect)]
            }
            Value::Object(obj) => obj,
            _ => {
                self.error(
                    INV_INVALID_IMPORT,
                    path,
                    "import entries are source strings or {import, from} objects",
                );
                return vec![];
            }
        };
        let source = match obj.get("from") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => {
                self.error(INV_INVALID_IMPORT, path, "import requires a non-empty `from` source");
                return vec![];
            }
        };

        match obj.get("import") {
            None | Some(Value::Null) => vec![spec(&source, ImportKind::SideEffect)],
            Some(Value::String(symbol)) => {
                let symbol = symbol.trim();
                if let Some(caps) = NAMESPACE_IMPORT_RE.captures(symbol) {
                    vec![spec(&source, ImportKind::Namespace(caps[1].to_string()))]
                } else if symbol == "*" {
                    match obj.get("as") {
                        Some(alias) => self
                            .identifier(alias, &format!("{}.as", path), INV_INVALID_IMPORT)
                            .map(|a| spec(&source, ImportKind::Namespace(a)))
                            .into_iter()
                            .collect(),
                        None => {
                            self.error(INV_INVALID_IMPORT, path, "namespace import requires an alias");
                            vec![]
                        }
                    }
                } else if is_identifier(symbol) {
                    vec![spec(&source, ImportKind::Default(symbol.to_string()))]
                } else {
                    self.error(
                        INV_INVALID_IMPORT,
                        &format!("{}.import", path),
                        format!("'{}' is not an importable name", symbol),
                    );
                    vec![]
                }
            }
            Some(Value::Object(symbols)) if !symbols.is_empty() => {
                let mut out = vec![];
                let mut named = vec![];
                for (symbol, shape) in symbols {
                    let symbol_path = format!("{}.import.{}", path, symbol);
                    let alias = match shape {
                        Value::Null | Value::Bool(true) => None,
                        Value::Object(o) => match o.get("as") {
                            Some(a) => self.identifier(a, &format!("{}.as", symbol_path), INV_INVALID_IMPORT),
                            None => None,
                        },
                        Value::String(_) => self.identifier(shape, &symbol_path, INV_INVALID_IMPORT),
                        _ => {
                            self.error(
                                INV_INVALID_IMPORT,
                                &symbol_path,
                                "imported symbols map to {}, an alias string or {as}",
                            );
                            continue;
                        }
                    };
                    match symbol.as_str() {
                        "default" | "*" => {
                            let Some(alias) = alias else {
                                self.error(
                                    INV_INVALID_IMPORT,
                                    &symbol_path,
                                    format!("'{}' imports require an alias", symbol),
                                );
                                continue;
                            };
                            let kind = if symbol == "*" {
                                ImportKind::Namespace(alias)
                            } else {
                                ImportKind::Default(alias)
                            };
                            out.push(spec(&source, kind));
                        }
                        s if is_identifier(s) => named.push(NamedImport {
                            symbol: s.to_string(),
                            alias,
                        }),
                        s => self.error(
                            INV_INVALID_IMPORT,
                            &symbol_path,
                            format!("'{}' is not an importable name", s),
                        ),
                    }
                }
                if !named.is_empty() {
                    out.push(spec(&source, ImportKind::Named(named)));
                }
                out
            }
            Some(_) => {
                self.error(
                    INV_INVALID_IMPORT,
                    &format!("{}.import", path),
                    "`import` must be a name, '* as Name' or a non-empty symbol map",
                );
                vec![]
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONTEXTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn provisions(&mut self, value: &Value, path: &str) -> Vec<ContextProvision> {
        match value {
            Value::Object(map) => map
                .iter()
                .filter_map(|(name, v)| {
                    let item_path = format!("{}.{}", path, name);
                    let name = self.identifier(&Value::String(name.clone()), &item_path, INV_MISPLACED_CONTEXT)?;
                    let value = match v {
                        Value::Null | Value::Bool(true) => name.clone(),
                        other => default_code(other),
                    };
                    Some(ContextProvision { name, value })
                })
                .collect(),
            _ => self
                .context_names(value, path)
                .into_iter()
                .map(|name| ContextProvision {
                    value: name.clone(),
                    name,
                })
                .collect(),
        }
    }

    fn context_names(&mut self, value: &Value, path: &str) -> Vec<String> {
        match value {
            Value::String(_) => self.identifier(value, path, INV_MISPLACED_CONTEXT).into_iter().collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| {
                    self.identifier(item, &format!("{}[{}]", path, i), INV_MISPLACED_CONTEXT)
                })
                .collect(),
            _ => {
                self.error(
                    INV_MISPLACED_CONTEXT,
                    path,
                    "context lists must be a name or an array of names",
                );
                vec![]
            }
        }
    }
}

fn child_count(children: Option<&Value>) -> usize {
    match children {
        None | Some(Value::Null) => 0,
        Some(Value::Array(items)) => items.len(),
        Some(_) => 1,
    }
}

fn attributes(map: &Map<String, Value>) -> IndexMap<String, ValueExpr> {
    map.iter()
        .map(|(k, v)| (k.clone(), ValueExpr::from_json(v)))
        .collect()
}

/// Code positions accept script strings verbatim and JSON literals as their JS form.
fn default_code(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `count` -> `setCount`
pub fn setter_name(getter: &str) -> String {
    let mut chars = getter.chars();
    match chars.next() {
        Some(first) => format!("set{}{}", first.to_uppercase(), chars.as_str()),
        None => "set".to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ErrorKind;
    use serde_json::json;

    fn load_err(doc: Value) -> Vec<CompilerError> {
        load_app(&doc).expect_err("document should be rejected")
    }

    #[test]
    fn test_loads_minimal_component() {
        let app = load_app(&json!({
            "type": "app",
            "components": [{"type": "Component", "name": "App", "children": "{count}"}]
        }))
        .unwrap();
        assert_eq!(app.components.len(), 1);
        assert_eq!(app.components[0].name.as_deref(), Some("App"));
        assert_eq!(app.components[0].children, vec![Child::Script("count".into())]);
    }

    #[test]
    fn test_accumulates_every_structural_error() {
        let errors = load_err(json!({
            "components": [
                {"type": "Component"},
                {"type": "Component", "name": "B", "children": [{"type": ""}, "{oops"]}
            ]
        }));
        let codes: Vec<&str> = errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![INV_MISSING_NAME, INV_INVALID_NODE_TYPE, INV_INVALID_CHILD]
        );
        assert!(errors.iter().all(|e| e.kind == ErrorKind::Structural));
        assert_eq!(errors[2].path, "components[1].children[1]");
    }

    #[test]
    fn test_unknown_format_reference_is_structural() {
        let errors = load_err(json!({
            "styleFormats": {"wide": {"minWidth": 1024}},
            "components": [{"name": "App", "style": [{"format": "narrow", "style": {"width": 1}}]}]
        }));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, INV_UNKNOWN_FORMAT);
        assert_eq!(errors[0].path, "components[0].style[0]");
    }

    #[test]
    fn test_rest_must_be_last_and_single() {
        let errors = load_err(json!({
            "components": [{"name": "App", "expressions": [
                {"type": "var", "var": ["...rest", "a"], "value": "list"},
                {"type": "var", "var": {"...": "r", "a": {}}, "value": "obj"},
                {"type": "var", "var": ["a", "...b", "...c"], "value": "list"}
            ]}]
        }));
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().all(|e| e.code == INV_MALFORMED_PATTERN));
        assert!(errors[2].message.contains("last entry"));
        assert!(errors[3].message.contains("at most once"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let errors = load_err(json!({
            "components": [{"name": "App", "expressions": [
                {"type": "var", "var": {}, "value": "obj"}
            ]}]
        }));
        assert_eq!(errors[0].message, "pattern binds no names");
    }

    #[test]
    fn test_style_entry_discrimination() {
        let app = load_app(&json!({
            "styleFormats": {"wide": {"minWidth": 1024}},
            "components": [{"name": "App", "style": [
                {"color": "red"},
                {"condition": "active", "style": {"color": "blue"}},
                {"format": "wide", "style": {"width": 30}},
                {"selector": "&:hover", "style": {"opacity": 0.5}},
                ".raw { color: green; }",
                "{dynamicStyle}",
                {"script": "other"}
            ]}]
        }))
        .unwrap();
        let style = &app.components[0].style;
        assert!(matches!(style[0], StyleEntry::PlainObject(_)));
        assert!(matches!(style[1], StyleEntry::Conditional { .. }));
        assert!(matches!(style[2], StyleEntry::Format { .. }));
        assert!(matches!(style[3], StyleEntry::Selector { .. }));
        assert!(matches!(style[4], StyleEntry::StaticString(_)));
        assert_eq!(style[5], StyleEntry::DynamicScript("dynamicStyle".into()));
        assert_eq!(style[6], StyleEntry::DynamicScript("other".into()));
    }

    #[test]
    fn test_static_style_maps_reject_script_values() {
        let errors = load_err(json!({
            "styleFormats": {"wide": {"minWidth": 1024}},
            "components": [{"name": "App", "style": [
                {"condition": "active", "style": {"color": "{theme.accent}"}},
                {"format": "wide", "style": {"width": "{size}"}},
                {"selector": "&:hover", "style": {"opacity": 0.5, "color": "{theme.hover}"}}
            ]}]
        }));
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "components[0].style[1].style.width",
                "components[0].style[2].style.color"
            ]
        );
        assert!(errors.iter().all(|e| e.code == INV_INVALID_STYLE));
    }

    #[test]
    fn test_import_shapes() {
        let app = load_app(&json!({
            "imports": [
                {"import": "React", "from": "react"},
                {"import": "* as Icons", "from": "icons"},
                {"import": {"useState": {}, "useMemo": "memo", "default": "Lib"}, "from": "lib"},
                "./polyfill"
            ],
            "components": []
        }))
        .unwrap();
        let kinds: Vec<&ImportKind> = app.imports.iter().map(|i| &i.kind).collect();
        assert_eq!(kinds[0], &ImportKind::Default("React".into()));
        assert_eq!(kinds[1], &ImportKind::Namespace("Icons".into()));
        assert_eq!(kinds[2], &ImportKind::Default("Lib".into()));
        assert_eq!(
            kinds[3],
            &ImportKind::Named(vec![
                NamedImport {
                    symbol: "useState".into(),
                    alias: None
                },
                NamedImport {
                    symbol: "useMemo".into(),
                    alias: Some("memo".into())
                },
            ])
        );
        assert_eq!(kinds[4], &ImportKind::SideEffect);
    }

    #[test]
    fn test_state_single_name_derives_setter() {
        let app = load_app(&json!({
            "components": [{"name": "App", "expressions": [
                {"type": "state", "var": "open", "initialState": false}
            ]}]
        }))
        .unwrap();
        assert_eq!(
            app.components[0].expressions[0],
            ExpressionNode::State {
                getter: "open".into(),
                setter: "setOpen".into(),
                initial: Some(ValueExpr::Literal(json!(false))),
            }
        );
    }

    #[test]
    fn test_contexts_only_on_definitions() {
        let errors = load_err(json!({
            "components": [{"name": "App", "children": [
                {"type": "div", "useContexts": ["Theme"]}
            ]}]
        }));
        assert_eq!(errors[0].code, INV_MISPLACED_CONTEXT);
    }

    #[test]
    fn test_unknown_root_component() {
        let errors = load_err(json!({
            "rootComponent": "Main",
            "components": [{"name": "App"}]
        }));
        assert_eq!(errors[0].code, INV_UNKNOWN_ROOT);
    }

    #[test]
    fn test_format_predicate_keys_checked() {
        let errors = load_err(json!({
            "styleFormats": {"odd": {"minDepth": 3}},
            "components": []
        }));
        assert_eq!(errors[0].code, INV_INVALID_FORMAT_PREDICATE);
        assert_eq!(errors[0].path, "styleFormats.odd.minDepth");
    }

    #[test]
    fn test_child_positions_follow_document() {
        let app = load_app(&json!({
            "components": [{"name": "App", "children": [
                "text",
                {"type": "div", "children": [{"type": "span"}]}
            ]}]
        }))
        .unwrap();
        let div = app.components[0].child_nodes().next().unwrap();
        assert_eq!(div.position, vec![0, 1]);
        let span = div.child_nodes().next().unwrap();
        assert_eq!(span.position, vec![0, 1, 0]);
        assert_eq!(span.path, "components[0].children[1].children[0]");
    }
}
