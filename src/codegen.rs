//! Codegen module for the uitree compiler
//!
//! Generates one source file per top-level component: the import block, the
//! exported function, and a hoisted function for every inline definition.
//! All platform differences are delegated to the selected `TargetEmitter`.

use indexmap::IndexSet;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::config::CompileOptions;
use crate::context::{ContextRegistry, USE_CONTEXT};
use crate::imports::{
    collect_imports, declared_functions, default_import, named_import, side_effect_import,
    user_imports,
};
use crate::renamer::NameTable;
use crate::style::{indent, resolve_style, ResolvedStyle, StyleFragment, StyleUsage};
use crate::target::TargetEmitter;
use crate::transform::{hooks_used, mark_redeclarations, normalize};
use crate::tree::{AppTree, Child, ComponentNode, ImportSpec, NodeKind, PropEntry, ValueExpr};
use crate::validate::CompilerError;
use crate::visitor::{definitions_of, nodes_of};

lazy_static! {
    static ref SIMPLE_EXPR_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$.]*$").unwrap();
}

pub const GLOBAL_STYLESHEET: &str = "global.css";
pub const STYLE_MODULE: &str = "app.scss";
const INLINE_WIDTH: usize = 80;

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT/OUTPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Frozen, shared state every per-component generation reads.
pub struct CodegenContext<'a> {
    pub app: &'a AppTree,
    pub names: &'a NameTable,
    pub contexts: &'a ContextRegistry,
    pub options: &'a CompileOptions,
    pub target: &'a dyn TargetEmitter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentArtifact {
    pub name: String,
    /// Relative to the output root.
    pub path: String,
    pub source: String,
    /// Stylesheet text appended to the global sheet (component `styleSheet` overrides).
    pub style_sheet: Vec<String>,
    /// Style-module text: `styleModule` overrides, then class fragments in document order.
    pub style_module: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

pub fn generate_component(
    ctx: &CodegenContext,
    index: usize,
) -> Result<ComponentArtifact, Vec<CompilerError>> {
    let component = &ctx.app.components[index];
    let name = component
        .resolved_name()
        .unwrap_or(component.display_name())
        .to_string();

    let nodes = nodes_of(component);
    let styles: HashMap<&str, ResolvedStyle> = nodes
        .iter()
        .filter(|n| !n.style.is_empty())
        .map(|n| {
            (
                n.path.as_str(),
                resolve_style(n, &ctx.app.style_formats, ctx.target),
            )
        })
        .collect();

    let mut writer = FileWriter {
        ctx,
        index,
        styles: &styles,
        hooks: vec![],
        context_ids: IndexSet::new(),
        file_usage: StyleUsage::default(),
        fn_usage: StyleUsage::default(),
        tags: IndexSet::new(),
        references: IndexSet::new(),
    };

    let definitions = definitions_of(component);
    let functions: Vec<String> = definitions
        .iter()
        .enumerate()
        .map(|(i, def)| writer.function(def, i == 0))
        .collect();

    let implicit = writer.implicit_imports(index == root_index(ctx.app));
    let block = collect_imports(
        user_imports(ctx.app, component),
        &implicit,
        &declared_functions(component),
    )?;

    let mut source = String::new();
    let imports = block.render();
    if !imports.is_empty() {
        source.push_str(&imports);
        source.push_str("\n\n");
    }
    source.push_str(&restore_opaque(&functions.join("\n\n")));
    source.push('\n');

    let style_sheet = definitions
        .iter()
        .filter_map(|d| d.style_sheet.clone())
        .collect();
    let mut style_module: Vec<String> = definitions
        .iter()
        .filter_map(|d| d.style_module.clone())
        .collect();
    style_module.extend(
        nodes
            .iter()
            .filter_map(|n| styles.get(n.path.as_str()).and_then(|s| s.css.clone())),
    );

    debug!(component = %name, functions = functions.len(), "component generated");

    Ok(ComponentArtifact {
        path: format!(
            "{}/{}.{}",
            ctx.options.component_dir.trim_end_matches('/'),
            name,
            ctx.target.component_extension()
        ),
        name,
        source,
        style_sheet,
        style_module,
    })
}

/// Index of the declared root component, or the first component.
pub fn root_index(app: &AppTree) -> usize {
    app.root_component
        .as_deref()
        .and_then(|root| {
            app.components
                .iter()
                .position(|c| c.name.as_deref() == Some(root))
        })
        .unwrap_or(0)
}

/// `../` for every segment of the component directory.
fn root_prefix(component_dir: &str) -> String {
    let depth = component_dir
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .count();
    if depth == 0 {
        "./".to_string()
    } else {
        "../".repeat(depth)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE WRITER
// ═══════════════════════════════════════════════════════════════════════════════

struct FileWriter<'a, 'c> {
    ctx: &'c CodegenContext<'a>,
    index: usize,
    styles: &'c HashMap<&'a str, ResolvedStyle>,
    hooks: Vec<&'static str>,
    context_ids: IndexSet<String>,
    file_usage: StyleUsage,
    fn_usage: StyleUsage,
    tags: IndexSet<String>,
    /// Components defined in other files and rendered by this one.
    references: IndexSet<Reference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Reference {
    /// File stem of the top-level definition holding the function.
    file: String,
    identifier: String,
    /// Top-level definitions are default exports, inline ones named exports.
    default: bool,
}

impl<'a, 'c> FileWriter<'a, 'c> {
    fn use_hook(&mut self, hook: &'static str) {
        if !self.hooks.contains(&hook) {
            self.hooks.push(hook);
        }
    }

    fn style_of(&self, node: &ComponentNode) -> Option<ResolvedStyle> {
        self.styles
            .get(node.path.as_str())
            .filter(|s| !s.is_empty())
            .cloned()
    }

    fn function(&mut self, def: &ComponentNode, exported: bool) -> String {
        self.fn_usage = StyleUsage::default();
        let name = def.resolved_name().unwrap_or(def.display_name()).to_string();
        let (params, mut outer) = match &def.kind {
            NodeKind::Component {
                params: Some(pattern),
            } => (opaque(&pattern.render()), pattern.bound_names()),
            _ => (String::new(), vec![]),
        };

        let consumes = self.ctx.contexts.consumes(def);
        let provides = self.ctx.contexts.provides(def);
        if !consumes.is_empty() {
            self.use_hook(USE_CONTEXT);
        }
        for id in consumes
            .iter()
            .map(|c| &c.identifier)
            .chain(provides.iter().map(|p| &p.identifier))
        {
            self.context_ids.insert(id.clone());
        }

        outer.extend(consumes.iter().map(|c| c.local.clone()));
        let mut statements = normalize(&def.expressions);
        let redeclared = mark_redeclarations(&mut statements, &outer);
        for hook in hooks_used(&statements) {
            self.use_hook(hook);
        }

        let mut markup = self.root_markup(def);
        for provide in provides.iter().rev() {
            let open = format!(
                "{}.Provider value={{{}}}",
                provide.identifier,
                opaque(&provide.value)
            );
            let tag = format!("{}.Provider", provide.identifier);
            markup = Some(wrap(&open, &tag, markup.into_iter().collect()));
        }

        let mut body: Vec<String> = consumes
            .iter()
            .map(|c| {
                let keyword = if redeclared.contains(&c.local) { "var" } else { "const" };
                c.declare(keyword)
            })
            .collect();
        body.extend(self.ctx.target.style_prelude(self.fn_usage));
        body.extend(statements.iter().map(|s| opaque(&s.render())));
        body.push(match markup {
            Some(m) if m.contains('\n') => format!("return (\n{}\n);", indent(&m)),
            Some(m) => format!("return {};", m),
            None => "return null;".to_string(),
        });

        // Named inline definitions can be rendered from other files.
        let export = if exported {
            "export default "
        } else if def.name.is_some() {
            "export "
        } else {
            ""
        };
        format!(
            "{}function {}({}) {{\n{}\n}}",
            export,
            name,
            params,
            indent(&body.join("\n"))
        )
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Markup
    // ───────────────────────────────────────────────────────────────────────────

    /// The definition's returned markup, with component-level style applied to
    /// the single root element or to a generated container.
    fn root_markup(&mut self, def: &ComponentNode) -> Option<String> {
        let own = self.style_of(def);
        if let Some(style) = &own {
            if let [Child::Node(root)] = def.children.as_slice() {
                if let NodeKind::Element(tag) = &root.kind {
                    return Some(self.element(root, tag, Some(style)));
                }
            }
            let items = self.children(&def.children);
            let container = self.ctx.target.container_tag();
            self.tags.insert(container.to_string());
            let attrs = self.attributes(&[], Some(style), None);
            return Some(element_text(container, &attrs, items));
        }
        self.body(&def.children)
    }

    /// Single JSX expression for a list of children: the element itself, a
    /// fragment, or `None` when empty.
    fn body(&mut self, children: &[Child]) -> Option<String> {
        let single_element = matches!(
            children,
            [Child::Node(n)] if matches!(n.kind, NodeKind::Element(_) | NodeKind::Component { .. })
        );
        let items = self.children(children);
        match items.len() {
            0 => None,
            1 if single_element => items.into_iter().next(),
            _ => Some(wrap("", "", items)),
        }
    }

    fn children(&mut self, children: &[Child]) -> Vec<String> {
        children.iter().map(|c| self.child(c)).collect()
    }

    fn child(&mut self, child: &Child) -> String {
        match child {
            Child::Text(text) => opaque(&jsx_text(text)),
            Child::Primitive(value) => opaque(&format!("{{{}}}", value)),
            Child::Script(code) => format!("{{{}}}", opaque(code)),
            Child::Node(node) => self.node(node),
        }
    }

    fn node(&mut self, node: &ComponentNode) -> String {
        match &node.kind {
            NodeKind::Component { .. } => {
                format!("<{} />", node.resolved_name().unwrap_or(node.display_name()))
            }
            NodeKind::Element(tag) => self.element(node, tag, None),
            NodeKind::Script(code) => format!("{{{}}}", opaque(code)),
            NodeKind::Map { data, var, index } => {
                let params = match index {
                    Some(i) => format!("{}, {}", var.render(), i),
                    None => var.render(),
                };
                let params = opaque(&params);
                let inner = self.body(&node.children).unwrap_or_else(|| "null".to_string());
                format!(
                    "{{{}.map(({}) => (\n{}\n))}}",
                    opaque(&operand(data)),
                    params,
                    indent(&inner)
                )
            }
            NodeKind::If {
                condition,
                otherwise,
            } => {
                let then = self.body(&node.children).unwrap_or_else(|| "null".to_string());
                if otherwise.is_empty() {
                    format!(
                        "{{{} && (\n{}\n)}}",
                        opaque(&operand(condition)),
                        indent(&then)
                    )
                } else {
                    let other = self.body(otherwise).unwrap_or_else(|| "null".to_string());
                    format!(
                        "{{{} ? (\n{}\n) : (\n{}\n)}}",
                        opaque(&operand(condition)),
                        indent(&then),
                        indent(&other)
                    )
                }
            }
        }
    }

    fn element(&mut self, node: &ComponentNode, tag: &str, inherited: Option<&ResolvedStyle>) -> String {
        let tag = match self.ctx.names.component(tag) {
            Some(entry) => {
                if entry.owner != self.index {
                    let owner = &self.ctx.app.components[entry.owner];
                    self.references.insert(Reference {
                        file: owner.resolved_name().unwrap_or(owner.display_name()).to_string(),
                        identifier: entry.identifier.clone(),
                        default: entry.top_level,
                    });
                }
                entry.identifier.clone()
            }
            None => {
                self.tags.insert(tag.to_string());
                tag.to_string()
            }
        };
        let own = self.style_of(node);
        let attrs = self.attributes(&node.props, inherited, own.as_ref());
        let items = self.children(&node.children);
        element_text(&tag, &attrs, items)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Attributes
    // ───────────────────────────────────────────────────────────────────────────

    fn attributes(
        &mut self,
        props: &[PropEntry],
        inherited: Option<&ResolvedStyle>,
        own: Option<&ResolvedStyle>,
    ) -> Vec<String> {
        let class_attr = self.ctx.target.class_attribute();
        let styles: Vec<&ResolvedStyle> = inherited.into_iter().chain(own).collect();

        let mut classes: Vec<ValueExpr> = styles
            .iter()
            .filter_map(|s| s.class_name.clone())
            .map(|c| ValueExpr::Literal(Value::String(c)))
            .collect();
        let mut fragments: Vec<StyleFragment> = styles
            .iter()
            .flat_map(|s| s.runtime.iter().cloned())
            .collect();

        let mut attrs = vec![];
        for entry in props {
            match entry {
                PropEntry::Spread(code) => attrs.push(format!("{{...{}}}", opaque(code))),
                PropEntry::Attributes(map) => {
                    for (key, value) in map {
                        match (key.as_str(), class_attr) {
                            (k, Some(attr)) if k == attr || k == "class" => classes.push(value.clone()),
                            ("style", _) if !fragments.is_empty() => {
                                fragments.push(StyleFragment::Dynamic(value.to_code()))
                            }
                            _ => attrs.push(opaque(&jsx_attribute(key, value))),
                        }
                    }
                }
            }
        }

        if let Some(attr) = class_attr {
            if let Some(class) = class_value(&classes) {
                attrs.insert(0, format!("{}={}", attr, opaque(&class)));
            }
        }
        if let Some(style) = self.ctx.target.style_attribute(&fragments) {
            let usage = self.ctx.target.style_usage(&fragments);
            self.fn_usage.absorb(usage);
            self.file_usage.absorb(usage);
            attrs.push(format!("style={{{}}}", opaque(&style)));
        }
        attrs
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Imports
    // ───────────────────────────────────────────────────────────────────────────

    fn implicit_imports(&self, is_root: bool) -> Vec<ImportSpec> {
        let options = self.ctx.options;
        let target = self.ctx.target;
        let prefix = root_prefix(&options.component_dir);
        let mut specs = vec![];

        if target.imports_stylesheets() && is_root {
            let style_dir = options.style_dir.trim_end_matches('/');
            specs.push(side_effect_import(&format!(
                "{}{}/{}",
                prefix, style_dir, GLOBAL_STYLESHEET
            )));
            specs.push(side_effect_import(&format!(
                "{}{}/{}",
                prefix, style_dir, STYLE_MODULE
            )));
        }
        if !self.hooks.is_empty() {
            specs.push(named_import("react", &self.hooks));
        }
        if !self.context_ids.is_empty() {
            let ids: Vec<&str> = self.context_ids.iter().map(String::as_str).collect();
            specs.push(named_import(&format!("{}contexts", prefix), &ids));
        }
        specs.extend(target.style_imports(self.file_usage, &options.runtime_module));
        specs.extend(self.tags.iter().filter_map(|t| target.element_import(t)));
        for reference in &self.references {
            let source = format!("./{}", reference.file);
            specs.push(if reference.default {
                default_import(&source, &reference.identifier)
            } else {
                named_import(&source, &[reference.identifier.as_str()])
            });
        }
        specs
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPAQUE TEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Private-use marker carrying user newlines through `indent`.
const OPAQUE_ESCAPE: char = '\u{E000}';

/// Encodes user text so layout never touches its line breaks: `\n` becomes
/// marker + `n` and the marker itself is doubled. Undone by `restore_opaque`.
fn opaque(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => {
                out.push(OPAQUE_ESCAPE);
                out.push('n');
            }
            OPAQUE_ESCAPE => {
                out.push(OPAQUE_ESCAPE);
                out.push(OPAQUE_ESCAPE);
            }
            c => out.push(c),
        }
    }
    out
}

fn restore_opaque(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != OPAQUE_ESCAPE {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(OPAQUE_ESCAPE) => out.push(OPAQUE_ESCAPE),
            Some(other) => {
                out.push(c);
                out.push(other);
            }
            None => out.push(c),
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSX TEXT HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Wraps `expr` in parentheses unless it is a plain (dotted) identifier.
fn operand(expr: &str) -> String {
    let expr = expr.trim();
    if SIMPLE_EXPR_RE.is_match(expr) {
        expr.to_string()
    } else {
        format!("({})", expr)
    }
}

fn jsx_text(text: &str) -> String {
    let unsafe_char = text
        .chars()
        .any(|c| matches!(c, '{' | '}' | '<' | '>' | '\n' | '\r'));
    if unsafe_char || text.trim() != text || text.is_empty() {
        format!("{{{}}}", Value::String(text.to_string()))
    } else {
        text.to_string()
    }
}

fn jsx_attribute(key: &str, value: &ValueExpr) -> String {
    match value {
        ValueExpr::Literal(Value::String(s)) if !s.contains('"') && !s.contains('\n') => {
            format!("{}=\"{}\"", key, s)
        }
        other => format!("{}={{{}}}", key, other.to_code()),
    }
}

/// Generated classes first, then explicit values in declaration order.
fn class_value(classes: &[ValueExpr]) -> Option<String> {
    if classes.is_empty() {
        return None;
    }
    let all_static = classes.iter().all(|c| matches!(c, ValueExpr::Literal(_)));
    let parts: Vec<String> = classes
        .iter()
        .map(|c| match c {
            ValueExpr::Literal(Value::String(s)) => s.clone(),
            ValueExpr::Literal(other) => other.to_string(),
            ValueExpr::Script(code) => format!("${{{}}}", code),
        })
        .collect();
    let joined = parts.join(" ");
    if all_static && !joined.contains('"') {
        Some(format!("\"{}\"", joined))
    } else {
        Some(format!("{{`{}`}}", joined.replace('`', "\\`")))
    }
}

/// `open` is the tag with attributes; an empty `open` renders a fragment.
fn wrap(open: &str, tag: &str, items: Vec<String>) -> String {
    if items.is_empty() {
        return if open.is_empty() {
            "<></>".to_string()
        } else {
            format!("<{} />", open)
        };
    }
    let inline = items.len() == 1 && !items[0].contains('\n');
    let candidate = format!("<{}>{}</{}>", open, items.join(""), tag);
    if inline && candidate.len() <= INLINE_WIDTH {
        return candidate;
    }
    format!(
        "<{}>\n{}\n</{}>",
        open,
        indent(&items.join("\n")),
        tag
    )
}

fn element_text(tag: &str, attrs: &[String], items: Vec<String>) -> String {
    let open = if attrs.is_empty() {
        tag.to_string()
    } else {
        format!("{} {}", tag, attrs.join(" "))
    };
    wrap(&open, tag, items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jsx_text_escaping() {
        assert_eq!(jsx_text("Hello"), "Hello");
        assert_eq!(jsx_text("a < b"), "{\"a < b\"}");
        assert_eq!(jsx_text(" padded "), "{\" padded \"}");
    }

    #[test]
    fn test_attributes_render() {
        assert_eq!(
            jsx_attribute("title", &ValueExpr::Literal(json!("Hi"))),
            "title=\"Hi\""
        );
        assert_eq!(
            jsx_attribute("onClick", &ValueExpr::Script("() => go()".into())),
            "onClick={() => go()}"
        );
        assert_eq!(
            jsx_attribute("count", &ValueExpr::Literal(json!(3))),
            "count={3}"
        );
    }

    #[test]
    fn test_class_merge_order() {
        let static_only = class_value(&[
            ValueExpr::Literal(json!("card-abc123")),
            ValueExpr::Literal(json!("extra")),
        ]);
        assert_eq!(static_only.as_deref(), Some("\"card-abc123 extra\""));

        let dynamic = class_value(&[
            ValueExpr::Literal(json!("card-abc123")),
            ValueExpr::Script("active ? 'on' : ''".into()),
        ]);
        assert_eq!(
            dynamic.as_deref(),
            Some("{`card-abc123 ${active ? 'on' : ''}`}")
        );
    }

    #[test]
    fn test_wrap_layouts() {
        assert_eq!(wrap("span", "span", vec!["{count}".into()]), "<span>{count}</span>");
        assert_eq!(wrap("br", "br", vec![]), "<br />");
        assert_eq!(
            wrap("", "", vec!["<a />".into(), "<b />".into()]),
            "<>\n  <a />\n  <b />\n</>"
        );
    }

    #[test]
    fn test_opaque_text_survives_indent() {
        let code = "const msg = `line1\nline2`;\u{E000}n";
        let laid_out = indent(&format!("{}\nreturn null;", opaque(code)));
        assert_eq!(
            restore_opaque(&laid_out),
            "  const msg = `line1\nline2`;\u{E000}n\n  return null;"
        );
    }

    #[test]
    fn test_operand_and_prefix() {
        assert_eq!(operand("props.items"), "props.items");
        assert_eq!(operand("a || b"), "(a || b)");
        assert_eq!(root_prefix("components"), "../");
        assert_eq!(root_prefix("src/components/"), "../../");
        assert_eq!(root_prefix(""), "./");
    }
}
