//! Style resolution.
//!
//! Every style entry of a node is classified once and routed either into the
//! node's stylesheet fragment (scoped under its generated class) or into the
//! ordered runtime style-assembly list. Which route format, selector and raw
//! text entries take is decided by the platform table in `target.rs`.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

use crate::parse::is_identifier;
use crate::target::TargetEmitter;
use crate::tree::{ComponentNode, FormatPredicate, StyleEntry, StyleMap, ValueExpr};

lazy_static! {
    static ref UPPER_RE: Regex = Regex::new(r"[A-Z]").unwrap();
    static ref UNITLESS: HashSet<&'static str> = [
        "animation-iteration-count",
        "aspect-ratio",
        "border-image-outset",
        "border-image-slice",
        "border-image-width",
        "column-count",
        "columns",
        "fill-opacity",
        "flex",
        "flex-grow",
        "flex-negative",
        "flex-order",
        "flex-positive",
        "flex-shrink",
        "flood-opacity",
        "font-weight",
        "grid-area",
        "grid-column",
        "grid-column-end",
        "grid-column-start",
        "grid-row",
        "grid-row-end",
        "grid-row-start",
        "line-clamp",
        "line-height",
        "opacity",
        "order",
        "orphans",
        "stop-opacity",
        "stroke-dashoffset",
        "stroke-miterlimit",
        "stroke-opacity",
        "stroke-width",
        "tab-size",
        "widows",
        "z-index",
        "zoom",
    ]
    .into_iter()
    .collect();
}

/// One entry of the runtime style-assembly list. Later fragments win on key collision.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleFragment {
    Object(StyleMap),
    Conditional {
        predicate: String,
        style: StyleMap,
    },
    FormatGuard {
        format: String,
        predicate: FormatPredicate,
        style: StyleMap,
    },
    Dynamic(String),
}

/// Where a platform table sends a static-capable entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// A rule nested inside the node's class block.
    Css(String),
    Runtime(StyleFragment),
    Dropped,
}

/// Runtime helpers a set of fragments needs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StyleUsage {
    pub merge_styles: bool,
    pub match_format: bool,
}

impl StyleUsage {
    pub fn absorb(&mut self, other: StyleUsage) {
        self.merge_styles |= other.merge_styles;
        self.match_format |= other.match_format;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedStyle {
    /// Present only when the node produced stylesheet rules.
    pub class_name: Option<String>,
    pub css: Option<String>,
    pub runtime: Vec<StyleFragment>,
}

impl ResolvedStyle {
    pub fn is_empty(&self) -> bool {
        self.class_name.is_none() && self.runtime.is_empty()
    }
}

fn push_object(runtime: &mut Vec<StyleFragment>, map: &StyleMap) {
    if let Some(StyleFragment::Object(last)) = runtime.last_mut() {
        for (k, v) in map {
            last.insert(k.clone(), v.clone());
        }
        return;
    }
    runtime.push(StyleFragment::Object(map.clone()));
}

/// Resolve the style entries of one node for one platform.
pub fn resolve_style(
    node: &ComponentNode,
    formats: &IndexMap<String, FormatPredicate>,
    target: &dyn TargetEmitter,
) -> ResolvedStyle {
    let mut rules = vec![];
    let mut runtime = vec![];

    for entry in &node.style {
        let projection = match entry {
            StyleEntry::PlainObject(map) => {
                push_object(&mut runtime, map);
                continue;
            }
            StyleEntry::Conditional { predicate, style } => {
                Projection::Runtime(StyleFragment::Conditional {
                    predicate: predicate.clone(),
                    style: style.clone(),
                })
            }
            StyleEntry::DynamicScript(code) => Projection::Runtime(StyleFragment::Dynamic(code.clone())),
            StyleEntry::Format { format, style } => match formats.get(format) {
                Some(predicate) => target.format_entry(format, predicate, style),
                None => Projection::Dropped,
            },
            StyleEntry::Selector { selector, style } => target.selector_entry(selector, style),
            StyleEntry::StaticString(text) => target.static_text_entry(text),
        };
        match projection {
            Projection::Css(rule) => rules.push(rule),
            Projection::Runtime(fragment) => runtime.push(fragment),
            Projection::Dropped => {}
        }
    }

    let class_name = match (rules.is_empty(), node.class_name()) {
        (false, Some(class)) => Some(class.to_string()),
        _ => None,
    };
    let css = class_name
        .as_ref()
        .map(|class| format!(".{} {{\n{}\n}}\n", class, indent(&rules.join("\n"))));

    ResolvedStyle {
        class_name,
        css,
        runtime,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CSS RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn indent(text: &str) -> String {
    text.lines()
        .map(|l| {
            if l.is_empty() {
                String::new()
            } else {
                format!("  {}", l)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `backgroundColor` -> `background-color`, `WebkitTransition` -> `-webkit-transition`.
pub fn css_property(key: &str) -> String {
    if key.starts_with("--") || key.contains('-') {
        return key.to_string();
    }
    UPPER_RE
        .replace_all(key, |caps: &regex::Captures| format!("-{}", caps[0].to_lowercase()))
        .to_string()
}

pub fn css_value(property: &str, value: &Value) -> String {
    match value {
        Value::Number(n) if UNITLESS.contains(property) || n.as_f64() == Some(0.0) => n.to_string(),
        Value::Number(n) => format!("{}px", n),
        Value::String(s) => s.clone(),
        Value::Null => "initial".to_string(),
        other => other.to_string(),
    }
}

/// Generated static declarations carry `!important`: they compete with inline runtime styles.
pub fn css_declarations(style: &StyleMap) -> String {
    style
        .iter()
        .map(|(k, v)| {
            let property = css_property(k);
            let value = css_value(&property, v);
            format!("{}: {} !important;", property, value)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn css_block(selector: &str, style: &StyleMap) -> String {
    let body = css_declarations(style);
    if body.is_empty() {
        format!("{} {{}}", selector)
    } else {
        format!("{} {{\n{}\n}}", selector, indent(&body))
    }
}

fn number_px(n: &serde_json::Number) -> String {
    format!("{}px", n)
}

/// `(min-width: 1024px) and (orientation: landscape)`
pub fn media_query(predicate: &FormatPredicate) -> String {
    let mut parts = vec![];
    if let Some(n) = &predicate.min_width {
        parts.push(format!("(min-width: {})", number_px(n)));
    }
    if let Some(n) = &predicate.max_width {
        parts.push(format!("(max-width: {})", number_px(n)));
    }
    if let Some(n) = &predicate.min_height {
        parts.push(format!("(min-height: {})", number_px(n)));
    }
    if let Some(n) = &predicate.max_height {
        parts.push(format!("(max-height: {})", number_px(n)));
    }
    if let Some(o) = &predicate.orientation {
        parts.push(format!("(orientation: {})", o.as_str()));
    }
    parts.join(" and ")
}

// ═══════════════════════════════════════════════════════════════════════════════
// JS LITERALS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn js_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        Value::String(key.to_string()).to_string()
    }
}

/// Object literal for a runtime style map; `{…}` values are embedded as script.
pub fn js_object(style: &StyleMap) -> String {
    if style.is_empty() {
        return "{}".to_string();
    }
    format!("{{ {} }}", js_entries(style).join(", "))
}

pub fn js_entries(style: &StyleMap) -> Vec<String> {
    style
        .iter()
        .map(|(k, v)| format!("{}: {}", js_key(k), ValueExpr::from_json(v).to_code()))
        .collect()
}

/// `{ minWidth: 1024, orientation: "portrait" }`
pub fn format_literal(predicate: &FormatPredicate) -> String {
    let mut parts = vec![];
    let numbers = [
        ("minWidth", &predicate.min_width),
        ("maxWidth", &predicate.max_width),
        ("minHeight", &predicate.min_height),
        ("maxHeight", &predicate.max_height),
    ];
    for (key, value) in numbers {
        if let Some(n) = value {
            parts.push(format!("{}: {}", key, n));
        }
    }
    if let Some(o) = &predicate.orientation {
        parts.push(format!("orientation: \"{}\"", o.as_str()));
    }
    format!("{{ {} }}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> StyleMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_css_property_and_units() {
        assert_eq!(css_property("backgroundColor"), "background-color");
        assert_eq!(css_property("WebkitTransition"), "-webkit-transition");
        assert_eq!(css_property("--accent"), "--accent");
        assert_eq!(css_value("width", &json!(30)), "30px");
        assert_eq!(css_value("opacity", &json!(0.5)), "0.5");
        assert_eq!(css_value("z-index", &json!(10)), "10");
        assert_eq!(css_value("margin", &json!(0)), "0");
        assert_eq!(css_value("width", &json!("50%")), "50%");
    }

    #[test]
    fn test_declarations_are_important() {
        let style = map(json!({"width": 30, "fontWeight": 700}));
        assert_eq!(
            css_declarations(&style),
            "width: 30px !important;\nfont-weight: 700 !important;"
        );
    }

    #[test]
    fn test_media_query_and_literal() {
        let predicate = FormatPredicate {
            min_width: Some(1024.into()),
            orientation: Some(crate::tree::Orientation::Landscape),
            ..Default::default()
        };
        assert_eq!(
            media_query(&predicate),
            "(min-width: 1024px) and (orientation: landscape)"
        );
        assert_eq!(
            format_literal(&predicate),
            "{ minWidth: 1024, orientation: \"landscape\" }"
        );
    }

    #[test]
    fn test_js_object_embeds_scripts() {
        let style = map(json!({"color": "{theme.primary}", "padding-top": 4, "flex": 1}));
        assert_eq!(
            js_object(&style),
            "{ color: theme.primary, \"padding-top\": 4, flex: 1 }"
        );
    }

    #[test]
    fn test_adjacent_objects_merge_last_write_wins() {
        let mut runtime = vec![];
        push_object(&mut runtime, &map(json!({"color": "red", "width": 1})));
        push_object(&mut runtime, &map(json!({"color": "blue"})));
        assert_eq!(
            runtime,
            vec![StyleFragment::Object(map(json!({"color": "blue", "width": 1})))]
        );
    }
}
