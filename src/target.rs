//! Platform emission tables.
//!
//! Everything that differs between the web and cross-platform output lives
//! behind `TargetEmitter`. One table is selected per run; the resolver and the
//! generator never branch on the platform themselves.

use crate::config::Platform;
use crate::imports::named_import;
use crate::style::{
    css_block, format_literal, indent, js_entries, js_object, media_query, Projection,
    StyleFragment, StyleUsage,
};
use crate::tree::{FormatPredicate, ImportSpec, StyleMap};

pub const MERGE_STYLES: &str = "mergeStyles";
pub const MATCH_FORMAT: &str = "matchFormat";
pub const DIMENSIONS_HOOK: &str = "useWindowDimensions";
pub const DIMENSIONS_LOCAL: &str = "__dimensions";
pub const REACT_NATIVE: &str = "react-native";

/// Primitives imported from `react-native` when used as element types.
pub const NATIVE_PRIMITIVES: [&str; 16] = [
    "ActivityIndicator",
    "Button",
    "FlatList",
    "Image",
    "ImageBackground",
    "KeyboardAvoidingView",
    "Modal",
    "Pressable",
    "SafeAreaView",
    "ScrollView",
    "SectionList",
    "Switch",
    "Text",
    "TextInput",
    "TouchableOpacity",
    "View",
];

pub trait TargetEmitter: Send + Sync {
    fn platform(&self) -> Platform;

    fn component_extension(&self) -> &'static str;

    /// Element generated around markup that needs a single styled root.
    fn container_tag(&self) -> &'static str;

    /// Attribute carrying generated class names, if the platform has one.
    fn class_attribute(&self) -> Option<&'static str>;

    /// Whether the root component imports the generated stylesheets.
    fn imports_stylesheets(&self) -> bool;

    fn format_entry(&self, format: &str, predicate: &FormatPredicate, style: &StyleMap) -> Projection;

    fn selector_entry(&self, selector: &str, style: &StyleMap) -> Projection;

    fn static_text_entry(&self, text: &str) -> Projection;

    /// Expression for the `style` attribute, without the surrounding braces.
    fn style_attribute(&self, fragments: &[StyleFragment]) -> Option<String>;

    fn style_usage(&self, fragments: &[StyleFragment]) -> StyleUsage;

    /// Statements a component body needs before any styled markup.
    fn style_prelude(&self, usage: StyleUsage) -> Vec<String>;

    fn style_imports(&self, usage: StyleUsage, runtime_module: &str) -> Vec<ImportSpec>;

    /// Import for a platform primitive used as an element type.
    fn element_import(&self, tag: &str) -> Option<ImportSpec>;
}

pub fn target_for(platform: Platform) -> &'static dyn TargetEmitter {
    static WEB: WebTarget = WebTarget;
    static NATIVE: NativeTarget = NativeTarget;
    match platform {
        Platform::Web => &WEB,
        Platform::CrossPlatform => &NATIVE,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WEB
// ═══════════════════════════════════════════════════════════════════════════════

pub struct WebTarget;

impl TargetEmitter for WebTarget {
    fn platform(&self) -> Platform {
        Platform::Web
    }

    fn component_extension(&self) -> &'static str {
        "jsx"
    }

    fn container_tag(&self) -> &'static str {
        "div"
    }

    fn class_attribute(&self) -> Option<&'static str> {
        Some("className")
    }

    fn imports_stylesheets(&self) -> bool {
        true
    }

    fn format_entry(&self, _format: &str, predicate: &FormatPredicate, style: &StyleMap) -> Projection {
        Projection::Css(css_block(&format!("@media {}", media_query(predicate)), style))
    }

    fn selector_entry(&self, selector: &str, style: &StyleMap) -> Projection {
        Projection::Css(css_block(selector, style))
    }

    fn static_text_entry(&self, text: &str) -> Projection {
        Projection::Css(text.trim().to_string())
    }

    fn style_attribute(&self, fragments: &[StyleFragment]) -> Option<String> {
        if fragments.is_empty() {
            return None;
        }
        let mut parts = vec![];
        for fragment in fragments {
            match fragment {
                StyleFragment::Object(style) => parts.extend(js_entries(style)),
                StyleFragment::Conditional { predicate, style } => {
                    parts.push(format!("...({} ? {} : {{}})", predicate, js_object(style)))
                }
                StyleFragment::FormatGuard {
                    predicate, style, ..
                } => parts.push(format!(
                    "...({}({}, {}) ? {} : {{}})",
                    MATCH_FORMAT,
                    format_literal(predicate),
                    DIMENSIONS_LOCAL,
                    js_object(style)
                )),
                StyleFragment::Dynamic(code) => parts.push(format!("...({})", code)),
            }
        }
        if parts.is_empty() {
            return Some("{}".to_string());
        }
        Some(format!("{{ {} }}", parts.join(", ")))
    }

    fn style_usage(&self, fragments: &[StyleFragment]) -> StyleUsage {
        StyleUsage {
            merge_styles: false,
            match_format: fragments
                .iter()
                .any(|f| matches!(f, StyleFragment::FormatGuard { .. })),
        }
    }

    fn style_prelude(&self, _usage: StyleUsage) -> Vec<String> {
        vec![]
    }

    fn style_imports(&self, _usage: StyleUsage, _runtime_module: &str) -> Vec<ImportSpec> {
        vec![]
    }

    fn element_import(&self, _tag: &str) -> Option<ImportSpec> {
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CROSS-PLATFORM
// ═══════════════════════════════════════════════════════════════════════════════

pub struct NativeTarget;

impl TargetEmitter for NativeTarget {
    fn platform(&self) -> Platform {
        Platform::CrossPlatform
    }

    fn component_extension(&self) -> &'static str {
        "js"
    }

    fn container_tag(&self) -> &'static str {
        "View"
    }

    fn class_attribute(&self) -> Option<&'static str> {
        None
    }

    fn imports_stylesheets(&self) -> bool {
        false
    }

    fn format_entry(&self, format: &str, predicate: &FormatPredicate, style: &StyleMap) -> Projection {
        Projection::Runtime(StyleFragment::FormatGuard {
            format: format.to_string(),
            predicate: predicate.clone(),
            style: style.clone(),
        })
    }

    fn selector_entry(&self, _selector: &str, _style: &StyleMap) -> Projection {
        Projection::Dropped
    }

    fn static_text_entry(&self, _text: &str) -> Projection {
        Projection::Dropped
    }

    fn style_attribute(&self, fragments: &[StyleFragment]) -> Option<String> {
        match fragments {
            [] => None,
            [StyleFragment::Object(style)] => Some(js_object(style)),
            _ => {
                let args: Vec<String> = fragments
                    .iter()
                    .map(|fragment| match fragment {
                        StyleFragment::Object(style) => js_object(style),
                        StyleFragment::Conditional { predicate, style } => {
                            format!("({}) && {}", predicate, js_object(style))
                        }
                        StyleFragment::FormatGuard {
                            predicate, style, ..
                        } => format!(
                            "{}({}, {}) && {}",
                            MATCH_FORMAT,
                            format_literal(predicate),
                            DIMENSIONS_LOCAL,
                            js_object(style)
                        ),
                        StyleFragment::Dynamic(code) => code.clone(),
                    })
                    .collect();
                if args.iter().any(|a| a.contains('\n')) {
                    Some(format!(
                        "{}(\n{}\n)",
                        MERGE_STYLES,
                        indent(&args.join(",\n"))
                    ))
                } else {
                    Some(format!("{}({})", MERGE_STYLES, args.join(", ")))
                }
            }
        }
    }

    fn style_usage(&self, fragments: &[StyleFragment]) -> StyleUsage {
        StyleUsage {
            merge_styles: !matches!(fragments, [] | [StyleFragment::Object(_)]),
            match_format: fragments
                .iter()
                .any(|f| matches!(f, StyleFragment::FormatGuard { .. })),
        }
    }

    fn style_prelude(&self, usage: StyleUsage) -> Vec<String> {
        if usage.match_format {
            vec![format!("const {} = {}();", DIMENSIONS_LOCAL, DIMENSIONS_HOOK)]
        } else {
            vec![]
        }
    }

    fn style_imports(&self, usage: StyleUsage, runtime_module: &str) -> Vec<ImportSpec> {
        let mut helpers = vec![];
        if usage.merge_styles {
            helpers.push(MERGE_STYLES);
        }
        if usage.match_format {
            helpers.push(MATCH_FORMAT);
        }
        let mut specs = vec![];
        if !helpers.is_empty() {
            specs.push(named_import(runtime_module, &helpers));
        }
        if usage.match_format {
            specs.push(named_import(REACT_NATIVE, &[DIMENSIONS_HOOK]));
        }
        specs
    }

    fn element_import(&self, tag: &str) -> Option<ImportSpec> {
        NATIVE_PRIMITIVES
            .contains(&tag)
            .then(|| named_import(REACT_NATIVE, &[tag]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: serde_json::Value) -> StyleMap {
        serde_json::from_value(value).unwrap()
    }

    fn wide() -> FormatPredicate {
        FormatPredicate {
            min_width: Some(1024.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_web_format_is_media_block() {
        let web = target_for(Platform::Web);
        let projection = web.format_entry("wide", &wide(), &map(json!({"width": 30})));
        assert_eq!(
            projection,
            Projection::Css("@media (min-width: 1024px) {\n  width: 30px !important;\n}".into())
        );
    }

    #[test]
    fn test_native_format_is_runtime_guard() {
        let native = target_for(Platform::CrossPlatform);
        let projection = native.format_entry("wide", &wide(), &map(json!({"width": 30})));
        let Projection::Runtime(fragment) = projection else {
            panic!("expected runtime fragment");
        };
        let fragments = vec![fragment];
        assert_eq!(
            native.style_attribute(&fragments).unwrap(),
            "mergeStyles(matchFormat({ minWidth: 1024 }, __dimensions) && { width: 30 })"
        );
        let usage = native.style_usage(&fragments);
        assert!(usage.match_format && usage.merge_styles);
        assert_eq!(
            native.style_prelude(usage),
            vec!["const __dimensions = useWindowDimensions();".to_string()]
        );
    }

    #[test]
    fn test_selector_and_static_text_dropped_on_native() {
        let native = target_for(Platform::CrossPlatform);
        assert_eq!(
            native.selector_entry("&:hover", &map(json!({"opacity": 1}))),
            Projection::Dropped
        );
        assert_eq!(native.static_text_entry(".x {}"), Projection::Dropped);
        let web = target_for(Platform::Web);
        assert_eq!(
            web.static_text_entry(" .x {} "),
            Projection::Css(".x {}".into())
        );
    }

    #[test]
    fn test_web_style_attribute_spreads() {
        let web = target_for(Platform::Web);
        let fragments = vec![
            StyleFragment::Object(map(json!({"color": "red"}))),
            StyleFragment::Conditional {
                predicate: "active".into(),
                style: map(json!({"color": "blue"})),
            },
            StyleFragment::Dynamic("extra".into()),
        ];
        assert_eq!(
            web.style_attribute(&fragments).unwrap(),
            "{ color: \"red\", ...(active ? { color: \"blue\" } : {}), ...(extra) }"
        );
    }

    #[test]
    fn test_native_single_object_skips_merge() {
        let native = target_for(Platform::CrossPlatform);
        let fragments = vec![StyleFragment::Object(map(json!({"flex": 1})))];
        assert_eq!(native.style_attribute(&fragments).unwrap(), "{ flex: 1 }");
        assert_eq!(native.style_usage(&fragments), StyleUsage::default());
        assert!(native.element_import("View").is_some());
        assert!(native.element_import("div").is_none());
    }
}
