use crate::config::Platform;
use crate::parse::load_app;
use crate::renamer::resolve_names;
use crate::style::{resolve_style, ResolvedStyle, StyleFragment};
use crate::target::target_for;
use crate::tree::{AppTree, StyleMap};
use crate::visitor::nodes_of;
use crate::{compile_app, CompileOptions};
use serde_json::{json, Value};

fn named_app(doc: Value) -> AppTree {
    let app = load_app(&doc).expect("document should load");
    resolve_names(&app).expect("names should resolve");
    app
}

/// Resolved style of every styled node of the first component, in document order.
fn resolve(app: &AppTree, platform: Platform) -> Vec<ResolvedStyle> {
    nodes_of(&app.components[0])
        .into_iter()
        .filter(|n| !n.style.is_empty())
        .map(|n| resolve_style(n, &app.style_formats, target_for(platform)))
        .collect()
}

fn map(value: Value) -> StyleMap {
    serde_json::from_value(value).unwrap()
}

fn component_source(doc: Value, platform: Platform) -> String {
    let output = compile_app(&doc, &CompileOptions::for_platform(platform)).unwrap();
    let source = output
        .of_kind(crate::ArtifactKind::Component)
        .next()
        .map(|a| a.contents.clone())
        .unwrap();
    source
}

#[test]
fn test_format_entry_projects_per_platform() {
    let app = named_app(json!({
        "styleFormats": {"tall": {"minHeight": 800, "orientation": "portrait"}},
        "components": [{"name": "Hero", "style": [{"format": "tall", "style": {"height": 400}}]}]
    }));
    let class = app.components[0].class_name().unwrap().to_string();
    assert!(class.starts_with("hero-"));
    assert_eq!(class.len(), "hero-".len() + 6);

    let web = &resolve(&app, Platform::Web)[0];
    assert_eq!(web.class_name.as_deref(), Some(class.as_str()));
    assert!(web.runtime.is_empty());
    assert_eq!(
        web.css.as_deref().unwrap(),
        format!(
            ".{} {{\n  @media (min-height: 800px) and (orientation: portrait) {{\n    height: 400px !important;\n  }}\n}}\n",
            class
        )
    );

    let native = &resolve(&app, Platform::CrossPlatform)[0];
    assert_eq!(native.class_name, None);
    assert_eq!(native.css, None);
    assert!(matches!(
        &native.runtime[..],
        [StyleFragment::FormatGuard { format, .. }] if format == "tall"
    ));
}

#[test]
fn test_runtime_order_and_object_merging() {
    let app = named_app(json!({
        "components": [{
            "name": "App",
            "children": [{
                "type": "span",
                "style": [
                    {"color": "red", "width": 10},
                    {"color": "green"},
                    {"condition": "active", "style": {"color": "blue"}},
                    {"margin": 4},
                    "{override}"
                ]
            }]
        }]
    }));
    for platform in [Platform::Web, Platform::CrossPlatform] {
        let resolved = &resolve(&app, platform)[0];
        assert_eq!(resolved.class_name, None);
        assert_eq!(
            resolved.runtime,
            vec![
                StyleFragment::Object(map(json!({"color": "green", "width": 10}))),
                StyleFragment::Conditional {
                    predicate: "active".into(),
                    style: map(json!({"color": "blue"})),
                },
                StyleFragment::Object(map(json!({"margin": 4}))),
                StyleFragment::Dynamic("override".into()),
            ]
        );
    }
}

#[test]
fn test_dynamic_only_node_has_no_class() {
    let app = named_app(json!({
        "components": [{"name": "App", "children": [{"type": "div", "style": "{theme.box}"}]}]
    }));
    let nodes = nodes_of(&app.components[0]);
    assert_eq!(nodes[1].class_name(), None);
    let resolved = &resolve(&app, Platform::Web)[0];
    assert_eq!(resolved.runtime, vec![StyleFragment::Dynamic("theme.box".into())]);
}

#[test]
fn test_explicit_element_name_drives_class_stem() {
    let app = named_app(json!({
        "components": [{
            "name": "Page",
            "children": [
                {"type": "section", "name": "HeroBanner", "style": [{"selector": "&:hover", "style": {"opacity": 0.9}}]},
                {"type": "section", "style": [{"selector": "&:hover", "style": {"opacity": 0.9}}]}
            ]
        }]
    }));
    let nodes = nodes_of(&app.components[0]);
    let first = nodes[1].class_name().unwrap();
    let second = nodes[2].class_name().unwrap();
    assert!(first.starts_with("hero-banner-"), "{}", first);
    assert!(second.starts_with("page-"), "{}", second);
    assert_ne!(first, second);
}

#[test]
fn test_static_text_and_selector_nest_in_class_block() {
    let app = named_app(json!({
        "components": [{
            "name": "Card",
            "style": ["color: red;", {"selector": "&:hover", "style": {"opacity": 0.5}}]
        }]
    }));
    let class = app.components[0].class_name().unwrap().to_string();
    let web = &resolve(&app, Platform::Web)[0];
    assert_eq!(
        web.css.as_deref().unwrap(),
        format!(
            ".{} {{\n  color: red;\n  &:hover {{\n    opacity: 0.5 !important;\n  }}\n}}\n",
            class
        )
    );

    let native = &resolve(&app, Platform::CrossPlatform)[0];
    assert!(native.is_empty());
}

#[test]
fn test_component_style_on_single_root_element() {
    let source = component_source(
        json!({
            "components": [{
                "name": "App",
                "style": [{"selector": "&:hover", "style": {"opacity": 0.5}}],
                "children": [{"type": "section", "children": "hi"}]
            }]
        }),
        Platform::Web,
    );
    assert!(source.contains("return <section className=\"app-"));
    assert!(source.contains("\">hi</section>;"));
    assert!(!source.contains("<div"));
}

#[test]
fn test_component_style_with_many_children_uses_container() {
    let doc = json!({
        "components": [{
            "name": "App",
            "style": [{"selector": "&:hover", "style": {"opacity": 0.5}}, {"flex": 1}],
            "children": ["a", "b"]
        }]
    });
    let web = component_source(doc.clone(), Platform::Web);
    assert!(web.contains("<div className=\"app-"));
    assert!(web.contains("style={{ flex: 1 }}>\n"));

    // The selector is dropped on native; the plain object still needs a styled root.
    let native = component_source(doc, Platform::CrossPlatform);
    assert!(native.contains("<View style={{ flex: 1 }}>\n"));
    assert!(native.contains("import { View } from 'react-native';"));
    assert!(!native.contains("mergeStyles"));
}

#[test]
fn test_native_drops_selector_only_style_entirely() {
    let source = component_source(
        json!({
            "components": [{
                "name": "App",
                "style": [{"selector": "&:hover", "style": {"opacity": 0.5}}],
                "children": ["a", "b"]
            }]
        }),
        Platform::CrossPlatform,
    );
    assert!(!source.contains("View"));
    assert!(source.contains("<>\n"));
}

#[test]
fn test_explicit_style_prop_merges_after_generated_fragments() {
    let doc = json!({
        "components": [{
            "name": "App",
            "children": [
                {"type": "span", "style": [{"color": "red"}], "props": {"style": "{extra}"}},
                {"type": "b", "props": {"style": "{plain}"}}
            ]
        }]
    });
    let web = component_source(doc.clone(), Platform::Web);
    assert!(web.contains("<span style={{ color: \"red\", ...(extra) }} />"));
    assert!(web.contains("<b style={plain} />"));

    let native = component_source(doc, Platform::CrossPlatform);
    assert!(native.contains("<span style={mergeStyles({ color: \"red\" }, extra)} />"));
    assert!(native.contains("import { mergeStyles } from '@uitree/runtime';"));
}

#[test]
fn test_generated_class_precedes_explicit_class_names() {
    let source = component_source(
        json!({
            "components": [{
                "name": "App",
                "children": [{
                    "type": "button",
                    "name": "Toggle",
                    "props": {"className": "{active ? 'on' : ''}"},
                    "style": [{"selector": "&:focus", "style": {"outline": "none"}}]
                }]
            }]
        }),
        Platform::Web,
    );
    assert!(source.contains("<button className={`toggle-"));
    assert!(source.contains(" ${active ? 'on' : ''}`} />"));
}

#[test]
fn test_web_format_guard_never_reaches_runtime() {
    let source = component_source(
        json!({
            "styleFormats": {"wide": {"minWidth": 1024}},
            "components": [{
                "name": "App",
                "children": [{"type": "div", "style": [{"format": "wide", "style": {"width": 30}}, {"height": 2}]}]
            }]
        }),
        Platform::Web,
    );
    assert!(!source.contains("matchFormat"));
    assert!(source.contains("style={{ height: 2 }}"));
}
