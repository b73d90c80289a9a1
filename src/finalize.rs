//! Finalize Module for the uitree compiler
//!
//! Assembles per-component results into the artifact set of one run: the
//! component sources, the global stylesheet, the style module and the shared
//! contexts module. Concatenation always follows component declaration order.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::codegen::{ComponentArtifact, GLOBAL_STYLESHEET, STYLE_MODULE};
use crate::config::{CompileOptions, Platform};
use crate::context::{ContextRegistry, CONTEXTS_MODULE};
use crate::tree::AppTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    Component,
    GlobalStylesheet,
    StyleModule,
    Contexts,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Component => "component",
            ArtifactKind::GlobalStylesheet => "globalStylesheet",
            ArtifactKind::StyleModule => "styleModule",
            ArtifactKind::Contexts => "contexts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Relative to the output root, always `/`-separated.
    pub path: String,
    pub kind: ArtifactKind,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub platform: Platform,
    pub files: Vec<Artifact>,
    /// SHA-256 over every artifact path and contents, in order.
    pub fingerprint: String,
}

impl CompileOutput {
    pub fn file(&self, path: &str) -> Option<&Artifact> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn of_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = &Artifact> {
        self.files.iter().filter(move |f| f.kind == kind)
    }

    /// Writes every artifact below `out_dir`, creating directories as needed.
    pub fn write_to(&self, out_dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.files.len());
        for artifact in &self.files {
            let target = out_dir.join(&artifact.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, &artifact.contents)?;
            written.push(target);
        }
        Ok(written)
    }
}

/// The app-level sheet copied unchanged, then every non-blank component
/// section on its own line, separated from what precedes it by a blank line.
fn append_sections<'s>(base: &str, sections: impl IntoIterator<Item = &'s str>) -> String {
    let mut out = base.to_string();
    for section in sections {
        if section.trim().is_empty() {
            continue;
        }
        if !out.is_empty() {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(section);
        if !section.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

pub fn fingerprint(files: &[Artifact]) -> String {
    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(file.contents.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

pub fn finalize_output(
    app: &AppTree,
    components: Vec<ComponentArtifact>,
    contexts: &ContextRegistry,
    options: &CompileOptions,
    platform: Platform,
) -> CompileOutput {
    let style_dir = options.style_dir.trim_end_matches('/');

    let global = append_sections(
        &app.style_sheet,
        components
            .iter()
            .flat_map(|c| c.style_sheet.iter().map(String::as_str)),
    );
    let module = append_sections(
        &app.style_module,
        components
            .iter()
            .flat_map(|c| c.style_module.iter().map(String::as_str)),
    );

    let mut files: Vec<Artifact> = components
        .into_iter()
        .map(|c| Artifact {
            path: c.path,
            kind: ArtifactKind::Component,
            contents: c.source,
        })
        .collect();
    files.push(Artifact {
        path: format!("{}/{}", style_dir, GLOBAL_STYLESHEET),
        kind: ArtifactKind::GlobalStylesheet,
        contents: global,
    });
    files.push(Artifact {
        path: format!("{}/{}", style_dir, STYLE_MODULE),
        kind: ArtifactKind::StyleModule,
        contents: module,
    });
    if !contexts.is_empty() {
        files.push(Artifact {
            path: CONTEXTS_MODULE.to_string(),
            kind: ArtifactKind::Contexts,
            contents: contexts.render_module(),
        });
    }

    CompileOutput {
        platform,
        fingerprint: fingerprint(&files),
        files,
    }
}

/// Flattened artifact handed across the Node bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct ArtifactReport {
    pub path: String,
    pub kind: String,
    pub contents: String,
}

impl From<&Artifact> for ArtifactReport {
    fn from(a: &Artifact) -> Self {
        ArtifactReport {
            path: a.path.clone(),
            kind: a.kind.as_str().to_string(),
            contents: a.contents.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str, sheet: &[&str], module: &[&str]) -> ComponentArtifact {
        ComponentArtifact {
            name: name.into(),
            path: format!("components/{}.jsx", name),
            source: format!("export default function {}() {{}}\n", name),
            style_sheet: sheet.iter().map(|s| s.to_string()).collect(),
            style_module: module.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_stylesheets_follow_declaration_order() {
        let app = AppTree {
            style_sheet: "body { margin: 0; }\n".into(),
            style_module: "$accent: red;".into(),
            ..Default::default()
        };
        let output = finalize_output(
            &app,
            vec![
                artifact("A", &[], &[".a-111111 {}"]),
                artifact("B", &["h1 { color: blue; }"], &[".b-222222 {}"]),
            ],
            &ContextRegistry::default(),
            &CompileOptions::default(),
            Platform::Web,
        );
        assert_eq!(
            output.file("styles/global.css").unwrap().contents,
            "body { margin: 0; }\n\nh1 { color: blue; }\n"
        );
        assert_eq!(
            output.file("styles/app.scss").unwrap().contents,
            "$accent: red;\n\n.a-111111 {}\n\n.b-222222 {}\n"
        );
        assert!(output.file(CONTEXTS_MODULE).is_none());
        let paths: Vec<&str> = output.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "components/A.jsx",
                "components/B.jsx",
                "styles/global.css",
                "styles/app.scss"
            ]
        );
    }

    #[test]
    fn test_app_level_sheets_are_copied_unchanged() {
        let app = AppTree {
            style_sheet: "/* reset */\n\n\n".into(),
            style_module: "  ".into(),
            ..Default::default()
        };
        let output = finalize_output(
            &app,
            vec![artifact("A", &[], &[]), artifact("B", &["  \n"], &[])],
            &ContextRegistry::default(),
            &CompileOptions::default(),
            Platform::Web,
        );
        assert_eq!(output.file("styles/global.css").unwrap().contents, "/* reset */\n\n\n");
        assert_eq!(output.file("styles/app.scss").unwrap().contents, "  ");

        let appended = append_sections("a {}", ["b {}\n", "c {}"]);
        assert_eq!(appended, "a {}\n\nb {}\n\nc {}\n");
    }

    #[test]
    fn test_fingerprint_tracks_contents() {
        let a = vec![Artifact {
            path: "x".into(),
            kind: ArtifactKind::Component,
            contents: "1".into(),
        }];
        let mut b = a.clone();
        assert_eq!(fingerprint(&a), fingerprint(&b));
        b[0].contents = "2".into();
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_write_to_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let output = finalize_output(
            &AppTree::default(),
            vec![artifact("App", &[], &[])],
            &ContextRegistry::default(),
            &CompileOptions::default(),
            Platform::Web,
        );
        let written = output.write_to(dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert!(dir.path().join("components/App.jsx").is_file());
        assert!(dir.path().join("styles/global.css").is_file());
    }
}
