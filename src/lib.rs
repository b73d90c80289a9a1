//! # uitree compiler
//!
//! Compiles a declarative JSON UI tree into component source files plus two
//! stylesheet artifacts, for the `web` or `cross-platform` target.
//!
//! ## Pipeline
//!
//! 1. **Load** (`parse`): raw JSON → typed `AppTree`, or every structural error.
//! 2. **Names** (`renamer`): explicit names reserved, anonymous inline
//!    definitions and styled nodes named from their position.
//! 3. **Contexts** (`context`): app-wide provider registry, consumers resolved.
//!    User imports of every file are checked in the same pass, so one run
//!    reports name, context and import errors together.
//! 4. **Per component** (`codegen`, on the rayon pool): expression
//!    normalization (`transform`), style resolution (`style` + `target`),
//!    import collection (`imports`), markup.
//! 5. **Finalize** (`finalize`): artifacts concatenated in declaration order.
//!
//! Name and context registries are frozen before step 4, so the per-component
//! work only reads shared state and the output never depends on scheduling.
//!
//! A run yields either the complete artifact set or the ordered error list,
//! never both.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, info_span};

pub mod cache;
pub mod codegen;
pub mod config;
pub mod context;
pub mod discovery;
pub mod finalize;
pub mod imports;
pub mod parse;
pub mod renamer;
pub mod style;
pub mod target;
pub mod transform;
pub mod tree;
pub mod validate;
pub mod visitor;

#[cfg(test)]
mod style_tests;

pub use config::{CompileOptions, Platform};
pub use finalize::{Artifact, ArtifactKind, CompileOutput};
pub use validate::*;

use codegen::{generate_component, CodegenContext};
use renamer::NameTable;

/// Compile a parsed document.
pub fn compile_app(document: &Value, options: &CompileOptions) -> Result<CompileOutput, CompileFailure> {
    let _span = info_span!("compile_app").entered();

    let app = parse::load_app(document).map_err(CompileFailure::new)?;
    let platform = options.resolve_platform(app.platform);
    let target = target::target_for(platform);
    debug!(%platform, components = app.components.len(), "loaded");

    let mut errors = vec![];
    let mut names = match renamer::resolve_names(&app) {
        Ok(names) => names,
        Err(e) => {
            errors.extend(e);
            NameTable::default()
        }
    };
    let contexts = match context::bind_contexts(&app, &mut names) {
        Ok(contexts) => contexts,
        Err(e) => {
            errors.extend(e);
            context::ContextRegistry::default()
        }
    };
    errors.extend(imports::check_app_imports(&app));
    if !errors.is_empty() {
        return Err(CompileFailure::new(errors));
    }

    let ctx = CodegenContext {
        app: &app,
        names: &names,
        contexts: &contexts,
        options,
        target,
    };
    let results: Vec<_> = if options.parallel {
        (0..app.components.len())
            .into_par_iter()
            .map(|i| generate_component(&ctx, i))
            .collect()
    } else {
        (0..app.components.len())
            .map(|i| generate_component(&ctx, i))
            .collect()
    };

    let mut components = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(component) => components.push(component),
            Err(e) => errors.extend(e),
        }
    }
    if !errors.is_empty() {
        return Err(CompileFailure::new(errors));
    }

    let output = finalize::finalize_output(&app, components, &contexts, options, platform);
    info!(
        %platform,
        files = output.files.len(),
        fingerprint = %&output.fingerprint[..12],
        "compiled"
    );
    Ok(output)
}

/// Compile a document given as JSON text.
pub fn compile_str(source: &str, options: &CompileOptions) -> Result<CompileOutput, CompileFailure> {
    let document: Value = serde_json::from_str(source).map_err(|e| {
        CompileFailure::new(vec![CompilerError::structural(
            INV_INVALID_DOCUMENT,
            "$",
            format!("document is not valid JSON: {}", e),
        )])
    })?;
    compile_app(&document, options)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi(object)]
pub struct NativeCompileResult {
    pub platform: String,
    pub files: Vec<finalize::ArtifactReport>,
    pub fingerprint: String,
    pub errors: Vec<ErrorReport>,
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_app_native(
    document: Value,
    options: Option<Value>,
) -> napi::Result<NativeCompileResult> {
    let options: CompileOptions = match options {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| napi::Error::from_reason(format!("Invalid options: {}", e)))?,
        None => CompileOptions::default(),
    };
    Ok(match compile_app(&document, &options) {
        Ok(output) => NativeCompileResult {
            platform: output.platform.to_string(),
            files: output.files.iter().map(Into::into).collect(),
            fingerprint: output.fingerprint,
            errors: vec![],
        },
        Err(failure) => NativeCompileResult {
            platform: options.resolve_platform(None).to_string(),
            files: vec![],
            fingerprint: String::new(),
            errors: failure.errors.iter().map(Into::into).collect(),
        },
    })
}
