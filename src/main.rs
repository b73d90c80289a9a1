//! uitree - compile declarative JSON UI trees into component source
//!
//! # Usage
//!
//! ```bash
//! # Compile one document for the web
//! uitree compile shop.app.json --out dist
//!
//! # Compile every *.app.json below a directory for the cross-platform target
//! uitree compile apps/ --platform cross-platform --out dist
//!
//! # Validate only, print errors as JSON
//! uitree check shop.app.json --json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uitree_compiler::cache::IncrementalCache;
use uitree_compiler::discovery::{find_documents, read_document, SourceDocument};
use uitree_compiler::{compile_app, CompileFailure, CompileOptions, CompileOutput, Platform};

#[derive(Parser)]
#[command(name = "uitree")]
#[command(version)]
#[command(about = "Compile declarative JSON UI trees into component source and stylesheets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile documents and write the generated artifacts
    Compile {
        /// A document, or a directory scanned for *.app.json
        input: PathBuf,

        /// Target platform (web | cross-platform); overrides the document
        #[arg(short, long)]
        platform: Option<Platform>,

        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,

        /// JSON file with compile options; flags take precedence
        #[arg(long)]
        config: Option<PathBuf>,

        /// Recompile even when the cached output is current
        #[arg(long)]
        no_cache: bool,

        /// Cache directory
        #[arg(long, default_value = ".uitree/cache")]
        cache_dir: PathBuf,

        /// Run component generation sequentially
        #[arg(long)]
        sequential: bool,
    },

    /// Validate documents without writing anything
    Check {
        /// A document, or a directory scanned for *.app.json
        input: PathBuf,

        /// Target platform (web | cross-platform); overrides the document
        #[arg(short, long)]
        platform: Option<Platform>,

        /// Print errors as a JSON array
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uitree=info,uitree_compiler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

fn load_options(config: Option<&Path>, platform: Option<Platform>) -> Result<CompileOptions> {
    let mut options = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => CompileOptions::default(),
    };
    if platform.is_some() {
        options.platform = platform;
    }
    Ok(options)
}

fn documents(input: &Path) -> Result<Vec<SourceDocument>> {
    if !input.exists() {
        bail!("input {} does not exist", input.display());
    }
    let paths = find_documents(input);
    if paths.is_empty() {
        bail!("no *.app.json documents found under {}", input.display());
    }
    paths
        .iter()
        .map(|p| read_document(p).map_err(anyhow::Error::from))
        .collect()
}

fn report(doc: &SourceDocument, failure: &CompileFailure) {
    for e in &failure.errors {
        error!(document = %doc.path.display(), code = %e.code, path = %e.path, "{}", e.message);
        eprintln!("{}: {}", doc.path.display(), e);
        for related in &e.related {
            eprintln!("    related: {}", related);
        }
    }
}

fn compile_one(
    doc: &SourceDocument,
    options: &CompileOptions,
    cache: Option<&IncrementalCache>,
) -> Result<CompileOutput, CompileFailure> {
    let key = doc.path.to_string_lossy().to_string();
    let hash = IncrementalCache::compute_hash(&doc.text, options);
    if let Some(cached) = cache.and_then(|c| c.get(&key, &hash)) {
        info!(document = %key, "unchanged, using cached output");
        return Ok(cached);
    }
    let output = compile_app(&doc.value, options)?;
    if let Some(cache) = cache {
        cache.set(&key, &hash, &output);
    }
    Ok(output)
}

fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Compile {
            input,
            platform,
            out,
            config,
            no_cache,
            cache_dir,
            sequential,
        } => {
            let mut options = load_options(config.as_deref(), platform)?;
            if sequential {
                options.parallel = false;
            }
            let docs = documents(&input)?;
            let cache = (!no_cache).then(|| IncrementalCache::new(cache_dir));
            let many = docs.len() > 1;

            let mut ok = true;
            for doc in &docs {
                match compile_one(doc, &options, cache.as_ref()) {
                    Ok(output) => {
                        let dir = if many { out.join(doc.stem()) } else { out.clone() };
                        let written = output
                            .write_to(&dir)
                            .with_context(|| format!("writing output to {}", dir.display()))?;
                        info!(
                            document = %doc.path.display(),
                            platform = %output.platform,
                            files = written.len(),
                            "wrote {}",
                            dir.display()
                        );
                    }
                    Err(failure) => {
                        report(doc, &failure);
                        ok = false;
                    }
                }
            }
            Ok(ok)
        }
        Commands::Check {
            input,
            platform,
            json,
        } => {
            let options = load_options(None, platform)?;
            let mut all_errors = vec![];
            for doc in documents(&input)? {
                if let Err(failure) = compile_app(&doc.value, &options) {
                    if !json {
                        report(&doc, &failure);
                    }
                    all_errors.extend(failure.errors);
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&all_errors)?);
            } else if all_errors.is_empty() {
                println!("ok");
            }
            Ok(all_errors.is_empty())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_tracing() {
        eprintln!("{:#}", e);
    }
    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(2);
        }
    }
}
