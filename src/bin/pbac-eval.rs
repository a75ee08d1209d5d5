//! pbac-eval
//!
//! Decides one request against policy document files. Prints `ALLOW` or
//! `DENY` and exits 0 (allowed), 1 (denied) or 2 (error).

use anyhow::Context as _;
use clap::Parser;
use pbac_rs::{PolicyEngine, Request};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pbac-eval")]
#[command(about = "Evaluate an access request against IAM-style policy documents")]
struct Args {
    /// Policy file: one JSON document or an array of documents (repeatable)
    #[arg(short = 'p', long = "policies", required = true)]
    policies: Vec<PathBuf>,

    /// Request file: JSON with action, resource, principal and context
    #[arg(short = 'r', long)]
    request: Option<PathBuf>,

    /// Action to evaluate (overrides the request file)
    #[arg(short = 'a', long)]
    action: Option<String>,

    /// Resource to evaluate (overrides the request file)
    #[arg(short = 'R', long)]
    resource: Option<String>,

    /// Accept policy documents without validating them
    #[arg(long)]
    no_validate: bool,

    /// Compiled pattern cache size (0 disables caching)
    #[arg(long, default_value = "1024")]
    cache_capacity: usize,
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn run(args: &Args) -> anyhow::Result<bool> {
    let mut builder = PolicyEngine::builder()
        .validate_policies(!args.no_validate)
        .pattern_cache_capacity(args.cache_capacity);

    for path in &args.policies {
        info!("Loading policies from {:?}", path);
        builder = builder.policies(read_json(path)?);
    }

    let engine = builder.build().context("Failed to load policies")?;

    let mut request = match &args.request {
        Some(path) => serde_json::from_value::<Request>(read_json(path)?)
            .with_context(|| format!("Invalid request in {}", path.display()))?,
        None => Request::default(),
    };
    if let Some(action) = &args.action {
        request.action = action.clone();
    }
    if let Some(resource) = &args.resource {
        request.resource = resource.clone();
    }

    info!(
        "Evaluating '{}' on '{}' against {} statements",
        request.action,
        request.resource,
        engine.statement_count()
    );

    Ok(engine.evaluate(&request)?)
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(true) => {
            println!("ALLOW");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("DENY");
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
