//! `fastresolve resolve`: run specifiers through one resolver.

use fastresolve_core::{Resolver, ResolverOptions};
use futures::future::join_all;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Arguments for one invocation.
#[derive(Debug)]
pub struct ResolveAction {
    pub specifiers: Vec<String>,
    pub importer: PathBuf,
    pub config: Option<PathBuf>,
}

/// One resolution for JSON output. `resolved` is null for externals.
#[derive(Debug, Serialize)]
struct ResolveResult {
    specifier: String,
    resolved: Option<PathBuf>,
}

pub fn run(action: ResolveAction, json: bool) -> Result<()> {
    let options = match &action.config {
        Some(path) => ResolverOptions::from_file(path).into_diagnostic()?,
        None => ResolverOptions::default(),
    };
    let resolver = Resolver::new(options)
        .into_diagnostic()
        .wrap_err("invalid resolver options")?;

    // A symlinked importer would otherwise never match paths the resolver
    // canonicalized.
    let importer = dunce::canonicalize(&action.importer).unwrap_or(action.importer);

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let results = runtime.block_on(resolve_all(&resolver, &action.specifiers, &importer));

    if json {
        let json = serde_json::to_string_pretty(&results).into_diagnostic()?;
        println!("{json}");
    } else {
        for result in &results {
            match &result.resolved {
                Some(path) => println!("{} -> {}", result.specifier, path.display()),
                None => println!("{} -> (external)", result.specifier),
            }
        }
    }

    Ok(())
}

async fn resolve_all(
    resolver: &Resolver,
    specifiers: &[String],
    importer: &Path,
) -> Vec<ResolveResult> {
    let lookups = specifiers.iter().map(|specifier| async move {
        ResolveResult {
            specifier: specifier.clone(),
            resolved: resolver.resolve(specifier, Some(importer)).await,
        }
    });
    join_all(lookups).await
}
