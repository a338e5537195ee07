//! Cache generation and manifest listing.

use anyhow::Result;
use serde::Serialize;
use worker_sdk::worker_cache::CacheGeneration;

use crate::context::Context;

#[derive(Serialize)]
struct ManifestReport {
    cache: String,
    assets: Vec<String>,
}

/// Run the manifest command.
pub async fn run(ctx: &Context) -> Result<()> {
    let generation = CacheGeneration::from_config(&ctx.config.cache);
    let report = ManifestReport {
        cache: generation.name(),
        assets: ctx
            .config
            .cache
            .manifest
            .iter()
            .map(|asset| ctx.config.scope.resolve(asset))
            .collect(),
    };

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    ctx.output.header("Cache Manifest");
    ctx.output.kv("cache", &report.cache);
    ctx.output.kv("assets", &report.assets.len().to_string());
    for asset in &report.assets {
        ctx.output.list_item(asset);
    }

    Ok(())
}
