//! Configuration management commands.

use std::fs;

use anyhow::{Context as _, Result};
use dialoguer::Confirm;
use worker_sdk::WorkerConfig;

use super::{ConfigArgs, ConfigCommand};
use crate::context::{Context, CONFIG_NAMES};

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { path, force } => init_config(path.as_deref(), force, ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let config = &ctx.config;

    ctx.output.info("");
    ctx.output.info("[scope]");
    ctx.output.kv("origin", &config.scope.origin);
    ctx.output.kv("base_path", &config.scope.base_path);

    ctx.output.info("");
    ctx.output.info("[cookie]");
    ctx.output.kv("name", &config.cookie.name);
    ctx.output.kv("ceiling_ms", &config.cookie.ceiling_ms.to_string());
    ctx.output.kv("max_age", &config.cookie.max_age.to_string());

    ctx.output.info("");
    ctx.output.info("[cache]");
    ctx.output.kv("prefix", &config.cache.prefix);
    ctx.output.kv("version", &config.cache.version);
    ctx.output.kv("manifest", &format!("{} asset(s)", config.cache.manifest.len()));

    ctx.output.info("");
    ctx.output.kv("navigation_preload", &config.navigation_preload.to_string());

    Ok(())
}

async fn init_config(path: Option<&str>, force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.resolve_path(path.unwrap_or(CONFIG_NAMES[0]));

    if config_path.exists() && !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("{} exists. Overwrite?", config_path.display()))
            .default(false)
            .interact()?;

        if !confirmed {
            ctx.output.warn("Config init cancelled");
            return Ok(());
        }
    }

    let defaults = WorkerConfig::default();
    let content = if config_path.extension().is_some_and(|e| e == "json") {
        serde_json::to_string_pretty(&defaults)?
    } else {
        format!("# Intercepting worker configuration\n\n{}", defaults.to_toml()?)
    };
    fs::write(&config_path, content)
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}
