//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use worker_sdk::WorkerConfig;

use crate::output::Output;

/// Config file names searched for, in order.
pub const CONFIG_NAMES: [&str; 3] = ["worker.toml", ".worker.toml", "worker.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// Effective worker configuration.
    pub config: WorkerConfig,
    /// Where the configuration came from, if not defaults.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = if let Some(path) = config_path {
            let path = resolve(&cwd, path);
            let config = WorkerConfig::load(&path)?;
            (config, Some(path))
        } else {
            // Try to find config in current directory or parent directories
            match Self::find_config(&cwd) {
                Some((config, path)) => (config, Some(path)),
                None => (WorkerConfig::default(), None),
            }
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<(WorkerConfig, PathBuf)> {
        let mut current = start.to_path_buf();
        loop {
            for name in &CONFIG_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    match WorkerConfig::load(&config_path) {
                        Ok(config) => return Some((config, config_path)),
                        Err(e) => tracing::warn!(path = %config_path.display(), error = %e, "skipping unreadable config"),
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        resolve(&self.cwd, path)
    }
}

fn resolve(cwd: &Path, path: &str) -> PathBuf {
    if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        cwd.join(path)
    }
}
