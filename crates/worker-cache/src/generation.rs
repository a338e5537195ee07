//! Versioned cache names.

use worker_core::CacheConfig;

/// One versioned generation of the static asset cache.
///
/// Bumping the version yields a new name; activation evicts every other name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheGeneration {
    prefix: String,
    version: String,
}

impl CacheGeneration {
    /// Create a generation.
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version: version.into(),
        }
    }

    /// The generation described by the cache config.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.prefix.clone(), config.version.clone())
    }

    /// The name prefix shared by all generations.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The cache name, `{prefix}-v{version}`.
    pub fn name(&self) -> String {
        format!("{}-v{}", self.prefix, self.version)
    }

    /// Whether `cache` is anything other than this generation.
    pub fn is_stale(&self, cache: &str) -> bool {
        cache != self.name()
    }
}

impl std::fmt::Display for CacheGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-v{}", self.prefix, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_default_name() {
        let generation = CacheGeneration::from_config(&CacheConfig::default());
        assert_eq!(generation.name(), "minesweeper-service-worker-cache-v1");
        assert_eq!(generation.to_string(), generation.name());
    }

    #[test]
    fn test_generation_staleness() {
        let generation = CacheGeneration::new("app", "2");

        assert!(!generation.is_stale("app-v2"));
        assert!(generation.is_stale("app-v1"));
        assert!(generation.is_stale("unrelated"));
    }
}
