use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration, loaded with precedence:
/// 1. Default values
/// 2. Configuration file (ontoflow.toml)
/// 3. Environment variables (prefixed with ONTOFLOW_)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock budget for one transition's action pipeline, in ms.
    /// An action crossing the budget is recorded as TIMEOUT and the
    /// rest of the pipeline is skipped.
    pub action_budget_ms: u64,
    /// Capacity of the parsed guard AST cache.
    pub guard_cache_capacity: u64,
    /// Resolved template cache settings.
    pub template_cache: TemplateCacheConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplateCacheConfig {
    /// Maximum cached resolved definitions.
    pub max_capacity: u64,
    /// Time-to-live for cached definitions, in seconds.
    pub ttl_seconds: u64,
    /// Maximum template inheritance chain length.
    pub max_depth: usize,
}

impl Default for TemplateCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1000,
            ttl_seconds: 300,
            max_depth: 16,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            action_budget_ms: 30_000,
            guard_cache_capacity: 1024,
            template_cache: TemplateCacheConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("ontoflow.toml").exists() {
            builder = builder.add_source(File::with_name("ontoflow"));
        }

        builder = builder.add_source(
            Environment::with_prefix("ONTOFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}
