use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on packets processed concurrently.
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub top_protocols: usize,
    pub top_conversations: usize,
    pub top_queries: usize,
    pub refresh_rate_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { workers: 8 }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_protocols: 10,
            top_conversations: 5,
            top_queries: 5,
            refresh_rate_ms: 250,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl ReportConfig {
    pub fn refresh_rate(&self) -> Duration {
        Duration::from_millis(self.refresh_rate_ms)
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.workers == 0 {
            bail!("engine.workers must be at least 1");
        }
        if self.cache.ttl_secs == 0 {
            bail!("cache.ttl_secs must be at least 1");
        }
        if self.cache.sweep_interval_secs == 0 {
            bail!("cache.sweep_interval_secs must be at least 1");
        }
        if self.report.refresh_rate_ms == 0 {
            bail!("report.refresh_rate_ms must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.workers, 8);
        assert_eq!(config.cache.ttl(), Duration::from_secs(1800));
        assert_eq!(config.cache.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.report.top_protocols, 10);
        assert_eq!(config.report.top_conversations, 5);
        assert_eq!(config.report.top_queries, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [engine]
            workers = 2

            [report]
            top_queries = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.workers, 2);
        assert_eq!(config.report.top_queries, 20);
        assert_eq!(config.report.top_protocols, 10);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero() {
        let mut config = Config::default();
        config.engine.workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("traffic-lens-{}.toml", uuid::Uuid::new_v4()));
        let mut config = Config::default();
        config.cache.ttl_secs = 90;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load_from_file("/nonexistent/traffic-lens.toml").is_err());
    }
}
