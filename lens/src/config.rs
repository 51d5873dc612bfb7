//! Configuration for a catalog lens.

use std::path::Path;
use std::time::Duration;

use kedro_lens_catalog::ExtractorConfig;
use kedro_lens_directory_watcher::CatalogConvention;
use kedro_lens_matcher::MatcherConfig;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for a catalog lens.
///
/// Every section is optional in TOML; missing values fall back to the
/// defaults of a standard Kedro project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Where catalog files live.
    pub catalog: CatalogConvention,

    /// How catalog entries are read.
    pub extractor: ExtractorConfig,

    /// How node calls are recognized.
    pub matcher: MatcherConfig,

    /// Sync configuration.
    pub sync: SyncConfig,
}

impl LensConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&text)
    }

    /// Set the catalog convention.
    pub fn with_catalog(mut self, convention: CatalogConvention) -> Self {
        self.catalog = convention;
        self
    }

    /// Set the extractor configuration.
    pub fn with_extractor(mut self, config: ExtractorConfig) -> Self {
        self.extractor = config;
        self
    }

    /// Set the matcher configuration.
    pub fn with_matcher(mut self, config: MatcherConfig) -> Self {
        self.matcher = config;
        self
    }

    /// Set the sync configuration.
    pub fn with_sync(mut self, config: SyncConfig) -> Self {
        self.sync = config;
        self
    }
}

/// Configuration for synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay between checks while the host forbids index mutation (in milliseconds).
    pub retry_interval_ms: u64,

    /// Capacity of the file event and notification channels.
    pub event_channel_capacity: usize,

    /// Window for grouping file events into one batch (in milliseconds).
    pub debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 50,
            event_channel_capacity: 128,
            debounce_ms: 100,
        }
    }
}

impl SyncConfig {
    /// Retry interval as a duration.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Debounce window as a duration.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Set the retry interval.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = LensConfig::from_toml_str(
            r#"
[catalog]
conf_segment = "settings"

[matcher]
slot_keywords = ["inputs", "outputs", "sources"]

[sync]
retry_interval_ms = 10
"#,
        )
        .unwrap();

        assert_eq!(config.catalog.conf_segment, "settings");
        assert_eq!(config.catalog.catalog_segment, "catalog");
        assert_eq!(config.matcher.slot_keywords.len(), 3);
        assert_eq!(config.matcher.library, "kedro");
        assert_eq!(config.sync.retry_interval(), Duration::from_millis(10));
        assert_eq!(config.sync.debounce_ms, 100);
        assert_eq!(config.extractor, ExtractorConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(LensConfig::from_toml_str("[sync\nretry_interval_ms = ").is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("kedro-lens.toml");
        tokio::fs::write(&path, "[extractor]\nplaceholder_prefix = \"__\"\n")
            .await
            .unwrap();

        let config = LensConfig::load(&path).await.unwrap();
        assert_eq!(config.extractor.placeholder_prefix, "__");
        assert_eq!(config.sync, SyncConfig::default());
    }
}
