use serde::Deserialize;
use tracing::debug;

use crate::error::CampaignResult;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CAMPAIGN_EXPRESS__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    /// JSON field schema. The built-in CRM catalog is used when unset.
    #[serde(default)]
    pub schema_path: Option<String>,
    #[serde(default = "default_preview_chunk_size")]
    pub preview_chunk_size: usize,
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_preview_chunk_size() -> usize {
    4096
}
fn default_history_depth() -> usize {
    100
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            schema_path: None,
            preview_chunk_size: default_preview_chunk_size(),
            history_depth: default_history_depth(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            segmentation: SegmentationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> CampaignResult<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an optional TOML file, with environment
    /// variables taking precedence.
    pub fn load_from(path: Option<&str>) -> CampaignResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!(path, "Reading config file");
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGN_EXPRESS")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}
