pub mod config;
pub mod error;

pub use config::{AppConfig, SegmentationConfig};
pub use error::{CampaignError, CampaignResult};
