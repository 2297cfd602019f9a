//! Segment preview: validate saved segments and compute audience sizes
//! from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use campaign_core::config::AppConfig;
use campaign_core::{CampaignError, CampaignResult};
use campaign_segmentation::engine::load_registry;
use campaign_segmentation::preview::evaluate_population_chunked;
use campaign_segmentation::{codec, CustomerRecord, FieldRegistry};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "segment-preview")]
#[command(about = "Validate customer segments and compute audience sizes")]
#[command(version)]
struct Cli {
    /// TOML config file (environment variables take precedence)
    #[arg(long)]
    config: Option<String>,

    /// Field schema JSON (overrides config)
    #[arg(long, env = "CAMPAIGN_EXPRESS__SEGMENTATION__SCHEMA_PATH")]
    schema: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List segmentable fields and their operators
    Fields,
    /// Check a serialized segment against the field schema
    Validate {
        #[arg(long)]
        segment: PathBuf,
    },
    /// Count the customers matching a segment
    Count {
        #[arg(long)]
        segment: PathBuf,
        /// JSON array of {"customerId", "attributes"} objects
        #[arg(long)]
        customers: PathBuf,
        /// Records per evaluation chunk (overrides config)
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Print matching customer ids as well as the count
        #[arg(long, default_value_t = false)]
        ids: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCustomer {
    customer_id: String,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldListing<'a> {
    id: &'a str,
    display_name: &'a str,
    operators: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CountReport {
    evaluated: usize,
    match_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    matching_ids: Option<Vec<String>>,
    mismatches: Vec<codec::ConfigMismatch>,
    skipped_attributes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segment_preview=info,campaign_segmentation=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load_from(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(schema) = cli.schema {
        config.segmentation.schema_path = Some(schema);
    }

    let registry = load_registry(&config.segmentation)?;
    info!(node_id = %config.node_id, fields = registry.len(), "Field registry ready");

    match cli.command {
        Command::Fields => {
            let listing: Vec<FieldListing> = registry
                .fields()
                .iter()
                .map(|f| FieldListing {
                    id: &f.id,
                    display_name: &f.display_name,
                    operators: f.operators().iter().map(|op| op.id()).collect(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Command::Validate { segment } => {
            let decoded = codec::from_json(&read_file(&segment)?, &registry)?;
            println!("{}", serde_json::to_string_pretty(&decoded.mismatches)?);
            if !decoded.is_clean() {
                return Err(CampaignError::Validation(format!(
                    "{} condition(s) do not match the field schema",
                    decoded.mismatches.len()
                ))
                .into());
            }
        }
        Command::Count {
            segment,
            customers,
            chunk_size,
            ids,
        } => {
            let decoded = codec::from_json(&read_file(&segment)?, &registry)?;
            let (records, skipped) = load_customers(&customers, &registry)?;
            let chunk_size = chunk_size.unwrap_or(config.segmentation.preview_chunk_size);

            let result =
                evaluate_population_chunked(Arc::new(decoded.expression), records, chunk_size).await?;
            info!(
                evaluated = result.evaluated,
                matched = result.match_count,
                "Audience computed"
            );
            let report = CountReport {
                evaluated: result.evaluated,
                match_count: result.match_count,
                matching_ids: ids.then_some(result.matching_ids),
                mismatches: decoded.mismatches,
                skipped_attributes: skipped,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn read_file(path: &Path) -> CampaignResult<String> {
    Ok(std::fs::read_to_string(path)?)
}

fn load_customers(
    path: &Path,
    registry: &FieldRegistry,
) -> CampaignResult<(Arc<[CustomerRecord]>, usize)> {
    let raw: Vec<RawCustomer> = serde_json::from_str(&read_file(path)?)?;
    if raw.is_empty() {
        warn!(path = %path.display(), "Customer file is empty");
    }
    let mut skipped = 0;
    let records: Vec<CustomerRecord> = raw
        .into_iter()
        .map(|c| {
            let (record, rejected) =
                CustomerRecord::from_json_attributes(c.customer_id, &c.attributes, registry);
            if !rejected.is_empty() {
                warn!(customer_id = %record.customer_id, fields = ?rejected, "Skipped unreadable attributes");
                skipped += rejected.len();
            }
            record
        })
        .collect();
    Ok((records.into(), skipped))
}
