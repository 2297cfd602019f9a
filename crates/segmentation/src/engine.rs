//! Segmentation engine: ties the field registry, segment storage and
//! audience evaluation together for campaign targeting.

use std::sync::Arc;

use campaign_core::config::SegmentationConfig;
use tracing::info;
use uuid::Uuid;

use crate::error::SegmentResult;
use crate::evaluator::{evaluate_expression, PopulationResult};
use crate::expression::SegmentExpression;
use crate::fields::{FieldRegistry, RegistryHandle};
use crate::history::ExpressionHistory;
use crate::preview::{evaluate_population_chunked, AudiencePreview, PreviewOutcome};
use crate::record::CustomerRecord;
use crate::store::{InMemorySegmentStore, LoadedSegment, SegmentStore, SegmentSummary};

/// Reads the field schema named by the config, or falls back to the
/// built-in CRM catalog when none is configured.
pub fn load_registry(config: &SegmentationConfig) -> SegmentResult<FieldRegistry> {
    match &config.schema_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let registry = FieldRegistry::from_json(&json)?;
            info!(path = %path, fields = registry.len(), "Loaded field schema");
            Ok(registry)
        }
        None => Ok(FieldRegistry::crm_default()),
    }
}

pub struct SegmentationEngine {
    registry: RegistryHandle,
    store: Arc<dyn SegmentStore>,
    preview: AudiencePreview,
    chunk_size: usize,
    history_depth: usize,
}

impl SegmentationEngine {
    /// Engine backed by an in-memory segment store.
    pub fn new(config: &SegmentationConfig, registry: RegistryHandle) -> Self {
        let store = Arc::new(InMemorySegmentStore::new(registry.clone()));
        Self::with_store(config, registry, store)
    }

    pub fn with_store(
        config: &SegmentationConfig,
        registry: RegistryHandle,
        store: Arc<dyn SegmentStore>,
    ) -> Self {
        Self {
            registry,
            store,
            preview: AudiencePreview::new(config.preview_chunk_size),
            chunk_size: config.preview_chunk_size,
            history_depth: config.history_depth,
        }
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn preview(&self) -> &AudiencePreview {
        &self.preview
    }

    /// Editing session for a new segment draft.
    pub fn new_draft(&self) -> ExpressionHistory {
        ExpressionHistory::new(SegmentExpression::new(), self.history_depth)
    }

    pub fn save_segment(
        &self,
        name: &str,
        description: &str,
        expression: &SegmentExpression,
    ) -> SegmentResult<Uuid> {
        self.store.save(name, description, expression)
    }

    pub fn load_segment(&self, id: Uuid) -> SegmentResult<LoadedSegment> {
        self.store.get(id)
    }

    pub fn list_segments(&self) -> Vec<SegmentSummary> {
        self.store.list()
    }

    pub fn delete_segment(&self, id: Uuid) -> SegmentResult<()> {
        self.store.delete(id)
    }

    /// Membership of one customer in a saved segment.
    pub fn evaluate_user(&self, segment_id: Uuid, record: &CustomerRecord) -> SegmentResult<bool> {
        let loaded = self.store.get(segment_id)?;
        Ok(evaluate_expression(&loaded.expression, record))
    }

    /// Turns a saved segment into the list of matching customers.
    pub async fn resolve_audience(
        &self,
        segment_id: Uuid,
        records: Arc<[CustomerRecord]>,
    ) -> SegmentResult<PopulationResult> {
        let loaded = self.store.get(segment_id)?;
        let result =
            evaluate_population_chunked(Arc::new(loaded.expression), records, self.chunk_size).await?;
        info!(
            segment_id = %segment_id,
            evaluated = result.evaluated,
            matched = result.match_count,
            "Audience resolved"
        );
        Ok(result)
    }

    /// Audience size for a draft. Starting a new preview supersedes any
    /// still in flight.
    pub async fn preview_audience(
        &self,
        expression: Arc<SegmentExpression>,
        records: Arc<[CustomerRecord]>,
    ) -> SegmentResult<PreviewOutcome> {
        let ticket = self.preview.begin();
        self.preview.run(ticket, expression, records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SegmentBuilder;
    use crate::error::SegmentError;
    use crate::value::TypedValue;

    fn customers() -> Arc<[CustomerRecord]> {
        vec![
            CustomerRecord::new("ana")
                .with_attribute("name", TypedValue::text("Ana Silva"))
                .with_attribute("tier", TypedValue::text("gold")),
            CustomerRecord::new("bea").with_attribute("tier", TypedValue::text("silver")),
            CustomerRecord::new("cai"),
        ]
        .into()
    }

    #[tokio::test]
    async fn test_resolve_saved_segment() {
        let engine = SegmentationEngine::new(&SegmentationConfig::default(), RegistryHandle::default());
        let registry = engine.registry().snapshot();
        let expr = SegmentBuilder::new(&registry)
            .equals("tier", TypedValue::text("gold"))
            .or_group()
            .equals("tier", TypedValue::text("silver"))
            .build()
            .unwrap();
        let id = engine.save_segment("Gold or silver", "", &expr).unwrap();

        let result = engine.resolve_audience(id, customers()).await.unwrap();
        assert_eq!(result.matching_ids, vec!["ana".to_string(), "bea".to_string()]);
        assert!(engine.evaluate_user(id, &customers()[0]).unwrap());
        assert!(!engine.evaluate_user(id, &customers()[2]).unwrap());
        assert_eq!(engine.list_segments().len(), 1);

        engine.delete_segment(id).unwrap();
        assert!(matches!(
            engine.resolve_audience(id, customers()).await,
            Err(SegmentError::SegmentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_preview_draft() {
        let engine = SegmentationEngine::new(&SegmentationConfig::default(), RegistryHandle::default());
        let registry = engine.registry().snapshot();
        let mut draft = engine.new_draft();
        draft
            .apply(|e| e.add_condition(&registry, e.first_group_id(), "name"))
            .unwrap();

        // An incomplete condition matches nobody.
        let outcome = engine.preview_audience(draft.current(), customers()).await.unwrap();
        let PreviewOutcome::Current(estimate) = outcome else {
            panic!("only preview in flight");
        };
        assert_eq!(estimate.result.match_count, 0);

        draft.undo();
        let outcome = engine.preview_audience(draft.current(), customers()).await.unwrap();
        let PreviewOutcome::Current(estimate) = outcome else {
            panic!("only preview in flight");
        };
        assert_eq!(estimate.result.match_count, 3);
    }

    #[test]
    fn test_load_registry_default_and_file() {
        let config = SegmentationConfig::default();
        assert_eq!(load_registry(&config).unwrap().len(), FieldRegistry::crm_default().len());

        let path = std::env::temp_dir().join(format!("segment-schema-{}.json", Uuid::new_v4()));
        std::fs::write(&path, r#"[{"id": "score", "displayName": "Score", "type": "number"}]"#).unwrap();
        let config = SegmentationConfig {
            schema_path: Some(path.to_string_lossy().into_owned()),
            ..SegmentationConfig::default()
        };
        let registry = load_registry(&config).unwrap();
        assert!(registry.get_field("score").is_ok());
        std::fs::remove_file(path).unwrap();

        let missing = SegmentationConfig {
            schema_path: Some("/nonexistent/schema.json".into()),
            ..SegmentationConfig::default()
        };
        assert!(matches!(load_registry(&missing), Err(SegmentError::Io(_))));
    }
}
