//! Named segment persistence.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::codec::{self, ConfigMismatch};
use crate::error::{SegmentError, SegmentResult};
use crate::expression::SegmentExpression;
use crate::fields::RegistryHandle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A segment read back from storage, decoded against the live registry.
#[derive(Debug, Clone)]
pub struct LoadedSegment {
    pub summary: SegmentSummary,
    pub expression: SegmentExpression,
    pub mismatches: Vec<ConfigMismatch>,
}

/// Storage contract for saved segments. Implementations persist the
/// serialized form, so anything they store must survive
/// [`codec::serialize`] / [`codec::deserialize`] unchanged.
pub trait SegmentStore: Send + Sync {
    fn save(&self, name: &str, description: &str, expression: &SegmentExpression) -> SegmentResult<Uuid>;

    fn get(&self, id: Uuid) -> SegmentResult<LoadedSegment>;

    fn list(&self) -> Vec<SegmentSummary>;

    fn delete(&self, id: Uuid) -> SegmentResult<()>;
}

#[derive(Debug, Clone)]
struct StoredSegment {
    summary: SegmentSummary,
    payload: String,
}

/// In-process store keeping each segment as its JSON document.
pub struct InMemorySegmentStore {
    registry: RegistryHandle,
    segments: DashMap<Uuid, StoredSegment>,
}

impl InMemorySegmentStore {
    pub fn new(registry: RegistryHandle) -> Self {
        Self {
            registry,
            segments: DashMap::new(),
        }
    }

    /// Raw stored document, as another storage medium would hold it.
    pub fn payload(&self, id: Uuid) -> Option<String> {
        self.segments.get(&id).map(|s| s.payload.clone())
    }
}

impl SegmentStore for InMemorySegmentStore {
    fn save(&self, name: &str, description: &str, expression: &SegmentExpression) -> SegmentResult<Uuid> {
        let payload = codec::to_json(expression)?;
        let id = Uuid::new_v4();
        let summary = SegmentSummary {
            id,
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.segments.insert(id, StoredSegment { summary, payload });
        info!(segment_id = %id, name, groups = expression.groups().len(), "Segment saved");
        Ok(id)
    }

    fn get(&self, id: Uuid) -> SegmentResult<LoadedSegment> {
        let stored = self
            .segments
            .get(&id)
            .map(|s| s.clone())
            .ok_or(SegmentError::SegmentNotFound(id))?;
        let registry = self.registry.snapshot();
        let decoded = codec::from_json(&stored.payload, &registry)?;
        if !decoded.is_clean() {
            warn!(
                segment_id = %id,
                mismatches = decoded.mismatches.len(),
                "Saved segment no longer matches the field registry"
            );
        }
        Ok(LoadedSegment {
            summary: stored.summary,
            expression: decoded.expression,
            mismatches: decoded.mismatches,
        })
    }

    fn list(&self) -> Vec<SegmentSummary> {
        let mut summaries: Vec<SegmentSummary> =
            self.segments.iter().map(|s| s.summary.clone()).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        summaries
    }

    fn delete(&self, id: Uuid) -> SegmentResult<()> {
        self.segments
            .remove(&id)
            .map(|_| info!(segment_id = %id, "Segment deleted"))
            .ok_or(SegmentError::SegmentNotFound(id))
    }
}
