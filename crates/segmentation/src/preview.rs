//! Parallel population evaluation and live audience-size previews.
//!
//! Expressions and records are shared read-only behind `Arc`s. Chunks run
//! on the blocking pool and are reduced in chunk order, so the result is
//! identical to a single pass regardless of scheduling.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::error::{SegmentError, SegmentResult};
use crate::evaluator::{evaluate_population, PopulationResult};
use crate::expression::SegmentExpression;
use crate::record::CustomerRecord;

pub async fn evaluate_population_chunked(
    expression: Arc<SegmentExpression>,
    records: Arc<[CustomerRecord]>,
    chunk_size: usize,
) -> SegmentResult<PopulationResult> {
    let result = run_chunks(expression, records, chunk_size, || true).await?;
    Ok(result.unwrap_or_default())
}

/// Returns `None` once `keep_going` reports false. Every chunk checks it
/// again before evaluating.
async fn run_chunks<F>(
    expression: Arc<SegmentExpression>,
    records: Arc<[CustomerRecord]>,
    chunk_size: usize,
    keep_going: F,
) -> SegmentResult<Option<PopulationResult>>
where
    F: Fn() -> bool + Clone + Send + 'static,
{
    let handles: Vec<_> = chunk_ranges(records.len(), chunk_size)
        .into_iter()
        .map(|range| {
            let expression = expression.clone();
            let records = records.clone();
            let keep_going = keep_going.clone();
            tokio::task::spawn_blocking(move || {
                keep_going().then(|| evaluate_population(&expression, &records[range]))
            })
        })
        .collect();

    let chunks = handles.len();
    let mut total = PopulationResult::default();
    for handle in handles {
        if !keep_going() {
            return Ok(None);
        }
        let part = handle
            .await
            .map_err(|e| SegmentError::PreviewTask(e.to_string()))?;
        let Some(part) = part else {
            return Ok(None);
        };
        total = total.merge(part);
    }
    debug!(chunks, evaluated = total.evaluated, matched = total.match_count, "Population evaluated");
    Ok(Some(total))
}

fn chunk_ranges(len: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let size = chunk_size.max(1);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

/// Identifies one preview request. Later requests get larger tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PreviewTicket(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceEstimate {
    pub ticket: PreviewTicket,
    pub result: PopulationResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreviewOutcome {
    Current(AudienceEstimate),
    /// A newer request was issued; this result was discarded.
    Superseded { ticket: PreviewTicket, latest: PreviewTicket },
}

/// Coordinates audience-size previews while an expression is being
/// edited. Only the most recently issued ticket may publish; results from
/// older tickets are dropped rather than merged.
pub struct AudiencePreview {
    generation: Arc<AtomicU64>,
    chunk_size: usize,
    latest: watch::Sender<Option<AudienceEstimate>>,
}

impl AudiencePreview {
    pub fn new(chunk_size: usize) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            chunk_size,
            latest,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AudienceEstimate>> {
        self.latest.subscribe()
    }

    /// Issues a ticket for a new expression version, superseding every
    /// earlier ticket.
    pub fn begin(&self) -> PreviewTicket {
        PreviewTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn latest_ticket(&self) -> PreviewTicket {
        PreviewTicket(self.generation.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, ticket: PreviewTicket) -> bool {
        self.latest_ticket() == ticket
    }

    pub async fn run(
        &self,
        ticket: PreviewTicket,
        expression: Arc<SegmentExpression>,
        records: Arc<[CustomerRecord]>,
    ) -> SegmentResult<PreviewOutcome> {
        let generation = self.generation.clone();
        let still_current = move || generation.load(Ordering::SeqCst) == ticket.0;
        let finished = run_chunks(expression, records, self.chunk_size, still_current).await?;
        let Some(result) = finished.filter(|_| self.is_current(ticket)) else {
            let latest = self.latest_ticket();
            debug!(ticket = ticket.0, latest = latest.0, "Discarding superseded audience preview");
            return Ok(PreviewOutcome::Superseded { ticket, latest });
        };

        let estimate = AudienceEstimate { ticket, result };
        let published = estimate.clone();
        self.latest.send_if_modified(|slot| {
            let newer = slot.as_ref().map_or(true, |current| current.ticket < ticket);
            if newer {
                *slot = Some(published);
            }
            newer
        });
        Ok(PreviewOutcome::Current(estimate))
    }
}
