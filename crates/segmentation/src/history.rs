//! Undo/redo over immutable expression snapshots.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SegmentResult;
use crate::expression::SegmentExpression;

/// Monotonic version number. Every successful edit gets a new one, so two
/// snapshots with the same version are the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExpressionVersion(pub u64);

#[derive(Debug, Clone)]
struct Snapshot {
    version: ExpressionVersion,
    expression: Arc<SegmentExpression>,
}

#[derive(Debug, Clone)]
pub struct ExpressionHistory {
    snapshots: Vec<Snapshot>,
    cursor: usize,
    next_version: u64,
    max_depth: usize,
}

impl ExpressionHistory {
    pub fn new(initial: SegmentExpression, max_depth: usize) -> Self {
        Self {
            snapshots: vec![Snapshot {
                version: ExpressionVersion(0),
                expression: Arc::new(initial),
            }],
            cursor: 0,
            next_version: 1,
            max_depth: max_depth.max(1),
        }
    }

    pub fn current(&self) -> Arc<SegmentExpression> {
        self.snapshots[self.cursor].expression.clone()
    }

    pub fn version(&self) -> ExpressionVersion {
        self.snapshots[self.cursor].version
    }

    /// Applies an edit to the current snapshot. On error the history is
    /// untouched. Any redo branch is discarded.
    pub fn apply<F>(&mut self, edit: F) -> SegmentResult<ExpressionVersion>
    where
        F: FnOnce(&SegmentExpression) -> SegmentResult<SegmentExpression>,
    {
        let next = edit(&self.snapshots[self.cursor].expression)?;
        let version = ExpressionVersion(self.next_version);
        self.next_version += 1;

        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(Snapshot {
            version,
            expression: Arc::new(next),
        });
        if self.snapshots.len() > self.max_depth {
            let excess = self.snapshots.len() - self.max_depth;
            self.snapshots.drain(..excess);
        }
        self.cursor = self.snapshots.len() - 1;
        Ok(version)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    pub fn undo(&mut self) -> Option<ExpressionVersion> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.version())
    }

    pub fn redo(&mut self) -> Option<ExpressionVersion> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.version())
    }
}
