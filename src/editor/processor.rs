//! Sequential processor — drains the pending queue one item at a time.
//!
//! Per-item state machine: Pending → InFlight → {Completed | Failed}.
//! A failed item is dropped (no retry, no failed-items list) and the next
//! pending item starts; one item's failure never blocks the batch.

use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use super::display::DisplayState;
use super::mode::EditorMode;
use super::queue::{CompletedItem, UploadQueue};
use crate::processing_service::{GateError, ProcessingService};
use crate::remote::ImageBackend;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Processing gate error: {0}")]
    Gate(#[from] GateError),
}

/// Outcome of one processing cycle.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub id: Uuid,
    /// `None` on success; the transient banner message on failure.
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Progress events emitted while draining the queue, for the shell's
/// status indicator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    Started { pending: u32 },
    ItemCompleted { id: Uuid },
    ItemFailed { id: Uuid, error: String },
    Progress { done: u32, total: u32 },
    Finished { processed: u32, failed: u32, duration_ms: u64 },
}

/// Summary of a full drain.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub processed: u32,
    pub failed: u32,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn empty() -> Self {
        Self {
            processed: 0,
            failed: 0,
            duration_ms: 0,
            errors: Vec::new(),
        }
    }
}

/// Drives the queue against the backend, one in-flight item at a time.
pub struct SequentialProcessor {
    backend: Box<dyn ImageBackend>,
}

impl SequentialProcessor {
    pub fn new(backend: Box<dyn ImageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn ImageBackend {
        self.backend.as_ref()
    }

    /// Process the front pending item, if the preconditions hold:
    /// settings confirmed, nothing in flight, queue non-empty.
    ///
    /// Returns `Ok(None)` when no cycle ran (disabled, busy, or empty) —
    /// that is the normal idle answer, not an error. On a cycle, the item
    /// is always removed from pending; success appends a `CompletedItem`
    /// and auto-advances the display so results stream in without manual
    /// selection.
    pub fn process_next(
        &self,
        mode: EditorMode,
        queue: &mut UploadQueue,
        completed: &mut Vec<CompletedItem>,
        display: &mut DisplayState,
        gate: &ProcessingService,
    ) -> Result<Option<ItemOutcome>, ProcessError> {
        if !queue.processing_enabled() {
            return Ok(None);
        }
        let Some(front_id) = queue.front_id() else {
            return Ok(None);
        };
        // Exactly one item in flight globally — refuse the cycle if the
        // gate is held, rather than queuing behind it.
        let Some(_guard) = gate.try_acquire(mode.operation_kind(), Some(front_id)) else {
            return Ok(None);
        };
        let Some(item) = queue.start_next() else {
            return Ok(None);
        };

        tracing::info!(item_id = %item.id, mode = %mode, "Render started");
        let mask = item.mask.as_ref().map(|m| m.as_slice());
        let result = self
            .backend
            .render(mode.endpoint(), &item.original, &item.params, mask);

        // Whatever the outcome, the item leaves the pending collection.
        queue.finish(item.id);

        match result {
            Ok(bytes) => {
                completed.push(CompletedItem {
                    id: item.id,
                    original: item.original,
                    result: std::sync::Arc::new(bytes),
                    params: item.params,
                    completed_at: chrono::Utc::now(),
                });
                display.auto_advance(item.id);
                tracing::info!(item_id = %item.id, "Render completed");
                Ok(Some(ItemOutcome {
                    id: item.id,
                    error: None,
                }))
            }
            Err(e) => {
                // Drop the item and continue with the next.
                tracing::warn!(item_id = %item.id, error = %e, "Render failed, item dropped");
                Ok(Some(ItemOutcome {
                    id: item.id,
                    error: Some(e.to_string()),
                }))
            }
        }
    }

    /// Drain the queue in strict FIFO order, emitting progress events.
    pub fn run_queue(
        &self,
        mode: EditorMode,
        queue: &mut UploadQueue,
        completed: &mut Vec<CompletedItem>,
        display: &mut DisplayState,
        gate: &ProcessingService,
        progress_fn: Option<&dyn Fn(RunEvent)>,
    ) -> Result<RunReport, ProcessError> {
        let start = Instant::now();
        let total = queue.len() as u32;

        if !queue.processing_enabled() || total == 0 {
            return Ok(RunReport::empty());
        }

        if let Some(progress) = progress_fn {
            progress(RunEvent::Started { pending: total });
        }

        let mut report = RunReport::empty();

        while let Some(outcome) = self.process_next(mode, queue, completed, display, gate)? {
            match &outcome.error {
                None => {
                    report.processed += 1;
                    if let Some(progress) = progress_fn {
                        progress(RunEvent::ItemCompleted { id: outcome.id });
                    }
                }
                Some(message) => {
                    report.failed += 1;
                    report.errors.push(format!("{}: {message}", outcome.id));
                    if let Some(progress) = progress_fn {
                        progress(RunEvent::ItemFailed {
                            id: outcome.id,
                            error: message.clone(),
                        });
                    }
                }
            }
            if let Some(progress) = progress_fn {
                progress(RunEvent::Progress {
                    done: report.processed + report.failed,
                    total,
                });
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;

        if let Some(progress) = progress_fn {
            progress(RunEvent::Finished {
                processed: report.processed,
                failed: report.failed,
                duration_ms: report.duration_ms,
            });
        }

        Ok(report)
    }
}
