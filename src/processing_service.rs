//! Single-in-flight gate for remote image processing.
//!
//! **Why this exists**: the backend renders one image per request and the
//! editor's queue semantics require strict FIFO with at most one item in
//! flight. Every render or segmentation call must hold the gate for its
//! full duration; a processing cycle can therefore never start while a
//! prior one is still awaiting its response.
//!
//! **Design**:
//! - `ProcessingService` lives in `AppState` (shared via `Arc`)
//! - `try_acquire()` is the normal path — the processor skips a cycle if
//!   something is already in flight rather than queuing a second request
//! - `acquire()` blocks; used by one-shot operations (segmentation)
//! - `current_operation()` provides observability (what mode, which item,
//!   when started)

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use uuid::Uuid;

/// What kind of remote operation is holding the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Erase/fill a masked region
    Inpaint,
    /// Extend the canvas beyond the original borders
    Outpaint,
    /// Super-resolution upscale
    Enhance,
    /// Grayscale → color
    Colorize,
    /// Art style transfer
    ArtStyle,
    /// Background/portrait blur
    Blur,
    /// Subject cutout
    BackgroundRemoval,
    /// Mask generation (click point or auto-detect)
    Segmentation,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inpaint => write!(f, "Inpaint"),
            Self::Outpaint => write!(f, "Outpaint"),
            Self::Enhance => write!(f, "Enhance"),
            Self::Colorize => write!(f, "Colorize"),
            Self::ArtStyle => write!(f, "Art style"),
            Self::Blur => write!(f, "Blur"),
            Self::BackgroundRemoval => write!(f, "Background removal"),
            Self::Segmentation => write!(f, "Segmentation"),
        }
    }
}

/// Snapshot of the in-flight operation, for the header indicator.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveOperation {
    pub kind: OperationKind,
    /// Queue item being processed. `None` for segmentation probes.
    pub item_id: Option<Uuid>,
    /// When the operation started (ISO 8601).
    pub started_at: String,
}

/// Errors from gate operations.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Internal lock error")]
    LockPoisoned,
}

/// The gate itself: a mutex held for the duration of each remote call,
/// plus an observable record of what is running.
pub struct ProcessingService {
    lock: Mutex<()>,
    current_op: Mutex<Option<ActiveOperation>>,
}

impl ProcessingService {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            current_op: Mutex::new(None),
        }
    }

    /// Acquire the gate, blocking until free.
    ///
    /// The guard must be held for the entire remote call — dropping it
    /// releases the gate and clears the current operation.
    pub fn acquire(
        &self,
        kind: OperationKind,
        item_id: Option<Uuid>,
    ) -> Result<ProcessingGuard<'_>, GateError> {
        let guard = self.lock.lock().map_err(|_| GateError::LockPoisoned)?;
        self.set_current_op(kind, item_id);
        Ok(ProcessingGuard {
            _guard: guard,
            service: self,
        })
    }

    /// Acquire the gate without blocking.
    ///
    /// Returns `None` if an operation is already in flight. The sequential
    /// processor uses this: a busy gate means "not this cycle", never
    /// "queue behind".
    pub fn try_acquire(
        &self,
        kind: OperationKind,
        item_id: Option<Uuid>,
    ) -> Option<ProcessingGuard<'_>> {
        let guard = self.lock.try_lock().ok()?;
        self.set_current_op(kind, item_id);
        Some(ProcessingGuard {
            _guard: guard,
            service: self,
        })
    }

    /// What is currently in flight? `None` when idle.
    pub fn current_operation(&self) -> Option<ActiveOperation> {
        self.current_op.lock().ok()?.clone()
    }

    /// Is a remote call in flight right now?
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    // ── Internal ────────────────────────────────────────────

    fn set_current_op(&self, kind: OperationKind, item_id: Option<Uuid>) {
        if let Ok(mut current) = self.current_op.lock() {
            *current = Some(ActiveOperation {
                kind,
                item_id,
                started_at: chrono::Utc::now().to_rfc3339(),
            });
        }
    }

    fn clear_current_op(&self) {
        if let Ok(mut current) = self.current_op.lock() {
            *current = None;
        }
    }
}

impl Default for ProcessingService {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII token for exclusive backend access.
///
/// Dropping the guard releases the gate and clears the current operation.
pub struct ProcessingGuard<'a> {
    _guard: MutexGuard<'a, ()>,
    service: &'a ProcessingService,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.service.clear_current_op();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_gate_is_idle() {
        let gate = ProcessingService::new();
        assert!(!gate.is_busy());
        assert!(gate.current_operation().is_none());
    }

    #[test]
    fn acquire_records_operation() {
        let gate = ProcessingService::new();
        let item = Uuid::new_v4();
        let guard = gate.acquire(OperationKind::Enhance, Some(item)).unwrap();
        assert!(gate.is_busy());

        let op = gate.current_operation().unwrap();
        assert_eq!(op.kind, OperationKind::Enhance);
        assert_eq!(op.item_id, Some(item));
        assert!(!op.started_at.is_empty());

        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.current_operation().is_none());
    }

    #[test]
    fn try_acquire_fails_while_busy() {
        let gate = ProcessingService::new();
        let _guard = gate.acquire(OperationKind::Colorize, None).unwrap();

        assert!(gate.try_acquire(OperationKind::Blur, None).is_none());
    }

    #[test]
    fn try_acquire_succeeds_when_idle() {
        let gate = ProcessingService::new();
        let guard = gate.try_acquire(OperationKind::Segmentation, None);
        assert!(guard.is_some());
        assert!(gate.is_busy());
    }

    #[test]
    fn guard_scope_bounds_the_operation() {
        let gate = ProcessingService::new();
        {
            let _guard = gate.acquire(OperationKind::ArtStyle, None).unwrap();
            assert_eq!(
                gate.current_operation().unwrap().kind,
                OperationKind::ArtStyle,
            );
        }
        assert!(gate.current_operation().is_none());
        assert!(!gate.is_busy());
    }

    #[test]
    fn acquire_blocks_until_released() {
        use std::sync::Arc;
        use std::thread;

        let gate = Arc::new(ProcessingService::new());
        let gate2 = Arc::clone(&gate);

        let handle = thread::spawn(move || {
            let _guard = gate2.acquire(OperationKind::Enhance, None).unwrap();
            thread::sleep(std::time::Duration::from_millis(50));
        });

        thread::sleep(std::time::Duration::from_millis(10));

        let start = std::time::Instant::now();
        let _guard = gate.acquire(OperationKind::Blur, None).unwrap();
        let waited = start.elapsed();

        assert!(
            waited.as_millis() >= 20,
            "Expected to block, but only waited {}ms",
            waited.as_millis()
        );

        handle.join().unwrap();
    }

    #[test]
    fn operation_kind_display() {
        assert_eq!(OperationKind::Enhance.to_string(), "Enhance");
        assert_eq!(OperationKind::ArtStyle.to_string(), "Art style");
        assert_eq!(
            OperationKind::BackgroundRemoval.to_string(),
            "Background removal"
        );
    }

    #[test]
    fn operation_kind_serializes_snake_case() {
        let json = serde_json::to_string(&OperationKind::BackgroundRemoval).unwrap();
        assert_eq!(json, "\"background_removal\"");
    }
}
