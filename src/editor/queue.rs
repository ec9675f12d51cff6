//! Upload queue: the pending batch and its per-item parameters.
//!
//! Lifecycle: a validated batch becomes `QueueItem`s with default
//! parameters; a one-time settings confirmation (global or per-item)
//! enables processing; the sequential processor then drains the queue
//! in strict FIFO order.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::mode::{EditorMode, ParamSet};
use super::upload::ValidatedUpload;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Per-item settings count mismatch: {expected} pending items, {got} parameter sets")]
    SettingsCountMismatch { expected: usize, got: usize },

    #[error("No pending item with id {0}")]
    UnknownItem(Uuid),

    #[error("Item {0} is already being processed")]
    ItemInFlight(Uuid),
}

// ═══════════════════════════════════════════
// Data model
// ═══════════════════════════════════════════

/// One source image awaiting processing.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: Uuid,
    /// Shared so an in-flight snapshot never copies pixel data.
    pub original: Arc<Vec<u8>>,
    pub is_processing: bool,
    pub params: ParamSet,
    /// Present only for mask-driven modes (inpaint/erase).
    pub mask: Option<Arc<Vec<u8>>>,
}

/// Snapshot handed to the processor while the item stays visible in the
/// pending list with `is_processing == true`.
#[derive(Debug, Clone)]
pub struct InFlightItem {
    pub id: Uuid,
    pub original: Arc<Vec<u8>>,
    pub params: ParamSet,
    pub mask: Option<Arc<Vec<u8>>>,
}

/// A successfully processed item. Created exactly once per source item,
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CompletedItem {
    /// Same identity as the originating `QueueItem`.
    pub id: Uuid,
    pub original: Arc<Vec<u8>>,
    pub result: Arc<Vec<u8>>,
    /// The values actually sent to the backend.
    pub params: ParamSet,
    pub completed_at: DateTime<Utc>,
}

/// How the settings dialog was confirmed.
#[derive(Debug, Clone)]
pub enum SettingsMode {
    /// One parameter set broadcast to every pending item.
    Global(ParamSet),
    /// Distinct parameter sets applied by positional correspondence.
    PerItem(Vec<ParamSet>),
}

// ═══════════════════════════════════════════
// UploadQueue
// ═══════════════════════════════════════════

/// The pending collection plus the processing-enabled flag.
#[derive(Debug)]
pub struct UploadQueue {
    mode: EditorMode,
    items: VecDeque<QueueItem>,
    processing_enabled: bool,
}

impl UploadQueue {
    /// Build one `QueueItem` per validated upload, each with a fresh id
    /// and this mode's default parameters. Processing stays disabled
    /// until settings are confirmed (or the dialog is cancelled).
    pub fn initialize(mode: EditorMode, uploads: Vec<ValidatedUpload>) -> Self {
        let defaults = mode.default_params();
        let items = uploads
            .into_iter()
            .map(|u| QueueItem {
                id: Uuid::new_v4(),
                original: Arc::new(u.bytes),
                is_processing: false,
                params: defaults.clone(),
                mask: None,
            })
            .collect();

        Self {
            mode,
            items,
            processing_enabled: false,
        }
    }

    /// An empty queue (session start, before any upload).
    pub fn empty(mode: EditorMode) -> Self {
        Self::initialize(mode, Vec::new())
    }

    /// Apply the confirmed settings and enable processing.
    ///
    /// `PerItem` requires exactly one set per pending item; a mismatch is
    /// rejected before any item is touched. All values are normalized
    /// against the mode schema (clamped, defaults filled).
    pub fn confirm_settings(&mut self, settings: SettingsMode) -> Result<(), QueueError> {
        match settings {
            SettingsMode::Global(params) => {
                let normalized = self.mode.normalize(&params);
                for item in &mut self.items {
                    item.params = normalized.clone();
                }
            }
            SettingsMode::PerItem(sets) => {
                if sets.len() != self.items.len() {
                    return Err(QueueError::SettingsCountMismatch {
                        expected: self.items.len(),
                        got: sets.len(),
                    });
                }
                for (item, params) in self.items.iter_mut().zip(sets) {
                    item.params = self.mode.normalize(&params);
                }
            }
        }

        self.processing_enabled = true;
        tracing::info!(
            mode = %self.mode,
            pending = self.items.len(),
            "Settings confirmed, processing enabled"
        );
        Ok(())
    }

    /// Cancelling the settings dialog is not an abort: processing becomes
    /// enabled with the defaults attached at initialization.
    pub fn cancel_settings(&mut self) {
        self.processing_enabled = true;
        tracing::debug!(mode = %self.mode, "Settings dialog cancelled, proceeding with defaults");
    }

    /// Attach a segmentation mask to a pending item (inpaint flow).
    pub fn attach_mask(&mut self, id: Uuid, mask: Vec<u8>) -> Result<(), QueueError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(QueueError::UnknownItem(id))?;
        if item.is_processing {
            return Err(QueueError::ItemInFlight(id));
        }
        item.mask = Some(Arc::new(mask));
        Ok(())
    }

    // ── Processor interface ─────────────────────────────────

    /// Mark the front item in flight and return a snapshot of it.
    ///
    /// Returns `None` if the queue is empty or an item is already in
    /// flight (at-most-one invariant — belt to the gate's suspenders).
    pub(crate) fn start_next(&mut self) -> Option<InFlightItem> {
        if self.items.iter().any(|i| i.is_processing) {
            return None;
        }
        let front = self.items.front_mut()?;
        front.is_processing = true;
        Some(InFlightItem {
            id: front.id,
            original: Arc::clone(&front.original),
            params: front.params.clone(),
            mask: front.mask.as_ref().map(Arc::clone),
        })
    }

    /// Remove an item from pending once its processing finished,
    /// whatever the outcome.
    pub(crate) fn finish(&mut self, id: Uuid) -> Option<QueueItem> {
        let pos = self.items.iter().position(|i| i.id == id)?;
        self.items.remove(pos)
    }

    // ── Inspection ──────────────────────────────────────────

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn processing_enabled(&self) -> bool {
        self.processing_enabled
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn front_id(&self) -> Option<Uuid> {
        self.items.front().map(|i| i.id)
    }

    /// Id of the item currently in flight, if any.
    pub fn in_flight(&self) -> Option<Uuid> {
        self.items.iter().find(|i| i.is_processing).map(|i| i.id)
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.items.iter().map(|i| i.id).collect()
    }

    pub fn items(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }

    pub fn get(&self, id: Uuid) -> Option<&QueueItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::upload::{content_hash, ImageKind};

    pub(crate) fn uploads(n: usize) -> Vec<ValidatedUpload> {
        (0..n)
            .map(|i| {
                let bytes = vec![i as u8; 16];
                ValidatedUpload {
                    hash: content_hash(&bytes),
                    bytes,
                    kind: ImageKind::Png,
                }
            })
            .collect()
    }

    #[test]
    fn initialize_assigns_fresh_ids_and_defaults() {
        let queue = UploadQueue::initialize(EditorMode::Enhance, uploads(3));
        assert_eq!(queue.len(), 3);
        assert!(!queue.processing_enabled());

        let ids = queue.ids();
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 3, "ids must be unique");

        for item in queue.items() {
            assert!(!item.is_processing);
            assert_eq!(item.params.get("scale"), Some(2.0));
        }
    }

    #[test]
    fn global_settings_broadcast() {
        let mut queue = UploadQueue::initialize(EditorMode::Enhance, uploads(3));
        queue
            .confirm_settings(SettingsMode::Global(ParamSet::new().with("scale", 3.0)))
            .unwrap();

        assert!(queue.processing_enabled());
        for item in queue.items() {
            assert_eq!(item.params.get("scale"), Some(3.0));
        }
    }

    #[test]
    fn per_item_settings_apply_positionally() {
        let mut queue = UploadQueue::initialize(EditorMode::ArtStyle, uploads(2));
        queue
            .confirm_settings(SettingsMode::PerItem(vec![
                ParamSet::new().with("strength", 0.3),
                ParamSet::new().with("strength", 0.9),
            ]))
            .unwrap();

        let strengths: Vec<_> = queue.items().map(|i| i.params.get("strength")).collect();
        assert_eq!(strengths, vec![Some(0.3), Some(0.9)]);
        // Missing knobs were filled from the schema
        for item in queue.items() {
            assert_eq!(item.params.get("style"), Some(0.0));
        }
    }

    #[test]
    fn per_item_count_mismatch_fails_fast() {
        let mut queue = UploadQueue::initialize(EditorMode::Enhance, uploads(3));
        let err = queue
            .confirm_settings(SettingsMode::PerItem(vec![ParamSet::new()]))
            .unwrap_err();

        assert!(matches!(
            err,
            QueueError::SettingsCountMismatch { expected: 3, got: 1 }
        ));
        // Nothing was mutated
        assert!(!queue.processing_enabled());
        for item in queue.items() {
            assert_eq!(item.params.get("scale"), Some(2.0));
        }
    }

    #[test]
    fn cancel_enables_with_defaults() {
        let mut queue = UploadQueue::initialize(EditorMode::Blur, uploads(2));
        queue.cancel_settings();

        assert!(queue.processing_enabled());
        for item in queue.items() {
            assert_eq!(item.params.get("radius"), Some(12.0));
        }
    }

    #[test]
    fn settings_are_normalized_against_schema() {
        let mut queue = UploadQueue::initialize(EditorMode::Enhance, uploads(1));
        queue
            .confirm_settings(SettingsMode::Global(ParamSet::new().with("scale", 100.0)))
            .unwrap();
        assert_eq!(queue.items().next().unwrap().params.get("scale"), Some(4.0));
    }

    #[test]
    fn start_next_is_exclusive_and_fifo() {
        let mut queue = UploadQueue::initialize(EditorMode::Enhance, uploads(2));
        let first_id = queue.front_id().unwrap();

        let in_flight = queue.start_next().unwrap();
        assert_eq!(in_flight.id, first_id);
        assert_eq!(queue.in_flight(), Some(first_id));

        // Second pickup refused while one is in flight
        assert!(queue.start_next().is_none());

        // Finishing removes it; the next pickup is the second item
        queue.finish(first_id).unwrap();
        assert_eq!(queue.len(), 1);
        let second = queue.start_next().unwrap();
        assert_ne!(second.id, first_id);
    }

    #[test]
    fn start_next_on_empty_queue() {
        let mut queue = UploadQueue::empty(EditorMode::Colorize);
        assert!(queue.start_next().is_none());
    }

    #[test]
    fn attach_mask_only_to_known_pending_items() {
        let mut queue = UploadQueue::initialize(EditorMode::Inpaint, uploads(1));
        let id = queue.front_id().unwrap();

        queue.attach_mask(id, vec![1, 2, 3]).unwrap();
        assert!(queue.get(id).unwrap().mask.is_some());

        let err = queue.attach_mask(Uuid::new_v4(), vec![]).unwrap_err();
        assert!(matches!(err, QueueError::UnknownItem(_)));

        queue.start_next().unwrap();
        let err = queue.attach_mask(id, vec![]).unwrap_err();
        assert!(matches!(err, QueueError::ItemInFlight(_)));
    }

    #[test]
    fn in_flight_snapshot_shares_pixel_data() {
        let mut queue = UploadQueue::initialize(EditorMode::Enhance, uploads(1));
        let snapshot = queue.start_next().unwrap();
        let item = queue.get(snapshot.id).unwrap();
        assert!(Arc::ptr_eq(&snapshot.original, &item.original));
    }
}
