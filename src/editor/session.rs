//! One editing session: a mode, its queue, completed results, and the
//! display state — the single generic component the source product
//! duplicated per editor.
//!
//! The shell creates one session per open editor tab and forwards user
//! actions; all remote traffic flows through the injected `ImageBackend`
//! and the shared processing gate.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use super::display::{DisplayState, ViewMode};
use super::mode::EditorMode;
use super::processor::{ItemOutcome, ProcessError, RunEvent, RunReport, SequentialProcessor};
use super::queue::{CompletedItem, QueueError, SettingsMode, UploadQueue};
use super::upload::{sniff_format, UploadError, UploadValidator};
use crate::processing_service::{OperationKind, ProcessingService};
use crate::remote::{ImageBackend, MaskQuery, RemoteError};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No completed item is selected")]
    NothingSelected,

    #[error("No pending item with id {0}")]
    UnknownItem(Uuid),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Segmentation failed: {0}")]
    Segmentation(#[from] RemoteError),

    #[error("Gate error: {0}")]
    Gate(#[from] crate::processing_service::GateError),

    #[error("Export failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Result has no recognizable image format")]
    UnknownResultFormat,
}

pub struct EditorSession {
    mode: EditorMode,
    queue: UploadQueue,
    completed: Vec<CompletedItem>,
    display: DisplayState,
    processor: SequentialProcessor,
    validator: UploadValidator,
    /// Transient banner message from the most recent failure.
    last_error: Option<String>,
}

impl EditorSession {
    pub fn new(mode: EditorMode, backend: Box<dyn ImageBackend>) -> Self {
        Self {
            mode,
            queue: UploadQueue::empty(mode),
            completed: Vec::new(),
            display: DisplayState::new(),
            processor: SequentialProcessor::new(backend),
            validator: UploadValidator::new(),
            last_error: None,
        }
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    // ── Upload ──────────────────────────────────────────────

    /// Validate a dropped selection and build the pending batch from the
    /// accepted files. Rejections are returned per file and do not block
    /// the rest; completed results from earlier batches are kept.
    pub fn load_batch(&mut self, files: Vec<Vec<u8>>) -> Vec<(usize, UploadError)> {
        self.validator.reset();
        let (accepted, rejected) = self.validator.validate_batch(files);
        tracing::info!(
            mode = %self.mode,
            accepted = accepted.len(),
            rejected = rejected.len(),
            "Batch loaded"
        );
        self.queue = UploadQueue::initialize(self.mode, accepted);
        rejected
    }

    // ── Settings ────────────────────────────────────────────

    pub fn confirm_settings(&mut self, settings: SettingsMode) -> Result<(), QueueError> {
        self.queue.confirm_settings(settings)
    }

    /// Cancel is "proceed with defaults", not abort.
    pub fn cancel_settings(&mut self) {
        self.queue.cancel_settings();
    }

    // ── Masking (inpaint flow) ──────────────────────────────

    /// Fetch a mask from the segmentation collaborator and attach it to a
    /// pending item. Blocks on the gate: segmentation is a one-shot user
    /// action, not a queue cycle.
    pub fn generate_mask(
        &mut self,
        gate: &ProcessingService,
        item_id: Uuid,
        query: &MaskQuery,
    ) -> Result<(), SessionError> {
        let original = self
            .queue
            .get(item_id)
            .ok_or(SessionError::UnknownItem(item_id))?
            .original
            .clone();

        let _guard = gate.acquire(OperationKind::Segmentation, Some(item_id))?;
        let mask = self.processor.backend().segment(&original, query)?;
        self.queue.attach_mask(item_id, mask)?;
        Ok(())
    }

    // ── Processing ──────────────────────────────────────────

    /// One processing cycle. Failures land in the transient banner.
    pub fn process_next(
        &mut self,
        gate: &ProcessingService,
    ) -> Result<Option<ItemOutcome>, ProcessError> {
        let outcome = self.processor.process_next(
            self.mode,
            &mut self.queue,
            &mut self.completed,
            &mut self.display,
            gate,
        )?;
        if let Some(outcome) = &outcome {
            if let Some(message) = &outcome.error {
                self.last_error = Some(message.clone());
            }
        }
        Ok(outcome)
    }

    /// Drain the whole pending batch.
    pub fn run_queue(
        &mut self,
        gate: &ProcessingService,
        progress_fn: Option<&dyn Fn(RunEvent)>,
    ) -> Result<RunReport, ProcessError> {
        let report = self.processor.run_queue(
            self.mode,
            &mut self.queue,
            &mut self.completed,
            &mut self.display,
            gate,
            progress_fn,
        )?;
        if let Some(last) = report.errors.last() {
            self.last_error = Some(last.clone());
        }
        Ok(report)
    }

    // ── Results & display ───────────────────────────────────

    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }

    pub fn completed(&self) -> &[CompletedItem] {
        &self.completed
    }

    pub fn active_item(&self) -> Option<&CompletedItem> {
        let id = self.display.active()?;
        self.completed.iter().find(|c| c.id == id)
    }

    /// Select a completed item for display. Returns false for unknown ids.
    pub fn select(&mut self, id: Uuid) -> bool {
        if self.completed.iter().any(|c| c.id == id) {
            self.display.select(id);
            true
        } else {
            false
        }
    }

    /// Delete a completed item. If it was active, the display falls back
    /// to the most recent remaining item, or none when it was the last.
    pub fn delete_completed(&mut self, id: Uuid) -> bool {
        let Some(pos) = self.completed.iter().position(|c| c.id == id) else {
            return false;
        };
        self.completed.remove(pos);
        let fallback = self.completed.last().map(|c| c.id);
        self.display.on_deleted(id, fallback);
        true
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut DisplayState {
        &mut self.display
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.display.set_view_mode(mode);
    }

    /// Read and clear the transient error banner.
    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ── Export ──────────────────────────────────────────────

    /// Write the active result to `dir` (the download action). The file
    /// name is the item id with an extension matching the result format.
    pub fn export_active(&self, dir: &std::path::Path) -> Result<PathBuf, SessionError> {
        let item = self.active_item().ok_or(SessionError::NothingSelected)?;
        let kind = sniff_format(&item.result).map_err(|_| SessionError::UnknownResultFormat)?;

        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.{}", item.id, kind.extension()));
        std::fs::write(&path, item.result.as_slice())?;
        tracing::info!(path = %path.display(), "Result exported");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::mode::ParamSet;
    use crate::remote::MockImageBackend;

    fn png_bytes(seed: u8) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R', seed]);
        bytes
    }

    fn session_with(n: u8, backend: MockImageBackend) -> EditorSession {
        let mut session = EditorSession::new(EditorMode::Enhance, Box::new(backend));
        let files = (0..n).map(png_bytes).collect();
        let rejected = session.load_batch(files);
        assert!(rejected.is_empty());
        session
    }

    #[test]
    fn load_batch_reports_rejections_without_blocking() {
        let mut session =
            EditorSession::new(EditorMode::Enhance, Box::new(MockImageBackend::new(&[1])));
        let rejected = session.load_batch(vec![
            png_bytes(0),
            b"not an image".to_vec(),
            png_bytes(1),
        ]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, 1);
        assert_eq!(session.queue().len(), 2);
    }

    #[test]
    fn full_flow_confirm_process_display() {
        let mut session = session_with(2, MockImageBackend::new(png_bytes(99).as_slice()));
        session
            .confirm_settings(SettingsMode::Global(ParamSet::new().with("scale", 3.0)))
            .unwrap();

        let gate = ProcessingService::new();
        let report = session.run_queue(&gate, None).unwrap();

        assert_eq!(report.processed, 2);
        assert!(session.queue().is_empty());
        assert_eq!(session.completed().len(), 2);
        // Live mode → newest result is displayed
        assert_eq!(
            session.display().active(),
            Some(session.completed()[1].id)
        );
        assert!(session.active_item().is_some());
    }

    #[test]
    fn failure_sets_transient_banner() {
        let mut session = session_with(1, MockImageBackend::failing("GPU pool exhausted"));
        session.cancel_settings();

        let gate = ProcessingService::new();
        let report = session.run_queue(&gate, None).unwrap();

        assert_eq!(report.failed, 1);
        assert!(session.completed().is_empty());
        let banner = session.take_error().unwrap();
        assert!(banner.contains("GPU pool exhausted"));
        assert!(session.take_error().is_none(), "banner is transient");
    }

    #[test]
    fn select_and_delete_semantics() {
        let mut session = session_with(3, MockImageBackend::new(&[1]));
        session.cancel_settings();
        let gate = ProcessingService::new();
        session.run_queue(&gate, None).unwrap();

        let ids: Vec<_> = session.completed().iter().map(|c| c.id).collect();
        assert!(session.select(ids[0]));
        assert!(!session.select(Uuid::new_v4()));

        // Deleting the active item falls back to a remaining one
        assert!(session.delete_completed(ids[0]));
        let active = session.display().active().unwrap();
        assert!(ids[1..].contains(&active));

        // Deleting the rest clears the display
        assert!(session.delete_completed(ids[1]));
        assert!(session.delete_completed(ids[2]));
        assert_eq!(session.display().active(), None);
        assert!(session.active_item().is_none());

        assert!(!session.delete_completed(ids[0]), "already gone");
    }

    #[test]
    fn generate_mask_attaches_to_pending_item() {
        let backend = MockImageBackend::new(&[1]).with_mask_result(&[0xAB]);
        let mut session = EditorSession::new(EditorMode::Inpaint, Box::new(backend));
        session.load_batch(vec![png_bytes(0)]);
        let id = session.queue().front_id().unwrap();

        let gate = ProcessingService::new();
        session
            .generate_mask(&gate, id, &MaskQuery::Point { x: 12.0, y: 30.0 })
            .unwrap();

        let item = session.queue().get(id).unwrap();
        assert_eq!(item.mask.as_ref().unwrap().as_slice(), &[0xAB]);
        assert!(!gate.is_busy(), "gate released after segmentation");
    }

    #[test]
    fn generate_mask_unknown_item() {
        let mut session =
            EditorSession::new(EditorMode::Inpaint, Box::new(MockImageBackend::new(&[1])));
        let gate = ProcessingService::new();
        let err = session
            .generate_mask(&gate, Uuid::new_v4(), &MaskQuery::Auto)
            .unwrap_err();
        assert!(matches!(err, SessionError::UnknownItem(_)));
    }

    #[test]
    fn export_active_writes_result_with_extension() {
        let mut session = session_with(1, MockImageBackend::new(png_bytes(42).as_slice()));
        session.cancel_settings();
        let gate = ProcessingService::new();
        session.run_queue(&gate, None).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = session.export_active(dir.path()).unwrap();

        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(std::fs::read(&path).unwrap(), png_bytes(42));
    }

    #[test]
    fn export_without_selection_fails() {
        let session =
            EditorSession::new(EditorMode::Enhance, Box::new(MockImageBackend::new(&[1])));
        let dir = tempfile::tempdir().unwrap();
        let err = session.export_active(dir.path()).unwrap_err();
        assert!(matches!(err, SessionError::NothingSelected));
    }

    #[test]
    fn live_to_compare_reveal_switch_with_active_item() {
        let mut session = session_with(1, MockImageBackend::new(&[1]));
        session.cancel_settings();
        let gate = ProcessingService::new();
        session.run_queue(&gate, None).unwrap();

        assert_eq!(session.display().reveal_percent(), 100.0);
        session.set_view_mode(ViewMode::Compare);
        assert_eq!(session.display().reveal_percent(), 50.0);
    }
}
