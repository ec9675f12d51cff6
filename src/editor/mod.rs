//! The generic bulk editor: one engine parameterized by `EditorMode`
//! instead of one implementation per editing tool.
//!
//! Flow: validate uploads → build the pending queue → confirm settings
//! (global or per-item) → sequentially render each item against the
//! backend → show results in the live/compare panel.

pub mod display;
pub mod mode;
pub mod processor;
pub mod queue;
pub mod session;
pub mod upload;

pub use display::{CompareSlider, DisplayState, ImageBox, ViewMode};
pub use mode::{EditorMode, ParamSet, ParamSpec};
pub use processor::{ItemOutcome, RunEvent, RunReport, SequentialProcessor};
pub use queue::{CompletedItem, QueueItem, SettingsMode, UploadQueue};
pub use session::{EditorSession, SessionError};
pub use upload::{UploadError, UploadValidator, ValidatedUpload};
