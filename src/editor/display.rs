//! Display state for the result panel: active item, live/compare mode,
//! and the draggable before/after divider.
//!
//! The gesture is an explicit state object with begin/update/end
//! transitions, independent of any UI binding — the shell forwards raw
//! pointer coordinates and reads back a clip percentage.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Fraction of the container the fitted image box may occupy.
const FIT_FRACTION: f32 = 0.95;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Could not measure image: {0}")]
    Measure(String),
}

/// Which layer the result panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Processed image at full extent, original hidden.
    Live,
    /// Split view: processed image clipped left of the divider.
    Compare,
}

/// Horizontal bounds of the rendered image element, in the same
/// coordinate space as the pointer events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBox {
    pub left: f32,
    pub width: f32,
}

/// The draggable divider. Position is a percentage of the image width,
/// always within [0, 100].
#[derive(Debug, Clone, Copy)]
pub struct CompareSlider {
    position: f32,
    dragging: bool,
}

impl CompareSlider {
    pub const DEFAULT_POSITION: f32 = 50.0;

    pub fn new() -> Self {
        Self {
            position: Self::DEFAULT_POSITION,
            dragging: false,
        }
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Press-and-hold starts the gesture and snaps to the pointer.
    pub fn begin_drag(&mut self, pointer_x: f32, image_box: ImageBox) {
        self.dragging = true;
        self.position = Self::percent_of(pointer_x, image_box);
    }

    /// Pointer-move while held. Ignored when no gesture is armed;
    /// movement outside the image's horizontal bounds clamps to the
    /// nearest edge.
    pub fn update_drag(&mut self, pointer_x: f32, image_box: ImageBox) {
        if !self.dragging {
            return;
        }
        self.position = Self::percent_of(pointer_x, image_box);
    }

    /// Release ends the gesture; the position stays where it was left.
    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    fn percent_of(pointer_x: f32, image_box: ImageBox) -> f32 {
        if image_box.width <= 0.0 {
            return Self::DEFAULT_POSITION;
        }
        ((pointer_x - image_box.left) / image_box.width * 100.0).clamp(0.0, 100.0)
    }
}

impl Default for CompareSlider {
    fn default() -> Self {
        Self::new()
    }
}

/// What the result panel currently shows.
#[derive(Debug)]
pub struct DisplayState {
    active: Option<Uuid>,
    view_mode: ViewMode,
    pub slider: CompareSlider,
}

impl DisplayState {
    pub fn new() -> Self {
        Self {
            active: None,
            view_mode: ViewMode::Live,
            slider: CompareSlider::new(),
        }
    }

    pub fn active(&self) -> Option<Uuid> {
        self.active
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn select(&mut self, id: Uuid) {
        self.active = Some(id);
    }

    /// Percentage of the image width the processed layer is revealed
    /// over: full in Live mode, divider position in Compare mode.
    pub fn reveal_percent(&self) -> f32 {
        match self.view_mode {
            ViewMode::Live => 100.0,
            ViewMode::Compare => self.slider.position(),
        }
    }

    /// A freshly completed item becomes active when nothing is shown yet
    /// or the panel is in Live mode — results stream in without manual
    /// selection.
    pub(crate) fn auto_advance(&mut self, id: Uuid) {
        if self.active.is_none() || self.view_mode == ViewMode::Live {
            self.active = Some(id);
        }
    }

    /// React to a completed item being deleted: if it was active, fall
    /// back to the given remaining item (or none).
    pub(crate) fn on_deleted(&mut self, id: Uuid, fallback: Option<Uuid>) {
        if self.active == Some(id) {
            self.active = fallback;
        }
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════
// Dimension fitting
// ═══════════════════════════════════════════

/// Natural pixel dimensions of an encoded image, without decoding pixels.
pub fn measure_dimensions(bytes: &[u8]) -> Result<(u32, u32), DisplayError> {
    image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DisplayError::Measure(e.to_string()))?
        .into_dimensions()
        .map_err(|e| DisplayError::Measure(e.to_string()))
}

/// Largest aspect-preserving box within 95% of the container.
///
/// Original and processed image share this box (the backend may return a
/// different native resolution), so toggling views causes no layout shift.
pub fn fit_box(natural: (u32, u32), container: (f32, f32)) -> (f32, f32) {
    let (w, h) = (natural.0 as f32, natural.1 as f32);
    if w <= 0.0 || h <= 0.0 || container.0 <= 0.0 || container.1 <= 0.0 {
        return (0.0, 0.0);
    }
    let avail_w = container.0 * FIT_FRACTION;
    let avail_h = container.1 * FIT_FRACTION;
    let scale = (avail_w / w).min(avail_h / h);
    (w * scale, h * scale)
}
