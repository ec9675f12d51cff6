//! Editing modes and their parameter schemas.
//!
//! The source product shipped one near-identical editor per mode; here a
//! mode is a capability set — parameter schema, backend endpoint, gate
//! operation kind — and a single `EditorSession` is instantiated per mode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::processing_service::OperationKind;

// ═══════════════════════════════════════════
// Mode enum
// ═══════════════════════════════════════════

/// The seven editing modes the backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    Inpaint,
    Outpaint,
    Enhance,
    Colorize,
    ArtStyle,
    Blur,
    BackgroundRemoval,
}

impl EditorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inpaint => "inpaint",
            Self::Outpaint => "outpaint",
            Self::Enhance => "enhance",
            Self::Colorize => "colorize",
            Self::ArtStyle => "art_style",
            Self::Blur => "blur",
            Self::BackgroundRemoval => "background_removal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "inpaint" => Some(Self::Inpaint),
            "outpaint" => Some(Self::Outpaint),
            "enhance" => Some(Self::Enhance),
            "colorize" => Some(Self::Colorize),
            "art_style" => Some(Self::ArtStyle),
            "blur" => Some(Self::Blur),
            "background_removal" => Some(Self::BackgroundRemoval),
            _ => None,
        }
    }

    pub fn all() -> &'static [EditorMode] {
        &[
            Self::Inpaint,
            Self::Outpaint,
            Self::Enhance,
            Self::Colorize,
            Self::ArtStyle,
            Self::Blur,
            Self::BackgroundRemoval,
        ]
    }

    /// Path segment of the backend render endpoint for this mode.
    pub fn endpoint(&self) -> &'static str {
        self.as_str()
    }

    /// Gate operation kind reported while an item of this mode is in flight.
    pub fn operation_kind(&self) -> OperationKind {
        match self {
            Self::Inpaint => OperationKind::Inpaint,
            Self::Outpaint => OperationKind::Outpaint,
            Self::Enhance => OperationKind::Enhance,
            Self::Colorize => OperationKind::Colorize,
            Self::ArtStyle => OperationKind::ArtStyle,
            Self::Blur => OperationKind::Blur,
            Self::BackgroundRemoval => OperationKind::BackgroundRemoval,
        }
    }

    /// Whether render requests for this mode carry a mask payload.
    pub fn uses_mask(&self) -> bool {
        matches!(self, Self::Inpaint)
    }

    /// Numeric knobs this mode accepts.
    pub fn param_specs(&self) -> &'static [ParamSpec] {
        match self {
            Self::Inpaint => &[ParamSpec {
                name: "feather",
                default: 4.0,
                min: 0.0,
                max: 50.0,
            }],
            Self::Outpaint => &[ParamSpec {
                name: "expand",
                default: 2.0,
                min: 1.1,
                max: 3.0,
            }],
            Self::Enhance => &[ParamSpec {
                name: "scale",
                default: 2.0,
                min: 1.0,
                max: 4.0,
            }],
            Self::Colorize => &[ParamSpec {
                name: "saturation",
                default: 1.0,
                min: 0.0,
                max: 2.0,
            }],
            Self::ArtStyle => &[
                ParamSpec {
                    name: "strength",
                    default: 0.75,
                    min: 0.0,
                    max: 1.0,
                },
                ParamSpec {
                    name: "style",
                    default: 0.0,
                    min: 0.0,
                    max: 31.0,
                },
            ],
            Self::Blur => &[ParamSpec {
                name: "radius",
                default: 12.0,
                min: 1.0,
                max: 40.0,
            }],
            // Cutout takes no knobs — the backend decides everything.
            Self::BackgroundRemoval => &[],
        }
    }

    /// A fully populated parameter set with every knob at its default.
    pub fn default_params(&self) -> ParamSet {
        let mut set = ParamSet::new();
        for spec in self.param_specs() {
            set.insert(spec.name, spec.default);
        }
        set
    }

    /// Normalize a user-supplied set against this mode's schema:
    /// known knobs are clamped to their range, missing knobs get their
    /// default, unknown knobs are dropped.
    pub fn normalize(&self, params: &ParamSet) -> ParamSet {
        let mut set = ParamSet::new();
        for spec in self.param_specs() {
            let value = params.get(spec.name).unwrap_or(spec.default);
            set.insert(spec.name, value.clamp(spec.min, spec.max));
        }
        set
    }
}

impl std::fmt::Display for EditorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Parameter schema
// ═══════════════════════════════════════════

/// One numeric knob: name, default, and allowed range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

/// A named set of numeric knob values, ordered for stable wire output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, f64>);

impl ParamSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert, for test fixtures and defaults.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
