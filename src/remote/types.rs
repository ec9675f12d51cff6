//! Wire types for the render and segmentation endpoints.
//!
//! Images travel as base64 strings inside JSON bodies; parameters are a
//! flat map of named numeric knobs. Error responses carry a
//! human-readable `message`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::RemoteError;
use crate::editor::mode::ParamSet;

/// Request body for POST /v1/render/{mode}
#[derive(Serialize)]
pub struct RenderRequest<'a> {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    pub params: &'a ParamSet,
}

/// Response body from a successful render.
#[derive(Deserialize)]
pub struct RenderResponse {
    pub image: String,
}

/// Request body for POST /v1/segment
#[derive(Serialize)]
pub struct SegmentRequest<'a> {
    pub image: String,
    pub query: &'a MaskQuery,
}

/// Response body from a successful segmentation.
#[derive(Deserialize)]
pub struct SegmentResponse {
    pub mask: String,
}

/// Error payload the backend returns on non-2xx responses.
#[derive(Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// How the segmentation endpoint should find the subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MaskQuery {
    /// Segment the object under a click point (image-space coordinates).
    Point { x: f32, y: f32 },
    /// Let the backend auto-detect the main subject.
    Auto,
}

pub fn encode_image(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn decode_image(encoded: &str) -> Result<Vec<u8>, RemoteError> {
    BASE64
        .decode(encoded)
        .map_err(|e| RemoteError::Decode(format!("invalid base64 image payload: {e}")))
}
