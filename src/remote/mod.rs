//! Image-processing backend collaborator.
//!
//! Everything interesting — inpainting, super-resolution, colorization,
//! style transfer, segmentation — happens on the other side of this HTTP
//! contract. This module only speaks the wire format.

pub mod client;
pub mod types;

pub use client::{HttpImageBackend, ImageBackend, MockImageBackend, RenderCall};
pub use types::MaskQuery;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Cannot reach image backend at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Backend rejected the request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Could not decode backend response: {0}")]
    Decode(String),
}
