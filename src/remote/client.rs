//! HTTP client for the image-processing backend, plus the mock used
//! throughout the test suite.

use std::sync::Mutex;

use super::types::{
    decode_image, encode_image, ErrorPayload, MaskQuery, RenderRequest, RenderResponse,
    SegmentRequest, SegmentResponse,
};
use super::RemoteError;
use crate::config;
use crate::editor::mode::ParamSet;

/// Black-box contract of the processing backend: given image bytes and a
/// parameter set, return new image bytes or an error.
pub trait ImageBackend: Send + Sync {
    fn render(
        &self,
        endpoint: &str,
        image: &[u8],
        params: &ParamSet,
        mask: Option<&[u8]>,
    ) -> Result<Vec<u8>, RemoteError>;

    fn segment(&self, image: &[u8], query: &MaskQuery) -> Result<Vec<u8>, RemoteError>;
}

/// Shared handles delegate, so a test can keep a reference to a mock it
/// handed to the processor.
impl<T: ImageBackend + ?Sized> ImageBackend for std::sync::Arc<T> {
    fn render(
        &self,
        endpoint: &str,
        image: &[u8],
        params: &ParamSet,
        mask: Option<&[u8]>,
    ) -> Result<Vec<u8>, RemoteError> {
        (**self).render(endpoint, image, params, mask)
    }

    fn segment(&self, image: &[u8], query: &MaskQuery) -> Result<Vec<u8>, RemoteError> {
        (**self).segment(image, query)
    }
}

/// Production backend client.
pub struct HttpImageBackend {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpImageBackend {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    /// Client against the configured backend with the bounded render
    /// timeout. A hung call would stall the whole queue, so there is
    /// always a timeout here even though the source behavior had none.
    pub fn from_config() -> Self {
        Self::new(&config::render_api_url(), config::RENDER_TIMEOUT_SECS)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> RemoteError {
        if e.is_connect() {
            RemoteError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            RemoteError::Timeout(self.timeout_secs)
        } else {
            RemoteError::Http(e.to_string())
        }
    }

    fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        // Prefer the backend's human-readable message; fall back to raw body.
        let body = response.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorPayload>(&body)
            .map(|p| p.message)
            .unwrap_or(body);
        Err(RemoteError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl ImageBackend for HttpImageBackend {
    fn render(
        &self,
        endpoint: &str,
        image: &[u8],
        params: &ParamSet,
        mask: Option<&[u8]>,
    ) -> Result<Vec<u8>, RemoteError> {
        let url = format!("{}/v1/render/{}", self.base_url, endpoint);
        let body = RenderRequest {
            image: encode_image(image),
            mask: mask.map(encode_image),
            params,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let parsed: RenderResponse = Self::check_status(response)?
            .json()
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        decode_image(&parsed.image)
    }

    fn segment(&self, image: &[u8], query: &MaskQuery) -> Result<Vec<u8>, RemoteError> {
        let url = format!("{}/v1/segment", self.base_url);
        let body = SegmentRequest {
            image: encode_image(image),
            query,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let parsed: SegmentResponse = Self::check_status(response)?
            .json()
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        decode_image(&parsed.mask)
    }
}

// ═══════════════════════════════════════════
// Mock backend
// ═══════════════════════════════════════════

/// One recorded render call, for asserting on outbound parameters.
#[derive(Debug, Clone)]
pub struct RenderCall {
    pub endpoint: String,
    pub params: ParamSet,
    pub had_mask: bool,
}

/// Mock backend for tests — configurable result, per-call failure
/// injection, and a record of every outbound call.
pub struct MockImageBackend {
    result: Vec<u8>,
    mask_result: Vec<u8>,
    /// Calls whose 0-based index is listed here fail.
    fail_on_calls: Vec<usize>,
    fail_all: bool,
    fail_message: String,
    calls: Mutex<Vec<RenderCall>>,
}

impl MockImageBackend {
    pub fn new(result: &[u8]) -> Self {
        Self {
            result: result.to_vec(),
            mask_result: vec![0xFF],
            fail_on_calls: Vec::new(),
            fail_all: false,
            fail_message: "mock failure".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every render call with the given message.
    pub fn failing(message: &str) -> Self {
        let mut mock = Self::new(&[]);
        mock.fail_all = true;
        mock.fail_message = message.to_string();
        mock
    }

    /// Fail only the render call at the given 0-based index.
    pub fn with_failure_at(mut self, call_index: usize) -> Self {
        self.fail_on_calls.push(call_index);
        self
    }

    pub fn with_mask_result(mut self, mask: &[u8]) -> Self {
        self.mask_result = mask.to_vec();
        self
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().expect("mock lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock lock").len()
    }
}

impl ImageBackend for MockImageBackend {
    fn render(
        &self,
        endpoint: &str,
        _image: &[u8],
        params: &ParamSet,
        mask: Option<&[u8]>,
    ) -> Result<Vec<u8>, RemoteError> {
        let mut calls = self.calls.lock().expect("mock lock");
        let index = calls.len();
        calls.push(RenderCall {
            endpoint: endpoint.to_string(),
            params: params.clone(),
            had_mask: mask.is_some(),
        });

        if self.fail_all || self.fail_on_calls.contains(&index) {
            return Err(RemoteError::Api {
                status: 500,
                message: self.fail_message.clone(),
            });
        }
        Ok(self.result.clone())
    }

    fn segment(&self, _image: &[u8], _query: &MaskQuery) -> Result<Vec<u8>, RemoteError> {
        Ok(self.mask_result.clone())
    }
}
