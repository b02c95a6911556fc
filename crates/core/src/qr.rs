//! Rendering of QR payloads into something an observer can display.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to render QR payload: {0}")]
pub struct RenderError(pub String);

/// Turns a raw QR payload into an image payload for observers.
pub trait QrRenderer: Send + Sync {
	fn render(&self, payload: &str) -> Result<String, RenderError>;
}

/// Encodes the payload as a `data:` URL so any observer can decode it locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlRenderer;

impl QrRenderer for DataUrlRenderer {
	fn render(&self, payload: &str) -> Result<String, RenderError> {
		if payload.is_empty() {
			return Err(RenderError("empty payload".to_string()));
		}
		Ok(format!("data:text/plain;base64,{}", STANDARD.encode(payload)))
	}
}
