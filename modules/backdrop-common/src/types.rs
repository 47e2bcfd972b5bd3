use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::error::{BackdropError, Result};

/// MIME type of every generated image.
pub const OUTPUT_MIME_TYPE: &str = "image/png";

const DATA_URL_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Whether a declared MIME type names an image (`image/*`).
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .trim()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("image/"))
}

/// Strip a `data:<mime>;base64,` prefix, leaving the raw base64 body.
/// Input without such a prefix is returned unchanged.
pub fn strip_data_url_prefix(payload: &str) -> &str {
    payload
        .strip_prefix(DATA_URL_SCHEME)
        .and_then(|rest| rest.find(BASE64_MARKER).map(|i| &rest[i + BASE64_MARKER.len()..]))
        .unwrap_or(payload)
}

// --- EncodedImage ---

/// An image in transit: its MIME type plus a `data:` URL carrying the
/// base64 body. Always holds valid base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedImage {
    mime_type: String,
    data_url: String,
}

impl EncodedImage {
    /// Encode raw bytes.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        let mime_type = mime_type.trim().to_string();
        let data_url = format!(
            "{DATA_URL_SCHEME}{mime_type}{BASE64_MARKER}{}",
            STANDARD.encode(bytes)
        );
        Self {
            mime_type,
            data_url,
        }
    }

    /// Wrap an already-encoded body (prefix optional) under `mime_type`.
    pub fn from_base64(mime_type: &str, payload: &str) -> Result<Self> {
        let body = strip_data_url_prefix(payload.trim());
        STANDARD
            .decode(body)
            .map_err(|e| BackdropError::Validation(format!("Payload is not valid base64: {e}")))?;

        let mime_type = mime_type.trim().to_string();
        let data_url = format!("{DATA_URL_SCHEME}{mime_type}{BASE64_MARKER}{body}");
        Ok(Self {
            mime_type,
            data_url,
        })
    }

    /// Parse a `data:image/...;base64,...` string.
    pub fn parse_data_url(data_url: &str) -> Result<Self> {
        let rest = data_url
            .trim()
            .strip_prefix(DATA_URL_SCHEME)
            .ok_or_else(|| BackdropError::Validation("Not a data URL".to_string()))?;
        let (mime_type, body) = rest.split_once(BASE64_MARKER).ok_or_else(|| {
            BackdropError::Validation("Data URL is not base64-encoded".to_string())
        })?;
        if !is_image_mime(mime_type) {
            return Err(BackdropError::Validation(format!(
                "Data URL does not carry an image: {mime_type}"
            )));
        }
        Self::from_base64(mime_type, body)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    /// The base64 body without the data-URL prefix.
    pub fn base64_payload(&self) -> &str {
        strip_data_url_prefix(&self.data_url)
    }

    /// Decoded image bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.base64_payload())
            .map_err(|e| BackdropError::Validation(format!("Payload is not valid base64: {e}")))
    }

    /// Size of the decoded image, computed from the base64 length.
    pub fn byte_len(&self) -> usize {
        let body = self.base64_payload().as_bytes();
        let padding = body.iter().rev().take_while(|b| **b == b'=').count();
        (body.len() / 4 * 3).saturating_sub(padding)
    }
}

// --- EditRequest / EditResult ---

/// One edit submission: the source image and the user's free-text instruction.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub source_image: EncodedImage,
    pub instruction: String,
}

impl EditRequest {
    pub fn new(source_image: EncodedImage, instruction: impl Into<String>) -> Self {
        Self {
            source_image,
            instruction: instruction.into(),
        }
    }
}

/// Outcome of a single edit: a PNG image or a classified failure.
pub type EditResult = std::result::Result<EncodedImage, BackdropError>;
