mod client;
pub mod types;

use std::time::Duration;

use tracing::info;

use crate::error::Result;
use client::GeminiClient;
use types::*;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// Gemini Agent
// =============================================================================

#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for Gemini {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gemini")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client(&self) -> Result<GeminiClient> {
        GeminiClient::new(&self.api_key, &self.base_url, self.timeout)
    }

    /// Send a raw generateContent request.
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        self.client()?.generate_content(&self.model, request).await
    }

    /// Edit an image with a text prompt. Returns the first inline image of
    /// the response, or `None` when the model answered without one.
    pub async fn edit_image(
        &self,
        mime_type: &str,
        base64_data: &str,
        prompt: &str,
    ) -> Result<Option<InlineData>> {
        let request = GenerateContentRequest::image_edit(mime_type, base64_data, prompt);
        let response = self.generate_content(&request).await?;

        match response.first_inline_image() {
            Some(image) => {
                info!(
                    model = %self.model,
                    mime_type = %image.mime_type,
                    base64_len = image.data.len(),
                    "Gemini returned an image"
                );
                Ok(Some(image.clone()))
            }
            None => {
                info!(
                    model = %self.model,
                    finish_reason = response.finish_reason().unwrap_or("-"),
                    block_reason = response.block_reason().unwrap_or("-"),
                    has_text = response.text().is_some(),
                    "Gemini response carried no image"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_public_endpoint() {
        let gemini = Gemini::new("key", DEFAULT_MODEL);
        assert_eq!(gemini.model(), "gemini-2.5-flash-image");
        assert_eq!(gemini.base_url(), DEFAULT_API_BASE);
    }

    #[test]
    fn debug_output_hides_api_key() {
        let gemini = Gemini::new("super-secret", DEFAULT_MODEL);
        let dbg = format!("{gemini:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("gemini-2.5-flash-image"));
    }

    #[test]
    fn builder_overrides() {
        let gemini = Gemini::new("key", "m")
            .with_base_url("http://localhost:9999")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(gemini.base_url(), "http://localhost:9999");
        assert_eq!(gemini.timeout, Duration::from_secs(3));
    }
}
