// Trait boundary between the edit pipeline and the generative image service.
//
// The pipeline only needs "send image + prompt, get back the first image or
// nothing". Gemini implements it for real; testing::MockEditor scripts it.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Send one image (base64 body, no data-URL prefix) and a prompt.
    /// `Ok(None)` means the service answered without an image.
    async fn edit(&self, mime_type: &str, base64_data: &str, prompt: &str)
        -> Result<Option<String>>;
}

#[async_trait]
impl ImageEditor for ai_client::Gemini {
    async fn edit(
        &self,
        mime_type: &str,
        base64_data: &str,
        prompt: &str,
    ) -> Result<Option<String>> {
        let image = self.edit_image(mime_type, base64_data, prompt).await?;
        Ok(image.map(|inline| inline.data))
    }
}
