use std::sync::Arc;
use std::time::Instant;

use backdrop_common::{BackdropError, EditRequest, EditResult, EncodedImage, OUTPUT_MIME_TYPE};
use tracing::{info, warn};

use crate::traits::ImageEditor;

/// Fixed directive placed before every user instruction.
pub const EDIT_DIRECTIVE: &str = "Edit this image. Create a photorealistic output.";

pub fn build_prompt(instruction: &str) -> String {
    format!("{EDIT_DIRECTIVE} {}", instruction.trim())
}

/// One request/response exchange with the image service per `submit`.
/// No retries, no caching.
#[derive(Clone)]
pub struct EditPipeline {
    editor: Arc<dyn ImageEditor>,
}

impl EditPipeline {
    pub fn new(editor: Arc<dyn ImageEditor>) -> Self {
        Self { editor }
    }

    pub async fn submit(&self, request: &EditRequest) -> EditResult {
        let source = &request.source_image;
        let prompt = build_prompt(&request.instruction);
        let started = Instant::now();

        info!(
            mime_type = source.mime_type(),
            bytes = source.byte_len(),
            "Submitting image edit"
        );

        let reply = self
            .editor
            .edit(source.mime_type(), source.base64_payload(), &prompt)
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let data = match reply {
            Ok(Some(data)) => data,
            Ok(None) => {
                warn!(elapsed_ms, "Image service returned no image");
                return Err(BackdropError::EmptyResult);
            }
            Err(e) => {
                warn!(error = %e, elapsed_ms, "Image service request failed");
                return Err(BackdropError::Service(format!("{e:#}")));
            }
        };

        let image = EncodedImage::from_base64(OUTPUT_MIME_TYPE, &data).map_err(|_| {
            BackdropError::Service("Malformed image data in response".to_string())
        })?;

        info!(bytes = image.byte_len(), elapsed_ms, "Image edit complete");
        Ok(image)
    }
}
