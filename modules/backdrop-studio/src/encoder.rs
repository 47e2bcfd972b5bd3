//! Turns user-selected files into [`EncodedImage`] data URLs.

use std::path::Path;

use backdrop_common::config::DEFAULT_MAX_UPLOAD_BYTES;
use backdrop_common::{is_image_mime, BackdropError, EncodedImage, Result};
use tracing::debug;

/// Detect a MIME type from magic bytes, for callers with no declared type.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    max_bytes: usize,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl Encoder {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Reject anything whose declared type is not `image/*`.
    pub fn validate_mime(&self, declared_mime: &str) -> Result<()> {
        if is_image_mime(declared_mime) {
            Ok(())
        } else {
            Err(BackdropError::Validation(format!(
                "Please upload an image file (got {:?})",
                declared_mime.trim()
            )))
        }
    }

    fn check_size(&self, len: u64) -> Result<()> {
        if len > self.max_bytes as u64 {
            return Err(BackdropError::Validation(format!(
                "Image is too large ({len} bytes, max {})",
                self.max_bytes
            )));
        }
        Ok(())
    }

    /// Encode bytes already in memory.
    pub fn encode_bytes(&self, declared_mime: &str, bytes: &[u8]) -> Result<EncodedImage> {
        self.validate_mime(declared_mime)?;
        self.check_size(bytes.len() as u64)?;
        if bytes.is_empty() {
            return Err(BackdropError::Validation("Image file is empty".to_string()));
        }
        debug!(mime_type = declared_mime, bytes = bytes.len(), "Encoding image");
        Ok(EncodedImage::from_bytes(declared_mime, bytes))
    }

    /// Read and encode a file. The MIME check runs before any file access.
    pub async fn encode_file(
        &self,
        path: impl AsRef<Path>,
        declared_mime: &str,
    ) -> Result<EncodedImage> {
        self.validate_mime(declared_mime)?;
        let bytes = self.read_file(path).await?;
        self.encode_bytes(declared_mime, &bytes)
    }

    /// Read a file whose size is within the limit. Oversized files are
    /// rejected from their metadata, before any content is read.
    pub async fn read_file(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let io_err = |e: std::io::Error| BackdropError::Io(format!("{}: {e}", path.display()));

        let metadata = tokio::fs::metadata(path).await.map_err(io_err)?;
        self.check_size(metadata.len())?;

        tokio::fs::read(path).await.map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Smallest valid PNG signature + IHDR start; enough for `infer`.
    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn non_image_mime_is_validation_error() {
        let err = Encoder::default()
            .encode_bytes("application/pdf", b"%PDF-1.7")
            .unwrap_err();
        assert!(matches!(err, BackdropError::Validation(_)));
        assert!(err.user_message().contains("Please upload an image file"));
    }

    #[test]
    fn encode_keeps_declared_mime_and_bytes() {
        let bytes: Vec<u8> = JPEG_MAGIC.iter().copied().cycle().take(10 * 1024).collect();
        let image = Encoder::default().encode_bytes("image/jpeg", &bytes).unwrap();

        assert_eq!(image.mime_type(), "image/jpeg");
        assert!(image.data_url().starts_with("data:image/jpeg;base64,"));
        assert_eq!(image.decode().unwrap(), bytes);
    }

    #[test]
    fn oversize_is_rejected() {
        let err = Encoder::new(4).encode_bytes("image/png", b"12345").unwrap_err();
        assert!(matches!(err, BackdropError::Validation(_)));
    }

    #[test]
    fn empty_is_rejected() {
        assert!(Encoder::default().encode_bytes("image/png", b"").is_err());
    }

    #[test]
    fn sniffs_common_types() {
        assert_eq!(sniff_mime(PNG_MAGIC), Some("image/png"));
        assert_eq!(sniff_mime(JPEG_MAGIC), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"plain text"), None);
    }

    #[tokio::test]
    async fn encode_file_reads_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PNG_MAGIC).unwrap();

        let image = Encoder::default()
            .encode_file(file.path(), "image/png")
            .await
            .unwrap();

        assert_eq!(image.decode().unwrap(), PNG_MAGIC);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_from_metadata() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 64]).unwrap();

        let err = Encoder::new(16).read_file(file.path()).await.unwrap_err();

        assert!(matches!(err, BackdropError::Validation(_)));
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn read_file_within_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(JPEG_MAGIC).unwrap();

        let bytes = Encoder::new(JPEG_MAGIC.len()).read_file(file.path()).await.unwrap();

        assert_eq!(bytes, JPEG_MAGIC);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Encoder::default()
            .encode_file(dir.path().join("gone.jpg"), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, BackdropError::Io(_)));
    }

    #[tokio::test]
    async fn non_image_file_is_rejected_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        // The path does not exist: a read attempt would yield Io, not Validation.
        let err = Encoder::default()
            .encode_file(dir.path().join("notes.txt"), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, BackdropError::Validation(_)));
    }
}
