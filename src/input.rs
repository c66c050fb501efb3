use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat};

use crate::errors::{ClassifyError, InputError, Result};

/// Upload ceiling applied at every entry point.
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// A user-supplied image blob with its declared MIME type.
#[derive(Debug, Clone)]
pub struct ImageInput {
    bytes: Vec<u8>,
    mime: String,
}

impl ImageInput {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }

    /// Parses `data:<mime>;base64,<payload>`.
    ///
    /// Payloads whose decoded size would exceed `max_size` are rejected before
    /// decoding.
    pub fn from_data_url(data_url: &str, max_size: usize) -> std::result::Result<Self, InputError> {
        let malformed = |reason: &str| InputError::MalformedDataUrl {
            reason: reason.to_string(),
        };

        let rest = data_url
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| malformed("missing `data:` scheme"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| malformed("missing `,` separator"))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| malformed("only base64 payloads are supported"))?;

        let payload = payload.trim();
        let decoded_len = payload.trim_end_matches('=').len() / 4 * 3;
        if decoded_len > max_size {
            return Err(InputError::TooLarge {
                size: decoded_len,
                limit: max_size,
            });
        }

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| InputError::MalformedDataUrl {
                reason: e.to_string(),
            })?;

        Ok(Self::from_bytes(bytes, mime))
    }

    /// Reads a file and infers its MIME type from the extension.
    ///
    /// Unknown extensions get `application/octet-stream`, which validation
    /// then rejects.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| ClassifyError::FileSystem {
            path: path.to_path_buf(),
            operation: "image read".to_string(),
            source: e,
        })?;
        let mime = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type())
            .unwrap_or("application/octet-stream");
        Ok(Self::from_bytes(bytes, mime))
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Checks MIME type and size without touching the pixel data.
    pub fn validate(&self, max_size: usize) -> std::result::Result<(), InputError> {
        if !self.mime.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(InputError::UnsupportedMimeType {
                mime: self.mime.clone(),
            });
        }
        if self.bytes.is_empty() {
            return Err(InputError::Empty);
        }
        if self.bytes.len() > max_size {
            return Err(InputError::TooLarge {
                size: self.bytes.len(),
                limit: max_size,
            });
        }
        Ok(())
    }

    pub fn decode(&self) -> std::result::Result<DynamicImage, InputError> {
        let image = image::load_from_memory(&self.bytes)
            .map_err(|source| InputError::Undecodable { source })?;
        if image.width() == 0 || image.height() == 0 {
            return Err(InputError::Undecodable {
                source: image::ImageError::Limits(image::error::LimitError::from_kind(
                    image::error::LimitErrorKind::DimensionError,
                )),
            });
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([120, 80, 40])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_rejects_non_image_mime() {
        let input = ImageInput::from_bytes(b"hello".to_vec(), "text/plain");
        assert!(matches!(
            input.validate(DEFAULT_MAX_FILE_SIZE),
            Err(InputError::UnsupportedMimeType { .. })
        ));
    }

    #[test]
    fn test_rejects_oversized() {
        let input = ImageInput::from_bytes(vec![0u8; 11 * 1024 * 1024], "image/jpeg");
        assert!(matches!(
            input.validate(DEFAULT_MAX_FILE_SIZE),
            Err(InputError::TooLarge { limit, .. }) if limit == DEFAULT_MAX_FILE_SIZE
        ));
    }

    #[test]
    fn test_accepts_at_limit() {
        let input = ImageInput::from_bytes(vec![0u8; 16], "image/png");
        assert!(input.validate(16).is_ok());
        assert!(input.validate(15).is_err());
    }

    #[test]
    fn test_rejects_empty() {
        let input = ImageInput::from_bytes(Vec::new(), "image/png");
        assert!(matches!(input.validate(16), Err(InputError::Empty)));
    }

    #[test]
    fn test_data_url_roundtrip() {
        let bytes = png_bytes();
        let url = format!("data:image/png;base64,{}", STANDARD.encode(&bytes));
        let input = ImageInput::from_data_url(&url, DEFAULT_MAX_FILE_SIZE).unwrap();
        assert_eq!(input.mime(), "image/png");
        assert_eq!(input.bytes(), bytes.as_slice());
        assert_eq!(input.decode().unwrap().width(), 8);
    }

    #[test]
    fn test_malformed_data_urls() {
        for url in [
            "image/png;base64,AAAA",
            "data:image/png;base64",
            "data:image/png,AAAA",
            "data:image/png;base64,@@@@",
        ] {
            assert!(
                matches!(
                    ImageInput::from_data_url(url, DEFAULT_MAX_FILE_SIZE),
                    Err(InputError::MalformedDataUrl { .. })
                ),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_oversized_data_url_rejected_before_decode() {
        // not valid base64, so only the size check can reject it as TooLarge
        let url = format!("data:image/png;base64,{}", "@".repeat(4096));
        assert!(matches!(
            ImageInput::from_data_url(&url, 1024),
            Err(InputError::TooLarge { size: 3072, limit: 1024 })
        ));

        let small = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes()));
        assert!(ImageInput::from_data_url(&small, png_bytes().len()).is_ok());
    }

    #[test]
    fn test_undecodable_bytes() {
        let input = ImageInput::from_bytes(vec![1, 2, 3, 4], "image/jpeg");
        assert!(matches!(input.decode(), Err(InputError::Undecodable { .. })));
    }

    #[test]
    fn test_from_path_infers_mime() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("box.png");
        std::fs::write(&path, png_bytes())?;
        let input = ImageInput::from_path(&path)?;
        assert_eq!(input.mime(), "image/png");

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"not an image")?;
        let input = ImageInput::from_path(&txt)?;
        assert!(input.validate(DEFAULT_MAX_FILE_SIZE).is_err());
        Ok(())
    }
}
