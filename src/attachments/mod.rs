//! Image attachments for multimodal requests
//!
//! Reads an uploaded image from disk and encodes it for embedding in a JSON
//! request body

mod vision;

use std::path::Path;

use base64::Engine;

use crate::Result;

pub use vision::VisionClient;

/// Read an image file and return its bytes base64-encoded
///
/// No size or format validation is performed.
///
/// # Errors
///
/// Returns `Error::Io` if the file is missing or unreadable
pub fn encode_image(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "encoded image");
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Base64 image payload plus the MIME type it is declared with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Base64 payload (standard alphabet, padded)
    pub data: String,
    /// MIME type declared in the data URI
    pub mime_type: &'static str,
}

impl EncodedImage {
    /// Read and encode an image, detecting its real type from magic bytes
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file is missing or unreadable
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Encode in-memory image bytes
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: sniff_mime_type(bytes),
        }
    }

    /// Wrap an already-encoded payload, declaring it as JPEG
    #[must_use]
    pub const fn from_base64_jpeg(data: String) -> Self {
        Self {
            data,
            mime_type: "image/jpeg",
        }
    }

    /// `data:<mime>;base64,<payload>` URI for `image_url` content parts
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Detect an image MIME type from its leading bytes
///
/// Unknown formats are declared as JPEG.
#[must_use]
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}
