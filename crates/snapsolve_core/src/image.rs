//! crates/snapsolve_core/src/image.rs
//!
//! Validation of captured image payloads before they are sent to the solver.

use crate::domain::CapturedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use std::sync::LazyLock;

static DATA_URL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:[A-Za-z0-9.+/-]*;base64,").expect("data URL pattern is valid")
});

/// Base64 prefix of the PNG signature `\x89PNG`.
const PNG_MAGIC: &str = "iVBOR";
/// Base64 prefix of the JPEG SOI marker `\xFF\xD8\xFF`.
const JPEG_MAGIC: &str = "/9j/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Why a payload was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("image payload is empty")]
    Empty,
    #[error("image payload is not valid padded base64")]
    InvalidBase64,
    #[error("image is neither PNG nor JPEG")]
    UnknownFormat,
}

/// A prefix-stripped, validated base64 payload ready for transmission.
#[derive(Debug, PartialEq, Eq)]
pub struct ImagePayload {
    base64: String,
    format: ImageFormat,
}

impl ImagePayload {
    pub fn as_base64(&self) -> &str {
        &self.base64
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn into_base64(self) -> String {
        self.base64
    }
}

/// Removes a leading `data:<mime>;base64,` prefix, if any.
pub fn strip_data_url(raw: &str) -> &str {
    match DATA_URL_PREFIX.find(raw) {
        Some(m) => &raw[m.end()..],
        None => raw,
    }
}

/// Detects the image format from the base64 magic-number prefix.
pub fn detect_format(base64: &str) -> Option<ImageFormat> {
    if base64.starts_with(PNG_MAGIC) {
        Some(ImageFormat::Png)
    } else if base64.starts_with(JPEG_MAGIC) {
        Some(ImageFormat::Jpeg)
    } else {
        None
    }
}

/// Turns a captured image into a transmittable payload.
///
/// Camera plugins sometimes wrap long base64 output across lines, so ASCII
/// whitespace is removed before checking the alphabet and padding.
pub fn prepare_payload(image: CapturedImage) -> Result<ImagePayload, ImageError> {
    let raw = image.into_inner();
    let stripped = strip_data_url(raw.trim());
    let base64: String = stripped
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if base64.is_empty() {
        return Err(ImageError::Empty);
    }

    let format = detect_format(&base64).ok_or(ImageError::UnknownFormat)?;

    STANDARD
        .decode(base64.as_bytes())
        .map_err(|_| ImageError::InvalidBase64)?;

    Ok(ImagePayload { base64, format })
}
