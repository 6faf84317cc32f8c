//! Media inspection for the image publisher.
//!
//! Classifies raw bytes by their magic number and decodes just enough of
//! the header to learn the pixel dimensions. Runs entirely in memory; the
//! publisher calls this before any network traffic so that a non-image
//! never reaches the upload step.

use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use thiserror::Error;

/// Errors from media inspection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    /// The bytes are not a recognised image type.
    #[error("not an image")]
    NotAnImage,

    /// Recognised as an image but the header could not be decoded.
    #[error("undecodable {mime_type}: {reason}")]
    Undecodable {
        /// The sniffed mime type.
        mime_type: &'static str,
        /// Decoder error message.
        reason: String,
    },
}

/// What the publisher needs to know about an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    /// Mime type, e.g. `image/png`.
    pub mime_type: &'static str,
    /// Canonical file extension for the format, e.g. `png`.
    pub extension: &'static str,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Number of bytes.
    pub size: u64,
}

impl MediaInfo {
    /// File name used as the message body and upload name.
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension)
    }
}

/// Classify bytes as an image type.
pub fn sniff(bytes: &[u8]) -> Result<ImageFormat, MediaError> {
    image::guess_format(bytes).map_err(|_| MediaError::NotAnImage)
}

/// Classify and measure an image.
pub fn inspect(bytes: &[u8]) -> Result<MediaInfo, MediaError> {
    let format = sniff(bytes)?;
    let mime_type = format.to_mime_type();

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| MediaError::Undecodable {
            mime_type,
            reason: e.to_string(),
        })?;

    Ok(MediaInfo {
        mime_type,
        extension: format.extensions_str().first().copied().unwrap_or("img"),
        width,
        height,
        size: bytes.len() as u64,
    })
}
