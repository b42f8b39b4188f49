//! Image type detection from magic bytes.
//!
//! Downloads are accepted only when the payload starts with the signature of
//! a format whose extension is in [`IMAGE_EXTENSIONS`]; the server's
//! `Content-Type` and the URL extension are ignored.

use crate::assets::{is_an_image, IMAGE_EXTENSIONS};
use image::ImageFormat;

/// A positively identified image type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageType {
    pub format: ImageFormat,
    ext: &'static str,
}

impl ImageType {
    /// Canonical file extension, without the dot.
    pub fn ext(&self) -> &'static str {
        self.ext
    }
}

/// Identify `bytes` as an image, or `None` when the signature is unknown or
/// belongs to a format outside [`IMAGE_EXTENSIONS`] (PNM, farbfeld, ...).
pub fn image_type(bytes: &[u8]) -> Option<ImageType> {
    let format = image::guess_format(bytes).ok()?;
    let ext = format
        .extensions_str()
        .iter()
        .copied()
        .find(|e| is_an_image(&format!(".{e}")))?;
    Some(ImageType { format, ext })
}
