//! Accepted upload media types

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image media type accepted for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
}

impl MediaType {
    /// Parse a declared `Content-Type`. Parameters after `;` are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case("image/jpeg") {
            Some(MediaType::Jpeg)
        } else if essence.eq_ignore_ascii_case("image/png") {
            Some(MediaType::Png)
        } else if essence.eq_ignore_ascii_case("image/webp") {
            Some(MediaType::Webp)
        } else {
            None
        }
    }

    /// Canonical MIME string
    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
        }
    }

    /// Matching decoder format
    pub fn image_format(&self) -> ImageFormat {
        match self {
            MediaType::Jpeg => ImageFormat::Jpeg,
            MediaType::Png => ImageFormat::Png,
            MediaType::Webp => ImageFormat::WebP,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}
