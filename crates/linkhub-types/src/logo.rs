//! Logo images and the per-slot logo files published with a hub page.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Image formats accepted as logos, detected from content rather than from
/// URLs or file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Svg,
}

impl ImageFormat {
    /// Detect the format from the leading bytes of an image.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(ImageFormat::Png);
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Some(ImageFormat::Gif);
        }
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(ImageFormat::Webp);
        }

        // SVG is text: look for the root element near the start.
        let head = &bytes[..bytes.len().min(512)];
        let text = String::from_utf8_lossy(head);
        let text = text.trim_start_matches('\u{feff}').trim_start();
        if text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg")) {
            return Some(ImageFormat::Svg);
        }

        None
    }

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
            ImageFormat::Svg => "svg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Raw logo bytes whose format has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl LogoImage {
    /// Wrap downloaded bytes. Returns `None` when the content is not a
    /// recognised image format.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        let format = ImageFormat::sniff(&bytes)?;
        Some(Self { bytes, format })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

/// A logo file as published alongside the page: `(filename, bytes)`.
///
/// The filename extension always matches the detected format of `bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoSlot {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl LogoSlot {
    /// Name a logo for a one-based slot number: `logo2.png`.
    pub fn for_slot(slot: usize, image: &LogoImage) -> Self {
        Self {
            filename: format!("logo{slot}.{}", image.format().extension()),
            bytes: image.bytes().to_vec(),
        }
    }

    /// Whether the filename is non-empty and its extension matches the
    /// content.
    pub fn is_consistent(&self) -> bool {
        let Some(format) = ImageFormat::sniff(&self.bytes) else {
            return false;
        };
        let extension = self
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match format {
            ImageFormat::Jpeg => extension == "jpg" || extension == "jpeg",
            other => extension == other.extension(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{JPEG, PNG};
    use super::*;

    #[test]
    fn test_sniff_known_formats() {
        assert_eq!(ImageFormat::sniff(PNG), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::sniff(JPEG), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::sniff(b"GIF89a\x01\x00"), Some(ImageFormat::Gif));
        assert_eq!(
            ImageFormat::sniff(b"RIFF\x10\x00\x00\x00WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
        assert_eq!(
            ImageFormat::sniff(b"  <?xml version=\"1.0\"?><svg xmlns=\"\"></svg>"),
            Some(ImageFormat::Svg)
        );
    }

    #[test]
    fn test_sniff_rejects_html() {
        assert_eq!(ImageFormat::sniff(b"<!DOCTYPE html><html></html>"), None);
        assert_eq!(ImageFormat::sniff(b""), None);
    }

    #[test]
    fn test_logo_slot_filename_matches_format() {
        let image = LogoImage::from_bytes(JPEG.to_vec()).unwrap();
        let slot = LogoSlot::for_slot(2, &image);
        assert_eq!(slot.filename, "logo2.jpg");
        assert!(slot.is_consistent());
    }

    #[test]
    fn test_logo_slot_inconsistent_extension() {
        let slot = LogoSlot {
            filename: "logo1.jpg".to_string(),
            bytes: PNG.to_vec(),
        };
        assert!(!slot.is_consistent());
    }

    #[test]
    fn test_logo_image_rejects_unknown_bytes() {
        assert!(LogoImage::from_bytes(b"not an image".to_vec()).is_none());
    }
}
