//! Content hashing and format sniffing
//!
//! Turns raw image bytes into the key used for deduplication plus the
//! format and (when available) pixel dimensions.

use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::Path;

/// What the pipeline knows about an image before it is uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    /// SHA-256 of the raw bytes, base64url without padding.
    pub hash: String,
    /// Normalized extension, no leading dot. Empty when nothing matched.
    pub format: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Hashes `data` and works out its format.
///
/// Format resolution order: byte signature, then the extension of `path`.
/// Dimensions are best effort and simply left out when the decoder cannot
/// read the header.
pub fn digest(data: &[u8], path: Option<&Path>) -> ContentDigest {
    let hash = content_hash(data);
    let format = sniff_format(data)
        .map(str::to_string)
        .or_else(|| path.and_then(extension_format))
        .unwrap_or_default();
    let (width, height) = match dimensions(data) {
        Some((w, h)) => (Some(w), Some(h)),
        None => (None, None),
    };

    tracing::debug!(
        "Hashed {} bytes -> {} (format: {:?}, {:?}x{:?})",
        data.len(),
        hash,
        format,
        width,
        height
    );

    ContentDigest {
        hash,
        format,
        width,
        height,
    }
}

pub fn content_hash(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Matches well-known magic numbers.
pub fn sniff_format(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("jpg"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("webp"),
        [_, _, _, _, b'f', b't', b'y', b'p', b'a', b'v', b'i', b'f' | b's', ..] => Some("avif"),
        [_, _, _, _, b'f', b't', b'y', b'p', b'h', b'e', b'i', b'c' | b'x', ..] => Some("heic"),
        [b'B', b'M', ..] => Some("bmp"),
        [0x00, 0x00, 0x01, 0x00, ..] => Some("ico"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some("tiff"),
        _ if looks_like_svg(bytes) => Some("svg"),
        _ => image::guess_format(bytes)
            .ok()
            .and_then(|f| f.extensions_str().first().copied()),
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

fn extension_format(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "" => None,
        "jpeg" => Some("jpg".to_string()),
        "tif" => Some("tiff".to_string()),
        _ => Some(ext),
    }
}

fn dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?;
    reader.format()?;
    match reader.into_dimensions() {
        Ok((w, h)) if w > 0 && h > 0 => Some((w, h)),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Could not read image dimensions: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_hash_is_url_safe_and_stable() {
        let a = content_hash(b"hello");
        assert_eq!(a, content_hash(b"hello"));
        assert_eq!(a.len(), 43);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn test_different_content_different_hash() {
        assert_ne!(content_hash(b"image one"), content_hash(b"image two"));
    }

    #[test]
    fn test_png_with_jpg_extension_is_png() {
        let data = png_bytes(3, 2);
        let result = digest(&data, Some(Path::new("/photos/holiday.jpg")));

        assert_eq!(result.format, "png");
        assert_eq!(result.width, Some(3));
        assert_eq!(result.height, Some(2));
    }

    #[test]
    fn test_extension_fallback_when_sniffing_fails() {
        let result = digest(b"not really an image", Some(Path::new("/tmp/Photo.JPEG")));
        assert_eq!(result.format, "jpg");
        assert_eq!(result.width, None);
        assert_eq!(result.height, None);
    }

    #[test]
    fn test_no_format_without_signature_or_extension() {
        let result = digest(b"plain", Some(Path::new("/tmp/README")));
        assert_eq!(result.format, "");
        assert_eq!(digest(b"plain", None).format, "");
    }

    #[test]
    fn test_sniff_signatures() {
        assert_eq!(sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpg"));
        assert_eq!(sniff_format(b"GIF89a...."), Some("gif"));
        assert_eq!(sniff_format(b"RIFF\0\0\0\0WEBPVP8 "), Some("webp"));
        assert_eq!(sniff_format(b"\0\0\0\x1cftypavif"), Some("avif"));
        assert_eq!(
            sniff_format(b"<?xml version=\"1.0\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\"/>"),
            Some("svg")
        );
        assert_eq!(sniff_format(&[]), None);
    }

    #[test]
    fn test_truncated_png_keeps_format_without_dimensions() {
        let data = png_bytes(4, 4);
        let truncated = &data[..10];
        let result = digest(truncated, None);
        assert_eq!(result.format, "png");
        assert_eq!(result.width, None);
    }
}
