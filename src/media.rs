//! Helpers for generated images carried as `data:image/png;base64,` URIs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Decode the payload of a base64 data URI
pub fn decode_data_uri(data_uri: &str) -> Result<Vec<u8>> {
    let (_, payload) = data_uri
        .split_once(";base64,")
        .ok_or_else(|| anyhow!("not a base64 data URI"))?;
    BASE64
        .decode(payload.trim())
        .context("image base64 decode failed")
}

/// Width and height from a PNG's IHDR chunk
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    // signature (8) + chunk length (4) + "IHDR" (4) + width (4) + height (4)
    if bytes.len() < 24 || !bytes.starts_with(PNG_SIGNATURE) || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

/// One-line description shown in place of the image
pub fn describe(data_uri: &str) -> String {
    match decode_data_uri(data_uri) {
        Ok(bytes) => {
            let size = format_size(bytes.len());
            match png_dimensions(&bytes) {
                Some((w, h)) => format!("PNG {}x{} · {}", w, h, size),
                None => format!("image · {}", size),
            }
        }
        Err(_) => "image (unreadable payload)".to_string(),
    }
}

fn format_size(len: usize) -> String {
    if len >= 1024 * 1024 {
        format!("{:.1} MB", len as f64 / (1024.0 * 1024.0))
    } else if len >= 1024 {
        format!("{:.1} KB", len as f64 / 1024.0)
    } else {
        format!("{} B", len)
    }
}

/// Write the image into `dir` as `image-<millis>.png`, returning the path.
pub fn save_image(data_uri: &str, dir: &Path) -> Result<PathBuf> {
    let bytes = decode_data_uri(data_uri)?;
    fs::create_dir_all(dir)?;

    let path = dir.join(format!("image-{}.png", chrono::Utc::now().timestamp_millis()));
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    fn data_uri(bytes: &[u8]) -> String {
        format!("data:image/png;base64,{}", BASE64.encode(bytes))
    }

    #[test]
    fn test_png_dimensions() {
        assert_eq!(png_dimensions(&png_header(512, 768)), Some((512, 768)));
        assert_eq!(png_dimensions(b"GIF89a not a png at all"), None);
        assert_eq!(png_dimensions(&PNG_SIGNATURE[..4]), None);
    }

    #[test]
    fn test_describe() {
        let uri = data_uri(&png_header(512, 512));
        assert_eq!(describe(&uri), "PNG 512x512 · 29 B");
        assert_eq!(describe("data:image/png;base64,!!!"), "image (unreadable payload)");
        assert_eq!(describe("https://example.com/cat.png"), "image (unreadable payload)");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_save_image_writes_decoded_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = png_header(64, 32);

        let path = save_image(&data_uri(&bytes), dir.path()).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("image-"));
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }
}
