//! Minimal FITS primary-HDU support
//!
//! Just enough of the format for the preview/exposure path: read the header
//! cards of a primary HDU, and write a primary HDU with 16-bit integer
//! data. Extensions, scaling keywords beyond BZERO/BSCALE, and non-integer
//! data are out of scope.

use std::fs;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::hardware::RasterBuffer;

const CARD_LEN: usize = 80;
const BLOCK_LEN: usize = 2880;

#[derive(Debug, Error)]
pub enum FitsError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a FITS file (missing SIMPLE card)")]
    NotFits,

    #[error("header truncated (no END card)")]
    Truncated,

    #[error("missing header key {0}")]
    MissingKey(&'static str),

    #[error("header key {key} has invalid value {value:?}")]
    BadValue { key: &'static str, value: String },
}

/// Parsed primary header: keyword → value (comments are dropped on read).
#[derive(Debug, Clone, Default)]
pub struct FitsHeader {
    cards: Vec<(String, String)>,
}

impl FitsHeader {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.cards
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, key: &'static str) -> Result<&str, FitsError> {
        self.get(key).ok_or(FitsError::MissingKey(key))
    }

    pub fn require_f64(&self, key: &'static str) -> Result<f64, FitsError> {
        let raw = self.require(key)?;
        raw.parse().map_err(|_| FitsError::BadValue {
            key,
            value: raw.to_string(),
        })
    }
}

/// Read the primary header of a FITS file.
///
/// A partially written file typically surfaces as [`FitsError::Truncated`]
/// or [`FitsError::NotFits`]; callers treat every failure the same and
/// retry.
pub fn read_primary_header(path: &Path) -> Result<FitsHeader, FitsError> {
    let bytes = fs::read(path)?;
    if bytes.len() < CARD_LEN || !bytes.starts_with(b"SIMPLE") {
        return Err(FitsError::NotFits);
    }

    let mut header = FitsHeader::default();
    for card in bytes.chunks_exact(CARD_LEN) {
        // Slice the raw bytes; a torn file can hold arbitrary non-UTF-8
        // garbage in the header region and must error, not panic.
        let keyword = String::from_utf8_lossy(&card[..8]);
        let keyword = keyword.trim_end();
        if keyword == "END" {
            return Ok(header);
        }
        if keyword.is_empty() || keyword == "COMMENT" || keyword == "HISTORY" {
            continue;
        }
        if &card[8..10] != b"= " {
            continue;
        }
        let value = String::from_utf8_lossy(&card[10..]);
        header
            .cards
            .push((keyword.to_string(), parse_card_value(&value)));
    }
    Err(FitsError::Truncated)
}

/// Extract the value portion of a card, stripping quotes and the trailing
/// `/ comment`.
fn parse_card_value(raw: &str) -> String {
    let raw = raw.trim_start();
    if let Some(rest) = raw.strip_prefix('\'') {
        // Quoted string: value runs to the closing quote.
        match rest.find('\'') {
            Some(end) => rest[..end].trim_end().to_string(),
            None => rest.trim_end().to_string(),
        }
    } else {
        let value = raw.split('/').next().unwrap_or(raw);
        value.trim().to_string()
    }
}

fn format_card(key: &str, value: &str, comment: &str, quoted: bool) -> [u8; CARD_LEN] {
    let rendered = if quoted {
        format!("'{value}'")
    } else {
        value.to_string()
    };
    let body = if comment.is_empty() {
        format!("{key:<8}= {rendered:<20}")
    } else {
        format!("{key:<8}= {rendered:<20} / {comment}")
    };
    let mut card = [b' '; CARD_LEN];
    let bytes = body.as_bytes();
    let len = bytes.len().min(CARD_LEN);
    card[..len].copy_from_slice(&bytes[..len]);
    card
}

fn pad_to_block(buffer: &mut Vec<u8>, fill: u8) {
    let remainder = buffer.len() % BLOCK_LEN;
    if remainder != 0 {
        buffer.resize(buffer.len() + BLOCK_LEN - remainder, fill);
    }
}

/// Write a primary HDU: mandatory cards, the caller's `(key, value, comment,
/// quoted)` cards, then the raster as 16-bit integers (BZERO 32768).
pub fn write_image(
    path: &Path,
    cards: &[(&str, String, &str, bool)],
    raster: &RasterBuffer,
) -> Result<(), FitsError> {
    let mut buffer = Vec::with_capacity(BLOCK_LEN);

    buffer.extend_from_slice(&format_card("SIMPLE", "T", "conforms to FITS standard", false));
    buffer.extend_from_slice(&format_card("BITPIX", "16", "bits per pixel", false));
    buffer.extend_from_slice(&format_card("NAXIS", "2", "number of axes", false));
    buffer.extend_from_slice(&format_card("NAXIS1", &raster.width.to_string(), "", false));
    buffer.extend_from_slice(&format_card("NAXIS2", &raster.height.to_string(), "", false));
    buffer.extend_from_slice(&format_card("BZERO", "32768", "offset for unsigned data", false));
    buffer.extend_from_slice(&format_card("BSCALE", "1", "", false));
    for (key, value, comment, quoted) in cards {
        buffer.extend_from_slice(&format_card(key, value, comment, *quoted));
    }
    let mut end = [b' '; CARD_LEN];
    end[..3].copy_from_slice(b"END");
    buffer.extend_from_slice(&end);
    pad_to_block(&mut buffer, b' ');

    for pixel in &raster.pixels {
        let stored = (i32::from(*pixel) - 32768) as i16;
        buffer.extend_from_slice(&stored.to_be_bytes());
    }
    pad_to_block(&mut buffer, 0);

    let mut file = fs::File::create(path)?;
    file.write_all(&buffer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn raster() -> RasterBuffer {
        RasterBuffer {
            width: 4,
            height: 2,
            pixels: vec![0, 1, 2, 3, 4, 5, 6, 7],
        }
    }

    #[test]
    fn test_write_then_read_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preview.fits");
        let cards: Vec<(&str, String, &str, bool)> = vec![
            ("OBJECT", "bias".to_string(), "", true),
            ("EXPTIME", "10".to_string(), "exposure duration in sec", false),
            ("FILTER", "R".to_string(), "filter name", true),
            ("DATE-OBS", "2024-01-01".to_string(), "YYYY-MM-DD", true),
            (
                "TIME-OBS",
                "09:59:50.0000".to_string(),
                "HH:MM:SS time of the exposure start",
                true,
            ),
        ];
        write_image(&path, &cards, &raster()).unwrap();

        let header = read_primary_header(&path).unwrap();
        assert_eq!(header.require("OBJECT").unwrap(), "bias");
        assert_eq!(header.require_f64("EXPTIME").unwrap(), 10.0);
        assert_eq!(header.require("FILTER").unwrap(), "R");
        assert_eq!(header.require("DATE-OBS").unwrap(), "2024-01-01");
        assert_eq!(header.require("TIME-OBS").unwrap(), "09:59:50.0000");
    }

    #[test]
    fn test_file_is_block_aligned() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preview.fits");
        write_image(&path, &[], &raster()).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len % BLOCK_LEN as u64, 0);
    }

    #[test]
    fn test_truncated_header_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.fits");
        // SIMPLE card only, no END: looks like a file mid-write.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&format_card("SIMPLE", "T", "", false));
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            read_primary_header(&path),
            Err(FitsError::Truncated)
        ));
    }

    #[test]
    fn test_non_fits_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.fits");
        std::fs::write(&path, b"this is not a fits file, not even close....................................").unwrap();
        assert!(matches!(
            read_primary_header(&path),
            Err(FitsError::NotFits)
        ));
    }

    #[test]
    fn test_garbage_card_bytes_are_an_error_not_a_panic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("torn.fits");
        // Valid SIMPLE card followed by a card of raw 0xFF bytes, as a file
        // torn mid-write can contain.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&format_card("SIMPLE", "T", "", false));
        bytes.extend_from_slice(&[0xFF; CARD_LEN]);
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            read_primary_header(&path),
            Err(FitsError::Truncated)
        ));
    }

    #[test]
    fn test_missing_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bare.fits");
        write_image(&path, &[], &raster()).unwrap();
        let header = read_primary_header(&path).unwrap();
        assert!(matches!(
            header.require("OBJECT"),
            Err(FitsError::MissingKey("OBJECT"))
        ));
    }
}
