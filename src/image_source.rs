//! Decoding image files into intensity grids.
//!
//! FITS files are read through `fitrs` from the primary HDU, with `BZERO` and
//! `BSCALE` applied so values are physical. They are recognised by extension
//! or by the `SIMPLE` card at the start of the file, since archive downloads
//! often carry names like `efz20050101.001200`. Everything else goes through
//! the `image` crate as 16-bit luminance so intensities keep a raw-count scale
//! comparable to FITS data.

use std::fs::File;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use fitrs::{Fits, FitsData, Hdu, HeaderValue};

use crate::error::ImageSourceError;
use crate::regions::IntensityGrid;

const FITS_EXTENSIONS: &[&str] = &["fits", "fit", "fts"];
const RASTER_EXTENSIONS: &[&str] = &["png", "tif", "tiff", "jpg", "jpeg"];

const FITS_BLOCK: usize = 2880;
const FITS_CARD: usize = 80;
const FITS_MAGIC: &[u8] = b"SIMPLE  =";
const FITS_BITPIX: &[i64] = &[16, 32, -32, -64];

/// True if `path` has an extension this module can decode, or starts with a
/// FITS header.
pub fn is_supported_image(path: &Path) -> bool {
    let by_extension = extension_of(path)
        .map(|ext| FITS_EXTENSIONS.contains(&ext.as_str()) || RASTER_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    by_extension || looks_like_fits(path)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn has_fits_extension(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| FITS_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// True if the first card of `path` is `SIMPLE  =`.
pub fn looks_like_fits(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut head = Vec::with_capacity(FITS_CARD);
    match file.take(FITS_CARD as u64).read_to_end(&mut head) {
        Ok(_) => head.starts_with(FITS_MAGIC),
        Err(_) => false,
    }
}

/// Decode `path` into an intensity grid.
pub fn load_grid(path: &Path) -> Result<IntensityGrid, ImageSourceError> {
    if has_fits_extension(path) || looks_like_fits(path) {
        load_fits(path)
    } else {
        load_raster(path)
    }
}

fn load_fits(path: &Path) -> Result<IntensityGrid, ImageSourceError> {
    let display = path.display().to_string();
    // fitrs panics on short reads; keep that failure local to this file
    panic::catch_unwind(AssertUnwindSafe(|| decode_fits(path, &display))).unwrap_or_else(|_| {
        Err(ImageSourceError::Fits {
            path: display.clone(),
            reason: "decoder panicked".to_string(),
        })
    })
}

fn decode_fits(path: &Path, display: &str) -> Result<IntensityGrid, ImageSourceError> {
    let fits_error = |reason: String| ImageSourceError::Fits {
        path: display.to_string(),
        reason,
    };
    let open_error = |source: std::io::Error| ImageSourceError::Open {
        path: display.to_string(),
        source,
    };

    let fits = Fits::open(path).map_err(open_error)?;
    let hdu = fits
        .get(0)
        .ok_or_else(|| fits_error("missing primary HDU".to_string()))?;

    let bitpix = integer_card(&hdu, "BITPIX").ok_or_else(|| fits_error("missing BITPIX".to_string()))?;
    if !FITS_BITPIX.contains(&bitpix) {
        return Err(fits_error(format!("unsupported BITPIX {}", bitpix)));
    }

    // NAXIS1 is the fastest-varying axis (columns).
    let (width, height) = match axes(&hdu).as_deref() {
        Some([width, height]) => (*width, *height),
        other => {
            return Err(fits_error(format!(
                "expected a 2-D image, found axes {:?}",
                other
            )))
        }
    };

    let data_len = (width as u64) * (height as u64) * bitpix.unsigned_abs() / 8;
    let required = header_len(path, display)? + data_len;
    let actual = std::fs::metadata(path).map_err(open_error)?.len();
    if actual < required {
        return Err(fits_error(format!(
            "data unit truncated: {} bytes, need {}",
            actual, required
        )));
    }

    let raw: Vec<f64> = match hdu.read_data() {
        FitsData::FloatingPoint32(array) => array.data.iter().map(|&v| f64::from(v)).collect(),
        FitsData::FloatingPoint64(array) => array.data.to_vec(),
        FitsData::IntegersI32(array) => array
            .data
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect(),
        FitsData::IntegersU32(array) => array
            .data
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect(),
        _ => return Err(fits_error("primary HDU is not a numeric array".to_string())),
    };

    let bzero = real_card(&hdu, "BZERO").unwrap_or(0.0);
    let bscale = real_card(&hdu, "BSCALE").unwrap_or(1.0);
    let pixels = raw
        .into_iter()
        .map(|v| (bzero + bscale * v) as f32)
        .collect();

    Ok(IntensityGrid::new(width, height, pixels))
}

fn integer_card(hdu: &Hdu, key: &str) -> Option<i64> {
    match hdu.value(key)? {
        HeaderValue::IntegerNumber(n) => Some(i64::from(*n)),
        _ => None,
    }
}

fn real_card(hdu: &Hdu, key: &str) -> Option<f64> {
    match hdu.value(key)? {
        HeaderValue::IntegerNumber(n) => Some(f64::from(*n)),
        HeaderValue::RealFloatingNumber(x) => Some(*x),
        _ => None,
    }
}

fn axes(hdu: &Hdu) -> Option<Vec<usize>> {
    let naxis = integer_card(hdu, "NAXIS")?;
    (1..=naxis)
        .map(|i| {
            integer_card(hdu, &format!("NAXIS{}", i)).and_then(|n| usize::try_from(n).ok())
        })
        .collect()
}

/// Length of the primary header in bytes, up to and including the block that
/// holds the `END` card.
fn header_len(path: &Path, display: &str) -> Result<u64, ImageSourceError> {
    let mut file = File::open(path).map_err(|source| ImageSourceError::Open {
        path: display.to_string(),
        source,
    })?;
    let mut block = [0u8; FITS_BLOCK];
    let mut blocks = 0u64;
    loop {
        if file.read_exact(&mut block).is_err() {
            return Err(ImageSourceError::Fits {
                path: display.to_string(),
                reason: "header has no END card".to_string(),
            });
        }
        blocks += 1;
        let has_end = block
            .chunks(FITS_CARD)
            .any(|card| card.starts_with(b"END") && card[3..].iter().all(|&b| b == b' '));
        if has_end {
            return Ok(blocks * FITS_BLOCK as u64);
        }
    }
}

fn load_raster(path: &Path) -> Result<IntensityGrid, ImageSourceError> {
    let luma = image::open(path)?.into_luma16();
    let (width, height) = luma.dimensions();
    let pixels = luma.into_raw().into_iter().map(f32::from).collect();
    Ok(IntensityGrid::new(width as usize, height as usize, pixels))
}

/// Bytes of a minimal single-HDU FITS file with 16-bit data.
#[cfg(test)]
pub(crate) fn fits_bytes(width: usize, height: usize, data: &[i16], extra_cards: &[(&str, &str)]) -> Vec<u8> {
    let mut cards = vec![
        ("SIMPLE", "T".to_string()),
        ("BITPIX", "16".to_string()),
        ("NAXIS", "2".to_string()),
        ("NAXIS1", width.to_string()),
        ("NAXIS2", height.to_string()),
    ];
    cards.extend(extra_cards.iter().map(|(k, v)| (*k, v.to_string())));

    let mut bytes = Vec::new();
    for (key, value) in cards {
        bytes.extend(format!("{:<8}= {:>20}{:50}", key, value, "").bytes());
    }
    bytes.extend(format!("{:<80}", "END").bytes());
    bytes.resize(bytes.len().div_ceil(FITS_BLOCK) * FITS_BLOCK, b' ');

    let data_start = bytes.len();
    for v in data {
        bytes.extend(v.to_be_bytes());
    }
    if bytes.len() > data_start {
        bytes.resize(bytes.len().div_ceil(FITS_BLOCK) * FITS_BLOCK, 0);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_image(&PathBuf::from("efz20050101.001200.fits")));
        assert!(is_supported_image(&PathBuf::from("a/b/frame.FIT")));
        assert!(is_supported_image(&PathBuf::from("sun.png")));
        assert!(!is_supported_image(&PathBuf::from("notes.txt")));
        // No extension and nothing on disk to sniff
        assert!(!is_supported_image(&PathBuf::from("efz20050101")));
    }

    #[test]
    fn test_extensionless_fits_is_detected() {
        let dir = TempDir::new().unwrap();
        let fits = dir.path().join("efz20050103.001200");
        std::fs::write(&fits, fits_bytes(6, 3, &[0; 18], &[])).unwrap();
        let text = dir.path().join("efz20050104.001200");
        std::fs::write(&text, b"efz20050104.001200 3\n").unwrap();

        assert!(looks_like_fits(&fits));
        assert!(is_supported_image(&fits), "FITS content without extension");
        assert!(!is_supported_image(&text));

        let grid = load_grid(&fits).unwrap();
        assert_eq!((grid.width(), grid.height()), (6, 3));
    }

    #[test]
    fn test_load_fits_grid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.fits");
        let data: Vec<i16> = (0..12).map(|v| v * 100 - 300).collect();
        std::fs::write(&path, fits_bytes(4, 3, &data, &[])).unwrap();

        let grid = load_grid(&path).unwrap();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        let expected: Vec<f32> = data.iter().map(|&v| f32::from(v)).collect();
        assert_eq!(grid.data(), expected.as_slice(), "row-major, NAXIS1 fastest");
    }

    #[test]
    fn test_load_fits_applies_bzero_and_bscale() {
        let dir = TempDir::new().unwrap();
        let unsigned = dir.path().join("unsigned.fits");
        std::fs::write(
            &unsigned,
            fits_bytes(3, 1, &[i16::MIN, 0, 100], &[("BZERO", "32768")]),
        )
        .unwrap();
        let grid = load_grid(&unsigned).unwrap();
        assert_eq!(grid.data(), &[0.0, 32768.0, 32868.0]);

        let scaled = dir.path().join("scaled.fits");
        std::fs::write(
            &scaled,
            fits_bytes(2, 1, &[5, -1], &[("BSCALE", "2.5"), ("BZERO", "10.0")]),
        )
        .unwrap();
        let grid = load_grid(&scaled).unwrap();
        assert_eq!(grid.data(), &[22.5, 7.5]);
    }

    #[test]
    fn test_truncated_fits_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("efz20050105.001200.fits");
        // Complete header for 4x4 16-bit data, but no data unit
        let header = fits_bytes(4, 4, &[], &[]);
        assert_eq!(header.len(), FITS_BLOCK);
        std::fs::write(&path, &header).unwrap();

        match load_grid(&path) {
            Err(ImageSourceError::Fits { reason, .. }) => {
                assert!(reason.contains("truncated"), "unexpected reason: {}", reason)
            }
            other => panic!("expected a FITS error, got {:?}", other),
        }

        // Partial data is just as short
        let mut partial = fits_bytes(4, 4, &[7; 16], &[]);
        partial.truncate(FITS_BLOCK + 10);
        std::fs::write(&path, &partial).unwrap();
        assert!(matches!(load_grid(&path), Err(ImageSourceError::Fits { .. })));
    }

    #[test]
    fn test_fits_header_without_end_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cut.fits");
        let mut bytes = fits_bytes(2, 2, &[1, 2, 3, 4], &[]);
        bytes.truncate(FITS_CARD * 3);
        std::fs::write(&path, &bytes).unwrap();
        assert!(load_grid(&path).is_err());
    }

    #[test]
    fn test_load_png_grid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.png");
        let img = GrayImage::from_fn(4, 3, |x, y| if x == 1 && y == 2 { Luma([255]) } else { Luma([0]) });
        img.save(&path).unwrap();

        let grid = load_grid(&path).unwrap();
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.data()[2 * 4 + 1], 65535.0);
        assert_eq!(grid.data()[0], 0.0);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_grid(&dir.path().join("absent.fits")).is_err());
        assert!(load_grid(&dir.path().join("absent.png")).is_err());
    }

    #[test]
    fn test_garbage_raster_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(load_grid(&path), Err(ImageSourceError::Image(_))));
    }
}
