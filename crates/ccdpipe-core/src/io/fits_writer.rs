use std::ffi::CString;
use std::fs;
use std::path::{Path, PathBuf};

use fitsio::images::{ImageDescription, ImageType};
use fitsio::{sys, FitsFile};

use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::io::fits::{cfitsio_lock, check, fits_error, header_records};
use crate::io::header::{Header, STRUCTURAL_KEYWORDS};

/// Write a frame as a single-HDU FITS file with `BITPIX = -32`.
///
/// The file is written to a hidden sibling first and renamed over `path`, so
/// rewriting a frame in place never leaves a truncated file behind.
pub fn write_frame(path: &Path, frame: &Frame) -> Result<()> {
    let tmp = temp_path(path);
    if let Err(e) = write_to(&tmp, frame) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

fn write_to(path: &Path, frame: &Frame) -> Result<()> {
    let _guard = cfitsio_lock();
    let (height, width) = frame.dim();
    let description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: &[height, width],
    };

    let mut fits = FitsFile::create(path)
        .with_custom_primary(&description)
        .overwrite()
        .open()
        .map_err(|e| fits_error(path, e))?;
    let hdu = fits.primary_hdu().map_err(|e| fits_error(path, e))?;

    let pixels: Vec<f32> = frame.data.iter().copied().collect();
    hdu.write_image(&mut fits, &pixels)
        .map_err(|e| fits_error(path, e))?;

    drop_default_comments(&mut fits, path)?;
    write_cards(&mut fits, &frame.header, path)
}

/// cfitsio opens every new primary header with a COMMENT citing the FITS
/// paper; frames carry only their own commentary.
fn drop_default_comments(fits: &mut FitsFile, path: &Path) -> Result<()> {
    let records = header_records(fits, path)?;
    let mut status = 0;
    for (i, record) in records.iter().enumerate().rev() {
        if record.starts_with("COMMENT") {
            unsafe {
                let raw = fits.as_raw();
                sys::ffdrec(raw, (i + 1) as i32, &mut status);
            }
            check(path, status)?;
        }
    }
    Ok(())
}

/// Append the user cards in order. Long text values go out as `CONTINUE` records.
fn write_cards(fits: &mut FitsFile, header: &Header, path: &Path) -> Result<()> {
    let user_cards = header
        .cards()
        .iter()
        .filter(|c| c.is_commentary() || !STRUCTURAL_KEYWORDS.contains(&c.keyword.as_str()));

    let mut status = 0;
    for card in user_cards {
        for record in card.to_records() {
            let record = CString::new(record).map_err(|e| PipelineError::InvalidFits {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            unsafe {
                let raw = fits.as_raw();
                sys::ffprec(raw, record.as_ptr(), &mut status);
            }
            check(path, status)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fits::read_frame;
    use ndarray::array;

    #[test]
    fn test_write_then_read_preserves_cards_and_pixels() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("frame.fits");

        let mut header = Header::new();
        header.set("OBJECT", "NGC6752");
        header.set_with_comment("EXPTIME", 60i64, "seconds");
        header.set("AIRMASS", 1.25f64);
        header.add_commentary("COMMENT", "  'science'");
        header.set("CCDPROC", true);
        let frame = Frame::new(array![[1.0f32, -2.5, 3.0], [4.0, 5.0, 1e6]], header.clone());

        write_frame(&path, &frame).unwrap();
        let len = fs::metadata(&path).unwrap().len() as usize;
        assert_eq!(len % 2880, 0);

        let back = read_frame(&path).unwrap();
        assert_eq!(back.data, frame.data);
        assert_eq!(back.header, header);
        assert!(!dir.path().join(".frame.fits.tmp").exists());
    }

    #[test]
    fn test_structural_cards_in_header_are_regenerated() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("frame.fits");

        let mut header = Header::new();
        header.set("NAXIS1", 999i64);
        header.set("BITPIX", 16i64);
        let frame = Frame::new(ndarray::Array2::zeros((2, 5)), header);

        write_frame(&path, &frame).unwrap();
        let back = read_frame(&path).unwrap();
        assert_eq!(back.dim(), (2, 5));
        assert!(back.header.is_empty());
    }

    #[test]
    fn test_rewrite_does_not_accumulate_cards() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("frame.fits");
        let mut header = Header::new();
        header.set("FILTER", "B");
        write_frame(&path, &Frame::new(ndarray::Array2::ones((3, 3)), header)).unwrap();

        let once = read_frame(&path).unwrap();
        write_frame(&path, &once).unwrap();
        let twice = read_frame(&path).unwrap();
        assert_eq!(twice.header, once.header);
        assert_eq!(twice.header.len(), 1);
    }
}
