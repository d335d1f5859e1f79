use std::ffi::{c_char, CStr};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fitsio::errors::check_status;
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::ImageType;
use fitsio::{sys, FitsFile};
use ndarray::Array2;

use crate::error::{PipelineError, Result};
use crate::frame::Frame;
use crate::io::header::Header;

/// cfitsio card buffer length, including the terminating NUL.
const FLEN_CARD: usize = 81;

/// cfitsio keeps process-wide open-file state, so calls into it are serialised.
static CFITSIO: Mutex<()> = Mutex::new(());

pub(crate) fn cfitsio_lock() -> MutexGuard<'static, ()> {
    CFITSIO.lock().unwrap_or_else(|e| e.into_inner())
}

/// Pixel layout of the image HDU.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageLayout {
    pub bitpix: i32,
    pub width: usize,
    pub height: usize,
    pub bscale: f64,
    pub bzero: f64,
}

impl ImageLayout {
    pub fn bytes_per_pixel(&self) -> usize {
        (self.bitpix.unsigned_abs() / 8) as usize
    }

    pub fn data_byte_size(&self) -> usize {
        self.width * self.height * self.bytes_per_pixel()
    }
}

/// Header and layout of the first HDU that carries image data. Pixels are
/// only read on request.
pub struct FitsReader {
    path: PathBuf,
    pub header: Header,
    pub layout: ImageLayout,
}

impl FitsReader {
    pub fn open(path: &Path) -> Result<Self> {
        with_image_hdu(path, |_, _, header, layout| {
            Ok(Self {
                path: path.to_path_buf(),
                header,
                layout,
            })
        })
    }

    /// (height, width)
    pub fn dim(&self) -> (usize, usize) {
        (self.layout.height, self.layout.width)
    }

    /// Physical pixel values; cfitsio applies `BSCALE`/`BZERO`.
    pub fn read_data(&self) -> Result<Array2<f32>> {
        with_image_hdu(&self.path, |fits, hdu, _, layout| {
            read_pixels(fits, hdu, &layout, &self.path)
        })
    }

    pub fn into_frame(self) -> Result<Frame> {
        let data = self.read_data()?;
        Ok(Frame::new(data, self.header))
    }
}

/// Read a frame (pixels and header).
pub fn read_frame(path: &Path) -> Result<Frame> {
    with_image_hdu(path, |fits, hdu, header, layout| {
        let data = read_pixels(fits, hdu, &layout, path)?;
        Ok(Frame::new(data, header))
    })
}

/// Read only the header of the image HDU.
pub fn read_header(path: &Path) -> Result<Header> {
    with_image_hdu(path, |_, _, header, _| Ok(header))
}

/// Open `path`, find the first HDU with image data and hand it to `f` along
/// with the merged header (primary cards overlaid by extension cards).
fn with_image_hdu<T>(
    path: &Path,
    f: impl FnOnce(&mut FitsFile, &FitsHdu, Header, ImageLayout) -> Result<T>,
) -> Result<T> {
    let _guard = cfitsio_lock();
    let mut fits = FitsFile::open(path).map_err(|e| fits_error(path, e))?;

    let primary = fits.primary_hdu().map_err(|e| fits_error(path, e))?;
    let mut header = read_header_cards(&mut fits, path)?;
    header.strip_structural();

    if has_data(&primary) {
        let layout = image_layout(&mut fits, &primary, path)?;
        return f(&mut fits, &primary, header, layout);
    }

    let count = fits.iter().count();
    for index in 1..count {
        let hdu = fits.hdu(index).map_err(|e| fits_error(path, e))?;
        if !has_data(&hdu) {
            continue;
        }
        let mut extension = read_header_cards(&mut fits, path)?;
        extension.strip_structural();
        extension.remove("EXTNAME");
        header.merge(&extension);

        let layout = image_layout(&mut fits, &hdu, path)?;
        return f(&mut fits, &hdu, header, layout);
    }

    Err(invalid(path, "no image data in any HDU".to_string()))
}

fn has_data(hdu: &FitsHdu) -> bool {
    matches!(
        &hdu.info,
        HduInfo::ImageInfo { shape, .. } if !shape.is_empty() && shape.iter().all(|&n| n > 0)
    )
}

fn image_layout(fits: &mut FitsFile, hdu: &FitsHdu, path: &Path) -> Result<ImageLayout> {
    let (shape, image_type) = match &hdu.info {
        HduInfo::ImageInfo { shape, image_type } => (shape, image_type),
        _ => return Err(invalid(path, "HDU is not an image".to_string())),
    };

    let width = hdu
        .read_key::<i64>(fits, "NAXIS1")
        .map_err(|e| fits_error(path, e))?
        .max(0) as usize;
    let height = hdu.read_key::<i64>(fits, "NAXIS2").unwrap_or(0).max(0) as usize;
    if shape.len() < 2 || height == 0 || shape.iter().product::<usize>() != width * height {
        return Err(invalid(
            path,
            format!("only 2-D images are supported, got shape {:?}", shape),
        ));
    }

    Ok(ImageLayout {
        bitpix: image_type_to_bitpix(image_type),
        width,
        height,
        bscale: hdu.read_key::<f64>(fits, "BSCALE").unwrap_or(1.0),
        bzero: hdu.read_key::<f64>(fits, "BZERO").unwrap_or(0.0),
    })
}

fn image_type_to_bitpix(image_type: &ImageType) -> i32 {
    match image_type {
        ImageType::UnsignedByte | ImageType::Byte => 8,
        ImageType::Short | ImageType::UnsignedShort => 16,
        ImageType::Long | ImageType::UnsignedLong => 32,
        ImageType::LongLong => 64,
        ImageType::Float => -32,
        ImageType::Double => -64,
    }
}

fn read_pixels(
    fits: &mut FitsFile,
    hdu: &FitsHdu,
    layout: &ImageLayout,
    path: &Path,
) -> Result<Array2<f32>> {
    let pixels: Vec<f32> = hdu.read_image(fits).map_err(|e| fits_error(path, e))?;
    Array2::from_shape_vec((layout.height, layout.width), pixels)
        .map_err(|e| invalid(path, e.to_string()))
}

/// Every record of the current HDU's header, as cfitsio stores them.
pub(crate) fn header_records(fits: &mut FitsFile, path: &Path) -> Result<Vec<String>> {
    let (mut count, mut more, mut status) = (0, 0, 0);
    unsafe {
        let raw = fits.as_raw();
        sys::ffghsp(raw, &mut count, &mut more, &mut status);
    }
    check(path, status)?;

    let mut records = Vec::with_capacity(count.max(0) as usize);
    let mut buf: [c_char; FLEN_CARD] = [0; FLEN_CARD];
    for n in 1..=count {
        unsafe {
            let raw = fits.as_raw();
            sys::ffgrec(raw, n, buf.as_mut_ptr(), &mut status);
        }
        check(path, status)?;
        let record = unsafe { CStr::from_ptr(buf.as_ptr()) };
        records.push(record.to_string_lossy().into_owned());
    }
    Ok(records)
}

fn read_header_cards(fits: &mut FitsFile, path: &Path) -> Result<Header> {
    let records = header_records(fits, path)?;
    Ok(Header::from_records(records.iter().map(String::as_str)))
}

pub(crate) fn check(path: &Path, status: i32) -> Result<()> {
    check_status(status).map_err(|e| fits_error(path, e))
}

pub(crate) fn fits_error(path: &Path, e: fitsio::errors::Error) -> PipelineError {
    invalid(path, e.to_string())
}

fn invalid(path: &Path, reason: String) -> PipelineError {
    PipelineError::InvalidFits {
        path: path.to_path_buf(),
        reason,
    }
}
