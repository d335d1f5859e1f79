#[allow(dead_code)]
mod common;

use std::fs;

use ccdpipe_core::consts::FITS_BLOCK_SIZE;
use ccdpipe_core::frame::Frame;
use ccdpipe_core::io::{is_fits_file, list_fits_files, read_header, FitsReader, HeaderValue};
use ndarray::Array2;
use tempfile::TempDir;

use common::{constant, write_opd_frame, OpdFields};

// ---------------------------------------------------------------------------
// Frame write / read
// ---------------------------------------------------------------------------

#[test]
fn test_written_frame_reads_back_with_header() {
    let dir = TempDir::new().unwrap();
    let data = Array2::from_shape_fn((5, 7), |(r, c)| (r * 7 + c) as f32 * 1.5 - 3.0);
    let fields = OpdFields::science("HD 1234", "V");
    let path = write_opd_frame(dir.path(), "hd1234_0001.fits", data.clone(), &fields);

    let frame = Frame::load(&path).unwrap();
    assert_eq!(frame.dim(), (5, 7));
    assert_eq!(frame.data, data);
    assert_eq!(frame.header.get_str("OBJECT"), Some("HD 1234"));
    assert_eq!(frame.header.get_f64("EXPTIME"), Some(60.0));
    assert_eq!(frame.header.commentary("COMMENT").next(), Some("'science'"));
}

#[test]
fn test_long_text_values_survive_a_rewrite() {
    let dir = TempDir::new().unwrap();
    let long_name = format!("a_{}.fits", "x".repeat(68));
    assert_eq!(long_name.len(), 75);
    let object = "WD 1145+017 transit campaign, night of 2019-06-05, V band (O'Brien et al.)";

    let mut header = OpdFields::science(object, "V").header();
    header.set_with_comment("IMCMB001", long_name.as_str(), "input frame");
    let path = dir.path().join("final_wd_0000.fits");
    Frame::new(constant(2, 2, 1.0), header).save(&path).unwrap();

    let once = Frame::load(&path).unwrap();
    once.save(&path).unwrap();
    let frame = Frame::load(&path).unwrap();
    assert_eq!(frame.header.get_str("IMCMB001").map(str::len), Some(75));
    assert_eq!(frame.header.get_str("IMCMB001"), Some(long_name.as_str()));
    assert_eq!(frame.header.get_str("OBJECT"), Some(object));
    assert_eq!(frame.header, once.header);
}

#[test]
fn test_written_file_is_block_aligned() {
    let dir = TempDir::new().unwrap();
    let path = write_opd_frame(dir.path(), "f.fits", constant(10, 10, 1.0), &OpdFields::bias());
    let len = fs::metadata(&path).unwrap().len() as usize;
    assert_eq!(len % FITS_BLOCK_SIZE, 0);
}

#[test]
fn test_reader_reports_layout() {
    let dir = TempDir::new().unwrap();
    let path = write_opd_frame(dir.path(), "f.fits", constant(3, 4, 2.0), &OpdFields::bias());

    let reader = FitsReader::open(&path).unwrap();
    assert_eq!(reader.layout.bitpix, -32);
    assert_eq!(reader.dim(), (3, 4));
    assert_eq!(reader.layout.data_byte_size(), 3 * 4 * 4);
}

#[test]
fn test_read_header_only() {
    let dir = TempDir::new().unwrap();
    let path = write_opd_frame(dir.path(), "f.fits", constant(3, 4, 2.0), &OpdFields::flat("B"));

    let header = read_header(&path).unwrap();
    assert_eq!(header.get("FILTER"), Some(&HeaderValue::Text("B".into())));
    assert!(!header.contains("NAXIS1"));
}

#[test]
fn test_saving_over_existing_file_replaces_it() {
    let dir = TempDir::new().unwrap();
    let path = write_opd_frame(dir.path(), "f.fits", constant(3, 3, 1.0), &OpdFields::bias());

    let mut frame = Frame::load(&path).unwrap();
    frame.data.fill(5.0);
    frame.header.set("CCDPROC", true);
    frame.save(&path).unwrap();

    let back = Frame::load(&path).unwrap();
    assert!(back.data.iter().all(|&v| v == 5.0));
    assert_eq!(back.header.get("CCDPROC").and_then(HeaderValue::as_bool), Some(true));
    assert_eq!(list_fits_files(dir.path()).unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

#[test]
fn test_list_fits_files_sorted_and_filtered() {
    let dir = TempDir::new().unwrap();
    for name in ["c.fits", "a.FIT", "b.fts"] {
        write_opd_frame(dir.path(), name, constant(2, 2, 0.0), &OpdFields::bias());
    }
    fs::write(dir.path().join("notes.txt"), "x").unwrap();
    fs::create_dir(dir.path().join("sub.fits")).unwrap();

    let files = list_fits_files(dir.path()).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.FIT", "b.fts", "c.fits"]);
    assert!(!is_fits_file(&dir.path().join("notes.txt")));
}

#[test]
fn test_open_rejects_non_fits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.fits");
    fs::write(&path, vec![b'x'; FITS_BLOCK_SIZE]).unwrap();
    assert!(FitsReader::open(&path).is_err());
}
