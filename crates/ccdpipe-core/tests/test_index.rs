#[allow(dead_code)]
mod common;

use std::fs;

use ccdpipe_core::error::PipelineError;
use ccdpipe_core::frame::{Frame, FrameKind, Observation};
use ccdpipe_core::index::{index_directory, log_path, scan_directory, summary_path, NightSummary};
use ccdpipe_core::io::Card;
use tempfile::TempDir;

use common::{constant, write_opd_frame, write_opd_frame_with, OpdFields};

/// A small night: 2 bias, 3 flats (V, V, B), 3 science frames of two objects
/// and one focus frame.
fn write_night(dir: &std::path::Path) {
    for i in 0..2 {
        let name = format!("bias_{:04}.fits", i);
        write_opd_frame(dir, &name, constant(4, 4, 0.0), &OpdFields::bias());
    }
    for (i, filter) in ["V", "V", "B"].iter().enumerate() {
        let name = format!("flat_{:04}.fits", i);
        write_opd_frame(dir, &name, constant(4, 4, 1.0), &OpdFields::flat(filter));
    }

    let mut wd = OpdFields::science("WD 1145+017", "V");
    wd.airmass = 1.10;
    write_opd_frame(dir, "wd_0001.fits", constant(4, 4, 2.0), &wd);
    wd.airmass = 1.30;
    wd.exptime = 120.0;
    write_opd_frame(dir, "wd_0002.fits", constant(4, 4, 2.0), &wd);
    write_opd_frame(dir, "hd_0001.fits", constant(4, 4, 2.0), &OpdFields::science("HD 1", "B"));

    let mut focus = OpdFields::science("focus", "V");
    focus.tag = "test".into();
    write_opd_frame(dir, "focus_0001.fits", constant(4, 4, 2.0), &focus);
}

// ---------------------------------------------------------------------------
// Observation parsing
// ---------------------------------------------------------------------------

#[test]
fn test_observation_from_opd_header() {
    let dir = TempDir::new().unwrap();
    let fields = OpdFields::science("WD 1145+017", "V");
    let path = write_opd_frame(dir.path(), "wd.fits", constant(2, 2, 0.0), &fields);

    let obs = Observation::load(&path).unwrap();
    assert_eq!(obs.object, "WD1145+017");
    assert_eq!(obs.filter, "V");
    assert_eq!(obs.exposure, 60.0);
    assert_eq!(obs.airmass, 1.2);
    assert_eq!(obs.tag, "science");
    assert_eq!(obs.kind(), FrameKind::Science);
    assert!(obs.timestamp().is_some());
}

#[test]
fn test_observation_decimal_comma_exposure() {
    let dir = TempDir::new().unwrap();
    let path = write_opd_frame_with(
        dir.path(),
        "f.fits",
        constant(2, 2, 0.0),
        &OpdFields::science("X", "R"),
        &[Card::new("EXPTIME", "30,00000")],
    );
    assert_eq!(Observation::load(&path).unwrap().exposure, 30.0);
}

#[test]
fn test_calibration_kinds() {
    let dir = TempDir::new().unwrap();
    let bias = write_opd_frame(dir.path(), "b.fits", constant(2, 2, 0.0), &OpdFields::bias());
    let flat = write_opd_frame(dir.path(), "f.fits", constant(2, 2, 0.0), &OpdFields::flat("I"));
    assert_eq!(Observation::load(&bias).unwrap().kind(), FrameKind::Bias);
    assert_eq!(Observation::load(&flat).unwrap().kind(), FrameKind::Flat);
}

#[test]
fn test_missing_field_is_reported() {
    let dir = TempDir::new().unwrap();
    let fields = OpdFields::science("X", "V");
    let mut header = fields.header();
    header.remove("AIRMASS");
    let path = dir.path().join("noairmass.fits");
    Frame::new(constant(2, 2, 0.0), header)
        .save(&path)
        .unwrap();

    match Observation::load(&path) {
        Err(PipelineError::MissingField { key, .. }) => assert_eq!(key, "AIRMASS"),
        other => panic!("expected MissingField, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Night index
// ---------------------------------------------------------------------------

#[test]
fn test_scan_counts_kinds() {
    let dir = TempDir::new().unwrap();
    write_night(dir.path());

    let index = scan_directory(dir.path(), &[]).unwrap();
    assert_eq!(index.len(), 9);
    assert_eq!(index.select(FrameKind::Bias).len(), 2);
    assert_eq!(index.select(FrameKind::Flat).len(), 3);
    assert_eq!(index.select(FrameKind::Science).len(), 3);
    assert_eq!(index.select(FrameKind::Other).len(), 1);

    let flat_filters: Vec<String> = index.filters_of(FrameKind::Flat).into_iter().collect();
    assert_eq!(flat_filters, vec!["B", "V"]);
}

#[test]
fn test_index_persists_log_and_summary() {
    let root = TempDir::new().unwrap();
    let night = root.path().join("20190605");
    fs::create_dir(&night).unwrap();
    write_night(&night);

    let index = index_directory(&night, &["EXPTIME".to_string()], true).unwrap();
    assert_eq!(index.len(), 9);

    let log = fs::read_to_string(log_path(&night)).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 10);
    assert_eq!(lines[0], "file,DATE-OBS,OBJECT,FILTER,EXPTIME,AIRMASS,COMMENT,EXPTIME");
    assert!(lines
        .iter()
        .any(|l| l.starts_with("wd_0002.fits,") && l.contains(",WD1145+017,V,120,1.3,science,")));

    let summary = fs::read_to_string(summary_path(&night)).unwrap();
    assert!(summary.starts_with("Summary 2019-06-05"));
    assert!(summary.contains("Total images: 9"));
    assert!(summary.contains("Calibration: 5"));
    assert!(summary.contains("Science: 3"));
    assert!(summary.contains("Others: 1"));
    assert!(summary.contains("  V: 2"));
    assert!(summary.contains("WD1145+017: 2 (V: 2) Exptimes: [120, 60]s  1.100 < X < 1.300"));
}

#[test]
fn test_index_without_persist_writes_nothing() {
    let root = TempDir::new().unwrap();
    let night = root.path().join("n1");
    fs::create_dir(&night).unwrap();
    write_night(&night);

    index_directory(&night, &[], false).unwrap();
    assert!(!log_path(&night).exists());
    assert!(!summary_path(&night).exists());
}

#[test]
fn test_summary_objects() {
    let dir = TempDir::new().unwrap();
    write_night(dir.path());

    let summary = NightSummary::from_index(&scan_directory(dir.path(), &[]).unwrap());
    assert_eq!(summary.bias, 2);
    assert_eq!(summary.flats.get("V"), Some(&2));
    assert_eq!(summary.flats.get("B"), Some(&1));
    let wd = &summary.objects["WD1145+017"];
    assert_eq!(wd.frames, 2);
    assert_eq!(wd.exposures.len(), 2);
    assert!(summary.objects.contains_key("HD1"));
}

#[test]
fn test_scan_aborts_on_incomplete_header() {
    let dir = TempDir::new().unwrap();
    write_night(dir.path());
    let mut header = OpdFields::science("X", "V").header();
    header.remove("FILTER");
    Frame::new(constant(4, 4, 0.0), header)
        .save(&dir.path().join("broken.fits"))
        .unwrap();

    assert!(matches!(
        scan_directory(dir.path(), &[]),
        Err(PipelineError::MissingField { .. })
    ));
}
