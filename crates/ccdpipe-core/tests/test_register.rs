#[allow(dead_code)]
mod common;

use approx::assert_abs_diff_eq;
use ccdpipe_core::error::PipelineError;
use ccdpipe_core::frame::Frame;
use ccdpipe_core::io::{file_name, list_fits_files};
use ccdpipe_core::register::{
    align_folder, detect_sources, estimate_transform, AlignOutcome, RegistrationConfig,
};
use tempfile::TempDir;

use common::{constant, starfield, write_opd_frame, OpdFields};

fn fields() -> OpdFields {
    OpdFields::science("WD 1145+017", "V")
}

// ---------------------------------------------------------------------------
// Detection and matching
// ---------------------------------------------------------------------------

#[test]
fn test_detects_synthetic_stars() {
    let config = RegistrationConfig::default();
    let sources = detect_sources(&starfield(0.0, 0.0, 1), &config.detection);
    assert_eq!(sources.len(), 25);
    // brightest first
    assert!(sources.windows(2).all(|w| w[0].flux >= w[1].flux));
}

#[test]
fn test_estimate_translation() {
    let config = RegistrationConfig::default();
    let reference = detect_sources(&starfield(0.0, 0.0, 1), &config.detection);
    let shifted = detect_sources(&starfield(3.0, -2.0, 2), &config.detection);

    let matched = estimate_transform(&shifted, &reference, &config).unwrap();
    let t = matched.transform;
    assert_abs_diff_eq!(t.tx, -3.0, epsilon = 0.1);
    assert_abs_diff_eq!(t.ty, 2.0, epsilon = 0.1);
    assert_abs_diff_eq!(t.scale(), 1.0, epsilon = 1e-3);
    assert_abs_diff_eq!(t.rotation(), 0.0, epsilon = 0.1);
    assert!(matched.inliers >= 20);
}

#[test]
fn test_estimate_rotated_field() {
    let config = RegistrationConfig::default();
    let stars = common::star_positions(25, 128, 12.0, 12.0, 42);
    let theta = 6.0f64.to_radians();
    let (c, sn) = (theta.cos(), theta.sin());
    let rotated: Vec<(f64, f64)> = stars
        .iter()
        .map(|&(x, y)| {
            let (dx, dy) = (x - 64.0, y - 64.0);
            (64.0 + c * dx - sn * dy, 64.0 + sn * dx + c * dy)
        })
        .collect();

    let reference = detect_sources(&common::render_starfield(128, &stars, 0.0, 0.0, 1), &config.detection);
    let turned = detect_sources(&common::render_starfield(128, &rotated, 0.0, 0.0, 2), &config.detection);

    let matched = estimate_transform(&turned, &reference, &config).unwrap();
    let t = matched.transform;
    assert_abs_diff_eq!(t.rotation(), -6.0, epsilon = 0.1);
    assert_abs_diff_eq!(t.scale(), 1.0, epsilon = 1e-2);

    // a rotated star lands back on its reference position
    let (x, y) = t.apply(rotated[0].0, rotated[0].1);
    assert_abs_diff_eq!(x, stars[0].0, epsilon = 0.2);
    assert_abs_diff_eq!(y, stars[0].1, epsilon = 0.2);
}

#[test]
fn test_estimate_fails_on_unrelated_fields() {
    let config = RegistrationConfig::default();
    let reference = detect_sources(&starfield(0.0, 0.0, 1), &config.detection);
    let other_stars = common::star_positions(25, 128, 12.0, 12.0, 7);
    let other = detect_sources(
        &common::render_starfield(128, &other_stars, 0.0, 0.0, 3),
        &config.detection,
    );

    let strict = RegistrationConfig {
        min_inliers: 15,
        ..config
    };
    assert!(estimate_transform(&other, &reference, &strict).is_none());
}

// ---------------------------------------------------------------------------
// Folder alignment
// ---------------------------------------------------------------------------

#[test]
fn test_align_folder_onto_first_frame() {
    let dir = TempDir::new().unwrap();
    write_opd_frame(dir.path(), "wd_0000.fits", starfield(0.0, 0.0, 1), &fields());
    write_opd_frame(dir.path(), "wd_0001.fits", starfield(3.0, -2.0, 2), &fields());
    write_opd_frame(dir.path(), "wd_0002.fits", starfield(-1.0, 4.0, 3), &fields());

    let outcomes = align_folder(dir.path(), None, &RegistrationConfig::default(), |_| {}).unwrap();
    assert_eq!(outcomes.len(), 3);

    let names: Vec<String> = list_fits_files(dir.path())
        .unwrap()
        .iter()
        .map(|p| file_name(p))
        .collect();
    assert_eq!(names, vec!["a_wd_0000.fits", "a_wd_0001.fits", "a_wd_0002.fits"]);

    match &outcomes[2] {
        AlignOutcome::Aligned { transform, .. } => {
            assert_abs_diff_eq!(transform.tx, 1.0, epsilon = 0.1);
            assert_abs_diff_eq!(transform.ty, -4.0, epsilon = 0.1);
        }
        other => panic!("expected Aligned, got {:?}", other),
    }

    let reference = Frame::load(&dir.path().join("a_wd_0000.fits")).unwrap();
    let aligned = Frame::load(&dir.path().join("a_wd_0001.fits")).unwrap();
    assert_eq!(aligned.dim(), reference.dim());
    assert_eq!(aligned.header.get_str("ALIGNTO"), Some("wd_0000.fits"));
    assert_eq!(reference.header.get_str("ALIGNTO"), Some("wd_0000.fits"));

    // brightest star lands where the reference has it
    let config = RegistrationConfig::default();
    let ref_star = detect_sources(&reference.data, &config.detection)[0];
    let aligned_star = detect_sources(&aligned.data, &config.detection)[0];
    assert_abs_diff_eq!(ref_star.x, aligned_star.x, epsilon = 0.2);
    assert_abs_diff_eq!(ref_star.y, aligned_star.y, epsilon = 0.2);
}

#[test]
fn test_align_folder_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_opd_frame(dir.path(), "wd_0000.fits", starfield(0.0, 0.0, 1), &fields());
    write_opd_frame(dir.path(), "wd_0001.fits", starfield(2.0, 2.0, 2), &fields());
    let config = RegistrationConfig::default();
    align_folder(dir.path(), None, &config, |_| {}).unwrap();

    let again = align_folder(dir.path(), None, &config, |_| {}).unwrap();
    assert!(again.iter().all(|o| matches!(o, AlignOutcome::Skipped(_))));
    assert_eq!(list_fits_files(dir.path()).unwrap().len(), 2);
}

#[test]
fn test_align_folder_reports_progress() {
    let dir = TempDir::new().unwrap();
    write_opd_frame(dir.path(), "wd_0000.fits", starfield(0.0, 0.0, 1), &fields());
    write_opd_frame(dir.path(), "wd_0001.fits", starfield(1.0, 1.0, 2), &fields());
    let done = std::cell::Cell::new(0);

    align_folder(dir.path(), None, &RegistrationConfig::default(), |n| done.set(n)).unwrap();
    assert_eq!(done.get(), 2);
}

#[test]
fn test_reference_with_too_few_sources() {
    let dir = TempDir::new().unwrap();
    write_opd_frame(dir.path(), "wd_0000.fits", constant(64, 64, 100.0), &fields());
    write_opd_frame(dir.path(), "wd_0001.fits", starfield(0.0, 0.0, 1), &fields());

    assert!(matches!(
        align_folder(dir.path(), None, &RegistrationConfig::default(), |_| {}),
        Err(PipelineError::RegistrationFailure { .. })
    ));
    // nothing was written
    assert!(!dir.path().join("a_wd_0001.fits").exists());
}

#[test]
fn test_empty_folder() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        align_folder(dir.path(), None, &RegistrationConfig::default(), |_| {}),
        Err(PipelineError::InsufficientFrames(_))
    ));
}
