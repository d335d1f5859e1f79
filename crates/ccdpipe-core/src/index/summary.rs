use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;

use crate::error::Result;
use crate::frame::{format_exposure, FrameKind};
use crate::index::HeaderIndex;

/// Per-object breakdown of the science frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectSummary {
    pub frames: usize,
    pub per_filter: BTreeMap<String, usize>,
    /// Distinct exposure labels (seconds).
    pub exposures: BTreeSet<String>,
    pub airmass_min: f64,
    pub airmass_max: f64,
}

/// Human-readable digest of one observing night.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NightSummary {
    pub night: String,
    pub total: usize,
    pub calibration: usize,
    pub science: usize,
    pub others: usize,
    pub bias: usize,
    pub flats: BTreeMap<String, usize>,
    pub objects: BTreeMap<String, ObjectSummary>,
}

impl NightSummary {
    pub fn from_index(index: &HeaderIndex) -> Self {
        let mut summary = Self {
            night: night_date(index),
            total: index.len(),
            ..Default::default()
        };

        for record in &index.records {
            let obs = &record.observation;
            match record.kind() {
                FrameKind::Bias => {
                    summary.calibration += 1;
                    summary.bias += 1;
                }
                FrameKind::Flat => {
                    summary.calibration += 1;
                    *summary.flats.entry(obs.filter.clone()).or_default() += 1;
                }
                FrameKind::Science => {
                    summary.science += 1;
                    let entry = summary
                        .objects
                        .entry(obs.object.clone())
                        .or_insert_with(|| ObjectSummary {
                            airmass_min: f64::INFINITY,
                            airmass_max: f64::NEG_INFINITY,
                            ..Default::default()
                        });
                    entry.frames += 1;
                    *entry.per_filter.entry(obs.filter.clone()).or_default() += 1;
                    entry.exposures.insert(format_exposure(obs.exposure));
                    entry.airmass_min = entry.airmass_min.min(obs.airmass);
                    entry.airmass_max = entry.airmass_max.max(obs.airmass);
                }
                FrameKind::Other => summary.others += 1,
            }
        }

        summary
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Summary {}", self.night);
        let _ = writeln!(out, "Total images: {}", self.total);
        let _ = writeln!(out, "Calibration: {}", self.calibration);
        let _ = writeln!(out, "Science: {}", self.science);
        let _ = writeln!(out, "Others: {}", self.others);
        let _ = writeln!(out);
        let _ = writeln!(out, "Bias images: {}", self.bias);
        let _ = writeln!(out, "Flat images:");
        for (filter, n) in &self.flats {
            let _ = writeln!(out, "  {}: {}", filter, n);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Objects:");
        for (object, s) in &self.objects {
            let filters = s
                .per_filter
                .iter()
                .map(|(f, n)| format!("{}: {}", f, n))
                .collect::<Vec<_>>()
                .join(", ");
            let exposures = s.exposures.iter().cloned().collect::<Vec<_>>().join(", ");
            let _ = writeln!(
                out,
                "  {}: {} ({}) Exptimes: [{}]s  {:.3} < X < {:.3}",
                object, s.frames, filters, exposures, s.airmass_min, s.airmass_max
            );
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())?;
        Ok(())
    }
}

/// Date part of the first frame's `DATE-OBS`, or the directory name.
fn night_date(index: &HeaderIndex) -> String {
    index
        .records
        .first()
        .and_then(|r| r.observation.date_obs.split('T').next().map(str::to_string))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| {
            index
                .dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
}
