pub mod summary;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::consts::{
    KEY_AIRMASS, KEY_COMMENT, KEY_DATE_OBS, KEY_EXPTIME, KEY_FILTER, KEY_OBJECT,
    NIGHT_LOG_SUFFIX, NIGHT_SUMMARY_SUFFIX,
};
use crate::error::Result;
use crate::frame::{format_exposure, FrameKind, Observation};
use crate::io::{self, Header};

pub use summary::NightSummary;

/// Columns every index row carries, in order.
pub const INDEX_COLUMNS: [&str; 6] = [
    KEY_DATE_OBS,
    KEY_OBJECT,
    KEY_FILTER,
    KEY_EXPTIME,
    KEY_AIRMASS,
    KEY_COMMENT,
];

/// One row of the night index.
#[derive(Clone, Debug)]
pub struct IndexRecord {
    pub path: PathBuf,
    pub observation: Observation,
    /// Raw text of the requested extra keys (empty when absent).
    pub extra: BTreeMap<String, String>,
}

impl IndexRecord {
    pub fn file_name(&self) -> String {
        io::file_name(&self.path)
    }

    pub fn kind(&self) -> FrameKind {
        self.observation.kind()
    }
}

/// Header index of one night directory.
#[derive(Clone, Debug)]
pub struct HeaderIndex {
    pub dir: PathBuf,
    pub extra_keys: Vec<String>,
    pub records: Vec<IndexRecord>,
}

impl HeaderIndex {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn select(&self, kind: FrameKind) -> Vec<&IndexRecord> {
        self.records.iter().filter(|r| r.kind() == kind).collect()
    }

    pub fn paths_of(&self, kind: FrameKind) -> Vec<PathBuf> {
        self.select(kind).into_iter().map(|r| r.path.clone()).collect()
    }

    /// Distinct filters used by frames of a kind.
    pub fn filters_of(&self, kind: FrameKind) -> BTreeSet<String> {
        self.select(kind)
            .into_iter()
            .map(|r| r.observation.filter.clone())
            .collect()
    }

    /// Records of a kind grouped by a derived key.
    pub fn group_by<F>(&self, kind: FrameKind, key: F) -> BTreeMap<String, Vec<&IndexRecord>>
    where
        F: Fn(&IndexRecord) -> String,
    {
        let mut groups: BTreeMap<String, Vec<&IndexRecord>> = BTreeMap::new();
        for record in self.select(kind) {
            groups.entry(key(record)).or_default().push(record);
        }
        groups
    }

    /// Write the index as CSV: `file`, the required columns, then the extra keys.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;

        let mut columns = vec!["file".to_string()];
        columns.extend(INDEX_COLUMNS.iter().map(|c| c.to_string()));
        columns.extend(self.extra_keys.iter().cloned());
        wtr.write_record(&columns)?;

        for record in &self.records {
            let obs = &record.observation;
            let mut row = vec![
                record.file_name(),
                obs.date_obs.clone(),
                obs.object.clone(),
                obs.filter.clone(),
                format_exposure(obs.exposure),
                format!("{}", obs.airmass),
                obs.tag.clone(),
            ];
            for key in &self.extra_keys {
                row.push(record.extra.get(key).cloned().unwrap_or_default());
            }
            wtr.write_record(&row)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

fn extra_value(header: &Header, key: &str) -> String {
    match header.get(key) {
        Some(v) => v.to_string(),
        None => header.commentary(key).collect::<Vec<_>>().join(" ").trim().to_string(),
    }
}

/// Read the header of every FITS file in `dir` (sorted by file name).
/// A file lacking a required field aborts the scan.
pub fn scan_directory(dir: &Path, extra_keys: &[String]) -> Result<HeaderIndex> {
    let files = io::list_fits_files(dir)?;
    debug!(dir = %dir.display(), files = files.len(), "Scanning headers");

    let records: Vec<IndexRecord> = files
        .par_iter()
        .map(|path| {
            let header = io::read_header(path)?;
            let observation = Observation::from_header(&header, path)?;
            let extra = extra_keys
                .iter()
                .map(|k| (k.clone(), extra_value(&header, k)))
                .collect();
            Ok(IndexRecord {
                path: path.clone(),
                observation,
                extra,
            })
        })
        .collect::<Result<_>>()?;

    Ok(HeaderIndex {
        dir: dir.to_path_buf(),
        extra_keys: extra_keys.to_vec(),
        records,
    })
}

/// Base name used for the night's log files: the directory's own name.
fn night_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "night".to_string())
}

pub fn log_path(dir: &Path) -> PathBuf {
    dir.join(format!("{}{}", night_name(dir), NIGHT_LOG_SUFFIX))
}

pub fn summary_path(dir: &Path) -> PathBuf {
    dir.join(format!("{}{}", night_name(dir), NIGHT_SUMMARY_SUFFIX))
}

/// Index a directory; with `persist`, also store the CSV log and the summary
/// inside it.
pub fn index_directory(dir: &Path, extra_keys: &[String], persist: bool) -> Result<HeaderIndex> {
    let index = scan_directory(dir, extra_keys)?;

    if persist {
        let log = log_path(dir);
        index.write_csv(&log)?;
        let summary = NightSummary::from_index(&index);
        summary.write(&summary_path(dir))?;
        info!(
            frames = index.len(),
            log = %log.display(),
            "Night index written"
        );
    } else {
        info!(frames = index.len(), "Night indexed");
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_quotes_awkward_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("night.log");
        let observation = Observation {
            date_obs: "2019-06-05T23:10:00.000".into(),
            object: "M4, core".into(),
            filter: "V".into(),
            exposure: 60.0,
            airmass: 1.2,
            tag: "say \"hi\"".into(),
        };
        let index = HeaderIndex {
            dir: dir.path().to_path_buf(),
            extra_keys: vec!["OBSERVER".into()],
            records: vec![IndexRecord {
                path: dir.path().join("m4_0001.fits"),
                observation,
                extra: BTreeMap::from([("OBSERVER".to_string(), "a\nb".to_string())]),
            }],
        };

        index.write_csv(&path).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap().len(), 8);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][2], "M4, core");
        assert_eq!(&rows[0][6], "say \"hi\"");
        assert_eq!(&rows[0][7], "a\nb");
    }

    #[test]
    fn test_log_paths_use_directory_name() {
        let dir = Path::new("/data/20190605");
        assert_eq!(log_path(dir), Path::new("/data/20190605/20190605_night.log"));
        assert_eq!(
            summary_path(dir),
            Path::new("/data/20190605/20190605_night.summary")
        );
    }
}
