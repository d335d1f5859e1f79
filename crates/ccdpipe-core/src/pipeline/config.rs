use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::calibration::FlatPolicy;
use crate::combine::BatchConfig;
use crate::consts::{KEY_EXPTIME, KEY_FILTER, KEY_OBJECT};
use crate::register::RegistrationConfig;
use crate::stack::CombineMethod;

/// Settings for every pipeline step, loadable from a TOML file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub reduction: ReductionConfig,
    pub registration: RegistrationConfig,
    pub batch: BatchConfig,
}

impl PipelineConfig {
    pub fn align_combine(&self) -> AlignCombineConfig {
        AlignCombineConfig {
            registration: self.registration.clone(),
            batch: self.batch.clone(),
            output: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Parent of the `r_<night>` folder; the night's parent directory if unset.
    pub output: Option<PathBuf>,
    pub bias_method: CombineMethod,
    pub flat: FlatPolicy,
    /// Keys the reduced science frames are sorted by, outermost first.
    pub organize_keys: Vec<String>,
    /// Remove the raw calibration copies once their masters exist.
    pub cleanup_calibration: bool,
    /// Write the night log and summary into the night directory.
    pub persist_index: bool,
    /// Additional header keys recorded in the night log.
    pub extra_index_keys: Vec<String>,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            output: None,
            bias_method: CombineMethod::default(),
            flat: FlatPolicy::default(),
            organize_keys: vec![
                KEY_OBJECT.to_string(),
                KEY_FILTER.to_string(),
                KEY_EXPTIME.to_string(),
            ],
            cleanup_calibration: true,
            persist_index: true,
            extra_index_keys: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignCombineConfig {
    pub registration: RegistrationConfig,
    pub batch: BatchConfig,
    /// Where combined frames go; `<folder>/combined` if unset.
    pub output: Option<PathBuf>,
}
