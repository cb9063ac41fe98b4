//! JSON job descriptions.
//!
//! Every input path, pressure threshold and leg boundary of a processing run
//! lives in a job file instead of in code. Relative paths inside a job file
//! are resolved against the directory containing it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::binning::BIN_WIDTH;
use crate::data::loader::{AmlOptions, SeabirdOptions};
use crate::data::separate::{ClockBoundary, ClockWindow, IndexBoundary};

/// Split one AML cast into down and up files using explicit clock windows.
///
/// ```json
/// {
///   "input": "CTD/noctiluca_saturday_cast1.csv",
///   "down": { "start": "16:42:29", "end": "16:44:40" },
///   "up":   { "start": "16:44:47", "end": "16:46:31" },
///   "output_dir": "CTD/isolated_data"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolateJob {
    pub input: PathBuf,
    #[serde(default)]
    pub aml: AmlOptions,
    pub down: ClockWindow,
    pub up: ClockWindow,
    pub output_dir: PathBuf,
    /// Also write `.parquet` copies of both legs.
    #[serde(default)]
    pub parquet: bool,
}

/// Which leg of each cast a comparison bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegChoice {
    #[default]
    Down,
    Up,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeabirdInput {
    pub path: PathBuf,
    #[serde(default)]
    pub options: SeabirdOptions,
    /// Sample indices around the turning point.
    pub legs: IndexBoundary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmlInput {
    pub path: PathBuf,
    #[serde(default = "compensated_aml_options")]
    pub options: AmlOptions,
    /// Wall-clock times around the turning point.
    pub legs: ClockBoundary,
}

/// Comparisons put both instruments on reference salinity and report the
/// compensated optode alongside the raw reading.
fn compensated_aml_options() -> AmlOptions {
    AmlOptions {
        reference_salinity: true,
        compensate_oxygen: true,
        ..AmlOptions::default()
    }
}

fn default_bin_width() -> f64 {
    BIN_WIDTH
}

/// Bin one leg of a Seabird cast and an AML cast onto common pressure bins.
///
/// ```json
/// {
///   "seabird": { "path": "SBE0251244.cnv", "options": { "pressure_threshold": 1.0 },
///                "legs": { "down_end": 8000, "up_start": 8750 } },
///   "aml": { "path": "noctiluca_saturday_cast1.csv",
///            "legs": { "down_end": "16:12:00", "up_start": "16:12:30" } },
///   "output": "comparison_down.csv"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareJob {
    pub seabird: SeabirdInput,
    pub aml: AmlInput,
    #[serde(default)]
    pub leg: LegChoice,
    #[serde(default = "default_bin_width")]
    pub bin_width: f64,
    pub output: PathBuf,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading job file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing job file {}", path.display()))
}

fn resolve(base: &Path, p: &mut PathBuf) {
    if p.is_relative() {
        *p = base.join(&*p);
    }
}

fn base_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

impl IsolateJob {
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut job: IsolateJob = read_json(path)?;
        let base = base_dir(path);
        resolve(base, &mut job.input);
        resolve(base, &mut job.output_dir);
        Ok(job)
    }

    /// `<output_dir>/<input stem>_<leg>.<ext>`.
    pub fn output_path(&self, leg: &str, ext: &str) -> PathBuf {
        let stem = self
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("cast");
        self.output_dir.join(format!("{stem}_{leg}.{ext}"))
    }
}

impl CompareJob {
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut job: CompareJob = read_json(path)?;
        let base = base_dir(path);
        resolve(base, &mut job.seabird.path);
        resolve(base, &mut job.aml.path);
        resolve(base, &mut job.output);
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use std::io::Write as IoWrite;
    use tempfile::Builder;

    #[test]
    fn test_isolate_job_defaults_and_paths() {
        let dir = tempfile::tempdir().unwrap();
        let job_path = dir.path().join("isolate.json");
        std::fs::write(
            &job_path,
            r#"{
                "input": "CTD/cast1.csv",
                "down": { "start": "16:42:29", "end": "16:44:40" },
                "up": { "start": "16:44:47", "end": "16:46:31" },
                "output_dir": "out"
            }"#,
        )
        .unwrap();

        let job = IsolateJob::from_path(&job_path).unwrap();

        assert_eq!(job.input, dir.path().join("CTD/cast1.csv"));
        assert_eq!(job.aml, AmlOptions::default());
        assert!(!job.parquet);
        assert_eq!(job.down.start, NaiveTime::from_hms_opt(16, 42, 29).unwrap());
        assert_eq!(
            job.output_path("down", "csv"),
            dir.path().join("out").join("cast1_down.csv")
        );
    }

    #[test]
    fn test_compare_job_defaults() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "seabird": {{ "path": "/data/sb.cnv",
                             "options": {{ "pressure_threshold": 1.0 }},
                             "legs": {{ "down_end": 8000, "up_start": 8750 }} }},
                "aml": {{ "path": "/data/aml.csv",
                         "legs": {{ "down_end": "16:12:00", "up_start": "16:12:30" }} }},
                "output": "/data/cmp.csv"
            }}"#
        )
        .unwrap();

        let job = CompareJob::from_path(file.path()).unwrap();

        assert_eq!(job.leg, LegChoice::Down);
        assert_eq!(job.bin_width, BIN_WIDTH);
        assert_eq!(job.seabird.options.pressure_threshold, 1.0);
        assert_eq!(job.seabird.options.columns.salinity, 7);
        assert_eq!(job.seabird.legs, IndexBoundary { down_end: 8000, up_start: 8750 });
        assert!(job.aml.options.compensate_oxygen);
        assert!(job.aml.options.reference_salinity);
        assert_eq!(job.output, PathBuf::from("/data/cmp.csv"));
    }

    #[test]
    fn test_bad_job_file_reports_path() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{ \"input\": 3 }}").unwrap();

        let err = IsolateJob::from_path(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing job file"));
    }
}
