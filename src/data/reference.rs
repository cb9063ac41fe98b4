//! Historical reference profiles.
//!
//! Tabulated mean measurements with a full range per depth, e.g. a survey
//! summary transcribed from a cruise report:
//!
//! ```text
//! depth,temp,temp_range,sal,sal_range,o2,o2_range
//! 0,14.2,2.1,26.5,3.0,6.8,1.2
//! 10,12.9,1.4,30.1,1.8,6.1,0.9
//! ```

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{CtdError, Result};

/// One tabulated depth. Ranges are full widths (max − min).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    /// Metres.
    pub depth: f64,
    pub temp: f64,
    pub temp_range: f64,
    pub sal: f64,
    pub sal_range: f64,
    /// mL/L.
    pub o2: f64,
    pub o2_range: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceVariable {
    Temperature,
    Salinity,
    Oxygen,
}

impl ReferenceVariable {
    pub const ALL: [ReferenceVariable; 3] = [
        ReferenceVariable::Temperature,
        ReferenceVariable::Salinity,
        ReferenceVariable::Oxygen,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ReferenceVariable::Temperature => "temp",
            ReferenceVariable::Salinity => "sal",
            ReferenceVariable::Oxygen => "o2",
        }
    }
}

/// Mean with the lower and upper edge of its range at one depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopePoint {
    pub depth: f64,
    pub low: f64,
    pub mean: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceProfile {
    pub rows: Vec<ReferenceRow>,
}

impl ReferenceProfile {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `mean ± range / 2` for each depth, in file order.
    pub fn envelope(&self, var: ReferenceVariable) -> Vec<EnvelopePoint> {
        self.rows
            .iter()
            .map(|r| {
                let (mean, range) = match var {
                    ReferenceVariable::Temperature => (r.temp, r.temp_range),
                    ReferenceVariable::Salinity => (r.sal, r.sal_range),
                    ReferenceVariable::Oxygen => (r.o2, r.o2_range),
                };
                EnvelopePoint {
                    depth: r.depth,
                    low: mean - range / 2.0,
                    mean,
                    high: mean + range / 2.0,
                }
            })
            .collect()
    }
}

/// Read a reference profile CSV.
pub fn read_reference(path: &Path) -> Result<ReferenceProfile> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<ReferenceRow>, _>>()?;

    if rows.is_empty() {
        return Err(CtdError::EmptyInput(format!(
            "no reference rows in {}",
            path.display()
        )));
    }
    info!("Loaded {} reference depths from {}", rows.len(), path.display());
    Ok(ReferenceProfile { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as IoWrite;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_reference_and_envelope() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "depth,temp,temp_range,sal,sal_range,o2,o2_range\n\
             0,14.2,2.0,26.5,3.0,6.8,1.2\n\
             10,12.9,1.4,30.1,1.8,6.1,0.9"
        )
        .unwrap();

        let profile = read_reference(file.path()).unwrap();
        assert_eq!(profile.len(), 2);

        let temps = profile.envelope(ReferenceVariable::Temperature);
        assert!((temps[0].low - 13.2).abs() < 1e-12);
        assert!((temps[0].high - 15.2).abs() < 1e-12);
        assert_eq!(temps[1].depth, 10.0);

        let o2 = profile.envelope(ReferenceVariable::Oxygen);
        assert!((o2[1].mean - 6.1).abs() < 1e-12);
        assert!((o2[1].low - 5.65).abs() < 1e-12);
    }

    #[test]
    fn test_read_reference_rejects_bad_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "depth,temp,temp_range,sal,sal_range,o2,o2_range\n0,warm,2.0,26.5,3.0,6.8,1.2"
        )
        .unwrap();
        assert!(matches!(read_reference(file.path()), Err(CtdError::Csv(_))));
    }

    #[test]
    fn test_read_reference_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "depth,temp,temp_range,sal,sal_range,o2,o2_range").unwrap();
        assert!(matches!(
            read_reference(file.path()),
            Err(CtdError::EmptyInput(_))
        ));
    }
}
