use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::error::{CtdError, Result};

// ---------------------------------------------------------------------------
// MetadataValue – a single `key=value` entry from a cast header
// ---------------------------------------------------------------------------

/// A dynamically-typed header value. Numbers are recognised so they can be
/// printed and compared as numbers; everything else stays text.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl MetadataValue {
    /// Guess the type of a raw header value.
    pub fn guess(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        MetadataValue::String(s.to_string())
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Instrument / salinity scale
// ---------------------------------------------------------------------------

/// Which instrument family produced a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrument {
    /// CSV-logging CTD instrument (`key=value` header, `[data]` block).
    Aml,
    /// Seabird profiler plain-text export.
    Seabird,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::Aml => write!(f, "AML"),
            Instrument::Seabird => write!(f, "Seabird"),
        }
    }
}

/// What the salinity column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalinityScale {
    /// Practical salinity (PSU).
    Practical,
    /// Reference salinity, g/kg.
    Reference,
    /// Absolute salinity (TEOS-10), g/kg.
    Absolute,
}

impl SalinityScale {
    pub fn unit(self) -> &'static str {
        match self {
            SalinityScale::Practical => "PSU",
            SalinityScale::Reference | SalinityScale::Absolute => "g/kg",
        }
    }
}

// ---------------------------------------------------------------------------
// Variable – names a numeric column of a cast
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Variable {
    Pressure,
    Temperature,
    Salinity,
    Oxygen,
    CorrectedOxygen,
    Conductivity,
    Turbidity,
    Density,
}

impl Variable {
    pub const ALL: [Variable; 8] = [
        Variable::Pressure,
        Variable::Temperature,
        Variable::Salinity,
        Variable::Oxygen,
        Variable::CorrectedOxygen,
        Variable::Conductivity,
        Variable::Turbidity,
        Variable::Density,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Variable::Pressure => "Pressure",
            Variable::Temperature => "Temperature",
            Variable::Salinity => "Salinity",
            Variable::Oxygen => "Oxygen",
            Variable::CorrectedOxygen => "CorrectedOxygen",
            Variable::Conductivity => "Conductivity",
            Variable::Turbidity => "Turbidity",
            Variable::Density => "Density",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Cast – one deployment as index-aligned columns
// ---------------------------------------------------------------------------

/// One deployment stored column-wise. Every populated column has exactly
/// `pressure.len()` elements and element `i` of each column belongs to the
/// same sample.
#[derive(Debug, Clone)]
pub struct Cast {
    pub source: Option<PathBuf>,
    pub instrument: Instrument,
    pub salinity_scale: SalinityScale,
    /// Header `key=value` pairs (empty for Seabird files).
    pub metadata: BTreeMap<String, MetadataValue>,

    pub timestamps: Option<Vec<NaiveDateTime>>,
    /// dBar.
    pub pressure: Vec<f64>,
    /// °C.
    pub temperature: Vec<f64>,
    pub salinity: Vec<f64>,
    /// Raw sensor oxygen.
    pub oxygen: Vec<f64>,
    pub corrected_oxygen: Option<Vec<f64>>,
    pub conductivity: Option<Vec<f64>>,
    pub turbidity: Option<Vec<f64>>,
    pub density: Option<Vec<f64>>,
}

/// The two legs of a cast.
#[derive(Debug, Clone)]
pub struct CastLegs {
    pub down: Cast,
    pub up: Cast,
}

impl Cast {
    /// An empty cast with no optional columns.
    pub fn new(instrument: Instrument, salinity_scale: SalinityScale) -> Self {
        Cast {
            source: None,
            instrument,
            salinity_scale,
            metadata: BTreeMap::new(),
            timestamps: None,
            pressure: Vec::new(),
            temperature: Vec::new(),
            salinity: Vec::new(),
            oxygen: Vec::new(),
            corrected_oxygen: None,
            conductivity: None,
            turbidity: None,
            density: None,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.pressure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty()
    }

    /// Borrow a numeric column, `None` if the cast does not carry it.
    pub fn column(&self, var: Variable) -> Option<&[f64]> {
        match var {
            Variable::Pressure => Some(self.pressure.as_slice()),
            Variable::Temperature => Some(self.temperature.as_slice()),
            Variable::Salinity => Some(self.salinity.as_slice()),
            Variable::Oxygen => Some(self.oxygen.as_slice()),
            Variable::CorrectedOxygen => self.corrected_oxygen.as_deref(),
            Variable::Conductivity => self.conductivity.as_deref(),
            Variable::Turbidity => self.turbidity.as_deref(),
            Variable::Density => self.density.as_deref(),
        }
    }

    /// Variables present in this cast, in [`Variable::ALL`] order.
    pub fn variables(&self) -> Vec<Variable> {
        Variable::ALL
            .into_iter()
            .filter(|v| self.column(*v).is_some())
            .collect()
    }

    /// Check that every populated column is index-aligned with `pressure`.
    pub fn validate(&self) -> Result<()> {
        let n = self.len();
        for var in self.variables() {
            if let Some(col) = self.column(var) {
                check_len(var.label(), n, col.len())?;
            }
        }
        if let Some(ts) = &self.timestamps {
            check_len("Datetime", n, ts.len())?;
        }
        Ok(())
    }

    /// Copy the samples at `indices` (in the given order) into a new cast
    /// with the same optional columns and metadata.
    pub fn select(&self, indices: &[usize]) -> Cast {
        fn pick<T: Clone>(col: &[T], indices: &[usize]) -> Vec<T> {
            indices.iter().map(|&i| col[i].clone()).collect()
        }
        fn pick_opt<T: Clone>(col: &Option<Vec<T>>, indices: &[usize]) -> Option<Vec<T>> {
            col.as_ref().map(|c| pick(c, indices))
        }

        Cast {
            source: self.source.clone(),
            instrument: self.instrument,
            salinity_scale: self.salinity_scale,
            metadata: self.metadata.clone(),
            timestamps: pick_opt(&self.timestamps, indices),
            pressure: pick(&self.pressure, indices),
            temperature: pick(&self.temperature, indices),
            salinity: pick(&self.salinity, indices),
            oxygen: pick(&self.oxygen, indices),
            corrected_oxygen: pick_opt(&self.corrected_oxygen, indices),
            conductivity: pick_opt(&self.conductivity, indices),
            turbidity: pick_opt(&self.turbidity, indices),
            density: pick_opt(&self.density, indices),
        }
    }

    /// `(min, max)` of a column, ignoring NaN. `None` if absent or empty.
    pub fn range(&self, var: Variable) -> Option<(f64, f64)> {
        let col = self.column(var)?;
        col.iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// First and last timestamp.
    pub fn time_span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let ts = self.timestamps.as_ref()?;
        Some((*ts.first()?, *ts.last()?))
    }
}

fn check_len(what: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(CtdError::LengthMismatch {
            what: what.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Five-sample AML-like cast with timestamps one second apart.
    pub(crate) fn sample_cast() -> Cast {
        let t0 = NaiveDate::from_ymd_opt(2023, 1, 14)
            .unwrap()
            .and_hms_opt(16, 11, 58)
            .unwrap();
        let mut cast = Cast::new(Instrument::Aml, SalinityScale::Practical);
        cast.timestamps = Some((0..5).map(|i| t0 + chrono::Duration::seconds(i)).collect());
        cast.pressure = vec![1.0, 2.0, 3.0, 2.0, 1.0];
        cast.temperature = vec![12.0, 11.5, 11.0, 11.5, 12.0];
        cast.salinity = vec![30.0, 31.0, 32.0, 31.0, 30.0];
        cast.oxygen = vec![250.0, 245.0, 240.0, 245.0, 250.0];
        cast.turbidity = Some(vec![0.1, 0.2, 0.3, 0.2, 0.1]);
        cast
    }

    #[test]
    fn test_metadata_guess() {
        assert_eq!(MetadataValue::guess("42"), MetadataValue::Integer(42));
        assert_eq!(MetadataValue::guess("1.5"), MetadataValue::Float(1.5));
        assert_eq!(
            MetadataValue::guess(" 2023-01-14 "),
            MetadataValue::String("2023-01-14".to_string())
        );
        assert_eq!(MetadataValue::guess(""), MetadataValue::Null);
    }

    #[test]
    fn test_metadata_display() {
        assert_eq!(MetadataValue::guess("12345").to_string(), "12345");
        assert_eq!(MetadataValue::guess("0.25").to_string(), "0.25");
        assert_eq!(MetadataValue::guess("Base.X2").to_string(), "Base.X2");
        assert_eq!(MetadataValue::Null.to_string(), "<null>");
    }

    #[test]
    fn test_select_keeps_columns_aligned() {
        let cast = sample_cast();
        let sub = cast.select(&[0, 2, 4]);

        assert_eq!(sub.len(), 3);
        assert_eq!(sub.pressure, vec![1.0, 3.0, 1.0]);
        assert_eq!(sub.turbidity.as_deref(), Some(&[0.1, 0.3, 0.1][..]));
        assert_eq!(sub.timestamps.as_ref().map(Vec::len), Some(3));
        assert!(sub.density.is_none());
        sub.validate().unwrap();
    }

    #[test]
    fn test_validate_detects_misaligned_column() {
        let mut cast = sample_cast();
        cast.density = Some(vec![1025.0]);

        match cast.validate() {
            Err(CtdError::LengthMismatch { what, expected, got }) => {
                assert_eq!(what, "Density");
                assert_eq!(expected, 5);
                assert_eq!(got, 1);
            }
            other => panic!("expected length mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_range_and_variables() {
        let cast = sample_cast();
        assert_eq!(cast.range(Variable::Pressure), Some((1.0, 3.0)));
        assert_eq!(cast.range(Variable::Density), None);
        assert_eq!(
            cast.variables(),
            vec![
                Variable::Pressure,
                Variable::Temperature,
                Variable::Salinity,
                Variable::Oxygen,
                Variable::Turbidity
            ]
        );
    }
}
