//! Pressure binning.
//!
//! Samples are averaged into fixed-width half-open bins `[edge, edge + width)`.
//! Edges start at `floor(min pressure)` and stop before `ceil(max pressure)`,
//! so a sample sitting exactly on the top edge falls into the last bin.

use std::collections::BTreeMap;

use log::debug;

use super::model::{Cast, Variable};
use crate::error::{CtdError, Result};

/// Default bin width in dBar.
pub const BIN_WIDTH: f64 = 0.5;

/// Upper limit on the number of bins one span may produce. 50 000 bins of
/// 0.5 dBar already reach well past the deepest ocean trench.
pub const MAX_BINS: usize = 50_000;

/// Fixed-width pressure bins.
#[derive(Debug, Clone, PartialEq)]
pub struct PressureBins {
    pub edges: Vec<f64>,
    pub width: f64,
}

impl PressureBins {
    /// Bins spanning `[floor(min), ceil(max))`. A degenerate span (every
    /// pressure on the same integer) still yields one bin.
    pub fn spanning(pressure: &[f64], width: f64) -> Result<Self> {
        if pressure.is_empty() {
            return Err(CtdError::EmptyInput("no pressures to bin".to_string()));
        }
        if !width.is_finite() || width <= 0.0 {
            return Err(CtdError::InvalidBinWidth(width));
        }
        if let Some(&bad) = pressure.iter().find(|p| !p.is_finite()) {
            return Err(CtdError::InvalidPressure(bad));
        }

        let (min, max) = pressure
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| {
                (lo.min(p), hi.max(p))
            });
        let first = min.floor();
        let last = max.ceil();
        let count = ((last - first) / width).ceil().max(1.0);
        if count > MAX_BINS as f64 {
            return Err(CtdError::PressureSpan { min, max, width });
        }
        let n = count as usize;
        let edges = (0..n).map(|i| first + i as f64 * width).collect();

        Ok(PressureBins { edges, width })
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Index of the bin owning `p`: the largest edge not above `p`.
    /// Pressures below the first edge have no bin.
    pub fn index_of(&self, p: f64) -> Option<usize> {
        let first = *self.edges.first()?;
        if !p.is_finite() || p < first {
            return None;
        }
        let idx = ((p - first) / self.width).floor() as usize;
        Some(idx.min(self.edges.len() - 1))
    }

    /// Mean of `values` per bin. Bins that receive no sample are NaN.
    pub fn mean(&self, pressure: &[f64], values: &[f64]) -> Result<Vec<f64>> {
        if pressure.len() != values.len() {
            return Err(CtdError::LengthMismatch {
                what: "values".to_string(),
                expected: pressure.len(),
                got: values.len(),
            });
        }

        let mut sums = vec![0.0; self.len()];
        let mut counts = vec![0usize; self.len()];
        for (&p, &v) in pressure.iter().zip(values) {
            let idx = self.index_of(p).ok_or(CtdError::InvalidPressure(p))?;
            sums[idx] += v;
            counts[idx] += 1;
        }

        Ok(sums
            .into_iter()
            .zip(counts)
            .map(|(s, c)| if c == 0 { f64::NAN } else { s / c as f64 })
            .collect())
    }
}

/// Bin edges plus, when values were supplied, the binned means.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedProfile {
    pub edges: Vec<f64>,
    pub means: Option<Vec<f64>>,
}

/// Bin `values` by `pressure` with the default width. Without values only
/// the edges are computed.
pub fn bin_by_pressure(pressure: &[f64], values: Option<&[f64]>) -> Result<BinnedProfile> {
    let bins = PressureBins::spanning(pressure, BIN_WIDTH)?;
    let means = values.map(|v| bins.mean(pressure, v)).transpose()?;
    Ok(BinnedProfile {
        edges: bins.edges,
        means,
    })
}

/// Every populated column of a cast binned against its pressure.
#[derive(Debug, Clone)]
pub struct BinnedCast {
    pub bins: PressureBins,
    pub columns: BTreeMap<Variable, Vec<f64>>,
}

impl BinnedCast {
    pub fn get(&self, var: Variable) -> Option<&[f64]> {
        self.columns.get(&var).map(Vec::as_slice)
    }
}

/// Bin all columns of `cast` (except pressure itself) with the given width.
pub fn bin_cast(cast: &Cast, width: f64) -> Result<BinnedCast> {
    let bins = PressureBins::spanning(&cast.pressure, width)?;
    let mut columns = BTreeMap::new();
    for var in cast.variables() {
        if var == Variable::Pressure {
            continue;
        }
        if let Some(col) = cast.column(var) {
            columns.insert(var, bins.mean(&cast.pressure, col)?);
        }
    }
    debug!(
        "binned {} {} samples into {} bins of {} dBar",
        cast.len(),
        cast.instrument,
        bins.len(),
        width
    );
    Ok(BinnedCast { bins, columns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::sample_cast;

    #[test]
    fn test_edges_span_floor_to_ceil() {
        let profile = bin_by_pressure(&[1.2, 2.7, 3.4], None).unwrap();
        assert_eq!(profile.edges, vec![1.0, 1.5, 2.0, 2.5, 3.0, 3.5]);
        assert!(profile.means.is_none());
    }

    #[test]
    fn test_half_open_assignment() {
        // 1.0 and 1.2 share [1.0, 1.5); 1.6 belongs to [1.5, 2.0).
        let profile = bin_by_pressure(&[1.0, 1.2, 1.6], Some(&[10.0, 20.0, 30.0][..])).unwrap();
        assert_eq!(profile.edges, vec![1.0, 1.5]);
        let means = profile.means.unwrap();
        assert!((means[0] - 15.0).abs() < 1e-12);
        assert!((means[1] - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_bin_mean_is_arithmetic_mean() {
        let pres = [4.05, 4.1, 4.2, 4.33, 4.49];
        let vals = [1.0, 2.0, 3.0, 4.0, 10.0];
        let bins = PressureBins::spanning(&pres, BIN_WIDTH).unwrap();
        let means = bins.mean(&pres, &vals).unwrap();

        let idx = bins.index_of(4.2).unwrap();
        assert!((means[idx] - 4.0).abs() < 1e-12);
        assert!(means[1].is_nan());
    }

    #[test]
    fn test_empty_bins_are_nan_not_zero() {
        let profile = bin_by_pressure(&[1.1, 4.1], Some(&[5.0, 7.0][..])).unwrap();
        let means = profile.means.unwrap();
        assert_eq!(means.len(), 8);
        assert_eq!(means[0], 5.0);
        assert_eq!(means[6], 7.0);
        for (i, m) in means.iter().enumerate() {
            if i != 0 && i != 6 {
                assert!(m.is_nan(), "bin {i} should be NaN, got {m}");
            }
        }
    }

    #[test]
    fn test_zero_mean_stays_zero() {
        let profile = bin_by_pressure(&[1.1, 1.2], Some(&[-1.0, 1.0][..])).unwrap();
        assert_eq!(profile.means.unwrap()[0], 0.0);
    }

    #[test]
    fn test_top_edge_lands_in_last_bin() {
        let profile = bin_by_pressure(&[1.0, 2.0], Some(&[1.0, 3.0][..])).unwrap();
        assert_eq!(profile.edges, vec![1.0, 1.5]);
        let means = profile.means.unwrap();
        assert_eq!(means[0], 1.0);
        assert_eq!(means[1], 3.0);
    }

    #[test]
    fn test_degenerate_span_has_one_bin() {
        let profile = bin_by_pressure(&[3.0, 3.0], Some(&[2.0, 4.0][..])).unwrap();
        assert_eq!(profile.edges, vec![3.0]);
        assert_eq!(profile.means.unwrap(), vec![3.0]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            bin_by_pressure(&[], None),
            Err(CtdError::EmptyInput(_))
        ));
        assert!(matches!(
            bin_by_pressure(&[1.0, 2.0], Some(&[1.0][..])),
            Err(CtdError::LengthMismatch { .. })
        ));
        assert!(matches!(
            bin_by_pressure(&[1.0, f64::NAN], None),
            Err(CtdError::InvalidPressure(_))
        ));

        let bins = PressureBins::spanning(&[5.0, 6.0], BIN_WIDTH).unwrap();
        assert!(matches!(
            bins.mean(&[4.0], &[1.0]),
            Err(CtdError::InvalidPressure(_))
        ));
    }

    #[test]
    fn test_oversized_span_is_rejected() {
        assert!(matches!(
            bin_by_pressure(&[1.0, 1e25], None),
            Err(CtdError::PressureSpan { .. })
        ));
        assert!(matches!(
            PressureBins::spanning(&[0.0, 10.0], 1e-6),
            Err(CtdError::PressureSpan { .. })
        ));

        // Exactly at the limit is still fine.
        let top = MAX_BINS as f64 * BIN_WIDTH;
        let bins = PressureBins::spanning(&[0.0, top], BIN_WIDTH).unwrap();
        assert_eq!(bins.len(), MAX_BINS);
    }

    #[test]
    fn test_bin_cast_covers_all_columns() {
        let cast = sample_cast();
        let binned = bin_cast(&cast, BIN_WIDTH).unwrap();

        assert_eq!(binned.bins.edges, vec![1.0, 1.5, 2.0, 2.5]);
        assert!(binned.get(Variable::Pressure).is_none());
        assert!(binned.get(Variable::Density).is_none());

        let temps = binned.get(Variable::Temperature).unwrap();
        assert_eq!(temps[0], 12.0);
        assert!(temps[1].is_nan());
        assert_eq!(temps[2], 11.5);
        // 3.0 is the top edge and joins [2.5, 3.0).
        assert_eq!(temps[3], 11.0);

        let turb = binned.get(Variable::Turbidity).unwrap();
        assert!((turb[0] - 0.1).abs() < 1e-12);
    }
}
