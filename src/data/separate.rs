use chrono::{NaiveTime, Timelike};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::model::{Cast, CastLegs};
use crate::error::{CtdError, Result};

// ---------------------------------------------------------------------------
// Boundaries
// ---------------------------------------------------------------------------

/// Which leg a sample was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    Down,
    Up,
}

/// Sample-index boundary: `i < down_end` is down, `i > up_start` is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBoundary {
    pub down_end: usize,
    pub up_start: usize,
}

impl IndexBoundary {
    /// Single turning-point index; only that sample is dropped.
    pub fn at(index: usize) -> Self {
        IndexBoundary {
            down_end: index,
            up_start: index,
        }
    }

    pub fn classify(&self, index: usize) -> Option<Leg> {
        if index < self.down_end {
            Some(Leg::Down)
        } else if index > self.up_start {
            Some(Leg::Up)
        } else {
            None
        }
    }
}

/// Wall-clock boundary, compared against the sample's time of day at
/// whole-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockBoundary {
    pub down_end: NaiveTime,
    pub up_start: NaiveTime,
}

impl ClockBoundary {
    pub fn at(time: NaiveTime) -> Self {
        ClockBoundary {
            down_end: time,
            up_start: time,
        }
    }

    pub fn classify(&self, time: NaiveTime) -> Option<Leg> {
        let t = whole_seconds(time);
        if t < whole_seconds(self.down_end) {
            Some(Leg::Down)
        } else if t > whole_seconds(self.up_start) {
            Some(Leg::Up)
        } else {
            None
        }
    }
}

/// Open time-of-day interval `(start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ClockWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        let t = whole_seconds(time);
        t > whole_seconds(self.start) && t < whole_seconds(self.end)
    }
}

fn whole_seconds(t: NaiveTime) -> NaiveTime {
    t.with_nanosecond(0).unwrap_or(t)
}

// ---------------------------------------------------------------------------
// Separation
// ---------------------------------------------------------------------------

/// Split by sample index.
pub fn separate_by_index(cast: &Cast, boundary: IndexBoundary) -> Result<CastLegs> {
    partition(cast, |i| boundary.classify(i))
}

/// Split by wall-clock time. Fails if the cast carries no timestamps.
pub fn separate_by_clock(cast: &Cast, boundary: ClockBoundary) -> Result<CastLegs> {
    let ts = cast.timestamps.as_ref().ok_or(CtdError::MissingTimestamps)?;
    partition(cast, |i| boundary.classify(ts[i].time()))
}

/// Keep only samples inside explicit down and up windows; everything else
/// (surface soak, turning point, recovery) is dropped.
pub fn isolate_windows(cast: &Cast, down: ClockWindow, up: ClockWindow) -> Result<CastLegs> {
    let ts = cast.timestamps.as_ref().ok_or(CtdError::MissingTimestamps)?;
    partition(cast, |i| {
        let t = ts[i].time();
        if down.contains(t) {
            Some(Leg::Down)
        } else if up.contains(t) {
            Some(Leg::Up)
        } else {
            None
        }
    })
}

/// Assign every sample to at most one leg, preserving order. Fails with
/// `LengthMismatch` if the cast's columns are not aligned.
pub fn partition<F>(cast: &Cast, mut classify: F) -> Result<CastLegs>
where
    F: FnMut(usize) -> Option<Leg>,
{
    cast.validate()?;
    let mut down = Vec::new();
    let mut up = Vec::new();
    for i in 0..cast.len() {
        match classify(i) {
            Some(Leg::Down) => down.push(i),
            Some(Leg::Up) => up.push(i),
            None => {}
        }
    }

    let dropped = cast.len() - down.len() - up.len();
    info!(
        "{} cast split: {} down, {} up, {} dropped",
        cast.instrument,
        down.len(),
        up.len(),
        dropped
    );
    if down.is_empty() {
        warn!("{} downcast is empty", cast.instrument);
    }
    if up.is_empty() {
        warn!("{} upcast is empty", cast.instrument);
    }

    Ok(CastLegs {
        down: cast.select(&down),
        up: cast.select(&up),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::sample_cast;

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_index_partition_accounts_for_every_sample() {
        let cast = sample_cast();
        for b in 0..cast.len() {
            let legs = separate_by_index(&cast, IndexBoundary::at(b)).unwrap();
            assert_eq!(legs.down.len(), b);
            assert_eq!(legs.down.len() + legs.up.len() + 1, cast.len());
        }
    }

    #[test]
    fn test_index_gap_is_dropped() {
        let cast = sample_cast();
        let legs = separate_by_index(
            &cast,
            IndexBoundary {
                down_end: 2,
                up_start: 3,
            },
        )
        .unwrap();
        assert_eq!(legs.down.pressure, vec![1.0, 2.0]);
        assert_eq!(legs.up.pressure, vec![1.0]);
    }

    #[test]
    fn test_clock_partition() {
        // Samples at 16:11:58 .. 16:12:02.
        let cast = sample_cast();
        let legs = separate_by_clock(&cast, ClockBoundary::at(hms(16, 12, 0))).unwrap();

        assert_eq!(legs.down.len(), 2);
        assert_eq!(legs.up.len(), 2);
        assert_eq!(legs.down.pressure, vec![1.0, 2.0]);
        assert_eq!(legs.up.pressure, vec![2.0, 1.0]);
        assert_eq!(legs.up.turbidity.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_clock_boundary_ignores_fraction() {
        let boundary = ClockBoundary::at(hms(16, 12, 0));
        let t = NaiveTime::from_hms_milli_opt(16, 12, 0, 500).unwrap();
        assert_eq!(boundary.classify(t), None);
        assert_eq!(boundary.classify(hms(16, 11, 59)), Some(Leg::Down));
        assert_eq!(boundary.classify(hms(16, 12, 1)), Some(Leg::Up));
    }

    #[test]
    fn test_clock_requires_timestamps() {
        let mut cast = sample_cast();
        cast.timestamps = None;
        assert!(matches!(
            separate_by_clock(&cast, ClockBoundary::at(hms(16, 12, 0))),
            Err(CtdError::MissingTimestamps)
        ));
    }

    #[test]
    fn test_misaligned_cast_is_rejected() {
        let mut cast = sample_cast();
        cast.temperature.pop();
        assert!(matches!(
            separate_by_index(&cast, IndexBoundary::at(2)),
            Err(CtdError::LengthMismatch { .. })
        ));

        let mut cast = sample_cast();
        cast.timestamps.as_mut().unwrap().truncate(3);
        assert!(matches!(
            separate_by_clock(&cast, ClockBoundary::at(hms(16, 12, 0))),
            Err(CtdError::LengthMismatch { .. })
        ));
        let window = ClockWindow {
            start: hms(16, 11, 0),
            end: hms(16, 13, 0),
        };
        assert!(matches!(
            isolate_windows(&cast, window, window),
            Err(CtdError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_isolate_windows_are_open() {
        let cast = sample_cast();
        let legs = isolate_windows(
            &cast,
            ClockWindow {
                start: hms(16, 11, 58),
                end: hms(16, 12, 0),
            },
            ClockWindow {
                start: hms(16, 12, 0),
                end: hms(16, 12, 3),
            },
        )
        .unwrap();

        assert_eq!(legs.down.pressure, vec![2.0]);
        assert_eq!(legs.up.pressure, vec![2.0, 1.0]);
    }
}
