//! Parsing, correction, leg separation and pressure binning for CTD casts
//! from AML CSV loggers and Seabird profilers.

pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod pipeline;

pub use data::binning::{bin_by_pressure, bin_cast, BinnedCast, BinnedProfile, PressureBins};
pub use data::compensation::{compensate_oxygen, psu_to_reference_salinity};
pub use data::loader::{load_file, read_aml_csv, read_seabird, AmlOptions, SeabirdOptions};
pub use data::model::{Cast, CastLegs, Instrument, SalinityScale, Variable};
pub use data::separate::{
    isolate_windows, separate_by_clock, separate_by_index, ClockBoundary, ClockWindow,
    IndexBoundary,
};
pub use error::{CtdError, Result};
