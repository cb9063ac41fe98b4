/// Data layer: cast types, loading, corrections, separation and binning.
///
/// Architecture:
/// ```text
///  AML .csv / Seabird .cnv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Cast  (optional O2 compensation)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   Cast    │  index-aligned columns, one element per sample
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ separate  │  index / clock boundary → CastLegs { down, up }
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ binning   │  0.5 dBar bins → per-bin means
///   └──────────┘
/// ```
pub mod binning;
pub mod compensation;
pub mod loader;
pub mod model;
pub mod reference;
pub mod separate;
