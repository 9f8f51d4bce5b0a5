//! Numeric constants for the dedispersion and search stages
//!
//! Defaults used by the configuration layer and granularities that the
//! dedispersion strategies round their buffer sizes to.

/// Dispersion constant in MHz² s cm³ pc⁻¹.
pub const DEFAULT_DM_CONSTANT: f64 = 4.1493775933609e3;

/// Overlap granularity for the cache-tiled strategies, in spectra.
/// Buffer sizes and the maximum delay are rounded up to a multiple of this.
pub const KLOTSKI_MIN_OVERLAP: usize = 1024;

/// Tiles are processed in groups of this many channels.
pub const KLOTSKI_CHANNEL_ALIGNMENT: usize = 4;

/// Largest relative shift a tile's shift table can address.
pub const KLOTSKI_MAX_RELATIVE_SHIFT: usize = u16::MAX as usize;

/// Scale factor from median absolute deviation to Gaussian sigma.
pub const MAD_TO_SIGMA: f32 = 1.4826;

/// Standard deviations below this are treated as a flat (unsearchable) series.
pub const MIN_STDEV: f32 = 1e-12;

/// Tolerance used when comparing times derived from sample counts.
pub const TIME_EPSILON: f64 = 1e-9;
