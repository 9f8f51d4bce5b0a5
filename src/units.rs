//! Typed physical quantities used by the delay model and the search.
//!
//! All DM and delay arithmetic goes through these wrappers so that a
//! frequency can never be passed where a time is expected.
//!
//! # Parsing formats
//! - `Frequency`: `350`, `350MHz`, `1.4GHz`, `150000kHz`, `1e9Hz` (bare numbers are MHz)
//! - `Seconds`: `0.5`, `0.5s`, `1.5ms`, `64us` or `64μs` (bare numbers are seconds)
//! - `Dm`: `56.7` or `56.7pc/cm3`
//!
//! # Example
//! ```
//! use ddtr::units::{Frequency, Seconds};
//!
//! let f: Frequency = "1.4GHz".parse().unwrap();
//! assert!((f.as_mhz() - 1400.0).abs() < 1e-9);
//! let t: Seconds = "64us".parse().unwrap();
//! assert!((t.as_secs() - 64e-6).abs() < 1e-15);
//! ```

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DM_CONSTANT;

/// Frequency, stored in MHz
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frequency(f64);

impl Frequency {
    pub fn from_mhz(mhz: f64) -> Self {
        Self(mhz)
    }

    pub fn from_hz(hz: f64) -> Self {
        Self(hz / 1.0e6)
    }

    pub fn as_mhz(&self) -> f64 {
        self.0
    }

    pub fn as_hz(&self) -> f64 {
        self.0 * 1.0e6
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}MHz", self.0)
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (num, scale) = if let Some(num) = strip_suffix_ci(s, "ghz") {
            (num, 1.0e3)
        } else if let Some(num) = strip_suffix_ci(s, "mhz") {
            (num, 1.0)
        } else if let Some(num) = strip_suffix_ci(s, "khz") {
            (num, 1.0e-3)
        } else if let Some(num) = strip_suffix_ci(s, "hz") {
            (num, 1.0e-6)
        } else {
            (s, 1.0)
        };
        let value: f64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid frequency: {}", s))?;
        if value <= 0.0 {
            return Err("frequency must be positive".to_string());
        }
        Ok(Self(value * scale))
    }
}

/// Time, stored in seconds
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seconds(f64);

impl Seconds {
    pub const ZERO: Seconds = Seconds(0.0);

    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn from_millis(ms: f64) -> Self {
        Self(ms / 1.0e3)
    }

    pub fn from_micros(us: f64) -> Self {
        Self(us / 1.0e6)
    }

    pub fn as_secs(&self) -> f64 {
        self.0
    }

    pub fn as_millis(&self) -> f64 {
        self.0 * 1.0e3
    }

    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.0)
    }
}

impl FromStr for Seconds {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (num, scale) = if let Some(num) = s.strip_suffix("us").or_else(|| s.strip_suffix("μs"))
        {
            (num, 1.0e-6)
        } else if let Some(num) = s.strip_suffix("ms") {
            (num, 1.0e-3)
        } else if let Some(num) = s.strip_suffix('s') {
            (num, 1.0)
        } else {
            (s, 1.0)
        };
        let value: f64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid time: {}", s))?;
        if value < 0.0 {
            return Err("time must not be negative".to_string());
        }
        Ok(Self(value * scale))
    }
}

impl Add for Seconds {
    type Output = Seconds;

    fn add(self, rhs: Seconds) -> Seconds {
        Seconds(self.0 + rhs.0)
    }
}

impl AddAssign for Seconds {
    fn add_assign(&mut self, rhs: Seconds) {
        self.0 += rhs.0;
    }
}

impl Sub for Seconds {
    type Output = Seconds;

    fn sub(self, rhs: Seconds) -> Seconds {
        Seconds(self.0 - rhs.0)
    }
}

impl SubAssign for Seconds {
    fn sub_assign(&mut self, rhs: Seconds) {
        self.0 -= rhs.0;
    }
}

impl Mul<f64> for Seconds {
    type Output = Seconds;

    fn mul(self, rhs: f64) -> Seconds {
        Seconds(self.0 * rhs)
    }
}

impl Div<f64> for Seconds {
    type Output = Seconds;

    fn div(self, rhs: f64) -> Seconds {
        Seconds(self.0 / rhs)
    }
}

/// Ratio of two durations, e.g. a delay expressed in samples.
impl Div for Seconds {
    type Output = f64;

    fn div(self, rhs: Seconds) -> f64 {
        self.0 / rhs.0
    }
}

/// Dispersion measure in pc cm⁻³
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dm(f64);

impl Dm {
    pub fn from_pc_cm3(value: f64) -> Self {
        Self(value)
    }

    pub fn as_pc_cm3(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Dm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}pc/cm3", self.0)
    }
}

impl FromStr for Dm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let num = s
            .strip_suffix("pc/cm3")
            .or_else(|| s.strip_suffix("pc/cm^3"))
            .unwrap_or(s);
        let value: f64 = num
            .trim()
            .parse()
            .map_err(|_| format!("invalid DM: {}", s))?;
        if !value.is_finite() {
            return Err(format!("DM must be finite: {}", s));
        }
        if value < 0.0 {
            return Err("DM must not be negative".to_string());
        }
        Ok(Self(value))
    }
}

impl Add for Dm {
    type Output = Dm;

    fn add(self, rhs: Dm) -> Dm {
        Dm(self.0 + rhs.0)
    }
}

impl Sub for Dm {
    type Output = Dm;

    fn sub(self, rhs: Dm) -> Dm {
        Dm(self.0 - rhs.0)
    }
}

impl Mul<f64> for Dm {
    type Output = Dm;

    fn mul(self, rhs: f64) -> Dm {
        Dm(self.0 * rhs)
    }
}

/// Dispersion constant in MHz² s cm³ pc⁻¹
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DmConstant(f64);

impl DmConstant {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for DmConstant {
    fn default() -> Self {
        Self(DEFAULT_DM_CONSTANT)
    }
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() >= suffix.len() && s.is_char_boundary(s.len() - suffix.len()) {
        let (head, tail) = s.split_at(s.len() - suffix.len());
        if tail.eq_ignore_ascii_case(suffix) {
            return Some(head);
        }
    }
    None
}
