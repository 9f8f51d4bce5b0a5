use serde::Serialize;

use crate::dm::dispersion_smear;
use crate::units::{Dm, DmConstant, Frequency, Seconds};

/// Single-pulse candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpCandidate {
    dm: Dm,
    tstart: Seconds,
    tend: Seconds,
    width: Seconds,
    sigma: f32,
    ident: usize,
}

impl SpCandidate {
    /// Candidate ending one boxcar width after it starts
    pub fn new(dm: Dm, tstart: Seconds, width: Seconds, sigma: f32, ident: usize) -> Self {
        Self::with_tend(dm, tstart, tstart + width, width, sigma, ident)
    }

    pub fn with_tend(
        dm: Dm,
        tstart: Seconds,
        tend: Seconds,
        width: Seconds,
        sigma: f32,
        ident: usize,
    ) -> Self {
        Self {
            dm,
            tstart,
            tend,
            width,
            sigma,
            ident,
        }
    }

    /// Candidate ending when the pulse has swept down to `f_low`
    #[allow(clippy::too_many_arguments)]
    pub fn with_smear(
        dm: Dm,
        tstart: Seconds,
        width: Seconds,
        sigma: f32,
        ident: usize,
        f_low: Frequency,
        f_high: Frequency,
        dm_constant: DmConstant,
    ) -> Self {
        let tend = tstart + dispersion_smear(dm, f_low, f_high, dm_constant);
        Self::with_tend(dm, tstart, tend, width, sigma, ident)
    }

    pub fn dm(&self) -> Dm {
        self.dm
    }

    pub fn tstart(&self) -> Seconds {
        self.tstart
    }

    pub fn tend(&self) -> Seconds {
        self.tend
    }

    pub fn width(&self) -> Seconds {
        self.width
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    pub fn ident(&self) -> usize {
        self.ident
    }

    /// Last instant the candidate's data covers
    pub fn data_end(&self) -> Seconds {
        self.tend.max(self.tstart + self.width)
    }
}
