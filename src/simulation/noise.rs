use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{DdtrError, Result};

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub seed: Option<u64>,
    pub mean: f32,
    pub stdev: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            seed: None,
            mean: 0.0,
            stdev: 1.0,
        }
    }
}

impl NoiseConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_level(mut self, mean: f32, stdev: f32) -> Self {
        self.mean = mean;
        self.stdev = stdev;
        self
    }

    /// Noiseless: every sample equals `mean`
    pub fn silent(mean: f32) -> Self {
        Self {
            seed: None,
            mean,
            stdev: 0.0,
        }
    }

    pub(crate) fn distribution(&self) -> Result<Option<Normal<f32>>> {
        if self.stdev == 0.0 {
            return Ok(None);
        }
        Normal::new(0.0, self.stdev)
            .map(Some)
            .map_err(|e| DdtrError::Config(format!("invalid noise level {}: {}", self.stdev, e)))
    }
}

pub(crate) fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => rand::make_rng(),
    }
}

pub fn add_gaussian_noise(data: &mut [f32], noise: &Normal<f32>, rng: &mut ChaCha8Rng) {
    for sample in data.iter_mut() {
        *sample += noise.sample(rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_noise_repeats() {
        let normal = NoiseConfig::default().distribution().unwrap().unwrap();
        let mut a = vec![0.0; 64];
        let mut b = vec![0.0; 64];
        add_gaussian_noise(&mut a, &normal, &mut create_rng(Some(7)));
        add_gaussian_noise(&mut b, &normal, &mut create_rng(Some(7)));
        assert_eq!(a, b);
        assert!(a.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_invalid_level_rejected() {
        assert!(NoiseConfig::default().with_level(0.0, -1.0).distribution().is_err());
        assert!(NoiseConfig::silent(3.0).distribution().unwrap().is_none());
    }
}
