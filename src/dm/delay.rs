//! Cold-plasma dispersion delay
//!
//! A pulse at frequency `f` arrives later than at the reference frequency
//! `f_ref` by `k · DM · (1/f² − 1/f_ref²)` seconds, with frequencies in MHz
//! and `k` the dispersion constant.

use crate::units::{Dm, DmConstant, Frequency, Seconds};

/// Delay of `f_channel` relative to `f_reference`
///
/// Negative when the channel lies above the reference frequency.
pub fn dispersion_delay(
    dm: Dm,
    f_channel: Frequency,
    f_reference: Frequency,
    dm_constant: DmConstant,
) -> Seconds {
    let fc = f_channel.as_mhz();
    let fr = f_reference.as_mhz();
    Seconds::from_secs(dm_constant.value() * dm.as_pc_cm3() * (1.0 / (fc * fc) - 1.0 / (fr * fr)))
}

/// Delay of `f_channel` relative to `f_reference`, floored to whole samples
pub fn delay_samples(
    dm: Dm,
    f_channel: Frequency,
    f_reference: Frequency,
    dm_constant: DmConstant,
    sample_interval: Seconds,
) -> i64 {
    (dispersion_delay(dm, f_channel, f_reference, dm_constant) / sample_interval).floor() as i64
}

/// Delay in (fractional) samples per unit DM
///
/// Strategies multiply this by a trial DM and truncate, so the shift for
/// every trial is derived from one precomputed factor per channel.
pub fn dm_factor(
    f_channel: Frequency,
    f_reference: Frequency,
    dm_constant: DmConstant,
    sample_interval: Seconds,
) -> f64 {
    dispersion_delay(Dm::from_pc_cm3(1.0), f_channel, f_reference, dm_constant) / sample_interval
}

/// Time a pulse at `dm` takes to sweep from `f_high` down to `f_low`
pub fn dispersion_smear(
    dm: Dm,
    f_low: Frequency,
    f_high: Frequency,
    dm_constant: DmConstant,
) -> Seconds {
    dispersion_delay(dm, f_low, f_high, dm_constant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_delay_zero_at_reference() {
        let f = Frequency::from_mhz(350.0);
        let d = delay_samples(
            Dm::from_pc_cm3(100.0),
            f,
            f,
            DmConstant::default(),
            Seconds::from_micros(64.0),
        );
        assert_eq!(d, 0);
    }

    #[test]
    fn test_delay_known_value() {
        // 100 pc/cm3 between 1400 and 1500 MHz: 4149.38 * 100 * (1/1400² - 1/1500²)
        let delay = dispersion_delay(
            Dm::from_pc_cm3(100.0),
            Frequency::from_mhz(1400.0),
            Frequency::from_mhz(1500.0),
            DmConstant::default(),
        );
        let expected = 4.1493775933609e3 * 100.0 * (1.0 / 1400.0f64.powi(2) - 1.0 / 1500.0f64.powi(2));
        assert_relative_eq!(delay.as_secs(), expected, max_relative = 1e-14);
        assert_relative_eq!(delay.as_millis(), 27.2, max_relative = 1e-2);
    }

    #[test]
    fn test_delay_samples_floors() {
        let tsamp = Seconds::from_millis(1.0);
        let samples = delay_samples(
            Dm::from_pc_cm3(100.0),
            Frequency::from_mhz(1400.0),
            Frequency::from_mhz(1500.0),
            DmConstant::default(),
            tsamp,
        );
        assert_eq!(samples, 27);
    }

    #[test]
    fn test_delay_increases_toward_low_frequency() {
        let k = DmConstant::default();
        let top = Frequency::from_mhz(350.0);
        let tsamp = Seconds::from_micros(64.0);
        let dm = Dm::from_pc_cm3(50.0);
        let high = delay_samples(dm, Frequency::from_mhz(340.0), top, k, tsamp);
        let low = delay_samples(dm, Frequency::from_mhz(300.0), top, k, tsamp);
        assert!(low > high);
        assert!(high > 0);
    }

    #[test]
    fn test_dm_factor_scales_linearly() {
        let k = DmConstant::default();
        let tsamp = Seconds::from_micros(100.0);
        let f = Frequency::from_mhz(300.0);
        let top = Frequency::from_mhz(350.0);
        let factor = dm_factor(f, top, k, tsamp);
        let direct = dispersion_delay(Dm::from_pc_cm3(37.0), f, top, k) / tsamp;
        assert_relative_eq!(factor * 37.0, direct, max_relative = 1e-12);
    }
}
