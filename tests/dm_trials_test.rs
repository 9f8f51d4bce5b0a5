use std::sync::Arc;

use approx::assert_relative_eq;

use ddtr::DdtrError;
use ddtr::data::TimeFrequencyMetadata;
use ddtr::dm::{DmTrialPlan, DmTrials, DmTrialsMetadata};
use ddtr::units::{Dm, DmConstant, Frequency, Seconds};

fn dm(v: f64) -> Dm {
    Dm::from_pc_cm3(v)
}

fn single_range_plan(dedispersion_samples: usize) -> DmTrialPlan {
    let mut plan = DmTrialPlan::new(DmConstant::default(), dedispersion_samples);
    plan.add_dm_range(dm(0.0), dm(10.0), dm(1.0)).unwrap();
    plan
}

fn overlap_for(plan: &DmTrialPlan, metadata: &TimeFrequencyMetadata) -> usize {
    let (f_low, f_high) = metadata.low_high_frequencies();
    (plan.maximum_delay(f_low, f_high) / metadata.sample_interval).ceil() as usize
}

fn narrow_band(nchans: usize) -> TimeFrequencyMetadata {
    TimeFrequencyMetadata::with_linear_channels(
        Seconds::ZERO,
        Seconds::from_micros(34.567),
        Frequency::from_mhz(350.0),
        -0.028935,
        nchans,
    )
}

#[test]
fn test_narrow_band_plan_fits_pass() {
    let nspectra = 131072;
    let plan = single_range_plan(nspectra);
    let metadata = narrow_band(77);
    let overlap = overlap_for(&plan, &metadata);
    assert!(overlap < nspectra);

    let trials = plan
        .generate_dmtrials_metadata(metadata.sample_interval, nspectra, overlap)
        .unwrap();
    assert_eq!(trials.size(), 10);
    assert_eq!(trials.fundamental_sample_count(), nspectra - overlap);
    assert_eq!(plan.max_dm(), dm(9.0));
}

#[test]
fn test_wide_band_overlap_exceeds_pass() {
    let nspectra = 27000;
    let plan = single_range_plan(nspectra);
    let metadata = narrow_band(7776);
    let overlap = overlap_for(&plan, &metadata);
    assert!(overlap > nspectra, "overlap {} should exceed {}", overlap, nspectra);

    let result = plan.generate_dmtrials_metadata(metadata.sample_interval, nspectra, overlap);
    assert!(matches!(
        result,
        Err(DdtrError::OverlapExceedsSamples { spectra: 27000, .. })
    ));
}

fn four_range_plan() -> DmTrialPlan {
    let mut plan = DmTrialPlan::new(DmConstant::default(), 4096);
    plan.add_dm_range(dm(0.0), dm(10.0), dm(1.0)).unwrap();
    plan.add_dm_range(dm(10.0), dm(20.0), dm(2.0)).unwrap();
    plan.add_dm_range(dm(20.0), dm(40.0), dm(4.0)).unwrap();
    plan.add_dm_range(dm(40.0), dm(80.0), dm(8.0)).unwrap();
    plan
}

#[test]
fn test_sampling_interval_follows_downsampling() {
    let tsamp = Seconds::from_micros(64.0);
    let metadata = four_range_plan()
        .generate_dmtrials_metadata(tsamp, 4096, 0)
        .unwrap();
    assert_eq!(metadata.size(), 10 + 5 + 5 + 5);

    for (index, trial) in metadata.iter().enumerate() {
        let df = trial.downsampling_factor();
        assert!([1, 2, 4, 8].contains(&df));
        assert_eq!(
            metadata.sampling_interval(index),
            tsamp * df as f64,
            "trial {} at DM {}",
            index,
            trial.dm()
        );
        assert_eq!(metadata.number_of_samples(index), 4096 / df);
    }
    assert_eq!(metadata.total_data_size(), 10 * 4096 + 5 * 2048 + 5 * 1024 + 5 * 512);
}

#[test]
fn test_duration_is_count_times_interval() {
    let tsamp = Seconds::from_micros(64.0);
    let metadata = four_range_plan()
        .generate_dmtrials_metadata(tsamp, 4096, 96)
        .unwrap();
    assert_relative_eq!(metadata.duration().as_secs(), 4000.0 * 64e-6, epsilon = 1e-12);

    let trials = DmTrials::new(Arc::new(metadata), Seconds::from_secs(3.0));
    assert_relative_eq!(trials.end_time().as_secs(), 3.0 + 4000.0 * 64e-6, epsilon = 1e-12);
    for trial in trials.iter() {
        assert_eq!(trial.size(), 4000 / trial.downsampling_factor());
    }
}

#[test]
fn test_equal_trial_lists_compare_equal() {
    let tsamp = Seconds::from_micros(64.0);
    let plan = four_range_plan();
    let a = plan.generate_dmtrials_metadata(tsamp, 4096, 0).unwrap();
    let b = plan.generate_dmtrials_metadata(tsamp, 8192, 0).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.hash(), b.hash());

    let other_interval = plan
        .generate_dmtrials_metadata(Seconds::from_micros(128.0), 4096, 0)
        .unwrap();
    assert_ne!(a, other_interval);

    let mut reordered = DmTrialsMetadata::new(tsamp, 4096);
    for trial in a.iter().rev() {
        reordered.push(trial.dm(), trial.downsampling_factor()).unwrap();
    }
    assert_ne!(a, reordered);
}

#[test]
fn test_downsampling_must_divide_samples() {
    let mut metadata = DmTrialsMetadata::new(Seconds::from_micros(64.0), 4095);
    metadata.push(dm(0.0), 1).unwrap();
    assert!(matches!(
        metadata.push(dm(10.0), 2),
        Err(DdtrError::DownsamplingMismatch { factor: 2, samples: 4095 })
    ));
    assert_eq!(metadata.size(), 1);
}
