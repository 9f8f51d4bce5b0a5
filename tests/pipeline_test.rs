mod test_signals;

use std::io::Cursor;

use ddtr::config::DedispersionAlgorithm;
use ddtr::data::{TimeFrequency, TimeFrequencyMetadata};
use ddtr::simulation::DispersedPulse;
use ddtr::source::{BlockSource, RawFileSource, spawn_reader};
use ddtr::sps::SpCandidate;
use ddtr::units::{Frequency, Seconds};
use ddtr::{DdtrError, PassResult, SearchPipeline};

/// Spectrum 9800 at the top of the band, in the second pass
const LATE_PULSE_TIME: f64 = 2.5088;
const LATE_PULSE_DM: f64 = 30.0;

fn pulses() -> Vec<DispersedPulse> {
    vec![
        DispersedPulse::new(
            test_signals::PULSE_DM,
            test_signals::PULSE_TIME,
            test_signals::PULSE_AMPLITUDE,
        ),
        DispersedPulse::new(LATE_PULSE_DM, LATE_PULSE_TIME, test_signals::PULSE_AMPLITUDE),
    ]
}

fn strongest<T: ddtr::data::Sample>(result: &PassResult<T>) -> Option<&SpCandidate> {
    result
        .candidates
        .iter()
        .max_by(|a, b| a.sigma().total_cmp(&b.sigma()))
}

#[test]
fn test_stream_from_raw_file() {
    let blocks = test_signals::generate_blocks(&pulses(), 3, 4096, 7);
    let bytes = test_signals::raw_bytes(&blocks);
    let source = RawFileSource::<u8, _>::from_reader(
        Cursor::new(bytes),
        test_signals::test_metadata(),
        3000,
    )
    .unwrap();
    let (mut stream, reader) = spawn_reader(source, 2).unwrap();

    let config = test_signals::search_config(DedispersionAlgorithm::Cpu);
    let mut pipeline = SearchPipeline::<u8>::new(&config).unwrap();
    let mut results = Vec::new();
    while let Some(block) = stream.next_block().unwrap() {
        results.extend(pipeline.push(block).unwrap());
    }
    results.extend(pipeline.finish().unwrap());
    reader.join().unwrap().unwrap();

    assert_eq!(pipeline.passes(), 2);
    assert_eq!(results.len(), 2);
    assert!(results[0].start_time < results[1].start_time);

    let expected = [
        (test_signals::PULSE_DM, test_signals::PULSE_TIME),
        (LATE_PULSE_DM, LATE_PULSE_TIME),
    ];
    for (result, (dm, time)) in results.iter().zip(expected) {
        let best = strongest(result).expect("pulse detected");
        assert_eq!(best.dm().as_pc_cm3(), dm);
        assert!(
            (best.tstart().as_secs() - time).abs() < 2e-3,
            "pulse at {} found at {}",
            time,
            best.tstart()
        );
        for candidate in result.candidates.iter() {
            assert!((candidate.tstart().as_secs() - time).abs() < 0.5);
        }
    }

    let idents: Vec<usize> = results
        .iter()
        .flat_map(|r| r.candidates.iter().map(SpCandidate::ident))
        .collect();
    let mut sorted = idents.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), idents.len(), "identifiers are unique across passes");

    for result in &results {
        let before = config.window.before();
        let after = config.window.after();
        let mut covered = 0;
        for window in result.candidates.data_iter(before, after) {
            let window = window.unwrap();
            assert_eq!(window.data.number_of_channels(), test_signals::NCHANS);
            let first = result.candidates.get(window.candidates.start).unwrap();
            assert!(window.start_time() <= first.tstart());
            assert!(window.data.number_of_spectra() > 0);
            covered += window.candidates.len();
        }
        assert_eq!(covered, result.candidates.len());
    }
}

#[test]
fn test_layout_change_restarts_search() {
    let config = test_signals::search_config(DedispersionAlgorithm::Cpu);
    let mut pipeline = SearchPipeline::<u8>::new(&config).unwrap();

    for block in test_signals::generate_blocks(&[], 2, 4096, 3) {
        pipeline.push(block).unwrap();
    }
    assert_eq!(pipeline.passes(), 1);

    let narrow = TimeFrequencyMetadata::with_linear_channels(
        Seconds::from_secs(10.0),
        Seconds::from_micros(256.0),
        Frequency::from_mhz(400.0),
        -1.0,
        32,
    );
    let block = TimeFrequency::from_vec(narrow, vec![96u8; 32 * 1000]).unwrap();
    let results = pipeline.push(block).unwrap();
    assert!(results.is_empty());

    let layout = pipeline.ddtr().plan().layout().expect("plan configured");
    assert_eq!(layout.number_of_channels(), 32);
    assert_eq!(pipeline.retained_blocks(), 1);
    // A flat block dedisperses but has nothing to find
    let tail = pipeline.finish().unwrap();
    assert_eq!(tail.len(), 1);
    assert!(tail[0].candidates.is_empty());
    assert_eq!(pipeline.passes(), 2);
}

#[test]
fn test_time_gap_searches_pending_data() {
    let config = test_signals::search_config(DedispersionAlgorithm::Cpu);
    let mut pipeline = SearchPipeline::<u8>::new(&config).unwrap();

    for block in test_signals::generate_blocks(&[], 1, 4096, 5) {
        assert!(pipeline.push(block).unwrap().is_empty());
    }
    assert_eq!(pipeline.retained_blocks(), 1);

    let mut later = test_signals::test_metadata();
    later.start_time = Seconds::from_secs(5.0);
    let block = TimeFrequency::from_vec(later, vec![96u8; test_signals::NCHANS * 4096]).unwrap();
    let results = pipeline.push(block).unwrap();

    // The data before the gap is searched on its own
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].start_time, Seconds::ZERO);
    assert_eq!(results[0].spectra, 4096);
    assert_eq!(pipeline.retained_blocks(), 1);

    let tail = pipeline.finish().unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].start_time, Seconds::from_secs(5.0));
    assert_eq!(pipeline.passes(), 2);
    assert_eq!(pipeline.retained_blocks(), 0);
}

#[test]
fn test_invalid_configuration_rejected() {
    let mut config = test_signals::search_config(DedispersionAlgorithm::Cpu);
    config.ddtr.dedispersion_samples = 0;
    assert!(matches!(
        SearchPipeline::<u8>::new(&config),
        Err(DdtrError::Config(_))
    ));

    let mut config = test_signals::search_config(DedispersionAlgorithm::Cpu);
    config.ddtr.dm_ranges.clear();
    assert!(matches!(
        SearchPipeline::<u8>::new(&config),
        Err(DdtrError::EmptyDmPlan)
    ));
}
