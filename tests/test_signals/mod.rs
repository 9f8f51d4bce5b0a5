pub mod generate;

#[allow(unused_imports)]
pub use generate::{
    NCHANS, PULSE_AMPLITUDE, PULSE_DM, PULSE_TIME, generate_blocks, raw_bytes, search_config,
    test_metadata,
};
