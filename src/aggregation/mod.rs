pub mod buffer;
pub mod filler;

pub use buffer::AggregationBuffer;
pub use filler::AggregationBufferFiller;
