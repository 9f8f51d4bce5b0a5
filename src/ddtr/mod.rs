//! Dedispersion: strategies, the plan that owns them and the engine that
//! drives them range by range

pub mod cpu;
pub mod engine;
pub mod klotski;
pub mod plan;
pub mod strategy;
pub mod tiling;
pub mod work;

pub use cpu::CpuStrategy;
pub use engine::{Ddtr, DdtrProcessor};
pub use klotski::KlotskiStrategy;
pub use plan::DedispersionPlan;
pub use strategy::{ChunkLayout, DedispersionStrategy, StrategyCommon};
pub use tiling::ShiftPolicy;
pub use work::WorkingBuffer;
