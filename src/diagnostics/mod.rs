//! Serializable summaries of a demodulation run.
//!
//! [`DemodReport`] is what the demo tool writes next to its images: input
//! size, the seed, traversal counters and a [`TimingBreakdown`] per stage.

pub mod report;
pub mod timing;

pub use report::{DemodReport, QualitySummary};
pub use timing::{StageTiming, TimingBreakdown};
