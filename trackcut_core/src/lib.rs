//! Sample-accurate audio segmentation with objective quality validation.
//!
//! The engine cuts an in-memory [`AudioBuffer`] into named segments at
//! precise time boundaries and scores each result against a
//! [`QualityProfile`]. Cut points are nudged to zero-crossings, internally
//! adjacent boundaries get an equal-power crossfade, and TPDF dither is
//! applied ahead of any bit-depth reduction. Container decoding and file
//! output belong to calling collaborators; this crate never touches the
//! filesystem.
//!
//! The typical entry point is [`split_with_quality`]:
//!
//! ```no_run
//! use trackcut_core::{split_with_quality, AudioBuffer, SampleFormat, SplitConfig, TimeSpec};
//!
//! # fn demo(samples: Vec<f32>) -> Result<(), trackcut_core::EngineError> {
//! let buffer = AudioBuffer::new(samples, 44_100, 2, SampleFormat::I16)?;
//! let specs = vec![
//!     TimeSpec::new("0:00", "0:05", "intro"),
//!     TimeSpec::new("0:05", "1:30", "verse"),
//! ];
//! let report = split_with_quality(buffer, &specs, &SplitConfig::default())?;
//! for outcome in &report.outcomes {
//!     println!("{}: {:?}", outcome.name, outcome.result.is_ok());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Standalone validation of any buffer goes through [`validate_buffer`].

mod analysis;
mod boundary;
mod buffer;
mod config;
mod crossfade;
mod dither;
mod error;
mod gate;
mod pipeline;
mod plan;
mod profile;
mod timecode;
mod workers;

pub use analysis::{AnalysisConfig, QualityAnalyzer, QualityMetrics};
pub use boundary::{refine_cut_point, DEFAULT_ZERO_CROSSING_WINDOW_MS};
pub use buffer::{AudioBuffer, SampleFormat, SegmentBuffer};
pub use config::{SplitConfig, SplitConfigBuilder};
pub use crossfade::{crossfade_boundary, equal_power_gains, DEFAULT_FADE_MS};
pub use dither::{apply_tpdf_dither, lsb_at};
pub use error::EngineError;
pub use gate::{classify, QualityLevel, QualityReport};
pub use pipeline::{
    split_with_quality, split_with_quality_observed, validate_buffer, ProcessedSegment,
    ProgressEvent, SegmentOutcome, SplitReport, StageTimings,
};
pub use plan::{plan_segments, PlannedSegment, SplitPlan, TimeSpec};
pub use profile::{QualityProfile, Thresholds};
pub use timecode::{format_timecode, parse_timecode, to_sample_index};
pub use workers::{AnalysisPool, JobHandle};
