//! The per-request split pipeline.
//!
//! One invocation owns its input buffer exclusively: plan, refine every
//! cut point, extract the segment buffers, blend internally adjacent
//! boundaries, dither, then analyze and gate each segment. Planning
//! errors reject the whole request before any sample is touched;
//! per-segment anomalies after a valid plan are reported in that
//! segment's outcome without aborting its siblings.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::analysis::{AnalysisConfig, QualityAnalyzer};
use crate::boundary::refine_cut_point;
use crate::buffer::{AudioBuffer, SegmentBuffer};
use crate::config::SplitConfig;
use crate::crossfade::{crossfade_boundary, fade_frames_for};
use crate::dither::apply_tpdf_dither;
use crate::error::EngineError;
use crate::gate::{self, QualityReport};
use crate::plan::{plan_segments, SplitPlan, TimeSpec};
use crate::profile::QualityProfile;
use crate::workers::{AnalysisPool, JobHandle};

/// Progress notifications emitted while a split request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Start { total_segments: usize },
    /// A segment buffer has been cut and conditioned (not yet analyzed).
    Segment { index: usize, name: String },
    Finish,
}

/// Wall-clock time spent in each stage for one segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageTimings {
    pub refine: Duration,
    pub crossfade: Duration,
    pub dither: Duration,
    pub analysis: Duration,
}

/// A successfully produced segment.
#[derive(Debug, Clone)]
pub struct ProcessedSegment {
    pub segment: SegmentBuffer,
    /// `None` when quality validation was disabled for the request.
    pub report: Option<QualityReport>,
    pub timings: StageTimings,
}

/// Result record for one planned segment, in plan order.
#[derive(Debug)]
pub struct SegmentOutcome {
    pub name: String,
    pub start_sample: usize,
    pub end_sample: usize,
    pub result: Result<ProcessedSegment, EngineError>,
}

/// Everything one split request produced.
#[derive(Debug)]
pub struct SplitReport {
    pub sample_rate: u32,
    pub outcomes: Vec<SegmentOutcome>,
}

impl SplitReport {
    pub fn processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.processed()
    }
}

/// Score a single buffer against a profile without splitting it.
pub fn validate_buffer(
    buffer: &AudioBuffer,
    profile: &QualityProfile,
    analysis: &AnalysisConfig,
) -> Result<QualityReport, EngineError> {
    let analyzer = QualityAnalyzer::new(analysis.clone());
    let metrics = analyzer.analyze(buffer)?;
    Ok(gate::report(metrics, profile))
}

/// Split `buffer` into the requested segments and validate each one.
pub fn split_with_quality(
    buffer: AudioBuffer,
    specs: &[TimeSpec],
    config: &SplitConfig,
) -> Result<SplitReport, EngineError> {
    split_with_quality_observed(buffer, specs, config, |_| {})
}

/// [`split_with_quality`] with a progress callback.
pub fn split_with_quality_observed(
    buffer: AudioBuffer,
    specs: &[TimeSpec],
    config: &SplitConfig,
    mut on_event: impl FnMut(ProgressEvent),
) -> Result<SplitReport, EngineError> {
    let plan = plan_segments(buffer.frames(), buffer.sample_rate(), specs)?;
    on_event(ProgressEvent::Start {
        total_segments: plan.len(),
    });

    let mut timings = vec![StageTimings::default(); plan.len()];
    let cuts = refine_plan(&buffer, &plan, config, &mut timings);

    // Cut, then condition the boundaries and word length.
    let mut buffers: Vec<AudioBuffer> = cuts
        .iter()
        .map(|&(start, end)| buffer.slice_frames(start, end))
        .collect();
    drop(buffer);

    if let Some(fade_ms) = config.fade_ms {
        blend_adjacent_boundaries(&plan, &mut buffers, fade_ms, &mut timings);
    }

    if let Some(target_bits) = config.dither_bits {
        let mut rng = rand::thread_rng();
        for (index, segment) in buffers.iter_mut().enumerate() {
            timed(&mut timings[index].dither, || {
                apply_tpdf_dither(segment, target_bits, &mut rng)
            });
        }
    }

    for (index, segment) in plan.segments().iter().enumerate() {
        on_event(ProgressEvent::Segment {
            index,
            name: segment.name.clone(),
        });
    }

    let reports = if config.quality_validation {
        analyze_segments(&buffers, config, &mut timings)
    } else {
        buffers.iter().map(|_| None).collect()
    };

    let outcomes = plan
        .segments()
        .iter()
        .zip(buffers)
        .zip(reports)
        .zip(&timings)
        .map(|(((planned, audio), report), &segment_timings)| {
            let result = match report {
                Some(Err(error)) => Err(error),
                Some(Ok(report)) => Ok(ProcessedSegment {
                    segment: SegmentBuffer {
                        name: planned.name.clone(),
                        audio,
                    },
                    report: Some(report),
                    timings: segment_timings,
                }),
                None => Ok(ProcessedSegment {
                    segment: SegmentBuffer {
                        name: planned.name.clone(),
                        audio,
                    },
                    report: None,
                    timings: segment_timings,
                }),
            };
            SegmentOutcome {
                name: planned.name.clone(),
                start_sample: planned.start_sample,
                end_sample: planned.end_sample,
                result,
            }
        })
        .collect();

    on_event(ProgressEvent::Finish);

    let report = SplitReport {
        sample_rate: plan.sample_rate(),
        outcomes,
    };
    info!(
        "split produced {} segment(s), {} failed",
        report.processed(),
        report.failed()
    );
    Ok(report)
}

/// Refine every cut point of the plan against the mono mix.
///
/// Internally adjacent segments share one refined cut so both sides meet
/// at the same frame. A refinement that would collapse a segment falls
/// back to the nominal indices.
fn refine_plan(
    buffer: &AudioBuffer,
    plan: &SplitPlan,
    config: &SplitConfig,
    timings: &mut [StageTimings],
) -> Vec<(usize, usize)> {
    let mono = buffer.mono_mix();
    let window_ms = config.zero_crossing_window_ms;
    let rate = buffer.sample_rate();

    let mut cuts = Vec::with_capacity(plan.len());
    let mut previous: Option<(usize, usize)> = None;
    for (index, segment) in plan.segments().iter().enumerate() {
        let (start, end) = timed(&mut timings[index].refine, || {
            let start = match previous {
                Some((nominal_end, refined_end)) if nominal_end == segment.start_sample => {
                    refined_end
                }
                _ => refine_cut_point(&mono, rate, segment.start_sample, window_ms),
            };
            let end = refine_cut_point(&mono, rate, segment.end_sample, window_ms);
            if start < end {
                (start, end)
            } else {
                warn!(
                    "refinement collapsed segment '{}', keeping nominal cut points",
                    segment.name
                );
                (segment.start_sample, segment.end_sample)
            }
        });
        previous = Some((segment.end_sample, end));
        cuts.push((start, end));
    }
    cuts
}

/// Equal-power blend at every pair of internally adjacent cuts.
fn blend_adjacent_boundaries(
    plan: &SplitPlan,
    buffers: &mut [AudioBuffer],
    fade_ms: f64,
    timings: &mut [StageTimings],
) {
    for index in 1..buffers.len() {
        let adjacent =
            plan.segments()[index - 1].end_sample == plan.segments()[index].start_sample;
        if !adjacent {
            continue;
        }
        let (head, tail) = buffers.split_at_mut(index);
        let outgoing = &mut head[index - 1];
        let incoming = &mut tail[0];
        // Both sides use the same window so the transition is symmetric.
        let fade_frames = fade_frames_for(outgoing, fade_ms).min(fade_frames_for(incoming, fade_ms));
        timed(&mut timings[index - 1].crossfade, || {
            crossfade_boundary(outgoing, incoming, fade_frames);
        });
    }
}

/// Analyze every segment, inline or through the bounded worker pool.
fn analyze_segments(
    buffers: &[AudioBuffer],
    config: &SplitConfig,
    timings: &mut [StageTimings],
) -> Vec<Option<Result<QualityReport, EngineError>>> {
    let analyzer = QualityAnalyzer::new(config.analysis.clone());

    if config.threads.get() == 1 {
        return buffers
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                Some(timed(&mut timings[index].analysis, || {
                    analyzer
                        .analyze(segment)
                        .map(|metrics| gate::report(metrics, &config.profile))
                }))
            })
            .collect();
    }

    let pool = AnalysisPool::new(
        config.threads,
        config.threads.get() * 2,
        analyzer,
        config.profile.clone(),
    );
    let mut results: Vec<Option<Result<QualityReport, EngineError>>> =
        (0..buffers.len()).map(|_| None).collect();
    let mut pending: VecDeque<(usize, JobHandle, Instant)> = VecDeque::new();

    for (index, segment) in buffers.iter().enumerate() {
        loop {
            match pool.try_submit(segment.clone()) {
                Ok(handle) => {
                    pending.push_back((index, handle, Instant::now()));
                    break;
                }
                Err(EngineError::Busy) => {
                    // Queue full: drain the oldest outstanding job before
                    // retrying, keeping submission bounded.
                    let Some((finished, handle, submitted)) = pending.pop_front() else {
                        results[index] = Some(Err(EngineError::Busy));
                        break;
                    };
                    results[finished] = Some(handle.wait(config.segment_timeout));
                    timings[finished].analysis = submitted.elapsed();
                }
                Err(other) => {
                    results[index] = Some(Err(other));
                    break;
                }
            }
        }
    }
    for (index, handle, submitted) in pending {
        results[index] = Some(handle.wait(config.segment_timeout));
        timings[index].analysis = submitted.elapsed();
    }

    results
}

/// Record the wall-clock cost of a stage while forwarding its result.
fn timed<T>(slot: &mut Duration, stage: impl FnOnce() -> T) -> T {
    let started = Instant::now();
    let result = stage();
    *slot += started.elapsed();
    result
}
