use std::collections::HashSet;

use log::debug;

use crate::error::EngineError;
use crate::timecode::{format_timecode, parse_timecode, to_sample_index};

/// A requested segment: textual start and end timecodes plus a name.
///
/// Accepted timecode shapes are `SS[.frac]`, `MM:SS[.frac]`, and
/// `HH:MM:SS[.frac]`. Names must be non-empty and unique within one split
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSpec {
    pub start: String,
    pub end: String,
    pub name: String,
}

impl TimeSpec {
    pub fn new(
        start: impl Into<String>,
        end: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            name: name.into(),
        }
    }
}

/// A resolved, validated segment range in sample indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSegment {
    pub start_sample: usize,
    pub end_sample: usize,
    pub name: String,
}

impl PlannedSegment {
    pub fn len_frames(&self) -> usize {
        self.end_sample - self.start_sample
    }
}

/// An ordered, non-overlapping split plan for one buffer.
///
/// Segments are sorted by start sample regardless of the order they were
/// requested in; every later stage and the final report follow this order.
#[derive(Debug, Clone)]
pub struct SplitPlan {
    segments: Vec<PlannedSegment>,
    sample_rate: u32,
}

impl SplitPlan {
    pub fn segments(&self) -> &[PlannedSegment] {
        &self.segments
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Resolve and validate a set of [`TimeSpec`]s against a buffer.
///
/// All planning errors are fail-fast: the entire request is rejected before
/// any sample data is touched, so a malformed plan never produces partial
/// output. Overlapping ranges are rejected rather than silently resolved.
pub fn plan_segments(
    buffer_frames: usize,
    sample_rate: u32,
    specs: &[TimeSpec],
) -> Result<SplitPlan, EngineError> {
    let mut seen_names = HashSet::new();
    let mut segments = Vec::with_capacity(specs.len());

    for spec in specs {
        if spec.name.trim().is_empty() {
            return Err(EngineError::invalid_time(
                &spec.name,
                "segment name cannot be empty",
            ));
        }
        if !seen_names.insert(spec.name.as_str()) {
            return Err(EngineError::DuplicateSegmentName {
                name: spec.name.clone(),
            });
        }

        let start_seconds = parse_timecode(&spec.start)?;
        let end_seconds = parse_timecode(&spec.end)?;
        if end_seconds <= start_seconds {
            return Err(EngineError::out_of_range(
                &spec.name,
                format!("end '{}' is not after start '{}'", spec.end, spec.start),
            ));
        }

        let start_sample = to_sample_index(start_seconds, sample_rate);
        let end_sample = to_sample_index(end_seconds, sample_rate);
        if end_sample > buffer_frames {
            return Err(EngineError::out_of_range(
                &spec.name,
                format!(
                    "end {} is past the buffer end {}",
                    format_timecode(end_sample, sample_rate),
                    format_timecode(buffer_frames, sample_rate),
                ),
            ));
        }
        if end_sample == start_sample {
            return Err(EngineError::out_of_range(
                &spec.name,
                "range collapses to zero samples at this sample rate",
            ));
        }

        segments.push(PlannedSegment {
            start_sample,
            end_sample,
            name: spec.name.clone(),
        });
    }

    segments.sort_by_key(|segment| segment.start_sample);

    for pair in segments.windows(2) {
        if pair[1].start_sample < pair[0].end_sample {
            return Err(EngineError::OverlappingSegments {
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }
    }

    debug!(
        "planned {} segment(s) over {} frames at {} Hz",
        segments.len(),
        buffer_frames,
        sample_rate
    );

    Ok(SplitPlan {
        segments,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(start: &str, end: &str, name: &str) -> TimeSpec {
        TimeSpec::new(start, end, name)
    }

    #[test]
    fn resolves_and_sorts_by_start_sample() {
        let specs = [spec("0:05", "0:10", "b"), spec("0:00", "0:05", "a")];
        let plan = plan_segments(441_000, 44_100, &specs).unwrap();

        let names: Vec<_> = plan.segments().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(plan.segments()[0].len_frames(), 5 * 44_100);
        assert_eq!(plan.segments()[1].len_frames(), 5 * 44_100);
    }

    #[test]
    fn segment_length_matches_rounded_duration() {
        let plan = plan_segments(
            1_000_000,
            44_100,
            &[spec("1.2345", "2.2345", "one_second")],
        )
        .unwrap();
        let frames = plan.segments()[0].len_frames() as i64;
        assert!((frames - 44_100).abs() <= 1);
    }

    #[test]
    fn rejects_overlapping_segments() {
        let specs = [spec("0:00", "0:06", "a"), spec("0:05", "0:10", "b")];
        let err = plan_segments(441_000, 44_100, &specs).unwrap_err();
        assert!(matches!(
            err,
            EngineError::OverlappingSegments { ref first, ref second }
                if first == "a" && second == "b"
        ));
    }

    #[test]
    fn touching_segments_are_not_overlap() {
        let specs = [spec("0:00", "0:05", "a"), spec("0:05", "0:10", "b")];
        assert!(plan_segments(441_000, 44_100, &specs).is_ok());
    }

    #[test]
    fn rejects_duplicate_names() {
        let specs = [spec("0", "1", "same"), spec("2", "3", "same")];
        let err = plan_segments(441_000, 44_100, &specs).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DuplicateSegmentName { ref name } if name == "same"
        ));
    }

    #[test]
    fn rejects_empty_names() {
        let err = plan_segments(441_000, 44_100, &[spec("0", "1", "  ")]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimeFormat { .. }));
    }

    #[test]
    fn rejects_ranges_past_the_buffer() {
        let err = plan_segments(44_100, 44_100, &[spec("0", "2", "long")]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::SegmentOutOfRange { ref name, .. } if name == "long"
        ));
    }

    #[test]
    fn rejects_inverted_and_empty_ranges() {
        assert!(plan_segments(441_000, 44_100, &[spec("5", "5", "x")]).is_err());
        assert!(plan_segments(441_000, 44_100, &[spec("6", "5", "x")]).is_err());
    }

    #[test]
    fn bad_timecode_fails_before_any_processing() {
        let err = plan_segments(441_000, 44_100, &[spec("zero", "5", "x")]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimeFormat { .. }));
    }
}
