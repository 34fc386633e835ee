use thiserror::Error;

/// Errors that can occur while planning, cutting, or validating audio.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Error returned when a textual timecode cannot be parsed.
    #[error("invalid time format '{input}': {reason}")]
    InvalidTimeFormat { input: String, reason: String },

    /// Error returned when a requested segment does not fit the buffer.
    #[error("segment '{name}' out of range: {detail}")]
    SegmentOutOfRange { name: String, detail: String },

    /// Error returned when two requested segments overlap.
    ///
    /// Overlap is ambiguous intent and is rejected rather than silently
    /// resolved; the caller must correct the request.
    #[error("segments '{first}' and '{second}' overlap")]
    OverlappingSegments { first: String, second: String },

    /// Error returned when two segments in one request share a name.
    #[error("duplicate segment name '{name}'")]
    DuplicateSegmentName { name: String },

    /// Error returned when a buffer or target format cannot be processed.
    #[error("unsupported sample format: {reason}")]
    UnsupportedSampleFormat { reason: String },

    /// Error returned when quality analysis is undefined for the input,
    /// such as an all-silent buffer.
    #[error("analysis failed: {reason}")]
    AnalysisFailure { reason: String },

    /// Error returned when the analysis worker pool queue is full.
    #[error("analysis worker pool is at capacity")]
    Busy,
}

impl EngineError {
    pub(crate) fn invalid_time(input: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidTimeFormat {
            input: input.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn out_of_range(name: &str, detail: impl Into<String>) -> Self {
        EngineError::SegmentOutOfRange {
            name: name.to_owned(),
            detail: detail.into(),
        }
    }

    pub(crate) fn analysis(reason: impl Into<String>) -> Self {
        EngineError::AnalysisFailure {
            reason: reason.into(),
        }
    }
}
