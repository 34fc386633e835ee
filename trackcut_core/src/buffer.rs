use serde::Serialize;

use crate::error::EngineError;

/// Sample format of the source material a buffer was decoded from.
///
/// Samples are always held as `f32` normalized to ±1.0 full scale; the
/// format tag records the effective bit depth, which drives dithering
/// decisions and the dynamic-range headroom used during analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    I16,
    I24,
    F32,
}

impl SampleFormat {
    /// Effective bit depth of the format.
    pub fn bit_depth(self) -> u32 {
        match self {
            SampleFormat::I16 => 16,
            SampleFormat::I24 => 24,
            SampleFormat::F32 => 32,
        }
    }

    /// Theoretical dynamic range of the format in dB.
    ///
    /// `f32` is treated at its 24-bit mantissa precision, which is what
    /// survives a trip through any integer delivery format.
    pub fn dynamic_range_db(self) -> f64 {
        let bits = match self {
            SampleFormat::F32 => 24,
            other => other.bit_depth(),
        };
        6.020_599_913_279_624 * f64::from(bits)
    }
}

/// An in-memory, interleaved multi-channel sample buffer.
///
/// The decoding collaborator creates one of these; the split pipeline owns
/// it exclusively for the duration of a request and derives per-segment
/// buffers from it.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    format: SampleFormat,
}

impl AudioBuffer {
    /// Construct a buffer, validating the channel layout invariant.
    pub fn new(
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
        format: SampleFormat,
    ) -> Result<Self, EngineError> {
        if sample_rate == 0 {
            return Err(EngineError::UnsupportedSampleFormat {
                reason: "sample rate must be positive".to_owned(),
            });
        }
        if channels == 0 {
            return Err(EngineError::UnsupportedSampleFormat {
                reason: "channel count must be at least one".to_owned(),
            });
        }
        if samples.len() % channels as usize != 0 {
            return Err(EngineError::UnsupportedSampleFormat {
                reason: format!(
                    "sample count {} is not a multiple of the channel count {}",
                    samples.len(),
                    channels
                ),
            });
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
            format,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub(crate) fn set_format(&mut self, format: SampleFormat) {
        self.format = format;
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Average all channels into a single representative signal.
    ///
    /// Cut-point refinement and spectral analysis operate on this mix so
    /// every channel is cut at the same frame, preserving inter-channel
    /// phase alignment.
    pub fn mono_mix(&self) -> Vec<f32> {
        let channels = self.channels as usize;
        if channels == 1 {
            return self.samples.clone();
        }

        let scale = 1.0 / channels as f32;
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect()
    }

    /// Copy the frame range `[start, end)` into a new buffer.
    ///
    /// Callers must keep `start <= end <= frames()`; the planner enforces
    /// this for every cut it emits.
    pub fn slice_frames(&self, start: usize, end: usize) -> AudioBuffer {
        let channels = self.channels as usize;
        let samples = self.samples[start * channels..end * channels].to_vec();
        AudioBuffer {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
            format: self.format,
        }
    }
}

/// A derived segment buffer together with its user-assigned name.
#[derive(Debug, Clone)]
pub struct SegmentBuffer {
    pub name: String,
    pub audio: AudioBuffer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_ragged_channel_layout() {
        let err = AudioBuffer::new(vec![0.0; 5], 44_100, 2, SampleFormat::F32).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedSampleFormat { .. }));
    }

    #[test]
    fn new_rejects_zero_rate_and_zero_channels() {
        assert!(AudioBuffer::new(vec![], 0, 1, SampleFormat::F32).is_err());
        assert!(AudioBuffer::new(vec![], 48_000, 0, SampleFormat::F32).is_err());
    }

    #[test]
    fn mono_mix_averages_channels_per_frame() {
        let buffer =
            AudioBuffer::new(vec![1.0, -1.0, 0.5, 0.5], 48_000, 2, SampleFormat::F32).unwrap();
        assert_eq!(buffer.mono_mix(), vec![0.0, 0.5]);
    }

    #[test]
    fn slice_frames_copies_all_channels() {
        let buffer = AudioBuffer::new(
            vec![0.0, 0.1, 1.0, 1.1, 2.0, 2.1],
            48_000,
            2,
            SampleFormat::I16,
        )
        .unwrap();
        let slice = buffer.slice_frames(1, 3);
        assert_eq!(slice.frames(), 2);
        assert_eq!(slice.samples(), &[1.0, 1.1, 2.0, 2.1]);
        assert_eq!(slice.format(), SampleFormat::I16);
    }
}
