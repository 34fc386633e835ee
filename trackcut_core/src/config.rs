use std::num::NonZeroUsize;
use std::time::Duration;

use crate::analysis::AnalysisConfig;
use crate::boundary::DEFAULT_ZERO_CROSSING_WINDOW_MS;
use crate::crossfade::DEFAULT_FADE_MS;
use crate::error::EngineError;
use crate::profile::QualityProfile;

/// Configuration for one split request.
///
/// Every tunable of the pipeline lives here and is passed explicitly into
/// each call; the engine reads no ambient or global state.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Crossfade window at internally adjacent cuts. `None` disables
    /// boundary blending.
    pub fade_ms: Option<f64>,
    /// Symmetric zero-crossing search window around each cut point.
    /// Zero disables refinement.
    pub zero_crossing_window_ms: f64,
    /// Target bit depth for TPDF dithering. `None` disables dithering;
    /// targets at or above the source depth are a no-op.
    pub dither_bits: Option<u32>,
    /// Whether each produced segment is analyzed and gated.
    pub quality_validation: bool,
    /// Acceptance profile used by the quality gate.
    pub profile: QualityProfile,
    pub analysis: AnalysisConfig,
    /// Worker threads for segment analysis. One means inline analysis
    /// with no pool.
    pub threads: NonZeroUsize,
    /// Per-segment ceiling on the wait for an analysis result. Applies to
    /// each segment separately so one slow segment cannot starve the
    /// validation of its siblings.
    pub segment_timeout: Option<Duration>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            fade_ms: Some(DEFAULT_FADE_MS),
            zero_crossing_window_ms: DEFAULT_ZERO_CROSSING_WINDOW_MS,
            dither_bits: Some(24),
            quality_validation: true,
            profile: QualityProfile::Professional,
            analysis: AnalysisConfig::default(),
            threads: NonZeroUsize::MIN,
            segment_timeout: None,
        }
    }
}

impl SplitConfig {
    pub fn builder() -> SplitConfigBuilder {
        SplitConfigBuilder {
            config: SplitConfig::default(),
        }
    }
}

/// Builder validating a [`SplitConfig`], mirroring its fields.
#[derive(Debug, Clone)]
pub struct SplitConfigBuilder {
    config: SplitConfig,
}

impl SplitConfigBuilder {
    pub fn fade_ms(mut self, fade_ms: Option<f64>) -> Self {
        self.config.fade_ms = fade_ms;
        self
    }

    pub fn zero_crossing_window_ms(mut self, window_ms: f64) -> Self {
        self.config.zero_crossing_window_ms = window_ms;
        self
    }

    pub fn dither_bits(mut self, bits: Option<u32>) -> Self {
        self.config.dither_bits = bits;
        self
    }

    pub fn quality_validation(mut self, enabled: bool) -> Self {
        self.config.quality_validation = enabled;
        self
    }

    pub fn profile(mut self, profile: QualityProfile) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn analysis(mut self, analysis: AnalysisConfig) -> Self {
        self.config.analysis = analysis;
        self
    }

    pub fn threads(mut self, threads: NonZeroUsize) -> Self {
        self.config.threads = threads;
        self
    }

    pub fn segment_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.segment_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<SplitConfig, EngineError> {
        let config = self.config;

        if let Some(fade_ms) = config.fade_ms {
            if !fade_ms.is_finite() || fade_ms < 0.0 {
                return Err(EngineError::invalid_time(
                    &fade_ms.to_string(),
                    "fade duration must be a finite, non-negative millisecond count",
                ));
            }
        }
        if !config.zero_crossing_window_ms.is_finite() || config.zero_crossing_window_ms < 0.0 {
            return Err(EngineError::invalid_time(
                &config.zero_crossing_window_ms.to_string(),
                "zero-crossing window must be a finite, non-negative millisecond count",
            ));
        }
        if let Some(bits) = config.dither_bits {
            if !(4..=32).contains(&bits) {
                return Err(EngineError::UnsupportedSampleFormat {
                    reason: format!("dither target of {bits} bits is outside 4..=32"),
                });
            }
        }

        Ok(config)
    }
}
