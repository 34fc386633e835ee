use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Concrete acceptance thresholds a profile resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    /// Minimum signal-to-noise ratio in dB.
    pub min_snr_db: f64,
    /// Maximum THD+N in dB (more negative is stricter).
    pub max_thdn_db: f64,
    /// Minimum dynamic range percentage.
    pub min_dynamic_range_pct: f64,
}

/// Named acceptance profile selecting a threshold set.
///
/// The built-in tiers are strictly ordered: `Studio` is never weaker than
/// `Professional`, which is never weaker than `Standard`, which is never
/// weaker than `Basic`. `Custom` carries caller-supplied thresholds and is
/// exempt from the ordering.
#[derive(Debug, Clone, PartialEq)]
pub enum QualityProfile {
    Studio,
    Professional,
    Standard,
    Basic,
    Custom(Thresholds),
}

impl QualityProfile {
    /// Resolve the profile to concrete thresholds.
    pub fn thresholds(&self) -> Thresholds {
        match self {
            QualityProfile::Studio => Thresholds {
                min_snr_db: 100.0,
                max_thdn_db: -80.0,
                min_dynamic_range_pct: 90.0,
            },
            QualityProfile::Professional => Thresholds {
                min_snr_db: 90.0,
                max_thdn_db: -60.0,
                min_dynamic_range_pct: 85.0,
            },
            QualityProfile::Standard => Thresholds {
                min_snr_db: 70.0,
                max_thdn_db: -40.0,
                min_dynamic_range_pct: 75.0,
            },
            QualityProfile::Basic => Thresholds {
                min_snr_db: 60.0,
                max_thdn_db: -30.0,
                min_dynamic_range_pct: 60.0,
            },
            QualityProfile::Custom(thresholds) => *thresholds,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QualityProfile::Studio => "studio",
            QualityProfile::Professional => "professional",
            QualityProfile::Standard => "standard",
            QualityProfile::Basic => "basic",
            QualityProfile::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QualityProfile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "studio" => Ok(QualityProfile::Studio),
            "professional" => Ok(QualityProfile::Professional),
            "standard" => Ok(QualityProfile::Standard),
            "basic" => Ok(QualityProfile::Basic),
            other => Err(format!(
                "unknown quality profile '{other}' (expected studio, professional, standard, or basic)"
            )),
        }
    }
}
