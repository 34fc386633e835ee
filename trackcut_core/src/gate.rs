//! Verdict classification of measured metrics against a profile.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::analysis::QualityMetrics;
use crate::profile::QualityProfile;

/// Margin steps a metric must clear past its profile threshold to grade
/// above `Acceptable`.
const SNR_STEP_DB: f64 = 10.0;
const THDN_STEP_DB: f64 = 10.0;
const DYNAMIC_RANGE_STEP_PCT: f64 = 5.0;

/// Overall verdict for one analyzed buffer.
///
/// Variants are ordered worst to best, so the smaller of two levels is the
/// stricter verdict. `Poor` and `Failed` are ordinary results carrying a
/// negative verdict, not errors; what to do about them belongs to the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Failed,
    Poor,
    Acceptable,
    Good,
    Excellent,
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityLevel::Failed => "failed",
            QualityLevel::Poor => "poor",
            QualityLevel::Acceptable => "acceptable",
            QualityLevel::Good => "good",
            QualityLevel::Excellent => "excellent",
        };
        f.write_str(name)
    }
}

impl FromStr for QualityLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "failed" => Ok(QualityLevel::Failed),
            "poor" => Ok(QualityLevel::Poor),
            "acceptable" => Ok(QualityLevel::Acceptable),
            "good" => Ok(QualityLevel::Good),
            "excellent" => Ok(QualityLevel::Excellent),
            other => Err(format!("unknown quality level '{other}'")),
        }
    }
}

/// A quality report: the measured metrics plus the derived verdict.
///
/// Serializes as one flat record so collaborators can persist or display
/// it without unpacking.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    #[serde(flatten)]
    pub metrics: QualityMetrics,
    pub level: QualityLevel,
}

/// Classify measured metrics against a profile.
///
/// The verdict is the worst of the three principal metrics, each graded
/// against its profile threshold: failing the threshold is `Poor`, and
/// passing grades upward in fixed margin steps. Detected clipping is
/// catastrophic and forces `Failed` regardless of the metrics.
pub fn classify(metrics: &QualityMetrics, profile: &QualityProfile) -> QualityLevel {
    if metrics.clipping_detected {
        return QualityLevel::Failed;
    }

    let thresholds = profile.thresholds();
    let snr = grade_margin(metrics.snr_db - thresholds.min_snr_db, SNR_STEP_DB);
    let thdn = grade_margin(thresholds.max_thdn_db - metrics.thdn_db, THDN_STEP_DB);
    let dynamic_range = grade_margin(
        metrics.dynamic_range_pct - thresholds.min_dynamic_range_pct,
        DYNAMIC_RANGE_STEP_PCT,
    );

    snr.min(thdn).min(dynamic_range)
}

/// Score and attach the verdict in one step.
pub fn report(metrics: QualityMetrics, profile: &QualityProfile) -> QualityReport {
    let level = classify(&metrics, profile);
    QualityReport { metrics, level }
}

fn grade_margin(margin: f64, step: f64) -> QualityLevel {
    if margin < 0.0 {
        QualityLevel::Poor
    } else if margin >= 2.0 * step {
        QualityLevel::Excellent
    } else if margin >= step {
        QualityLevel::Good
    } else {
        QualityLevel::Acceptable
    }
}
