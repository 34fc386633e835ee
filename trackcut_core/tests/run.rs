use std::num::NonZeroUsize;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trackcut_core::{
    split_with_quality, split_with_quality_observed, validate_buffer, AnalysisConfig, AudioBuffer,
    EngineError, ProgressEvent, QualityAnalyzer, QualityLevel, QualityProfile, SampleFormat,
    SplitConfig, Thresholds, TimeSpec,
};

/// Synthesize an in-memory sine buffer; no fixture files are needed since
/// the engine operates purely on decoded sample data.
fn sine_buffer(sample_rate: u32, seconds: f64, hz: f32, amplitude: f32) -> AudioBuffer {
    let frames = (f64::from(sample_rate) * seconds).round() as usize;
    let samples = (0..frames)
        .map(|n| (n as f32 / sample_rate as f32 * std::f32::consts::TAU * hz).sin() * amplitude)
        .collect();
    AudioBuffer::new(samples, sample_rate, 1, SampleFormat::F32).unwrap()
}

/// A sine with white noise of a known power, for SNR verification.
///
/// The noise source sums twelve uniforms per sample, which is Gaussian to
/// a very good approximation with exactly unit variance before scaling.
fn noisy_sine_buffer(
    sample_rate: u32,
    seconds: f64,
    hz: f32,
    amplitude: f32,
    noise_sigma: f32,
) -> AudioBuffer {
    let mut rng = StdRng::seed_from_u64(0x7261636b);
    let frames = (f64::from(sample_rate) * seconds).round() as usize;
    let samples = (0..frames)
        .map(|n| {
            let tone = (n as f32 / sample_rate as f32 * std::f32::consts::TAU * hz).sin()
                * amplitude;
            let gaussian: f32 =
                (0..12).map(|_| rng.gen_range(0.0f32..1.0)).sum::<f32>() - 6.0;
            tone + gaussian * noise_sigma
        })
        .collect();
    AudioBuffer::new(samples, sample_rate, 1, SampleFormat::F32).unwrap()
}

fn lenient_profile() -> QualityProfile {
    QualityProfile::Custom(Thresholds {
        min_snr_db: 20.0,
        max_thdn_db: -10.0,
        min_dynamic_range_pct: 10.0,
    })
}

#[test]
fn run_splits_ten_seconds_into_two_named_halves() {
    let buffer = sine_buffer(44_100, 10.0, 440.0, 0.5);
    let specs = [
        TimeSpec::new("0:00", "0:05", "a"),
        TimeSpec::new("0:05", "0:10", "b"),
    ];
    // Refinement off so the cut lands exactly on the nominal samples.
    let config = SplitConfig::builder()
        .zero_crossing_window_ms(0.0)
        .profile(lenient_profile())
        .build()
        .unwrap();

    let report = split_with_quality(buffer, &specs, &config).unwrap();

    assert_eq!(report.outcomes.len(), 2);
    let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["a", "b"], "plan order is by start sample");
    for outcome in &report.outcomes {
        let processed = outcome.result.as_ref().unwrap();
        assert_eq!(processed.segment.audio.frames(), 5 * 44_100);
        let quality = processed.report.as_ref().unwrap();
        assert!(quality.level >= QualityLevel::Acceptable, "{:?}", quality);
    }
}

#[test]
fn run_rejects_overlap_before_processing_any_audio() {
    let buffer = sine_buffer(44_100, 10.0, 440.0, 0.5);
    let specs = [
        TimeSpec::new("0:00", "0:06", "a"),
        TimeSpec::new("0:05", "0:10", "b"),
    ];

    let err = split_with_quality(buffer, &specs, &SplitConfig::default()).unwrap_err();
    assert!(matches!(err, EngineError::OverlappingSegments { .. }));
}

#[test]
fn run_reports_requested_order_independent_output_order() {
    let buffer = sine_buffer(44_100, 10.0, 440.0, 0.5);
    let specs = [
        TimeSpec::new("0:05", "0:10", "late"),
        TimeSpec::new("0:00", "0:05", "early"),
    ];
    let config = SplitConfig::builder()
        .quality_validation(false)
        .build()
        .unwrap();

    let report = split_with_quality(buffer, &specs, &config).unwrap();
    let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["early", "late"]);
}

#[test]
fn run_refines_cuts_toward_zero_crossings() {
    let buffer = sine_buffer(44_100, 4.0, 441.0, 0.5);
    // 1.0005 s is mid-cycle for a 441 Hz tone; the refined cut must land
    // where the mono signal changes sign.
    let specs = [TimeSpec::new("0", "1.0005", "head")];
    let config = SplitConfig::builder()
        .fade_ms(None)
        .profile(lenient_profile())
        .build()
        .unwrap();

    let report = split_with_quality(buffer.clone(), &specs, &config).unwrap();
    let processed = report.outcomes[0].result.as_ref().unwrap();
    let cut = processed.segment.audio.frames();
    assert_ne!(cut, 44_122, "nominal cut should have moved");

    // The refiner picks an index whose sign differs from its successor.
    let mono = buffer.mono_mix();
    let crossing = mono[cut] == 0.0 || (mono[cut] < 0.0) != (mono[cut + 1] < 0.0);
    assert!(crossing, "cut at {cut} is not a zero-crossing");
}

#[test]
fn run_emits_progress_events_in_order() {
    let buffer = sine_buffer(44_100, 2.0, 440.0, 0.5);
    let specs = [
        TimeSpec::new("0", "1", "one"),
        TimeSpec::new("1", "2", "two"),
    ];
    let config = SplitConfig::builder()
        .quality_validation(false)
        .build()
        .unwrap();

    let mut events = Vec::new();
    split_with_quality_observed(buffer, &specs, &config, |event| events.push(event)).unwrap();

    assert_eq!(events.first(), Some(&ProgressEvent::Start { total_segments: 2 }));
    assert_eq!(events.last(), Some(&ProgressEvent::Finish));
    let segment_names: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Segment { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(segment_names, ["one", "two"]);
}

#[test]
fn run_survives_a_silent_segment_without_aborting_siblings() {
    let sample_rate = 44_100;
    let mut samples = sine_buffer(sample_rate, 2.0, 440.0, 0.5).samples().to_vec();
    // Second half silent: analysis of it must fail, the first must not.
    for sample in &mut samples[sample_rate as usize..] {
        *sample = 0.0;
    }
    let buffer = AudioBuffer::new(samples, sample_rate, 1, SampleFormat::F32).unwrap();
    let specs = [
        TimeSpec::new("0", "1", "tone"),
        TimeSpec::new("1", "2", "silence"),
    ];
    let config = SplitConfig::builder()
        .fade_ms(None)
        .zero_crossing_window_ms(0.0)
        .profile(lenient_profile())
        .build()
        .unwrap();

    let report = split_with_quality(buffer, &specs, &config).unwrap();

    assert_eq!(report.processed(), 1);
    assert_eq!(report.failed(), 1);
    assert!(report.outcomes[0].result.is_ok());
    assert!(matches!(
        report.outcomes[1].result,
        Err(EngineError::AnalysisFailure { .. })
    ));
}

#[test]
fn run_with_worker_pool_matches_inline_results() {
    let buffer = sine_buffer(44_100, 8.0, 440.0, 0.5);
    let specs: Vec<TimeSpec> = (0..8)
        .map(|n| TimeSpec::new(n.to_string(), (n + 1).to_string(), format!("part{n}")))
        .collect();
    let config = SplitConfig::builder()
        .threads(NonZeroUsize::new(4).unwrap())
        .profile(lenient_profile())
        .build()
        .unwrap();

    let report = split_with_quality(buffer, &specs, &config).unwrap();

    assert_eq!(report.processed(), 8);
    for outcome in &report.outcomes {
        let quality = outcome.result.as_ref().unwrap().report.as_ref().unwrap();
        assert!(quality.metrics.snr_db > 40.0);
    }
}

#[test]
fn snr_measurement_tracks_the_analytic_value() {
    let sample_rate = 44_100;
    // Bin-centered tone for the default 8192-sample analysis frame.
    let hz = 150.0 * sample_rate as f32 / 8_192.0;
    let amplitude = 0.5f64;
    let sigma = 0.005f64;
    let buffer = noisy_sine_buffer(sample_rate, 2.0, hz, amplitude as f32, sigma as f32);

    let analyzer = QualityAnalyzer::default();
    let metrics = analyzer.analyze(&buffer).unwrap();

    let expected = 10.0 * (amplitude.powi(2) / 2.0 / sigma.powi(2)).log10();
    assert!(
        (metrics.snr_db - expected).abs() <= 1.0,
        "measured {:.2} dB, expected {expected:.2} dB",
        metrics.snr_db
    );
}

#[test]
fn clipping_run_length_scenario() {
    let sample_rate = 44_100;
    let make = |clip_len: usize| {
        let mut buffer = sine_buffer(sample_rate, 1.0, 440.0, 0.3);
        for sample in &mut buffer.samples_mut()[10_000..10_000 + clip_len] {
            *sample = 1.0;
        }
        buffer
    };
    let analyzer = QualityAnalyzer::default();

    assert!(!analyzer.analyze(&make(2)).unwrap().clipping_detected);
    assert!(analyzer.analyze(&make(50)).unwrap().clipping_detected);

    // Clipping is catastrophic: the verdict is Failed on any profile.
    let report = validate_buffer(
        &make(50),
        &QualityProfile::Basic,
        &AnalysisConfig::default(),
    )
    .unwrap();
    assert_eq!(report.level, QualityLevel::Failed);
}

#[test]
fn all_silent_buffer_is_an_analysis_failure_not_a_verdict() {
    let buffer = AudioBuffer::new(vec![0.0; 44_100], 44_100, 1, SampleFormat::F32).unwrap();
    let err = validate_buffer(
        &buffer,
        &QualityProfile::Standard,
        &AnalysisConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::AnalysisFailure { .. }));
}

#[test]
fn dither_to_sixteen_bits_marks_the_segment_format() {
    let buffer = sine_buffer(44_100, 2.0, 440.0, 0.5);
    let specs = [TimeSpec::new("0", "2", "whole")];
    let config = SplitConfig::builder()
        .dither_bits(Some(16))
        .profile(lenient_profile())
        .build()
        .unwrap();

    let report = split_with_quality(buffer, &specs, &config).unwrap();
    let processed = report.outcomes[0].result.as_ref().unwrap();
    assert_eq!(processed.segment.audio.format(), SampleFormat::I16);
}

#[test]
fn crossfade_only_applies_at_internally_adjacent_cuts() {
    let buffer = sine_buffer(44_100, 3.0, 440.0, 0.5);
    // "head" and "tail" are not adjacent; neither boundary may fade, so
    // the absolute edges of both segments keep full amplitude.
    let specs = [
        TimeSpec::new("0", "1", "head"),
        TimeSpec::new("2", "3", "tail"),
    ];
    let config = SplitConfig::builder()
        .zero_crossing_window_ms(0.0)
        .dither_bits(None)
        .quality_validation(false)
        .build()
        .unwrap();

    let report = split_with_quality(buffer, &specs, &config).unwrap();
    for outcome in &report.outcomes {
        let audio = &outcome.result.as_ref().unwrap().segment.audio;
        let tail_peak = audio.samples()[audio.samples().len() - 200..]
            .iter()
            .fold(0.0f32, |acc, &s| acc.max(s.abs()));
        assert!(
            tail_peak > 0.4,
            "'{}' tail was attenuated to {tail_peak}",
            outcome.name
        );
    }
}
