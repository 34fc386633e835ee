mod cli;
mod io;

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde_json::json;
use trackcut_core::{
    format_timecode, plan_segments, split_with_quality_observed, ProgressEvent, QualityLevel,
    QualityProfile, SplitConfig, SplitReport, TimeSpec,
};

use crate::cli::build_cli;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = build_cli().get_matches();

    let input_path = matches
        .get_one::<PathBuf>("file_path")
        .expect("required argument");
    if !input_path.is_file() {
        return Err(anyhow!(
            "input file does not exist: {}",
            input_path.display()
        ));
    }

    let specs: Vec<TimeSpec> = matches
        .get_many::<TimeSpec>("segment")
        .expect("required argument")
        .cloned()
        .collect();
    let output_dir = matches
        .get_one::<PathBuf>("output")
        .expect("defaulted argument");
    let profile = matches
        .get_one::<QualityProfile>("profile")
        .expect("defaulted argument")
        .clone();
    let overwrite = matches.get_flag("overwrite");
    let dry_run = matches.get_flag("dry-run");

    let threads = NonZeroUsize::new(*matches.get_one::<usize>("threads").expect("defaulted"))
        .ok_or_else(|| anyhow!("--threads must be at least 1"))?;
    let fade_ms = (!matches.get_flag("no-fade"))
        .then(|| *matches.get_one::<f64>("fade-ms").expect("defaulted"));
    let dither_bits = (!matches.get_flag("no-dither"))
        .then(|| *matches.get_one::<u32>("bit-depth").expect("defaulted"));
    let segment_timeout = matches
        .get_one::<u64>("timeout-secs")
        .map(|&secs| Duration::from_secs(secs));

    let config = SplitConfig::builder()
        .fade_ms(fade_ms)
        .dither_bits(dither_bits)
        .quality_validation(!matches.get_flag("no-quality"))
        .profile(profile.clone())
        .threads(threads)
        .segment_timeout(segment_timeout)
        .build()
        .context("invalid split configuration")?;

    let buffer = io::decode_audio(input_path)?;
    let sample_rate = buffer.sample_rate();

    if dry_run {
        let plan = plan_segments(buffer.frames(), sample_rate, &specs)
            .with_context(|| format!("failed to plan segments for '{}'", input_path.display()))?;

        println!("Dry run: would generate {} segment(s):", plan.len());
        for segment in plan.segments() {
            println!(
                "  {} [{} - {}] -> {}",
                segment.name,
                format_timecode(segment.start_sample, sample_rate),
                format_timecode(segment.end_sample, sample_rate),
                output_dir.join(format!("{}.wav", segment.name)).display()
            );
        }
        return Ok(());
    }

    if !output_dir.is_dir() {
        bail!("output directory does not exist: {}", output_dir.display());
    }
    if !overwrite {
        for spec in &specs {
            let target = output_dir.join(format!("{}.wav", spec.name));
            if target.exists() {
                bail!(
                    "refusing to overwrite '{}' (pass --overwrite to allow)",
                    target.display()
                );
            }
        }
    }

    let progress = ProgressBar::new(specs.len() as u64);
    progress.set_draw_target(ProgressDrawTarget::stderr());
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let progress_handle = progress.clone();
    let report = split_with_quality_observed(buffer, &specs, &config, move |event| match event {
        ProgressEvent::Start { total_segments } => {
            progress_handle.set_length(total_segments as u64);
        }
        ProgressEvent::Segment { name, .. } => {
            progress_handle.inc(1);
            progress_handle.set_message(name);
        }
        ProgressEvent::Finish => {
            progress_handle.set_message(String::from("validating"));
        }
    })
    .with_context(|| format!("failed to split '{}'", input_path.display()))?;
    progress.finish_and_clear();

    let written = write_outputs(&report, output_dir)?;
    print_summary(&report);

    if let Some(report_path) = matches.get_one::<PathBuf>("report") {
        write_json_report(report_path, input_path, &profile, &report, &written)?;
        println!("Report written to {}", report_path.display());
    }

    if report.failed() > 0 {
        bail!("{} segment(s) failed", report.failed());
    }
    if let Some(&required) = matches.get_one::<QualityLevel>("fail-below") {
        enforce_quality_floor(&report, required)?;
    }

    Ok(())
}

/// Persist every produced segment, returning the written paths in plan
/// order (`None` for segments whose processing failed).
fn write_outputs(report: &SplitReport, output_dir: &Path) -> anyhow::Result<Vec<Option<PathBuf>>> {
    let mut written = Vec::with_capacity(report.outcomes.len());
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(processed) => {
                let path = output_dir.join(format!("{}.wav", outcome.name));
                io::write_wav_segment(&path, &processed.segment.audio)?;
                written.push(Some(path));
            }
            Err(_) => written.push(None),
        }
    }
    Ok(written)
}

fn print_summary(report: &SplitReport) {
    println!(
        "Processed {} / {} segment(s)",
        report.processed(),
        report.outcomes.len()
    );
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(processed) => match &processed.report {
                Some(quality) => println!(
                    "  {}: {} (THD+N {:.1} dB, SNR {:.1} dB, DR {:.1}%)",
                    outcome.name,
                    quality.level.to_string().to_uppercase(),
                    quality.metrics.thdn_db,
                    quality.metrics.snr_db,
                    quality.metrics.dynamic_range_pct,
                ),
                None => println!("  {}: written (quality analysis skipped)", outcome.name),
            },
            Err(error) => println!("  {}: FAILED ({error})", outcome.name),
        }
    }
}

fn write_json_report(
    path: &Path,
    input: &Path,
    profile: &QualityProfile,
    report: &SplitReport,
    written: &[Option<PathBuf>],
) -> anyhow::Result<()> {
    let segments: Vec<_> = report
        .outcomes
        .iter()
        .zip(written)
        .map(|(outcome, output)| {
            let mut object = json!({
                "name": outcome.name,
                "start": format_timecode(outcome.start_sample, report.sample_rate),
                "end": format_timecode(outcome.end_sample, report.sample_rate),
                "start_sample": outcome.start_sample,
                "end_sample": outcome.end_sample,
                "output": output.as_ref().map(|p| p.display().to_string()),
            });
            match &outcome.result {
                Ok(processed) => {
                    object["quality"] = serde_json::to_value(&processed.report)
                        .unwrap_or(serde_json::Value::Null);
                }
                Err(error) => {
                    object["error"] = json!(error.to_string());
                }
            }
            object
        })
        .collect();

    let document = json!({
        "input": input.display().to_string(),
        "sample_rate": report.sample_rate,
        "profile": profile.name(),
        "segments": segments,
    });
    fs::write(path, serde_json::to_string_pretty(&document)?)
        .with_context(|| format!("failed to write report to '{}'", path.display()))?;
    Ok(())
}

/// A verdict below the floor is not a processing error, but the caller
/// asked for the run to fail on one.
fn enforce_quality_floor(report: &SplitReport, required: QualityLevel) -> anyhow::Result<()> {
    for outcome in &report.outcomes {
        if let Ok(processed) = &outcome.result {
            if let Some(quality) = &processed.report {
                if quality.level < required {
                    bail!(
                        "segment '{}' rated {}, below the required {}",
                        outcome.name,
                        quality.level,
                        required
                    );
                }
            }
        }
    }
    Ok(())
}
