use std::path::PathBuf;

use clap::{builder::ValueParser, value_parser, Arg, ArgAction, Command};
use trackcut_core::{QualityLevel, QualityProfile, TimeSpec};

pub const DEFAULT_PROFILE: &str = "professional";
pub const DEFAULT_FADE_MS: &str = "10";
pub const DEFAULT_BIT_DEPTH: &str = "24";

/// Parse a segment request of the form `START-END:NAME`.
///
/// `START` and `END` are timecodes (`SS`, `MM:SS`, or `HH:MM:SS`, each
/// with optional fractional seconds) and `NAME` becomes the output file
/// stem, so it may not be empty or contain path separators. Examples:
/// `"0-30:intro"`, `"1:30-2:45:chorus"`, `"1:02:03.5-1:10:00:outro"`.
pub fn parse_segment_spec(value: &str) -> Result<TimeSpec, String> {
    let invalid = || format!("invalid segment '{value}': expected START-END:NAME");

    let (range, name) = value.rsplit_once(':').ok_or_else(invalid)?;
    let (start, end) = range.split_once('-').ok_or_else(invalid)?;

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("segment '{value}' has an empty name"));
    }
    if name.contains(['/', '\\']) || name == ".." {
        return Err(format!(
            "segment name '{name}' cannot be used as a file name"
        ));
    }

    Ok(TimeSpec::new(start.trim(), end.trim(), name))
}

fn parse_fade_ms(value: &str) -> Result<f64, String> {
    let fade: f64 = value
        .parse()
        .map_err(|_| format!("invalid fade duration '{value}'"))?;
    if !fade.is_finite() || fade < 0.0 {
        return Err("fade duration must be a non-negative number of milliseconds".into());
    }
    Ok(fade)
}

fn parse_profile(value: &str) -> Result<QualityProfile, String> {
    value.parse()
}

fn parse_level(value: &str) -> Result<QualityLevel, String> {
    value.parse()
}

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Split audio files into named tracks with quality validation")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("segment")
                .short('s')
                .long("segment")
                .value_name("START-END:NAME")
                .help("Segment to cut (e.g. \"0-30:intro\", \"1:30-2:45:chorus\"); repeatable")
                .required(true)
                .action(ArgAction::Append)
                .value_parser(ValueParser::new(parse_segment_spec)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("OUTPUT_DIR")
                .help("Directory where the segment files will be written")
                .default_value(".")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .value_name("PROFILE")
                .help("Quality profile: studio, professional, standard, or basic")
                .default_value(DEFAULT_PROFILE)
                .value_parser(ValueParser::new(parse_profile)),
        )
        .arg(
            Arg::new("fade-ms")
                .long("fade-ms")
                .value_name("MILLISECONDS")
                .help("Crossfade window at adjacent cuts")
                .default_value(DEFAULT_FADE_MS)
                .value_parser(ValueParser::new(parse_fade_ms)),
        )
        .arg(
            Arg::new("no-fade")
                .long("no-fade")
                .help("Disable boundary crossfading")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("bit-depth")
                .long("bit-depth")
                .value_name("BITS")
                .help("Output bit depth; dither is applied when reducing")
                .default_value(DEFAULT_BIT_DEPTH)
                .value_parser(value_parser!(u32).range(4..=32)),
        )
        .arg(
            Arg::new("no-dither")
                .long("no-dither")
                .help("Disable TPDF dithering before bit-depth reduction")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-quality")
                .long("no-quality")
                .help("Skip quality analysis of the produced segments")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .value_name("COUNT")
                .help("Worker threads for segment analysis")
                .default_value("1")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .value_name("SECONDS")
                .help("Per-segment ceiling on analysis time")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .value_name("PATH")
                .help("Write the full quality report as JSON")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("fail-below")
                .long("fail-below")
                .value_name("LEVEL")
                .help("Exit non-zero when any segment rates below LEVEL")
                .value_parser(ValueParser::new(parse_level)),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Allow overwriting existing files in the output directory")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Preview the resolved split plan without writing files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("file_path")
                .value_name("FILE_PATH")
                .help("Path to the input audio file")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
}
