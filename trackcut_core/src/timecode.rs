use crate::error::EngineError;

/// Parse a textual timecode into seconds.
///
/// # Grammar
///
/// ```text
/// timecode = seconds
///          | minutes ":" seconds
///          | hours ":" minutes ":" seconds ;
/// seconds  = digits [ "." digits ] ;
/// minutes  = digits ;   (* < 60 when an hours field is present *)
/// hours    = digits ;
/// digits   = digit , { digit } ;
/// ```
///
/// Fractional seconds are accepted to nanosecond precision, well past the
/// millisecond resolution the split planner needs. Minute and second fields
/// must stay below 60 whenever a field to their left is present. Negative
/// values, empty fields, and non-digit characters are rejected.
pub fn parse_timecode(value: &str) -> Result<f64, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid_time(value, "timecode cannot be empty"));
    }

    let fields: Vec<&str> = trimmed.split(':').collect();
    if fields.len() > 3 {
        return Err(EngineError::invalid_time(
            value,
            "expected at most two ':' separators (HH:MM:SS)",
        ));
    }

    // All fields but the last are whole hour/minute counts.
    let mut prefix_seconds: u64 = 0;
    for (index, field) in fields[..fields.len() - 1].iter().enumerate() {
        let unit = parse_integer_field(value, field)?;
        // A minutes field under an hours field is clock-bounded.
        if fields.len() == 3 && index == 1 && unit >= 60 {
            return Err(EngineError::invalid_time(
                value,
                format!("minutes field '{field}' must be below 60"),
            ));
        }
        prefix_seconds = prefix_seconds
            .checked_mul(60)
            .and_then(|acc| acc.checked_add(unit))
            .ok_or_else(|| EngineError::invalid_time(value, "timecode is too large"))?;
    }

    let seconds_field = fields[fields.len() - 1];
    let (seconds, fraction) = parse_seconds_field(value, seconds_field)?;
    if fields.len() > 1 && seconds >= 60 {
        return Err(EngineError::invalid_time(
            value,
            format!("seconds field '{seconds_field}' must be below 60"),
        ));
    }

    let whole = prefix_seconds
        .checked_mul(60)
        .and_then(|acc| acc.checked_add(seconds))
        .ok_or_else(|| EngineError::invalid_time(value, "timecode is too large"))?;

    Ok(whole as f64 + fraction)
}

fn parse_integer_field(input: &str, field: &str) -> Result<u64, EngineError> {
    if field.is_empty() {
        return Err(EngineError::invalid_time(input, "empty timecode field"));
    }
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EngineError::invalid_time(
            input,
            format!("field '{field}' is not a whole number"),
        ));
    }
    field
        .parse::<u64>()
        .map_err(|_| EngineError::invalid_time(input, "timecode field is too large"))
}

fn parse_seconds_field(input: &str, field: &str) -> Result<(u64, f64), EngineError> {
    let (whole, fraction) = match field.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (field, None),
    };

    let seconds = parse_integer_field(input, whole)?;

    let fraction = match fraction {
        None => 0.0,
        Some("") => {
            return Err(EngineError::invalid_time(
                input,
                "expected digits after the decimal point",
            ));
        }
        Some(digits) => {
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(EngineError::invalid_time(
                    input,
                    format!("fraction '{digits}' is not numeric"),
                ));
            }
            if digits.len() > 9 {
                return Err(EngineError::invalid_time(
                    input,
                    "fractional seconds are limited to nanosecond precision",
                ));
            }
            digits.parse::<u64>().map_or(0.0, |value| {
                value as f64 / 10f64.powi(digits.len() as i32)
            })
        }
    };

    Ok((seconds, fraction))
}

/// Convert a time offset in seconds to the nearest sample index.
pub fn to_sample_index(seconds: f64, sample_rate: u32) -> usize {
    (seconds * f64::from(sample_rate)).round() as usize
}

/// Render a sample index as a timecode with millisecond precision.
///
/// Output uses `M:SS.mmm`, or `H:MM:SS.mmm` once an hour is reached, so
/// re-parsing a formatted value recovers the original index to within the
/// rounding error of one millisecond.
pub fn format_timecode(sample: usize, sample_rate: u32) -> String {
    let total_ms = (sample as f64 / f64::from(sample_rate) * 1_000.0).round() as u64;
    let ms = total_ms % 1_000;
    let total_seconds = total_ms / 1_000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3_600;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}.{ms:03}")
    } else {
        format!("{minutes}:{seconds:02}.{ms:03}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_seconds(input: &str, expected: f64) {
        let actual = parse_timecode(input).unwrap();
        assert!(
            (actual - expected).abs() < 1e-9,
            "input: {input}, got {actual}"
        );
    }

    #[test]
    fn parses_all_three_shapes() {
        assert_seconds("5", 5.0);
        assert_seconds("90", 90.0);
        assert_seconds("1:30", 90.0);
        assert_seconds("1:02:03", 3_723.0);
    }

    #[test]
    fn parses_fractional_seconds() {
        assert_seconds("5.5", 5.5);
        assert_seconds("0:05.25", 5.25);
        assert_seconds("1:00:00.001", 3_600.001);
    }

    #[test]
    fn accepts_surrounding_whitespace() {
        assert_seconds("  1:30 ", 90.0);
    }

    #[test]
    fn rejects_malformed_separators() {
        assert!(parse_timecode("1:2:3:4").is_err());
        assert!(parse_timecode("1::30").is_err());
        assert!(parse_timecode(":30").is_err());
        assert!(parse_timecode("1:30:").is_err());
    }

    #[test]
    fn rejects_non_numeric_components() {
        assert!(parse_timecode("abc").is_err());
        assert!(parse_timecode("1:3a").is_err());
        assert!(parse_timecode("1.2.3").is_err());
        assert!(parse_timecode("5.").is_err());
        assert!(parse_timecode("").is_err());
    }

    #[test]
    fn rejects_negative_values() {
        assert!(parse_timecode("-5").is_err());
        assert!(parse_timecode("1:-30").is_err());
    }

    #[test]
    fn rejects_clock_field_overflow() {
        assert!(parse_timecode("1:61").is_err());
        assert!(parse_timecode("1:61:00").is_err());
        assert!(parse_timecode("1:00:60").is_err());
        // A bare seconds count is not clock-bounded.
        assert_seconds("75", 75.0);
    }

    #[test]
    fn sample_conversion_rounds_to_nearest() {
        assert_eq!(to_sample_index(1.0, 44_100), 44_100);
        assert_eq!(to_sample_index(0.5, 44_100), 22_050);
        assert_eq!(to_sample_index(1.0 / 3.0, 48_000), 16_000);
    }

    #[test]
    fn format_round_trips_within_a_millisecond() {
        let rate = 44_100u32;
        for &sample in &[0usize, 1_234, 22_050, 220_500, 10_000_000] {
            let text = format_timecode(sample, rate);
            let reparsed = to_sample_index(parse_timecode(&text).unwrap(), rate);
            let tolerance = (rate as usize + 1_999) / 2_000;
            assert!(
                reparsed.abs_diff(sample) <= tolerance,
                "{sample} -> '{text}' -> {reparsed}"
            );
        }
    }

    #[test]
    fn format_switches_to_hours_form() {
        assert_eq!(format_timecode(44_100 * 3_661, 44_100), "1:01:01.000");
        assert_eq!(format_timecode(44_100 * 61, 44_100), "1:01.000");
    }
}
