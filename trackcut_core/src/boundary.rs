//! Cut-point refinement toward zero-crossings.
//!
//! Cutting mid-waveform leaves a step discontinuity that plays back as a
//! click. Each nominal cut point is therefore nudged to the nearest
//! zero-crossing of a mono-summed representative signal, so all channels
//! cut at the same frame and inter-channel phase stays aligned.

/// Default symmetric search window around a nominal cut point.
pub const DEFAULT_ZERO_CROSSING_WINDOW_MS: f64 = 5.0;

/// Find the zero-crossing nearest to `nominal` within `window_ms`.
///
/// A crossing is a sign change between consecutive samples, or an exact
/// zero. When the window contains none (constant or DC-biased signal), the
/// nominal index is returned unchanged; that is not an error.
pub fn refine_cut_point(
    mono: &[f32],
    sample_rate: u32,
    nominal: usize,
    window_ms: f64,
) -> usize {
    if mono.len() < 2 || nominal == 0 || nominal >= mono.len() {
        return nominal;
    }

    let window = (window_ms / 1_000.0 * f64::from(sample_rate)).round() as usize;
    if window == 0 {
        return nominal;
    }

    let search_start = nominal.saturating_sub(window / 2);
    let search_end = (nominal + window / 2).min(mono.len() - 1);
    if search_start >= search_end {
        return nominal;
    }

    let mut best: Option<usize> = None;
    for index in search_start..search_end {
        if !is_zero_crossing(mono[index], mono[index + 1]) {
            continue;
        }
        // Ties resolve to the earlier crossing.
        let better = match best {
            Some(current) => index.abs_diff(nominal) < current.abs_diff(nominal),
            None => true,
        };
        if better {
            best = Some(index);
        }
    }

    best.unwrap_or(nominal)
}

fn is_zero_crossing(a: f32, b: f32) -> bool {
    a == 0.0 || (a < 0.0) != (b < 0.0)
}
