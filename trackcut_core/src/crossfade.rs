//! Equal-power crossfading at internal cut boundaries.
//!
//! A hard cut between two segments changes perceived loudness through the
//! transition even when both sides are continuous material. The fade pair
//! used here keeps `g_out(t)^2 + g_in(t)^2 = 1` across the whole window,
//! so summed power stays constant when the segments are played back to
//! back.

use crate::buffer::AudioBuffer;

/// Default fade window applied at internally adjacent cuts.
pub const DEFAULT_FADE_MS: f64 = 10.0;

/// Complementary equal-power gain ramps of `len` samples.
///
/// Derived from the raised-cosine family: `g_out = cos(theta)` and
/// `g_in = sin(theta)` with `theta` sweeping 0..pi/2, so the outgoing ramp
/// starts at 1 and falls to 0 while the incoming ramp mirrors it.
pub fn equal_power_gains(len: usize) -> (Vec<f32>, Vec<f32>) {
    match len {
        0 => return (Vec::new(), Vec::new()),
        1 => return (vec![1.0], vec![0.0]),
        _ => {}
    }

    let mut fade_out = Vec::with_capacity(len);
    let mut fade_in = Vec::with_capacity(len);
    for index in 0..len {
        let theta = index as f64 / (len - 1) as f64 * std::f64::consts::FRAC_PI_2;
        fade_out.push(theta.cos() as f32);
        fade_in.push(theta.sin() as f32);
    }
    (fade_out, fade_in)
}

/// Fade window in frames for a buffer, honoring the too-short rule.
///
/// Segments shorter than twice the requested fade are left untouched so a
/// brief segment is not swallowed whole by its own boundary treatment.
pub fn fade_frames_for(buffer: &AudioBuffer, fade_ms: f64) -> usize {
    let frames = (fade_ms / 1_000.0 * f64::from(buffer.sample_rate())).round() as usize;
    if frames == 0 || buffer.frames() < frames * 2 {
        0
    } else {
        frames
    }
}

/// Blend the boundary between two adjacent segments.
///
/// The trailing `fade_frames` of `outgoing` ramp down and the leading
/// `fade_frames` of `incoming` ramp up, both on every channel. Callers only
/// apply this at internally adjacent cuts produced by one split request,
/// never at the absolute start or end of the source buffer.
pub fn crossfade_boundary(outgoing: &mut AudioBuffer, incoming: &mut AudioBuffer, fade_frames: usize) {
    if fade_frames == 0 {
        return;
    }

    let (fade_out, fade_in) = equal_power_gains(fade_frames);

    apply_tail_gain(outgoing, &fade_out);
    apply_head_gain(incoming, &fade_in);
}

fn apply_tail_gain(buffer: &mut AudioBuffer, gains: &[f32]) {
    let channels = buffer.channels() as usize;
    let start_frame = buffer.frames() - gains.len();
    let samples = buffer.samples_mut();
    for (offset, gain) in gains.iter().enumerate() {
        let base = (start_frame + offset) * channels;
        for sample in &mut samples[base..base + channels] {
            *sample *= gain;
        }
    }
}

fn apply_head_gain(buffer: &mut AudioBuffer, gains: &[f32]) {
    let channels = buffer.channels() as usize;
    let samples = buffer.samples_mut();
    for (offset, gain) in gains.iter().enumerate() {
        let base = offset * channels;
        for sample in &mut samples[base..base + channels] {
            *sample *= gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleFormat;

    #[test]
    fn gains_satisfy_the_equal_power_law() {
        let (fade_out, fade_in) = equal_power_gains(441);
        for (out, inc) in fade_out.iter().zip(&fade_in) {
            let power = f64::from(*out).powi(2) + f64::from(*inc).powi(2);
            assert!((power - 1.0).abs() < 1e-6, "power {power}");
        }
    }

    #[test]
    fn gains_are_monotone_and_pinned_at_the_ends() {
        let (fade_out, fade_in) = equal_power_gains(100);
        assert_eq!(fade_out[0], 1.0);
        assert!(fade_out[99].abs() < 1e-6);
        assert!(fade_in[0].abs() < 1e-6);
        assert_eq!(fade_in[99], 1.0);
        for pair in fade_out.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        for pair in fade_in.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn boundary_fade_touches_only_the_fade_region() {
        let rate = 1_000;
        let mut outgoing =
            AudioBuffer::new(vec![1.0; 100], rate, 1, SampleFormat::F32).unwrap();
        let mut incoming =
            AudioBuffer::new(vec![1.0; 100], rate, 1, SampleFormat::F32).unwrap();

        crossfade_boundary(&mut outgoing, &mut incoming, 10);

        assert!(outgoing.samples()[..90].iter().all(|&s| s == 1.0));
        assert!(outgoing.samples()[90..].windows(2).all(|w| w[1] <= w[0]));
        assert!(incoming.samples()[10..].iter().all(|&s| s == 1.0));
        assert!(incoming.samples()[..10].windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn short_segments_are_exempt() {
        let buffer = AudioBuffer::new(vec![0.0; 100], 44_100, 1, SampleFormat::F32).unwrap();
        // 10 ms at 44.1 kHz is 441 frames; a 100-frame segment cannot fade.
        assert_eq!(fade_frames_for(&buffer, DEFAULT_FADE_MS), 0);
    }

    #[test]
    fn fade_applies_to_every_channel() {
        let rate = 1_000;
        let mut outgoing =
            AudioBuffer::new(vec![1.0; 40], rate, 2, SampleFormat::F32).unwrap();
        let mut incoming =
            AudioBuffer::new(vec![1.0; 40], rate, 2, SampleFormat::F32).unwrap();

        crossfade_boundary(&mut outgoing, &mut incoming, 5);

        let tail = &outgoing.samples()[30..];
        for frame in tail.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!(tail[8].abs() < 1e-6 && tail[9].abs() < 1e-6);
    }
}
