//! TPDF dithering ahead of bit-depth reduction.
//!
//! Plain requantization correlates the rounding error with the program
//! material, which is audible as grit on low-level passages. Adding
//! triangular noise of one LSB peak-to-peak before rounding decorrelates
//! the error at the cost of a slightly raised, benign noise floor.

use log::debug;
use rand::Rng;

use crate::buffer::{AudioBuffer, SampleFormat};

/// Apply TPDF dither and requantize the buffer to `target_bits`.
///
/// The triangular distribution comes from summing two independent uniform
/// sources of ±1/4 LSB each, giving noise bounded to ±1/2 LSB, which is
/// exactly one LSB peak to peak at the target depth. When `target_bits` is at or
/// above the buffer's effective depth this is a no-op and returns `false`;
/// that keeps repeated calls at the same depth from accumulating noise.
pub fn apply_tpdf_dither<R: Rng>(
    buffer: &mut AudioBuffer,
    target_bits: u32,
    rng: &mut R,
) -> bool {
    if target_bits >= buffer.format().bit_depth() {
        return false;
    }

    let lsb = lsb_at(target_bits);
    let quarter = lsb / 4.0;
    let levels = (1u64 << (target_bits - 1)) as f32;
    let ceiling = 1.0 - lsb;

    for sample in buffer.samples_mut() {
        let noise = rng.gen_range(-quarter..=quarter) + rng.gen_range(-quarter..=quarter);
        let quantized = ((*sample + noise) * levels).round() / levels;
        *sample = quantized.clamp(-1.0, ceiling);
    }

    let format = match target_bits {
        16 => Some(SampleFormat::I16),
        24 => Some(SampleFormat::I24),
        _ => None,
    };
    if let Some(format) = format {
        buffer.set_format(format);
    }

    debug!("dithered and requantized to {target_bits} bits");
    true
}

/// Size of one least-significant bit at the given depth, on the ±1.0 scale.
pub fn lsb_at(target_bits: u32) -> f32 {
    1.0 / (1u64 << (target_bits - 1)) as f32
}
