//! Container decode and WAV encode at the CLI boundary.
//!
//! The core engine only sees in-memory buffers; everything touching the
//! filesystem lives here.

use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use log::info;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use trackcut_core::{AudioBuffer, SampleFormat};

/// Decode an audio container into an interleaved float buffer.
pub fn decode_audio(path: &Path) -> anyhow::Result<AudioBuffer> {
    let file = File::open(path)
        .with_context(|| format!("failed to open '{}'", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("unsupported or corrupt container '{}'", path.display()))?;
    let mut reader = probed.format;

    let track = reader
        .default_track()
        .ok_or_else(|| anyhow!("input stream does not provide a default track"))?;
    if track.codec_params.codec == CODEC_TYPE_NULL {
        bail!("unsupported codec");
    }

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("input stream does not advertise a sample rate"))?;
    let channels = track
        .codec_params
        .channels
        .map(|layout| layout.count())
        .ok_or_else(|| anyhow!("input stream does not advertise a channel layout"))?;
    let format = match track.codec_params.bits_per_sample {
        Some(16) => SampleFormat::I16,
        Some(24) => SampleFormat::I24,
        _ => SampleFormat::F32,
    };

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(err.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::new(decoded.capacity() as u64, *decoded.spec())
                });
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            // Recoverable corruption: skip the packet, as the decoder has
            // already reset itself.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    let buffer = AudioBuffer::new(samples, sample_rate, channels as u16, format)?;
    info!(
        "decoded '{}': {} Hz, {} channel(s), {:.2} s",
        path.display(),
        buffer.sample_rate(),
        buffer.channels(),
        buffer.duration_seconds()
    );
    Ok(buffer)
}

/// Write a segment buffer as PCM WAV at its effective bit depth.
///
/// 16-bit material stays 16-bit; everything wider is delivered as 24-bit
/// PCM, matching the depth the pipeline dithers to by default.
pub fn write_wav_segment(path: &Path, audio: &AudioBuffer) -> anyhow::Result<()> {
    let bits: u16 = match audio.format() {
        SampleFormat::I16 => 16,
        _ => 24,
    };
    let spec = hound::WavSpec {
        channels: audio.channels(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: bits,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create '{}'", path.display()))?;
    match bits {
        16 => {
            for &sample in audio.samples() {
                let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
                writer.write_sample(value)?;
            }
        }
        _ => {
            const I24_MAX: f32 = 8_388_607.0;
            for &sample in audio.samples() {
                let value = (sample.clamp(-1.0, 1.0) * I24_MAX).round() as i32;
                writer.write_sample(value)?;
            }
        }
    }
    writer
        .finalize()
        .with_context(|| format!("failed to finalize '{}'", path.display()))?;
    Ok(())
}
