//! Synthetic stem payloads

use crate::error::{Error, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::TAU;
use std::io::Cursor;

/// Encode a mono 16-bit WAV sine tone
pub fn sine_wav(frequency: f32, duration_secs: f64, sample_rate: u32, amplitude: f32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let frames = (duration_secs * f64::from(sample_rate)).round() as usize;
    let amplitude = amplitude.clamp(0.0, 1.0);
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
        for n in 0..frames {
            let t = n as f32 / sample_rate as f32;
            let sample = (TAU * frequency * t).sin() * amplitude;
            writer
                .write_sample((sample * f32::from(i16::MAX)) as i16)
                .map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)?;
    }
    Ok(cursor.into_inner())
}

fn wav_error(e: hound::Error) -> Error {
    Error::Internal(format!("WAV encode failed: {}", e))
}
