//! Waveform peak summaries
//!
//! Decodes a cached payload to mono samples with symphonia and reduces it
//! to a fixed number of max-abs amplitude buckets.

use crate::cache::{AudioBytes, WaveformData};
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

pub const DEFAULT_BUCKETS: usize = 100;

/// Mono PCM decoded from a payload
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Decode an in-memory payload to mono f32 samples
///
/// Channels are averaged. `extension` is a format hint and may be omitted.
pub fn decode_mono(bytes: &[u8], extension: Option<&str>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to detect format: {}", e)))?;
    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(Error::Decode(format!("Failed to read packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count().max(1);
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend(
                    buffer
                        .samples()
                        .chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(error = %e, "Skipping undecodable packet");
            }
            Err(e) => return Err(Error::Decode(format!("Decode failed: {}", e))),
        }
    }

    Ok(DecodedAudio { samples, sample_rate })
}

/// Reduce samples to `buckets` max-abs amplitudes in [0, 1]
///
/// Buckets that cover no samples (fewer samples than buckets) are 0.
pub fn compute_peaks(samples: &[f32], buckets: usize) -> Vec<f32> {
    let len = samples.len();
    (0..buckets)
        .map(|i| {
            let start = i * len / buckets;
            let end = (i + 1) * len / buckets;
            samples[start..end]
                .iter()
                .fold(0.0f32, |peak, s| peak.max(s.abs()))
                .min(1.0)
        })
        .collect()
}

/// Decode and summarise a payload
pub fn waveform_from_bytes(bytes: &[u8], extension: Option<&str>, buckets: usize) -> Result<WaveformData> {
    let decoded = decode_mono(bytes, extension)?;
    Ok(WaveformData {
        peaks: compute_peaks(&decoded.samples, buckets),
        duration: decoded.duration(),
        timestamp: stemsync_common::time::now(),
    })
}

/// Decode and summarise on a blocking worker
pub async fn compute_waveform(bytes: AudioBytes, extension: Option<String>, buckets: usize) -> Result<WaveformData> {
    tokio::task::spawn_blocking(move || waveform_from_bytes(&bytes, extension.as_deref(), buckets))
        .await
        .map_err(|e| Error::Internal(format!("Waveform task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::sine_wav;

    #[test]
    fn test_compute_peaks_buckets() {
        let samples = [0.1, -0.5, 0.2, 0.9, -0.3, 0.0];
        assert_eq!(compute_peaks(&samples, 3), vec![0.5, 0.9, 0.3]);
    }

    #[test]
    fn test_compute_peaks_more_buckets_than_samples() {
        let peaks = compute_peaks(&[0.4, -0.8], 4);
        assert_eq!(peaks.len(), 4);
        assert_eq!(peaks.iter().filter(|p| **p > 0.0).count(), 2);
    }

    #[test]
    fn test_compute_peaks_empty() {
        assert_eq!(compute_peaks(&[], 3), vec![0.0, 0.0, 0.0]);
        assert!(compute_peaks(&[0.5], 0).is_empty());
    }

    #[test]
    fn test_decode_wav() {
        let wav = sine_wav(440.0, 0.5, 8000, 0.5).unwrap();

        let decoded = decode_mono(&wav, Some("wav")).unwrap();

        assert_eq!(decoded.sample_rate, 8000);
        assert!((decoded.duration() - 0.5).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_compute_waveform_on_worker() {
        let wav = sine_wav(220.0, 1.0, 8000, 0.5).unwrap();

        let waveform = compute_waveform(AudioBytes::from(wav), Some("wav".to_string()), DEFAULT_BUCKETS)
            .await
            .unwrap();

        assert_eq!(waveform.peaks.len(), DEFAULT_BUCKETS);
        assert!(waveform.peaks.iter().all(|p| (*p - 0.5).abs() < 0.05));
        assert!((waveform.duration - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        let result = decode_mono(&[0u8; 64], None);
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
