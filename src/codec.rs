//! Byte-buffer boundary: decode any probeable container to mono f32 at a
//! target rate, encode mono f32 to a 16-bit PCM WAV.

use std::io::Cursor;

use hound::{WavSpec, WavWriter};
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::CodecError;

/// Below this many input samples the sinc resampler is skipped.
const MIN_SINC_INPUT: usize = 256;

/// Decoded mono audio.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    /// Rate of `samples` (the requested target rate).
    pub sample_rate: u32,
    pub source_sample_rate: u32,
    pub source_channels: u16,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode `bytes` to mono samples at `target_sample_rate`.
pub fn decode(bytes: &[u8], target_sample_rate: u32) -> Result<DecodedAudio, CodecError> {
    if target_sample_rate == 0 {
        return Err(CodecError::Decode("target sample rate must be positive".to_string()));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| CodecError::Decode(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(CodecError::NoAudioTrack)?;

    let track_id = track.id;
    let mut source_sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut source_channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0) as u16;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| CodecError::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(e) => {
                log::debug!("Stopping decode: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(CodecError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        source_sample_rate = spec.rate;
        let channels = spec.channels.count().max(1);
        source_channels = channels as u16;

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // Mix to mono
        for chunk in sample_buf.samples().chunks(channels) {
            mono.push(chunk.iter().sum::<f32>() / channels as f32);
        }
    }

    if mono.is_empty() {
        return Err(CodecError::EmptyAudio);
    }
    if source_sample_rate == 0 {
        return Err(CodecError::Decode("Stream has no sample rate".to_string()));
    }

    let samples = resample(mono, source_sample_rate, target_sample_rate)?;

    Ok(DecodedAudio {
        samples,
        sample_rate: target_sample_rate,
        source_sample_rate,
        source_channels,
    })
}

/// Resample mono audio, keeping the output at `len * to / from` samples.
pub fn resample(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>, CodecError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples);
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(CodecError::Resample(format!(
            "invalid rates {} -> {}",
            from_rate, to_rate
        )));
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let target_len = (samples.len() as f64 * ratio).round() as usize;

    if samples.len() < MIN_SINC_INPUT {
        return Ok(linear_resample(&samples, ratio, target_len));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| CodecError::Resample(format!("Failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let input = vec![samples];
    let mut resampled = resampler
        .process(&input, None)
        .map_err(|e| CodecError::Resample(e.to_string()))?
        .into_iter()
        .next()
        .unwrap_or_default();

    // Flush the filter tail so the last input samples make it out
    let tail = resampler
        .process_partial::<Vec<f32>>(None, None)
        .map_err(|e| CodecError::Resample(e.to_string()))?
        .into_iter()
        .next()
        .unwrap_or_default();
    resampled.extend(tail);

    resampled.drain(..delay.min(resampled.len()));
    resampled.resize(target_len, 0.0);
    Ok(resampled)
}

fn linear_resample(samples: &[f32], ratio: f64, target_len: usize) -> Vec<f32> {
    let last = samples.len() - 1;
    (0..target_len)
        .map(|i| {
            let pos = i as f64 / ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64).clamp(0.0, 1.0) as f32;
            samples[idx] * (1.0 - frac) + samples[next] * frac
        })
        .collect()
}

/// Encode mono samples as a 16-bit PCM WAV. Values are clamped to [-1, 1];
/// non-finite values become silence.
pub fn encode(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, CodecError> {
    if sample_rate == 0 {
        return Err(CodecError::Encode("sample rate must be positive".to_string()));
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| CodecError::Encode(format!("Failed to create WAV writer: {}", e)))?;

        for &sample in samples {
            let clean = if sample.is_finite() { sample.clamp(-1.0, 1.0) } else { 0.0 };
            writer
                .write_sample((clean * i16::MAX as f32).round() as i16)
                .map_err(|e| CodecError::Encode(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| CodecError::Encode(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(cursor.into_inner())
}
