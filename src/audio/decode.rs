use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Whole-file mono PCM.
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Number of video frames covering the audio at `fps`.
    pub fn frame_count(&self, fps: u32) -> usize {
        (self.duration() * fps as f64).ceil() as usize
    }

    /// Samples that arrive between video frame `index` and `index + 1`.
    pub fn frame_slice(&self, index: usize, fps: u32) -> &[f32] {
        let per_frame = self.sample_rate as f64 / fps as f64;
        let start = ((index as f64 * per_frame) as usize).min(self.samples.len());
        let end = (((index + 1) as f64 * per_frame) as usize).min(self.samples.len());
        &self.samples[start..end]
    }
}

pub fn decode_audio(path: &Path) -> Result<DecodedAudio> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to detect audio format")?;
    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio tracks found")?;
    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);
        downmix_into(&mut samples, buf.samples(), channels);
    }

    let audio = DecodedAudio {
        samples,
        sample_rate,
    };
    log::info!(
        "Decoded audio: {} samples, {}Hz, {} channel(s), {:.1}s",
        audio.samples.len(),
        sample_rate,
        channels,
        audio.duration()
    );
    Ok(audio)
}

/// Average interleaved channels into mono.
fn downmix_into(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let mut out = Vec::new();
        downmix_into(&mut out, &[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(out, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn frame_slices_tile_the_samples() {
        let audio = DecodedAudio {
            samples: (0..1000).map(|i| i as f32).collect(),
            sample_rate: 250,
        };
        assert_eq!(audio.frame_count(30), 120);
        let total: usize = (0..audio.frame_count(30))
            .map(|i| audio.frame_slice(i, 30).len())
            .sum();
        assert_eq!(total, 1000);
        assert_eq!(audio.frame_slice(0, 30)[0], 0.0);
        assert!(audio.frame_slice(500, 30).is_empty());
    }
}
