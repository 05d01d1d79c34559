use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{PipelineError, PipelineResult};

/// Decoded stereo audio. `left` and `right` always have the same, non-zero length.
#[derive(Clone, Debug)]
pub struct AudioTrack {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioTrack {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn duration(&self) -> f32 {
        self.left.len() as f32 / self.sample_rate as f32
    }
}

pub fn decode_audio(path: &Path) -> PipelineResult<AudioTrack> {
    let file = std::fs::File::open(path).map_err(|e| {
        PipelineError::decode(format!("failed to open audio file {}: {e}", path.display()))
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| PipelineError::decode(format!("failed to probe audio format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::decode("no audio tracks found"))?;

    let track_id = track.id;
    if let Some(channels) = track.codec_params.channels {
        check_channel_count(channels.count())?;
    }
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PipelineError::decode("unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PipelineError::decode(format!("failed to create audio decoder: {e}")))?;

    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(PipelineError::decode(format!("failed to read packet: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(PipelineError::decode(format!("failed to decode packet: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        check_channel_count(channels)?;
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        // Deinterleave
        for frame in sample_buf.samples().chunks_exact(channels) {
            left.push(frame[0]);
            right.push(frame[1]);
        }
    }

    let track = AudioTrack {
        left,
        right,
        sample_rate,
    };
    if track.is_empty() {
        return Err(PipelineError::decode(format!(
            "{} contains no samples",
            path.display()
        )));
    }

    log::info!(
        "Decoded audio: {} stereo samples, {}Hz, {:.2}s",
        track.len(),
        sample_rate,
        track.duration()
    );

    Ok(track)
}

fn check_channel_count(channels: usize) -> PipelineResult<()> {
    match channels {
        2 => Ok(()),
        1 => Err(PipelineError::decode("mono audio is not supported, two channels required")),
        n => Err(PipelineError::decode(format!(
            "{n}-channel audio is not supported, exactly two channels required"
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    pub(crate) fn write_wav(dir: &Path, name: &str, channels: u16, frames: &[(f32, f32)]) -> PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for &(l, r) in frames {
            writer.write_sample((l * i16::MAX as f32) as i16).unwrap();
            if channels >= 2 {
                writer.write_sample((r * i16::MAX as f32) as i16).unwrap();
            }
            for _ in 2..channels {
                writer.write_sample(0i16).unwrap();
            }
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn decodes_stereo_wav_into_two_channels() {
        let dir = tempfile::tempdir().unwrap();
        let frames: Vec<(f32, f32)> = (0..800).map(|i| (0.5, if i % 2 == 0 { -0.25 } else { 0.25 })).collect();
        let path = write_wav(dir.path(), "stereo.wav", 2, &frames);

        let track = decode_audio(&path).unwrap();
        assert_eq!(track.sample_rate, 8000);
        assert!(!track.is_empty());
        assert_eq!(track.left.len(), 800);
        assert_eq!(track.right.len(), 800);
        assert!((track.left[10] - 0.5).abs() < 1e-3);
        assert!((track.right[0] + 0.25).abs() < 1e-3);
        assert!((track.right[1] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn rejects_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "mono.wav", 1, &[(0.5, 0.0); 100]);
        let err = decode_audio(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(ref m) if m.contains("mono")));
    }

    #[test]
    fn rejects_more_than_two_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "quad.wav", 4, &[(0.5, 0.5); 100]);
        assert!(matches!(decode_audio(&path), Err(PipelineError::Decode(_))));
    }

    #[test]
    fn rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "empty.wav", 2, &[]);
        assert!(matches!(decode_audio(&path), Err(PipelineError::Decode(_))));
    }

    #[test]
    fn rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();
        assert!(matches!(decode_audio(&path), Err(PipelineError::Decode(_))));
    }

    #[test]
    fn missing_file_is_decode_error() {
        let err = decode_audio(Path::new("/nonexistent/track.mp3")).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }
}
