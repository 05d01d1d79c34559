use super::decode::AudioTrack;
use crate::error::{Channel, PipelineError, PipelineResult};

/// Peak-normalize both channels independently so each reaches exactly 1.0.
pub fn normalize(track: AudioTrack) -> PipelineResult<AudioTrack> {
    let AudioTrack {
        mut left,
        mut right,
        sample_rate,
    } = track;

    normalize_channel(&mut left, Channel::Left)?;
    normalize_channel(&mut right, Channel::Right)?;

    Ok(AudioTrack {
        left,
        right,
        sample_rate,
    })
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

fn normalize_channel(samples: &mut [f32], channel: Channel) -> PipelineResult<()> {
    // f32::max skips NaN, so the peak alone cannot catch it
    if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
        return Err(PipelineError::decode(format!(
            "{channel} channel contains a non-finite sample at {pos}"
        )));
    }
    let peak = peak(samples);
    if peak == 0.0 {
        return Err(PipelineError::SilentChannel { channel });
    }

    for s in samples.iter_mut() {
        *s /= peak;
    }

    log::debug!("Normalized {} channel (peak {:.4})", channel, peak);
    Ok(())
}
