use super::decode::AudioTrack;
use crate::error::{PipelineError, PipelineResult};

/// One frame's worth of stereo samples.
#[derive(Clone, Copy, Debug)]
pub struct SampleWindow<'a> {
    pub index: u32,
    pub left_chunk: &'a [f32],
    pub right_chunk: &'a [f32],
}

/// Splits a track into consecutive, non-overlapping windows of `frame_step`
/// samples. A trailing partial window is dropped.
#[derive(Clone, Copy, Debug)]
pub struct WindowSegmenter<'a> {
    track: &'a AudioTrack,
    frame_step: usize,
    num_frames: u32,
}

impl<'a> WindowSegmenter<'a> {
    pub fn new(track: &'a AudioTrack, fps: u32) -> PipelineResult<Self> {
        let frame_step = frame_step(track.sample_rate, fps)?;
        let total = track.left.len().min(track.right.len());
        let num_frames = u32::try_from(total / frame_step).map_err(|_| {
            PipelineError::config(format!("{} frames exceed the frame index range", total / frame_step))
        })?;

        Ok(Self {
            track,
            frame_step,
            num_frames,
        })
    }

    pub fn frame_step(&self) -> usize {
        self.frame_step
    }

    pub fn num_frames(&self) -> u32 {
        self.num_frames
    }

    pub fn window(&self, index: u32) -> Option<SampleWindow<'a>> {
        if index >= self.num_frames {
            return None;
        }
        let start = index as usize * self.frame_step;
        let end = start + self.frame_step;
        Some(SampleWindow {
            index,
            left_chunk: &self.track.left[start..end],
            right_chunk: &self.track.right[start..end],
        })
    }

    pub fn iter(&self) -> Windows<'a> {
        Windows {
            segmenter: *self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &WindowSegmenter<'a> {
    type Item = SampleWindow<'a>;
    type IntoIter = Windows<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Windows<'a> {
    segmenter: WindowSegmenter<'a>,
    next: u32,
}

impl<'a> Iterator for Windows<'a> {
    type Item = SampleWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.segmenter.window(self.next)?;
        self.next += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.segmenter.num_frames - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows<'_> {}

/// `floor(sample_rate / fps)`, rejecting a zero fps or a step below one sample.
pub fn frame_step(sample_rate: u32, fps: u32) -> PipelineResult<usize> {
    if fps == 0 || sample_rate / fps < 1 {
        return Err(PipelineError::InvalidFrameRate { fps, sample_rate });
    }
    Ok((sample_rate / fps) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(len: usize, sample_rate: u32) -> AudioTrack {
        AudioTrack {
            left: (0..len).map(|i| i as f32).collect(),
            right: (0..len).map(|i| -(i as f32)).collect(),
            sample_rate,
        }
    }

    #[test]
    fn ten_seconds_at_30fps_gives_300_frames() {
        let t = track(441_000, 44_100);
        let seg = WindowSegmenter::new(&t, 30).unwrap();
        assert_eq!(seg.frame_step(), 1470);
        assert_eq!(seg.num_frames(), 300);
        assert_eq!(seg.iter().count(), 300);
    }

    #[test]
    fn trailing_partial_window_is_dropped() {
        let t = track(1000, 300);
        let seg = WindowSegmenter::new(&t, 30).unwrap();
        assert_eq!(seg.frame_step(), 10);
        assert_eq!(seg.num_frames(), 100);

        let t = track(1009, 300);
        let seg = WindowSegmenter::new(&t, 30).unwrap();
        assert_eq!(seg.num_frames(), 100);
        let last = seg.iter().last().unwrap();
        assert_eq!(last.index, 99);
        assert_eq!(last.left_chunk, &t.left[990..1000]);
    }

    #[test]
    fn windows_are_contiguous_and_ordered() {
        let t = track(95, 100);
        let seg = WindowSegmenter::new(&t, 10).unwrap();
        for (i, w) in seg.iter().enumerate() {
            assert_eq!(w.index as usize, i);
            assert_eq!(w.left_chunk.len(), 10);
            assert_eq!(w.left_chunk[0], (i * 10) as f32);
            assert_eq!(w.right_chunk[9], -((i * 10 + 9) as f32));
        }
    }

    #[test]
    fn iteration_is_restartable() {
        let t = track(50, 100);
        let seg = WindowSegmenter::new(&t, 20).unwrap();
        let first: Vec<u32> = seg.iter().map(|w| w.index).collect();
        let second: Vec<u32> = (&seg).into_iter().map(|w| w.index).collect();
        assert_eq!(first, second);
        assert_eq!(seg.iter().len(), 10);
    }

    #[test]
    fn degenerate_frame_rate_is_rejected() {
        let t = track(100, 44_100);
        assert!(matches!(
            WindowSegmenter::new(&t, 0),
            Err(PipelineError::InvalidFrameRate { fps: 0, .. })
        ));
        assert!(matches!(
            WindowSegmenter::new(&t, 50_000),
            Err(PipelineError::InvalidFrameRate { .. })
        ));
    }

    #[test]
    fn short_track_yields_no_windows() {
        let t = track(5, 100);
        let seg = WindowSegmenter::new(&t, 10).unwrap();
        assert_eq!(seg.num_frames(), 0);
        assert!(seg.window(0).is_none());
    }
}
