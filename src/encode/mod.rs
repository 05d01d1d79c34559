pub mod ffmpeg;

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// Everything needed to mux a frame sequence with the source audio.
#[derive(Clone, Debug)]
pub struct EncodeRequest<'a> {
    /// printf-style pattern of the frame files, e.g. `.../frame_%05d.png`.
    pub frame_pattern: &'a Path,
    pub frame_count: u32,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub audio: &'a Path,
    pub output: &'a Path,
}

impl EncodeRequest<'_> {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.frame_count == 0 {
            return Err(PipelineError::encoding("no frames to encode"));
        }
        if self.fps == 0 {
            return Err(PipelineError::encoding("fps must be non-zero"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::encoding("output resolution must be non-zero"));
        }
        Ok(())
    }

    /// Output length in seconds; audio is cut to this, frames are never stretched.
    pub fn duration(&self) -> f64 {
        self.frame_count as f64 / self.fps as f64
    }
}

/// Video muxing capability. The pipeline only talks to this trait so the
/// orchestration can run without an external encoder.
pub trait Encoder: Send + Sync {
    fn encode(&self, request: &EncodeRequest<'_>) -> PipelineResult<PathBuf>;
}
