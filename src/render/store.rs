use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::raster::Canvas;
use crate::error::{PipelineError, PipelineResult};

const JOB_DIR_PREFIX: &str = "job-";

/// Per-job directory of `frame_00000.png`, `frame_00001.png`, ...
///
/// The directory is removed when the store is closed or dropped.
pub struct FrameStore {
    dir: TempDir,
    frames: u32,
}

impl FrameStore {
    pub fn create_in(temp_root: &Path) -> PipelineResult<Self> {
        std::fs::create_dir_all(temp_root).map_err(|e| PipelineError::io(temp_root, e))?;
        let dir = tempfile::Builder::new()
            .prefix(JOB_DIR_PREFIX)
            .tempdir_in(temp_root)
            .map_err(|e| PipelineError::io(temp_root, e))?;
        log::debug!("Frame store at {}", dir.path().display());
        Ok(Self { dir, frames: 0 })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn len(&self) -> u32 {
        self.frames
    }

    /// ffmpeg image2 pattern matching the frame file names.
    pub fn pattern(&self) -> PathBuf {
        self.dir.path().join("frame_%05d.png")
    }

    pub fn frame_path(&self, index: u32) -> PathBuf {
        self.dir.path().join(frame_file_name(index))
    }

    /// Frames must arrive in index order with no gaps.
    pub fn write(&mut self, index: u32, canvas: Canvas) -> PipelineResult<PathBuf> {
        if index != self.frames {
            return Err(PipelineError::raster(
                index,
                format!("out-of-order frame, expected index {}", self.frames),
            ));
        }
        let path = self.frame_path(index);
        let image = canvas
            .into_image()
            .ok_or_else(|| PipelineError::raster(index, "canvas buffer does not match its size"))?;
        image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| PipelineError::raster(index, format!("failed to save frame: {e}")))?;
        self.frames += 1;
        Ok(path)
    }

    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

pub fn frame_file_name(index: u32) -> String {
    format!("frame_{:05}.png", index)
}

/// Remove job directories left behind by a previous process.
///
/// Everything named `job-*` under `temp_root` goes, live or not, so only one
/// process may use a data directory at a time.
pub fn sweep_stale(temp_root: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(temp_root) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_job_dir = path.is_dir()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(JOB_DIR_PREFIX));
        let is_loose_frame = path.extension().is_some_and(|e| e == "png");

        let result = if is_job_dir {
            std::fs::remove_dir_all(&path)
        } else if is_loose_frame {
            std::fs::remove_file(&path)
        } else {
            continue;
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Failed to remove stale {}: {}", path.display(), e),
        }
    }
    if removed > 0 {
        log::info!("Removed {} stale frame entries from {}", removed, temp_root.display());
    }
    removed
}
