use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;

use crate::diagnostics::ErrorLog;
use crate::error::{PipelineError, PipelineResult};
use crate::render::store::FrameStore;

/// A temp resource that could not be removed. Logged, never fatal.
#[derive(Debug)]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub error: std::io::Error,
}

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to remove {}: {}", self.path.display(), self.error)
    }
}

/// Everything a job allocates on disk. Released exactly once, either through
/// `release` or on drop, whichever comes first.
pub struct JobResources {
    frames: Option<FrameStore>,
    staged_input: Option<TempPath>,
    log: Arc<ErrorLog>,
}

impl JobResources {
    pub fn new(log: Arc<ErrorLog>) -> Self {
        Self {
            frames: None,
            staged_input: None,
            log,
        }
    }

    /// Copy the caller's audio into `input_dir` under a job-unique name.
    /// The copy is what gets decoded and muxed, and what cleanup deletes.
    pub fn stage_input(&mut self, source: &Path, input_dir: &Path) -> PipelineResult<PathBuf> {
        std::fs::create_dir_all(input_dir).map_err(|e| PipelineError::io(input_dir, e))?;

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".into());
        let suffix = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let staged = tempfile::Builder::new()
            .prefix(&format!("{stem}-"))
            .suffix(&suffix)
            .tempfile_in(input_dir)
            .map_err(|e| PipelineError::io(input_dir, e))?
            .into_temp_path();

        std::fs::copy(source, &staged).map_err(|e| PipelineError::io(source, e))?;
        let path = staged.to_path_buf();
        self.staged_input = Some(staged);
        log::debug!("Staged {} as {}", source.display(), path.display());
        Ok(path)
    }

    pub fn create_frame_store(&mut self, temp_root: &Path) -> PipelineResult<&mut FrameStore> {
        let store = FrameStore::create_in(temp_root)?;
        Ok(self.frames.insert(store))
    }

    pub fn frames(&self) -> Option<&FrameStore> {
        self.frames.as_ref()
    }

    pub fn staged_input(&self) -> Option<&Path> {
        self.staged_input.as_deref()
    }

    pub fn release(&mut self) -> Vec<CleanupWarning> {
        let mut warnings = Vec::new();

        if let Some(store) = self.frames.take() {
            let path = store.path().to_path_buf();
            let count = store.len();
            match store.close() {
                Ok(()) => log::debug!("Removed {} frames in {}", count, path.display()),
                Err(error) => warnings.push(CleanupWarning { path, error }),
            }
        }

        if let Some(staged) = self.staged_input.take() {
            let path = staged.to_path_buf();
            if let Err(error) = staged.close() {
                warnings.push(CleanupWarning { path, error });
            }
        }

        for warning in &warnings {
            log::warn!("Cleanup: {}", warning);
            self.log.warning(&warning.to_string());
        }
        warnings
    }
}

impl Drop for JobResources {
    fn drop(&mut self) {
        self.release();
    }
}
