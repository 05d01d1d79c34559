use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use rayon::prelude::*;

use super::cleanup::JobResources;
use crate::audio::decode::decode_audio;
use crate::audio::normalize::normalize;
use crate::audio::window::{SampleWindow, WindowSegmenter};
use crate::config::{PipelineConfig, VisualizerConfig};
use crate::diagnostics::ErrorLog;
use crate::encode::{EncodeRequest, Encoder};
use crate::error::{PipelineError, PipelineResult};
use crate::render::raster::Canvas;
use crate::render::store::FrameStore;
use crate::render::{FrameRenderer, GonioRenderer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Loading,
    Normalizing,
    Rendering,
    Encoding,
    Cleanup,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum JobEvent {
    State(JobState),
    /// Percent of windows rendered, 0-100.
    Progress(u8),
    Completed { message: String, frames: u32, output: PathBuf },
    Failed { message: String },
}

/// Final outcome of one job.
#[derive(Clone, Debug)]
pub struct JobReport {
    pub state: JobState,
    pub frames_generated: u32,
    pub num_frames: u32,
    /// Set when rendering stopped early but a video was still produced.
    pub partial: bool,
    pub output: Option<PathBuf>,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct JobSpec {
    pub input: PathBuf,
    /// Defaults to `<output_dir>/<stem>_gonio.mp4`.
    pub output: Option<PathBuf>,
    pub visual: VisualizerConfig,
}

/// Requests cooperative cancellation of a running job. Cheap to clone and
/// safe to move into a signal handler.
#[derive(Clone, Debug)]
pub struct Canceller(Arc<AtomicBool>);

impl Canceller {
    /// Stop after the frame currently being written; frames so far are still encoded.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Handle to a job running on its own thread.
pub struct JobHandle {
    events: Receiver<JobEvent>,
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<JobReport>,
}

impl JobHandle {
    pub fn events(&self) -> &Receiver<JobEvent> {
        &self.events
    }

    pub fn canceller(&self) -> Canceller {
        Canceller(self.cancel.clone())
    }

    pub fn join(self) -> JobReport {
        match self.thread.join() {
            Ok(report) => report,
            Err(_) => JobReport {
                state: JobState::Failed,
                frames_generated: 0,
                num_frames: 0,
                partial: false,
                output: None,
                message: "Job worker panicked".into(),
            },
        }
    }
}

struct EventSink(Option<Sender<JobEvent>>);

impl EventSink {
    fn send(&self, event: JobEvent) {
        if let Some(tx) = &self.0 {
            // Receiver may be gone; the job still runs to cleanup.
            let _ = tx.send(event);
        }
    }

    fn state(&self, state: JobState) {
        log::debug!("Job state -> {:?}", state);
        self.send(JobEvent::State(state));
    }
}

/// Result of the load/normalize/render stages.
struct Rendered {
    frames_generated: u32,
    num_frames: u32,
    /// Why rendering stopped before the last window, if it did.
    interruption: Option<PipelineError>,
}

pub struct Orchestrator {
    paths: PipelineConfig,
    encoder: Arc<dyn Encoder>,
    error_log: Arc<ErrorLog>,
    workers: usize,
}

impl Orchestrator {
    pub fn new(paths: PipelineConfig, encoder: Arc<dyn Encoder>, error_log: Arc<ErrorLog>) -> Self {
        Self {
            paths,
            encoder,
            error_log,
            workers: 0,
        }
    }

    /// Rasterization threads; 0 lets rayon decide.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Run the job on a dedicated thread and return immediately.
    pub fn spawn(self: &Arc<Self>, spec: JobSpec) -> PipelineResult<JobHandle> {
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let this = Arc::clone(self);
        let token = cancel.clone();

        let thread = std::thread::Builder::new()
            .name("gonioviz-job".into())
            .spawn(move || this.run(&spec, Some(tx), &token))
            .map_err(|e| PipelineError::io(Path::new("<job thread>"), e))?;

        Ok(JobHandle {
            events: rx,
            cancel,
            thread,
        })
    }

    pub fn run(&self, spec: &JobSpec, events: Option<Sender<JobEvent>>, cancel: &AtomicBool) -> JobReport {
        let renderer = GonioRenderer::new(&spec.visual);
        self.run_with(spec, &renderer, events, cancel)
    }

    pub fn run_with(
        &self,
        spec: &JobSpec,
        renderer: &dyn FrameRenderer,
        events: Option<Sender<JobEvent>>,
        cancel: &AtomicBool,
    ) -> JobReport {
        let sink = EventSink(events);
        let name = display_name(&spec.input);
        let output = spec
            .output
            .clone()
            .unwrap_or_else(|| self.paths.default_output_for(&spec.input));

        log::info!("Job started: {} -> {}", spec.input.display(), output.display());

        let mut resources = JobResources::new(self.error_log.clone());

        let (rendered, fatal) = match self.produce_frames(spec, renderer, &mut resources, &sink, cancel) {
            Ok(rendered) => (rendered, None),
            Err(e) => (
                Rendered {
                    frames_generated: 0,
                    num_frames: 0,
                    interruption: None,
                },
                Some(e),
            ),
        };

        if let Some(ref e) = fatal {
            log::error!("Processing {} failed: {}", name, e);
            self.error_log
                .error(&format!("Frame generation failed for {}: {}", name, e));
        }
        if let Some(ref e) = rendered.interruption {
            log::warn!(
                "Rendering stopped after {}/{} frames: {}",
                rendered.frames_generated,
                rendered.num_frames,
                e
            );
            if !matches!(e, PipelineError::Cancelled) {
                self.error_log
                    .error(&format!("Frame generation failed for {}: {}", name, e));
            }
        }

        // Partial recovery: encode whatever made it to disk.
        let encoded = if rendered.frames_generated > 0 {
            sink.state(JobState::Encoding);
            Some(self.encode(spec, &resources, rendered.frames_generated, &output))
        } else {
            None
        };

        sink.state(JobState::Cleanup);
        resources.release();

        let report = match (encoded, fatal) {
            (Some(Ok(path)), _) => {
                let message = format!("Processed {} with {} frames.", name, rendered.frames_generated);
                JobReport {
                    state: JobState::Completed,
                    frames_generated: rendered.frames_generated,
                    num_frames: rendered.num_frames,
                    partial: rendered.interruption.is_some(),
                    output: Some(path),
                    message,
                }
            }
            (Some(Err(e)), _) => {
                log::error!("Encoding failed for {}: {}", name, e);
                self.error_log
                    .error(&format!("Video compilation failed for {}: {}", name, e));
                self.failed(&rendered, format!("Video compilation failed for {}. Check log.", name))
            }
            (None, Some(e)) => self.failed(
                &rendered,
                format!("{}. No frames generated for {}.", e, name),
            ),
            (None, None) => {
                self.error_log
                    .error(&format!("No frames generated for {}", name));
                self.failed(&rendered, format!("No frames generated for {}.", name))
            }
        };

        sink.state(report.state);
        match report.state {
            JobState::Completed => sink.send(JobEvent::Completed {
                message: report.message.clone(),
                frames: report.frames_generated,
                output: report.output.clone().unwrap_or_default(),
            }),
            _ => sink.send(JobEvent::Failed {
                message: report.message.clone(),
            }),
        }

        log::info!("Job finished ({:?}): {}", report.state, report.message);
        report
    }

    fn failed(&self, rendered: &Rendered, message: String) -> JobReport {
        JobReport {
            state: JobState::Failed,
            frames_generated: rendered.frames_generated,
            num_frames: rendered.num_frames,
            partial: false,
            output: None,
            message,
        }
    }

    /// Loading, normalizing and rendering. Errors here are fatal; a fault
    /// during rendering is carried in `Rendered::interruption` instead.
    fn produce_frames(
        &self,
        spec: &JobSpec,
        renderer: &dyn FrameRenderer,
        resources: &mut JobResources,
        sink: &EventSink,
        cancel: &AtomicBool,
    ) -> PipelineResult<Rendered> {
        spec.visual.validate()?;

        sink.state(JobState::Loading);
        let staged = resources.stage_input(&spec.input, &self.paths.input_dir)?;
        let track = decode_audio(&staged)?;

        sink.state(JobState::Normalizing);
        let track = normalize(track)?;

        sink.state(JobState::Rendering);
        let segmenter = WindowSegmenter::new(&track, spec.visual.fps)?;
        let num_frames = segmenter.num_frames();
        log::info!(
            "Rendering {} frames ({} samples per frame)",
            num_frames,
            segmenter.frame_step()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("gonioviz-raster-{i}"))
            .build()
            .map_err(|e| PipelineError::config(format!("failed to build render pool: {e}")))?;

        let store = resources.create_frame_store(&self.paths.temp_dir)?;
        let interruption = render_frames(&pool, &segmenter, renderer, store, sink, cancel);

        Ok(Rendered {
            frames_generated: store.len(),
            num_frames,
            interruption,
        })
    }

    fn encode(
        &self,
        spec: &JobSpec,
        resources: &JobResources,
        frames: u32,
        output: &Path,
    ) -> PipelineResult<PathBuf> {
        let store = resources
            .frames()
            .ok_or_else(|| PipelineError::encoding("frame store is gone"))?;
        let pattern = store.pattern();
        let audio = resources
            .staged_input()
            .ok_or_else(|| PipelineError::encoding("staged audio is gone"))?;

        self.encoder.encode(&EncodeRequest {
            frame_pattern: &pattern,
            frame_count: frames,
            fps: spec.visual.fps,
            width: spec.visual.width,
            height: spec.visual.height,
            audio,
            output,
        })
    }
}

/// Render windows in parallel batches, persisting strictly in index order.
/// Returns the error that stopped the loop, if any.
fn render_frames(
    pool: &rayon::ThreadPool,
    segmenter: &WindowSegmenter<'_>,
    renderer: &dyn FrameRenderer,
    store: &mut FrameStore,
    sink: &EventSink,
    cancel: &AtomicBool,
) -> Option<PipelineError> {
    let num_frames = segmenter.num_frames();
    // Bounds how many canvases are alive at once.
    let batch_len = (pool.current_num_threads() * 2).max(1);
    let mut windows = segmenter.iter();

    loop {
        if cancel.load(Ordering::SeqCst) {
            return Some(PipelineError::Cancelled);
        }
        let batch: Vec<SampleWindow<'_>> = windows.by_ref().take(batch_len).collect();
        if batch.is_empty() {
            return None;
        }

        let rendered: Vec<PipelineResult<Canvas>> = pool.install(|| {
            batch
                .par_iter()
                .map(|window| render_one(renderer, window))
                .collect()
        });

        for (window, result) in batch.iter().zip(rendered) {
            if let Err(e) = result.and_then(|canvas| store.write(window.index, canvas).map(|_| ())) {
                return Some(e);
            }
            let generated = store.len();
            sink.send(JobEvent::Progress(percent(generated, num_frames)));
            if generated < num_frames && cancel.load(Ordering::SeqCst) {
                return Some(PipelineError::Cancelled);
            }
        }
    }
}

fn render_one(renderer: &dyn FrameRenderer, window: &SampleWindow<'_>) -> PipelineResult<Canvas> {
    match catch_unwind(AssertUnwindSafe(|| renderer.render(window))) {
        Ok(result) => result,
        Err(_) => Err(PipelineError::raster(window.index, "renderer panicked")),
    }
}

fn percent(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done as u64 * 100) / total as u64).min(100) as u8
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
