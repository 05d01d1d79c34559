mod cli;
mod config;
mod audio;
mod render;
mod encode;
mod pipeline;
mod diagnostics;
mod error;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use cli::Cli;
use config::{PipelineConfig, VisualizerConfig};
use diagnostics::ErrorLog;
use encode::ffmpeg::{CodecProfile, FfmpegEncoder};
use pipeline::job::{JobEvent, JobSpec, JobState, Orchestrator};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Config values apply only when the CLI is at its default
    let mut data_root = cli.data_dir.clone();
    if let Some(path) = config::discover_config(cli.config.as_deref()) {
        match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                if cli.width == config::default_width() { cli.width = cfg.output.width; }
                if cli.height == config::default_height() { cli.height = cfg.output.height; }
                if cli.fps == config::default_fps() { cli.fps = cfg.output.fps; }
                if cli.color == config::default_color() { cli.color = cfg.visual.color; }
                if cli.amplitude_scale == config::default_amplitude_scale() {
                    cli.amplitude_scale = cfg.visual.amplitude_scale;
                }
                if cli.point_size == config::default_point_size() {
                    cli.point_size = cfg.visual.point_size;
                }
                if cli.alpha == config::default_alpha() { cli.alpha = cfg.visual.alpha; }
                if cli.dpi == config::default_dpi() { cli.dpi = cfg.visual.dpi; }
                if data_root.is_none() {
                    data_root = cfg.paths.root;
                }
            }
            Err(err) => log::warn!("{:#}", err),
        }
    }

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    let paths = PipelineConfig::with_root(&data_root.unwrap_or_else(PipelineConfig::default_root));
    paths.ensure_dirs().context("Failed to create data directories")?;
    render::store::sweep_stale(&paths.temp_dir);

    let visual = VisualizerConfig {
        fps: cli.fps,
        width: cli.width,
        height: cli.height,
        color: cli.color,
        amplitude_scale: cli.amplitude_scale,
        point_size: cli.point_size,
        alpha: cli.alpha,
        dpi: cli.dpi,
    };
    visual.validate()?;

    log::info!("gonioviz - stereo goniometer video renderer");
    log::info!("Input: {}", cli.input.display());
    log::info!("Resolution: {}x{} @ {}fps, color {}", visual.width, visual.height, visual.fps, visual.color);

    let encoder = FfmpegEncoder::new(CodecProfile {
        video_codec: cli.codec.clone(),
        pix_fmt: cli.pix_fmt.clone(),
        crf: cli.crf,
        video_bitrate: cli.bitrate.clone(),
        ..Default::default()
    })
    .with_binary(&cli.ffmpeg);
    if !encoder.is_available() {
        log::warn!(
            "{} not found; frames will render but encoding will fail",
            cli.ffmpeg.display()
        );
    }

    let error_log = Arc::new(ErrorLog::new(&paths.log_dir));
    let orchestrator = Arc::new(
        Orchestrator::new(paths, Arc::new(encoder), error_log.clone()).with_workers(cli.workers),
    );

    let handle = orchestrator.spawn(JobSpec {
        input: cli.input.clone(),
        output: cli.output.clone(),
        visual,
    })?;

    let canceller = handle.canceller();
    if let Err(e) = ctrlc::set_handler(move || {
        log::warn!("Interrupted; stopping after the current frame");
        canceller.cancel();
    }) {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    for event in handle.events().iter() {
        match event {
            JobEvent::State(state) if !state.is_terminal() => pb.set_message(format!("{:?}", state)),
            JobEvent::State(_) => {}
            JobEvent::Progress(p) => pb.set_position(p as u64),
            JobEvent::Completed { message, frames, output } => {
                pb.finish_with_message(message);
                log::info!("Encoded {} frames into {}", frames, output.display());
            }
            JobEvent::Failed { message } => pb.abandon_with_message(message),
        }
    }

    let report = handle.join();
    match report.state {
        JobState::Completed => {
            if report.partial {
                log::warn!(
                    "Partial video: {}/{} frames rendered",
                    report.frames_generated,
                    report.num_frames
                );
            }
            if let Some(ref output) = report.output {
                log::info!("Done! Output: {}", output.display());
            }
            Ok(())
        }
        _ => {
            if error_log.path().exists() {
                log::error!("Details in {}", error_log.path().display());
            }
            anyhow::bail!("{}", report.message)
        }
    }
}
