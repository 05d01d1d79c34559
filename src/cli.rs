use clap::Parser;
use std::path::PathBuf;

use crate::config::Rgb;

#[derive(Parser, Debug)]
#[command(name = "gonioviz", about = "Render a stereo recording as a goniometer video")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG), exactly two channels
    pub input: PathBuf,

    /// Output video file [default: <data dir>/output/<name>_gonio.mp4]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root for input/output/temp_frames/error_logs directories
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Video width in pixels
    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    /// Frames per second
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Point color (#rrggbb or r,g,b)
    #[arg(long, default_value = "#00ff00")]
    pub color: Rgb,

    /// Radius boost from window loudness
    #[arg(short, long, default_value_t = 2.0)]
    pub amplitude_scale: f32,

    /// Marker area in pt²
    #[arg(short, long, default_value_t = 10.0)]
    pub point_size: f32,

    /// Marker opacity (0-1]
    #[arg(long, default_value_t = 0.3)]
    pub alpha: f32,

    /// Render density; 100 renders at the output resolution
    #[arg(long, default_value_t = 100)]
    pub dpi: u32,

    /// Rasterization threads (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    pub workers: usize,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg binary
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,
}
