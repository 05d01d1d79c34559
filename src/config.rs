use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PipelineError, PipelineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };
}

impl FromStr for Rgb {
    type Err = String;

    /// Accepts `#rrggbb`, `rrggbb` or `r,g,b`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.contains(',') {
            let parts: Vec<&str> = s.split(',').map(str::trim).collect();
            if parts.len() != 3 {
                return Err(format!("expected r,g,b but got '{s}'"));
            }
            let channel = |p: &str| {
                p.parse::<u8>()
                    .map_err(|_| format!("color component '{p}' is not in 0-255"))
            };
            return Ok(Rgb {
                r: channel(parts[0])?,
                g: channel(parts[1])?,
                b: channel(parts[2])?,
            });
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected #rrggbb but got '{s}'"));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| format!("invalid hex color '{s}'"))
        };
        Ok(Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-job rendering parameters, immutable once the job starts.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualizerConfig {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub color: Rgb,
    pub amplitude_scale: f32,
    /// Marker area in pt² (scatter convention).
    pub point_size: f32,
    /// Constant opacity of each marker.
    pub alpha: f32,
    /// Rasterization density; 100 renders at exactly `width x height`.
    pub dpi: u32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            width: default_width(),
            height: default_height(),
            color: Rgb::GREEN,
            amplitude_scale: default_amplitude_scale(),
            point_size: default_point_size(),
            alpha: default_alpha(),
            dpi: default_dpi(),
        }
    }
}

impl VisualizerConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.fps == 0 {
            return Err(PipelineError::config("fps must be greater than zero"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::config("resolution must be non-zero"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            // yuv420p needs even dimensions
            return Err(PipelineError::config(format!(
                "resolution {}x{} must have even width and height",
                self.width, self.height
            )));
        }
        if !(self.amplitude_scale.is_finite() && self.amplitude_scale > 0.0) {
            return Err(PipelineError::config("amplitude_scale must be a positive number"));
        }
        if !(self.point_size.is_finite() && self.point_size > 0.0) {
            return Err(PipelineError::config("point_size must be a positive number"));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(PipelineError::config("alpha must be in (0, 1]"));
        }
        if self.dpi == 0 || self.dpi > 400 {
            return Err(PipelineError::config("dpi must be in 1..=400"));
        }
        Ok(())
    }

    /// Pixel size of the rasterized canvas before the encoder rescales it.
    pub fn canvas_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as u64 * self.dpi as u64) / 100).max(1) as u32;
        (scale(self.width), scale(self.height))
    }

    /// Marker radius in canvas pixels.
    pub fn marker_radius_px(&self) -> f32 {
        self.point_size.sqrt() * self.dpi as f32 / 72.0 / 2.0
    }
}

/// Process-wide directory layout, built once and passed to every job.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl PipelineConfig {
    pub fn with_root(root: &Path) -> Self {
        Self {
            input_dir: root.join("input"),
            output_dir: root.join("output"),
            temp_dir: root.join("temp_frames"),
            log_dir: root.join("error_logs"),
        }
    }

    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("gonioviz"))
            .unwrap_or_else(|| PathBuf::from("gonioviz"))
    }

    pub fn ensure_dirs(&self) -> PipelineResult<()> {
        for dir in [&self.input_dir, &self.output_dir, &self.temp_dir, &self.log_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
        }
        Ok(())
    }

    /// `<output_dir>/<stem>_gonio.mp4`
    pub fn default_output_for(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".into());
        self.output_dir.join(format!("{stem}_gonio.mp4"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_color")]
    pub color: Rgb,
    #[serde(default = "default_amplitude_scale")]
    pub amplitude_scale: f32,
    #[serde(default = "default_point_size")]
    pub point_size: f32,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
            amplitude_scale: default_amplitude_scale(),
            point_size: default_point_size(),
            alpha: default_alpha(),
            dpi: default_dpi(),
        }
    }
}

pub fn default_width() -> u32 { 1920 }
pub fn default_height() -> u32 { 1080 }
pub fn default_fps() -> u32 { 30 }
pub fn default_color() -> Rgb { Rgb::GREEN }
pub fn default_amplitude_scale() -> f32 { 2.0 }
pub fn default_point_size() -> f32 { 10.0 }
pub fn default_alpha() -> f32 { 0.3 }
pub fn default_dpi() -> u32 { 100 }

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    use anyhow::Context;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config {}", path.display()))
}

/// Explicit path, then `./gonioviz.toml`, then the user config directories.
pub fn discover_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("gonioviz.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("gonioviz").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("gonioviz").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
