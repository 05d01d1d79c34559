pub mod polar;
pub mod raster;
pub mod store;

use crate::audio::window::SampleWindow;
use crate::config::VisualizerConfig;
use crate::error::PipelineResult;

use raster::{Canvas, FrameRasterizer};

/// Turns one sample window into pixels. Implementations must be pure so
/// windows can be rendered on any thread in any order.
pub trait FrameRenderer: Send + Sync {
    fn render(&self, window: &SampleWindow<'_>) -> PipelineResult<Canvas>;
}

/// Polar projection followed by rasterization.
#[derive(Clone, Debug)]
pub struct GonioRenderer {
    amplitude_scale: f32,
    rasterizer: FrameRasterizer,
}

impl GonioRenderer {
    pub fn new(config: &VisualizerConfig) -> Self {
        Self {
            amplitude_scale: config.amplitude_scale,
            rasterizer: FrameRasterizer::new(config),
        }
    }
}

impl FrameRenderer for GonioRenderer {
    fn render(&self, window: &SampleWindow<'_>) -> PipelineResult<Canvas> {
        let scatter = polar::project(window, self.amplitude_scale);
        self.rasterizer.rasterize(window.index, &scatter)
    }
}
