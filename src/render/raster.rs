use image::RgbImage;
use vello_cpu::kurbo::{Circle, Rect, Shape};
use vello_cpu::peniko::Color;
use vello_cpu::{Pixmap, RenderContext};

use super::polar::PolarScatter;
use crate::config::{Rgb, VisualizerConfig};
use crate::error::{PipelineError, PipelineResult};

/// Radius value that lands exactly on the inscribed circle.
pub const RADIUS_LIMIT: f32 = 2.0;

/// Flattening tolerance for circle paths, in pixels.
const PATH_TOLERANCE: f64 = 0.1;

/// Opaque RGB8 pixel buffer, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Canvas {
    pub fn black(width: u32, height: u32) -> PipelineResult<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| PipelineError::config(format!("canvas {width}x{height} is too large")))?;
        Ok(Self {
            width,
            height,
            data: vec![0u8; len],
        })
    }

    /// Drops the alpha channel of an opaque pixmap.
    fn from_opaque_pixmap(pixmap: &Pixmap) -> Self {
        let data = pixmap
            .data_as_u8_slice()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        Self {
            width: pixmap.width() as u32,
            height: pixmap.height() as u32,
            data,
        }
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = ((y * self.width + x) * 3) as usize;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    pub fn into_image(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data)
    }
}

/// Draws a polar scatter on a black canvas. Output depends only on the
/// scatter and the construction parameters.
#[derive(Clone, Debug)]
pub struct FrameRasterizer {
    width: u32,
    height: u32,
    color: Rgb,
    alpha: f32,
    marker_radius: f32,
}

impl FrameRasterizer {
    pub fn new(config: &VisualizerConfig) -> Self {
        let (width, height) = config.canvas_size();
        Self::with_canvas(width, height, config.color, config.alpha, config.marker_radius_px())
    }

    pub fn with_canvas(width: u32, height: u32, color: Rgb, alpha: f32, marker_radius: f32) -> Self {
        Self {
            width,
            height,
            color,
            alpha: alpha.clamp(0.0, 1.0),
            // anything thinner vanishes entirely
            marker_radius: marker_radius.max(0.5),
        }
    }

    pub fn rasterize(&self, index: u32, scatter: &PolarScatter) -> PipelineResult<Canvas> {
        if scatter.is_empty() {
            return Canvas::black(self.width, self.height)
                .map_err(|e| PipelineError::raster(index, e.to_string()));
        }

        let (w, h) = match (u16::try_from(self.width), u16::try_from(self.height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(PipelineError::raster(
                    index,
                    format!("canvas {}x{} is out of range", self.width, self.height),
                ))
            }
        };

        let cx = self.width as f64 / 2.0;
        let cy = self.height as f64 / 2.0;
        let plot_radius = self.width.min(self.height) as f64 / 2.0;
        let px_per_unit = plot_radius / RADIUS_LIMIT as f64;

        let mut ctx = RenderContext::new(w, h);
        ctx.set_paint(Color::from_rgba8(0, 0, 0, 255));
        ctx.fill_rect(&Rect::new(0.0, 0.0, self.width as f64, self.height as f64));

        // Polar axes clip
        ctx.push_clip_layer(&Circle::new((cx, cy), plot_radius).to_path(PATH_TOLERANCE));
        let alpha = (self.alpha * 255.0).round() as u8;
        ctx.set_paint(Color::from_rgba8(self.color.r, self.color.g, self.color.b, alpha));

        for (theta, radius) in scatter.points() {
            if !theta.is_finite() || !radius.is_finite() {
                return Err(PipelineError::raster(
                    index,
                    format!("non-finite point (theta={theta}, radius={radius})"),
                ));
            }
            let r_px = radius as f64 * px_per_unit;
            let x = cx + r_px * (theta as f64).cos();
            let y = cy - r_px * (theta as f64).sin();
            let marker = Circle::new((x, y), self.marker_radius as f64);
            ctx.fill_path(&marker.to_path(PATH_TOLERANCE));
        }
        ctx.pop_layer();

        ctx.flush();
        let mut pixmap = Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        Ok(Canvas::from_opaque_pixmap(&pixmap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn rasterizer() -> FrameRasterizer {
        FrameRasterizer::with_canvas(64, 48, Rgb { r: 0, g: 255, b: 0 }, 0.5, 2.0)
    }

    fn scatter(points: &[(f32, f32)]) -> PolarScatter {
        PolarScatter {
            theta: points.iter().map(|p| p.0).collect(),
            radius: points.iter().map(|p| p.1).collect(),
            amplitude: 0.0,
        }
    }

    #[test]
    fn empty_scatter_is_all_black() {
        let canvas = rasterizer().rasterize(0, &PolarScatter::default()).unwrap();
        assert_eq!(canvas.data.len(), 64 * 48 * 3);
        assert!(canvas.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn origin_point_lands_at_center() {
        let canvas = rasterizer().rasterize(0, &scatter(&[(0.0, 0.0)])).unwrap();
        let [r, g, b] = canvas.pixel(32, 24);
        assert_eq!((r, b), (0, 0));
        assert!((126..=129).contains(&g), "green {g}");
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0]);
    }

    #[test]
    fn overlapping_points_accumulate() {
        let one = rasterizer().rasterize(0, &scatter(&[(0.0, 0.0)])).unwrap();
        let two = rasterizer()
            .rasterize(0, &scatter(&[(0.0, 0.0), (0.0, 0.0)]))
            .unwrap();
        assert!(two.pixel(32, 24)[1] > one.pixel(32, 24)[1]);
        assert_eq!(two.pixel(32, 24)[0], 0);
    }

    #[test]
    fn limit_radius_touches_inscribed_circle() {
        // theta = 0 points right; plot radius is 24px for a 64x48 canvas
        let canvas = rasterizer().rasterize(0, &scatter(&[(0.0, 1.0)])).unwrap();
        assert!(canvas.pixel(44, 24)[1] > 0);
        let canvas = rasterizer().rasterize(0, &scatter(&[(PI / 2.0, 2.0)])).unwrap();
        assert!(canvas.pixel(32, 1)[1] > 0);
    }

    #[test]
    fn points_outside_the_plot_are_clipped() {
        let canvas = rasterizer().rasterize(0, &scatter(&[(0.0, 3.0)])).unwrap();
        assert!(canvas.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn markers_straddling_the_plot_edge_are_cut() {
        // centre at x = 59.6, the inscribed circle ends at x = 56
        let canvas = rasterizer().rasterize(0, &scatter(&[(0.0, 2.3)])).unwrap();
        assert_eq!(canvas.pixel(59, 24), [0, 0, 0]);
        assert_eq!(canvas.pixel(60, 24), [0, 0, 0]);
    }

    #[test]
    fn opaque_markers_take_the_configured_color() {
        let r = FrameRasterizer::with_canvas(32, 32, Rgb { r: 255, g: 0, b: 128 }, 1.0, 3.0);
        let canvas = r.rasterize(0, &scatter(&[(0.0, 0.0)])).unwrap();
        assert_eq!(canvas.pixel(16, 16), [255, 0, 128]);
    }

    #[test]
    fn rendering_is_deterministic() {
        let pts: Vec<(f32, f32)> = (0..500)
            .map(|i| ((i as f32 * 0.37) % (2.0 * PI) - PI, (i as f32 * 0.011) % 2.0))
            .collect();
        let s = scatter(&pts);
        let a = rasterizer().rasterize(3, &s).unwrap();
        let b = rasterizer().rasterize(3, &s).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn non_finite_point_is_a_fault() {
        let err = rasterizer()
            .rasterize(9, &scatter(&[(0.0, f32::NAN)]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Rasterization { index: 9, .. }));
    }

    #[test]
    fn converts_to_image() {
        let canvas = rasterizer().rasterize(0, &PolarScatter::default()).unwrap();
        let img = canvas.into_image().unwrap();
        assert_eq!(img.dimensions(), (64, 48));
    }
}
