use std::f32::consts::PI;

use crate::audio::window::SampleWindow;

/// Polar coordinates of every sample pair in one window.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolarScatter {
    pub theta: Vec<f32>,
    pub radius: Vec<f32>,
    /// `mean(|l| + |r|) * amplitude_scale`
    pub amplitude: f32,
}

impl PolarScatter {
    pub fn is_empty(&self) -> bool {
        self.theta.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.theta.iter().copied().zip(self.radius.iter().copied())
    }
}

pub fn window_amplitude(left: &[f32], right: &[f32], amplitude_scale: f32) -> f32 {
    let n = left.len().min(right.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = left
        .iter()
        .zip(right)
        .map(|(l, r)| (l.abs() + r.abs()) as f64)
        .sum();
    (sum / n as f64) as f32 * amplitude_scale
}

pub fn project(window: &SampleWindow<'_>, amplitude_scale: f32) -> PolarScatter {
    let left = window.left_chunk;
    let right = window.right_chunk;
    if left.is_empty() || right.is_empty() {
        return PolarScatter::default();
    }

    let amplitude = window_amplitude(left, right, amplitude_scale);
    let gain = 1.0 + amplitude;

    let (theta, radius) = left
        .iter()
        .zip(right)
        .map(|(&l, &r)| (angle(l, r), (l * l + r * r).sqrt() * gain))
        .unzip();

    PolarScatter {
        theta,
        radius,
        amplitude,
    }
}

/// `atan2(r, l)` folded into `(-π, π]`.
fn angle(l: f32, r: f32) -> f32 {
    let theta = r.atan2(l);
    if theta <= -PI {
        PI
    } else {
        theta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window<'a>(left: &'a [f32], right: &'a [f32]) -> SampleWindow<'a> {
        SampleWindow {
            index: 0,
            left_chunk: left,
            right_chunk: right,
        }
    }

    #[test]
    fn constant_half_window_has_unit_amplitude() {
        let l = [0.5f32; 64];
        let r = [0.5f32; 64];
        let s = project(&window(&l, &r), 1.0);
        assert!((s.amplitude - 1.0).abs() < 1e-6);
        assert_eq!(s.theta.len(), 64);
        for (theta, radius) in s.points() {
            assert!((radius - 0.5f32.sqrt() * 2.0).abs() < 1e-5);
            assert!((theta - PI / 4.0).abs() < 1e-6);
        }
    }

    #[test]
    fn amplitude_scale_multiplies_mean() {
        let l = [1.0f32, 0.0];
        let r = [0.0f32, -1.0];
        assert!((window_amplitude(&l, &r, 3.0) - 3.0).abs() < 1e-6);
        assert!((window_amplitude(&l, &r, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn silence_maps_to_origin() {
        let l = [0.0f32; 4];
        let r = [0.0f32; 4];
        let s = project(&window(&l, &r), 2.0);
        assert!(s.radius.iter().all(|&r| r == 0.0));
        assert_eq!(s.amplitude, 0.0);
    }

    #[test]
    fn theta_stays_in_half_open_range() {
        let l = [-1.0f32, -1.0, 1.0, 0.0, 0.3];
        let r = [0.0f32, -0.0, 0.0, -1.0, 0.7];
        let s = project(&window(&l, &r), 1.0);
        for (theta, radius) in s.points() {
            assert!(theta > -PI && theta <= PI, "theta {theta}");
            assert!(radius >= 0.0);
        }
        assert_eq!(s.theta[1], PI);
    }

    #[test]
    fn radius_bounded_for_normalized_input() {
        let l: Vec<f32> = (0..200).map(|i| ((i as f32) * 0.13).sin()).collect();
        let r: Vec<f32> = (0..200).map(|i| ((i as f32) * 0.07).cos()).collect();
        let s = project(&window(&l, &r), 1.5);
        let bound = 2.0 * (1.0 + s.amplitude);
        assert!(s.radius.iter().all(|&r| (0.0..=bound).contains(&r)));
    }

    #[test]
    fn empty_window_gives_empty_scatter() {
        let s = project(&window(&[], &[]), 1.0);
        assert!(s.is_empty());
        assert_eq!(s.amplitude, 0.0);
    }
}
