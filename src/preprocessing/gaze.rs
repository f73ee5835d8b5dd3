//! Gaze normalization.

use crate::config::SamplingConfig;

/// Divides screen coordinates by the fixed source viewport.
///
/// ```text
/// (x, y) ──► (x / width, y / height)
/// ```
///
/// Values outside [0, 1] (gaze off-screen) are passed through, not clipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportNormalizer {
    width: f64,
    height: f64,
}

impl ViewportNormalizer {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn from_config(sampling: &SamplingConfig) -> Self {
        Self::new(sampling.viewport_width, sampling.viewport_height)
    }

    #[inline]
    pub fn normalize(&self, x: f64, y: f64) -> [f64; 2] {
        [x / self.width, y / self.height]
    }
}

impl Default for ViewportNormalizer {
    fn default() -> Self {
        Self::from_config(&SamplingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_viewport() {
        let n = ViewportNormalizer::default();
        assert_eq!(n.normalize(320.0, 180.0), [0.5, 0.5]);
        assert_eq!(n.normalize(640.0, 0.0), [1.0, 0.0]);
    }

    #[test]
    fn test_off_screen_not_clipped() {
        let n = ViewportNormalizer::new(100.0, 50.0);
        assert_eq!(n.normalize(-10.0, 75.0), [-0.1, 1.5]);
    }
}
