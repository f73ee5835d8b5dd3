//! Area resampling.
//!
//! Each output pixel is the overlap-weighted mean of the input pixels its
//! footprint covers:
//!
//! ```text
//! input  |  0  |  1  |  2  |  3  |  4  |       (5 px)
//! output |    0     |    1     |             (2 px, scale 2.5)
//!
//! out[0] = (in[0] + in[1] + 0.5·in[2]) / 2.5
//! out[1] = (0.5·in[2] + in[3] + in[4]) / 2.5
//! ```
//!
//! The filter is separable, so rows and columns are resampled in two passes.
//! Downscaling averages whole regions (no aliasing from skipped pixels);
//! upscaling degenerates to replication with blended seams.

use ndarray::{Array3, ArrayView3, Axis};

/// Contribution of one input index to one output index.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tap {
    index: usize,
    weight: f32,
}

/// Per-output-index taps for resampling `input_len` onto `output_len`.
fn area_taps(input_len: usize, output_len: usize) -> Vec<Vec<Tap>> {
    let scale = input_len as f64 / output_len as f64;
    (0..output_len)
        .map(|o| {
            let start = o as f64 * scale;
            let end = (o as f64 + 1.0) * scale;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(input_len);
            (first..last)
                .filter_map(|i| {
                    let overlap = end.min(i as f64 + 1.0) - start.max(i as f64);
                    (overlap > 1e-12).then(|| Tap {
                        index: i,
                        weight: (overlap / scale) as f32,
                    })
                })
                .collect()
        })
        .collect()
}

/// Resample along one axis of an `[H, W, C]` array.
fn resample_axis(input: ArrayView3<f32>, axis: Axis, output_len: usize) -> Array3<f32> {
    let mut shape = [input.shape()[0], input.shape()[1], input.shape()[2]];
    let taps = area_taps(shape[axis.index()], output_len);
    shape[axis.index()] = output_len;

    let mut output = Array3::<f32>::zeros(shape);
    for (o, mut out_lane) in output.axis_iter_mut(axis).enumerate() {
        for tap in &taps[o] {
            out_lane.scaled_add(tap.weight, &input.index_axis(axis, tap.index));
        }
    }
    output
}

/// Area-resize an `[H, W, C]` image to `[height, width, C]`.
///
/// A no-op copy when the size already matches. Zero-sized inputs or targets
/// yield an empty array of the target shape.
pub fn area_resize(input: ArrayView3<f32>, height: usize, width: usize) -> Array3<f32> {
    let (h, w, c) = input.dim();
    if h == 0 || w == 0 || height == 0 || width == 0 {
        return Array3::zeros((height, width, c));
    }
    if (h, w) == (height, width) {
        return input.to_owned();
    }
    let columns = resample_axis(input, Axis(1), width);
    resample_axis(columns.view(), Axis(0), height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_taps_sum_to_one() {
        for (input, output) in [(5, 2), (640, 224), (360, 224), (3, 7), (224, 224)] {
            for taps in area_taps(input, output) {
                let total: f32 = taps.iter().map(|t| t.weight).sum();
                assert!((total - 1.0).abs() < 1e-5, "{input}->{output}: {total}");
            }
        }
    }

    #[test]
    fn test_fractional_overlap() {
        let taps = area_taps(5, 2);
        assert_eq!(taps[0].len(), 3);
        assert!((taps[0][2].weight - 0.2).abs() < 1e-6);
        assert_eq!(taps[1][0].index, 2);
    }

    #[test]
    fn test_integer_downscale_is_block_mean() {
        // 4x4 single channel, values 0..16, down to 2x2
        let input = Array3::from_shape_fn((4, 4, 1), |(y, x, _)| (y * 4 + x) as f32);
        let out = area_resize(input.view(), 2, 2);
        assert_eq!(out.dim(), (2, 2, 1));
        assert!((out[[0, 0, 0]] - 2.5).abs() < 1e-5);
        assert!((out[[1, 1, 0]] - 12.5).abs() < 1e-5);
    }

    #[test]
    fn test_constant_image_stays_constant() {
        let input = Array3::from_elem((360, 640, 3), 0.25f32);
        let out = area_resize(input.view(), 224, 224);
        assert_eq!(out.dim(), (224, 224, 3));
        assert!(out.iter().all(|&v| (v - 0.25).abs() < 1e-5));
    }

    #[test]
    fn test_channels_independent() {
        let input = Array3::from_shape_fn((6, 6, 3), |(_, _, c)| c as f32);
        let out = area_resize(input.view(), 4, 4);
        for c in 0..3 {
            assert!(out
                .index_axis(Axis(2), c)
                .iter()
                .all(|&v| (v - c as f32).abs() < 1e-5));
        }
    }

    #[test]
    fn test_upscale_shape() {
        let input = Array3::from_elem((2, 3, 1), 1.0f32);
        let out = area_resize(input.view(), 5, 7);
        assert_eq!(out.dim(), (5, 7, 1));
        assert!(out.iter().all(|&v| (v - 1.0).abs() < 1e-5));
    }
}
