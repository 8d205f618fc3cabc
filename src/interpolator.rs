use ndarray::{Array2, ArrayView2};

pub(crate) struct Interpolator;

impl Interpolator {
    /// For every output index, the source indices it covers and their
    /// weights. Each output cell spans `src / dst` input cells and the weight
    /// is the overlapping fraction, so weights of one output sum to 1.
    pub(crate) fn area_weights(src: usize, dst: usize) -> Vec<Vec<(usize, f32)>> {
        let scale = src as f64 / dst as f64;
        let inv_scale = 1.0 / scale;

        (0..dst)
            .map(|i| {
                let start = i as f64 * scale;
                let end = start + scale;
                let first = start.floor() as usize;
                let last = (end.ceil() as usize).min(src);

                (first..last)
                    .filter_map(|j| {
                        let overlap = end.min(j as f64 + 1.0) - start.max(j as f64);
                        (overlap > 1e-9).then(|| (j, (overlap * inv_scale) as f32))
                    })
                    .collect()
            })
            .collect()
    }

    /// Area-averaging resize, rows first, then columns.
    pub(crate) fn resize_area(plane: &ArrayView2<f32>, height: usize, width: usize) -> Array2<f32> {
        let (src_height, src_width) = plane.dim();
        if (src_height, src_width) == (height, width) {
            return plane.to_owned();
        }

        let mut rows = Array2::<f32>::zeros((height, src_width));
        for (y, taps) in Self::area_weights(src_height, height).iter().enumerate() {
            let mut out = rows.row_mut(y);
            for &(src_y, weight) in taps {
                out.scaled_add(weight, &plane.row(src_y));
            }
        }

        let mut resized = Array2::<f32>::zeros((height, width));
        for (x, taps) in Self::area_weights(src_width, width).iter().enumerate() {
            let mut out = resized.column_mut(x);
            for &(src_x, weight) in taps {
                out.scaled_add(weight, &rows.column(src_x));
            }
        }

        resized
    }
}
