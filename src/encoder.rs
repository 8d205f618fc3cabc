//! 2.5D multi-window encoding.
//!
//! Each slice of a volume is replaced by the mean of its `k` nearest slices
//! along z, mapped through three radiometric windows and resized to a square
//! classifier input.

use image::{ImageBuffer, Rgb};
use ndarray::{Array2, Array3, Array4, ArrayView2, ArrayView3, Axis, s};
use rayon::prelude::*;

use crate::{config::Config, error::TriageError, interpolator::Interpolator, volume::Volume};

/// Added to the window range to keep degenerate windows finite.
pub const WINDOW_EPSILON: f32 = 1e-6;

/// A linear intensity window given by its center and width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSpec {
    pub name: &'static str,
    pub center: f32,
    pub width: f32,
}

impl WindowSpec {
    pub const BASE: WindowSpec = WindowSpec {
        name: "base",
        center: 500.0,
        width: 3000.0,
    };
    pub const LUNG: WindowSpec = WindowSpec {
        name: "lung",
        center: 225.0,
        width: 2100.0,
    };
    pub const MEDIASTINUM: WindowSpec = WindowSpec {
        name: "mediastinum",
        center: 220.0,
        width: 360.0,
    };

    /// Channel order of the encoded stack.
    pub const CATALOG: [WindowSpec; 3] = [Self::BASE, Self::LUNG, Self::MEDIASTINUM];

    pub fn bounds(&self) -> (f32, f32) {
        let half = self.width / 2.0;
        (self.center - half, self.center + half)
    }

    /// Clip `value` to the window and rescale it to [0, 1].
    #[inline]
    pub fn apply(&self, value: f32) -> f32 {
        let (low, high) = self.bounds();
        (value.clamp(low, high) - low) / (high - low + WINDOW_EPSILON)
    }
}

/// Encoded slices shaped (depth, channel, size, size), values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedStack {
    data: Array4<f32>,
}

impl EncodedStack {
    pub fn len(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (depth, channels, height, width)
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    /// The three channels of slice `index`.
    pub fn get(&self, index: usize) -> Option<ArrayView3<'_, f32>> {
        (index < self.len()).then(|| self.data.index_axis(Axis(0), index))
    }

    /// Row-major samples, ready to hand to an inference runtime.
    pub fn as_slice(&self) -> Option<&[f32]> {
        self.data.as_slice()
    }

    /// Native-endian bytes of [`EncodedStack::as_slice`].
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.as_slice().map(bytemuck::cast_slice)
    }

    #[inline]
    fn normalize_to_u8(value: f32) -> u8 {
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    }

    /// Slice `index` as an RGB image, one window per color channel.
    pub fn preview(&self, index: usize) -> Option<ImageBuffer<Rgb<u8>, Vec<u8>>> {
        let channels = self.get(index)?;
        let (_, height, width) = channels.dim();
        let pixel_data: Vec<u8> = channels
            .permuted_axes([1, 2, 0])
            .iter()
            .map(|&v| Self::normalize_to_u8(v))
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiWindowEncoder {
    k_slices: usize,
    size: usize,
}

impl MultiWindowEncoder {
    /// # Errors
    ///
    /// [`TriageError::InvalidConfig`] unless `k_slices` is odd and positive
    /// and `size` is positive.
    pub fn new(k_slices: usize, size: usize) -> Result<Self, TriageError> {
        if k_slices % 2 == 0 {
            return Err(TriageError::InvalidConfig(format!(
                "k_slices must be odd and at least 1, got {k_slices}"
            )));
        }
        if size == 0 {
            return Err(TriageError::InvalidConfig(
                "img_size must be positive".to_string(),
            ));
        }
        Ok(Self { k_slices, size })
    }

    pub fn from_config(config: &Config) -> Result<Self, TriageError> {
        Self::new(config.k_slices, config.img_size)
    }

    /// Encode every slice of `volume`. Slices are processed in parallel and
    /// reassembled in z order.
    pub fn encode(&self, volume: &Volume) -> Result<EncodedStack, TriageError> {
        let (depth, height, width) = volume.dim();
        if depth == 0 {
            return Err(TriageError::EmptySeries {
                series_id: volume.series_id().to_string(),
            });
        }
        if height == 0 || width == 0 {
            return Err(TriageError::EmptyPlane {
                series_id: volume.series_id().to_string(),
                depth,
                plane: (height, width),
            });
        }

        let encoded: Vec<Array3<f32>> = (0..depth)
            .into_par_iter()
            .map(|z| {
                let slab = self.neighbor_average(volume.data(), z);
                self.encode_slab(&slab.view())
            })
            .collect();

        let mut data = Array4::<f32>::zeros((depth, WindowSpec::CATALOG.len(), self.size, self.size));
        for (z, channels) in encoded.iter().enumerate() {
            data.slice_mut(s![z, .., .., ..]).assign(channels);
        }

        log::debug!(
            "Encoded series {} into {:?}",
            volume.series_id(),
            data.dim()
        );
        Ok(EncodedStack { data })
    }

    /// Mean of the `k_slices` slices centred on `z`, reflecting at the
    /// volume boundaries without repeating the edge slice. `z` must be below
    /// the volume depth.
    pub(crate) fn neighbor_average(&self, volume: &Array3<f32>, z: usize) -> Array2<f32> {
        let depth = volume.len_of(Axis(0));
        let pad = (self.k_slices / 2) as isize;

        let mut slab = Array2::<f32>::zeros(volume.index_axis(Axis(0), z).raw_dim());
        for offset in -pad..=pad {
            let index = reflect_index(z as isize + offset, depth);
            slab += &volume.index_axis(Axis(0), index);
        }
        slab /= self.k_slices as f32;
        slab
    }

    /// Window a slab into three channels, then resize each to the target size.
    fn encode_slab(&self, slab: &ArrayView2<f32>) -> Array3<f32> {
        let mut channels = Array3::<f32>::zeros((WindowSpec::CATALOG.len(), self.size, self.size));
        for (c, window) in WindowSpec::CATALOG.iter().enumerate() {
            let windowed = slab.mapv(|v| window.apply(v));
            let resized = Interpolator::resize_area(&windowed.view(), self.size, self.size);
            channels
                .index_axis_mut(Axis(0), c)
                .assign(&resized.mapv(|v| v.clamp(0.0, 1.0)));
        }
        channels
    }
}

/// Map an index outside `0..len` back inside by mirroring around the first
/// and last elements, which are not repeated. Repeats for short axes.
pub(crate) fn reflect_index(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let wrapped = index.rem_euclid(period);
    if wrapped < len as isize {
        wrapped as usize
    } else {
        (period - wrapped) as usize
    }
}
