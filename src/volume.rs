use ndarray::{Array3, ArrayView2, Axis};

/// Calibrated intensities of one series, shaped (depth, height, width).
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    series_id: String,
    data: Array3<f32>,
}

impl Volume {
    pub fn new(series_id: impl Into<String>, data: Array3<f32>) -> Self {
        Self {
            series_id: series_id.into(),
            data,
        }
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn depth(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn get_slice(&self, index: usize) -> Option<ArrayView2<'_, f32>> {
        (index < self.depth()).then(|| self.data.index_axis(Axis(0), index))
    }
}
