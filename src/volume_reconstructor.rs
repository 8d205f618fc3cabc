use crate::{
    decoder::{SliceDecoder, SlicePixels},
    error::TriageError,
    series_selector::{Series, SliceFile},
    volume::Volume,
    warnings::Warnings,
};

use ndarray::{Array2, Array3, s};
use rayon::prelude::*;

pub struct VolumeReconstructor;

impl VolumeReconstructor {
    /// Decode every slice of `series` and stack the calibrated planes in
    /// series order.
    ///
    /// Slices that fail to decode are dropped with a warning.
    ///
    /// # Errors
    ///
    /// [`TriageError::EmptySeries`] when no slice could be decoded and
    /// [`TriageError::InconsistentGeometry`] when the decoded slices differ in
    /// rows or columns.
    pub fn reconstruct<D: SliceDecoder + ?Sized>(
        decoder: &D,
        series: &Series,
        warnings: &mut Warnings,
    ) -> Result<Volume, TriageError> {
        let decoded: Vec<_> = series
            .slices()
            .par_iter()
            .map(|slice| (slice, decoder.read_pixels(&slice.path)))
            .collect();

        let mut planes = Vec::with_capacity(decoded.len());
        for (slice, result) in decoded {
            match result {
                Ok(pixels) if pixels.pixels.is_empty() => warnings.push(format_args!(
                    "{}: skip slice {} (empty pixel matrix)",
                    series.series_id(),
                    slice.path.display()
                )),
                Ok(pixels) => planes.push((slice, Self::calibrate(&pixels))),
                Err(error) => warnings.push(format_args!("{}: skip slice ({error})", series.series_id())),
            }
        }

        if planes.is_empty() {
            return Err(TriageError::EmptySeries {
                series_id: series.series_id().to_string(),
            });
        }

        Self::validate_dimensions(series.series_id(), &planes)?;
        let volume = Self::build_volume_array(&planes);
        log::debug!(
            "Reconstructed series {} with shape {:?}",
            series.series_id(),
            volume.dim()
        );

        Ok(Volume::new(series.series_id(), volume))
    }

    /// Apply `raw * slope + intercept` to every sample.
    pub fn calibrate(pixels: &SlicePixels) -> Array2<f32> {
        let SlicePixels {
            pixels,
            rescale_slope,
            rescale_intercept,
        } = pixels;
        pixels.mapv(|raw| (f64::from(raw) * rescale_slope + rescale_intercept) as f32)
    }

    fn validate_dimensions(
        series_id: &str,
        planes: &[(&SliceFile, Array2<f32>)],
    ) -> Result<(), TriageError> {
        let first_dim = planes[0].1.dim();
        match planes.iter().find(|(_, plane)| plane.dim() != first_dim) {
            Some((slice, plane)) => Err(TriageError::InconsistentGeometry {
                series_id: series_id.to_string(),
                path: slice.path.clone(),
                expected: first_dim,
                found: plane.dim(),
            }),
            None => Ok(()),
        }
    }

    fn build_volume_array(planes: &[(&SliceFile, Array2<f32>)]) -> Array3<f32> {
        let (height, width) = planes[0].1.dim();
        let depth = planes.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, (_, plane)) in planes.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(plane);
        }

        volume
    }
}
