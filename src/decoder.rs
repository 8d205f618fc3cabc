use std::path::{Path, PathBuf};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, OpenFileOptions, open_file},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, s};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{}: cannot read header ({reason})", path.display())]
    HeaderParse { path: PathBuf, reason: String },

    #[error("{}: cannot decode pixel data ({reason})", path.display())]
    PixelDecode { path: PathBuf, reason: String },
}

impl DecodeError {
    pub fn header(path: &Path, reason: impl ToString) -> Self {
        DecodeError::HeaderParse {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn pixels(path: &Path, reason: impl ToString) -> Self {
        DecodeError::PixelDecode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Header fields needed to group and order slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceHeader {
    pub series_id: String,
    /// `None` when the file has no parseable InstanceNumber.
    pub instance_number: Option<i32>,
}

/// Raw stored samples of a single slice plus its rescale parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SlicePixels {
    pub pixels: Array2<i32>,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
}

impl SlicePixels {
    /// Samples without a rescale transform (slope 1, intercept 0).
    pub fn raw(pixels: Array2<i32>) -> Self {
        Self {
            pixels,
            rescale_slope: 1.0,
            rescale_intercept: 0.0,
        }
    }
}

/// Reads slice files. Implementations must be shareable across threads since
/// headers and pixel data are decoded in parallel.
pub trait SliceDecoder: Sync {
    /// Read header fields only, without touching pixel data.
    fn read_header(&self, path: &Path) -> Result<SliceHeader, DecodeError>;

    /// Decode the first frame and its rescale parameters.
    fn read_pixels(&self, path: &Path) -> Result<SlicePixels, DecodeError>;
}

/// [`SliceDecoder`] backed by dicom-rs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DicomDecoder;

impl DicomDecoder {
    fn series_id(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<String> {
        let uid = dicom_object
            .element(tags::SERIES_INSTANCE_UID)
            .ok()?
            .to_str()
            .ok()?;
        let uid = uid.trim_end_matches(['\0', ' ']).trim();
        (!uid.is_empty()).then(|| uid.to_string())
    }

    fn instance_number(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<i32> {
        dicom_object
            .element(tags::INSTANCE_NUMBER)
            .ok()?
            .to_int::<i32>()
            .ok()
    }

    fn rescale(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        tag: dicom::core::Tag,
        default: f64,
    ) -> f64 {
        dicom_object
            .element(tag)
            .ok()
            .and_then(|element| element.to_float64().ok())
            .unwrap_or(default)
    }
}

impl SliceDecoder for DicomDecoder {
    fn read_header(&self, path: &Path) -> Result<SliceHeader, DecodeError> {
        let dicom_object = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)
            .map_err(|e| DecodeError::header(path, e))?;

        let series_id = Self::series_id(&dicom_object)
            .ok_or_else(|| DecodeError::header(path, "missing SeriesInstanceUID"))?;

        Ok(SliceHeader {
            series_id,
            instance_number: Self::instance_number(&dicom_object),
        })
    }

    fn read_pixels(&self, path: &Path) -> Result<SlicePixels, DecodeError> {
        let dicom_object = open_file(path).map_err(|e| DecodeError::pixels(path, e))?;
        let pixel_data = dicom_object
            .decode_pixel_data()
            .map_err(|e| DecodeError::pixels(path, e))?;

        // Stored values only, calibration happens in the reconstructor.
        let options = ConvertOptions::new()
            .with_modality_lut(ModalityLutOption::None)
            .with_voi_lut(VoiLutOption::Identity);
        let frames = pixel_data
            .to_ndarray_with_options::<i32>(&options)
            .map_err(|e| DecodeError::pixels(path, e))?;
        let pixels = frames.slice_move(s![0, .., .., 0]);

        Ok(SlicePixels {
            pixels,
            rescale_slope: Self::rescale(&dicom_object, tags::RESCALE_SLOPE, 1.0),
            rescale_intercept: Self::rescale(&dicom_object, tags::RESCALE_INTERCEPT, 0.0),
        })
    }
}
