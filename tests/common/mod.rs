#![allow(dead_code)]

use std::path::Path;

use dicom::{
    core::{DataElement, PrimitiveValue, VR},
    object::{FileMetaTableBuilder, InMemDicomObject},
};
use dicom_dictionary_std::{tags, uids};

/// A 16-bit signed CT slice written as explicit VR little endian.
pub struct SliceSpec<'a> {
    pub series_id: &'a str,
    pub instance_number: Option<i32>,
    pub rows: u16,
    pub columns: u16,
    pub pixels: Vec<i16>,
    pub slope: Option<f64>,
    pub intercept: Option<f64>,
    pub with_pixel_data: bool,
}

impl<'a> SliceSpec<'a> {
    pub fn filled(series_id: &'a str, instance_number: i32, size: u16, value: i16) -> Self {
        Self {
            series_id,
            instance_number: Some(instance_number),
            rows: size,
            columns: size,
            pixels: vec![value; usize::from(size) * usize::from(size)],
            slope: Some(1.0),
            intercept: Some(-1024.0),
            with_pixel_data: true,
        }
    }

    pub fn write(&self, path: &Path) {
        let sop_instance_uid = format!(
            "1.2.826.0.1.3680043.8.498.{}.{}",
            self.series_id.len(),
            self.instance_number.unwrap_or(0)
        );

        let mut object = InMemDicomObject::from_element_iter([
            DataElement::new(
                tags::SOP_CLASS_UID,
                VR::UI,
                PrimitiveValue::from(uids::CT_IMAGE_STORAGE),
            ),
            DataElement::new(
                tags::SOP_INSTANCE_UID,
                VR::UI,
                PrimitiveValue::from(sop_instance_uid.as_str()),
            ),
            DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT")),
            DataElement::new(
                tags::SERIES_INSTANCE_UID,
                VR::UI,
                PrimitiveValue::from(self.series_id),
            ),
            DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)),
            DataElement::new(
                tags::PHOTOMETRIC_INTERPRETATION,
                VR::CS,
                PrimitiveValue::from("MONOCHROME2"),
            ),
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(self.rows)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(self.columns)),
            DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16)),
            DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(16_u16)),
            DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(15_u16)),
            DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(1_u16)),
        ]);

        if let Some(instance_number) = self.instance_number {
            object.put(DataElement::new(
                tags::INSTANCE_NUMBER,
                VR::IS,
                PrimitiveValue::from(instance_number.to_string()),
            ));
        }
        if let Some(slope) = self.slope {
            object.put(DataElement::new(
                tags::RESCALE_SLOPE,
                VR::DS,
                PrimitiveValue::from(slope.to_string()),
            ));
        }
        if let Some(intercept) = self.intercept {
            object.put(DataElement::new(
                tags::RESCALE_INTERCEPT,
                VR::DS,
                PrimitiveValue::from(intercept.to_string()),
            ));
        }
        if self.with_pixel_data {
            object.put(DataElement::new(
                tags::PIXEL_DATA,
                VR::OW,
                PrimitiveValue::U16(self.pixels.iter().map(|&v| v as u16).collect()),
            ));
        }

        let file_object = object
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid(sop_instance_uid),
            )
            .expect("valid file meta");
        file_object.write_to_file(path).expect("writable temp dir");
    }
}
