//! Synthesizes minimal DICOM slices for tests.
//!
//! Fixtures are written as Explicit VR Little Endian MR images with 8-bit
//! MONOCHROME2 pixel data plus the geometry tags the loader and pipeline
//! read. `index` drives both the slice position (z = index) and the
//! Instance Number.

use std::path::Path;

use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use dicom_dictionary_std::tags;

const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";
const MR_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.4";
const AXIAL_ORIENTATION: &str = "1\\0\\0\\0\\1\\0";

pub struct SliceFixture {
    rows: u16,
    cols: u16,
    index: u16,
    fill: u8,
    orientation: String,
    with_spacing: bool,
    gradient: bool,
}

impl SliceFixture {
    /// An 8x8 slice at position z = `index`, uniformly filled with `fill`.
    pub fn new(index: u16, fill: u8) -> Self {
        Self {
            rows: 8,
            cols: 8,
            index,
            fill,
            orientation: AXIAL_ORIENTATION.to_string(),
            with_spacing: true,
            gradient: false,
        }
    }

    pub fn with_size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    pub fn with_orientation(mut self, orientation: &str) -> Self {
        self.orientation = orientation.to_string();
        self
    }

    pub fn without_spacing(mut self) -> Self {
        self.with_spacing = false;
        self
    }

    /// Replace the uniform fill with a ramp so min and max differ.
    pub fn with_gradient(mut self) -> Self {
        self.gradient = true;
        self
    }

    pub fn write(&self, path: &Path) {
        let pixel_count = self.rows as usize * self.cols as usize;
        let pixels: Vec<u8> = if self.gradient {
            (0..pixel_count).map(|i| (i % 256) as u8).collect()
        } else {
            vec![self.fill; pixel_count]
        };

        let sop_instance = format!("1.2.826.0.1.3680043.2.1125.{}", self.index + 1);

        let mut object = InMemDicomObject::new_empty();
        object.put(DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(MR_IMAGE_STORAGE),
        ));
        object.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(sop_instance.as_str()),
        ));
        object.put(DataElement::new(
            tags::MODALITY,
            VR::CS,
            PrimitiveValue::from("MR"),
        ));
        object.put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from("MONOCHROME2"),
        ));
        object.put(DataElement::new(
            tags::SAMPLES_PER_PIXEL,
            VR::US,
            PrimitiveValue::from(1_u16),
        ));
        object.put(DataElement::new(
            tags::ROWS,
            VR::US,
            PrimitiveValue::from(self.rows),
        ));
        object.put(DataElement::new(
            tags::COLUMNS,
            VR::US,
            PrimitiveValue::from(self.cols),
        ));
        object.put(DataElement::new(
            tags::BITS_ALLOCATED,
            VR::US,
            PrimitiveValue::from(8_u16),
        ));
        object.put(DataElement::new(
            tags::BITS_STORED,
            VR::US,
            PrimitiveValue::from(8_u16),
        ));
        object.put(DataElement::new(
            tags::HIGH_BIT,
            VR::US,
            PrimitiveValue::from(7_u16),
        ));
        object.put(DataElement::new(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            PrimitiveValue::from(0_u16),
        ));
        object.put(DataElement::new(
            tags::INSTANCE_NUMBER,
            VR::IS,
            PrimitiveValue::from(format!("{}", self.index).as_str()),
        ));
        object.put(DataElement::new(
            tags::IMAGE_POSITION_PATIENT,
            VR::DS,
            PrimitiveValue::from(format!("0\\0\\{}", self.index).as_str()),
        ));
        object.put(DataElement::new(
            tags::IMAGE_ORIENTATION_PATIENT,
            VR::DS,
            PrimitiveValue::from(self.orientation.as_str()),
        ));
        if self.with_spacing {
            object.put(DataElement::new(
                tags::PIXEL_SPACING,
                VR::DS,
                PrimitiveValue::from("1\\1"),
            ));
            object.put(DataElement::new(
                tags::SLICE_THICKNESS,
                VR::DS,
                PrimitiveValue::from("1"),
            ));
        }
        object.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OB,
            PrimitiveValue::U8(pixels.into()),
        ));

        let object = object
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(EXPLICIT_VR_LE)
                    .media_storage_sop_class_uid(MR_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid(sop_instance.as_str()),
            )
            .expect("build file meta");
        object.write_to_file(path).expect("write slice fixture");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_round_trips_through_the_dicom_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.dcm");
        SliceFixture::new(3, 42).write(&path);

        let object = dicom::object::open_file(&path).unwrap();
        let rows: u16 = object.element(tags::ROWS).unwrap().to_int().unwrap();
        assert_eq!(rows, 8);
        let position = object
            .element(tags::IMAGE_POSITION_PATIENT)
            .unwrap()
            .to_multi_float32()
            .unwrap();
        assert_eq!(position[2], 3.0);
    }
}
