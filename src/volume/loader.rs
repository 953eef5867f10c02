//! Builds a [`Volume`] from a directory of DICOM slice files.
//!
//! Runs once, synchronously, before the server starts. Any failure here is
//! fatal to startup: a volume that cannot be reconstructed leaves the page
//! without a meaningful viewer pane, so there is no retry and no partial
//! result.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use dicom::object::{open_file, FileDicomObject, InMemDicomObject};
use dicom::pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption};
use dicom_dictionary_std::tags;
use ndarray::{s, Array2, Array3};
use thiserror::Error;

use super::Volume;

/// Direction cosines may differ by this much and still count as parallel.
const ORIENTATION_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("No DICOM slices found in {0}")]
    NoSlices(PathBuf),

    #[error("Could not read slice {file}: {message}")]
    UnreadableSlice { file: String, message: String },

    #[error("Could not decode pixel data in {file}: {message}")]
    UndecodableSlice { file: String, message: String },

    #[error("Slice {file} is {found:?} but the series is {expected:?}")]
    InconsistentDimensions {
        file: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Slice {file} is not parallel to the rest of the series")]
    NonParallelOrientation { file: String },

    #[error("Series carries no spacing information")]
    MissingSpacing,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One decoded slice plus the geometry needed to order and validate it.
struct SliceRecord {
    file: String,
    order: f32,
    image: Array2<u16>,
    orientation: Option<[f32; 6]>,
    position: Option<[f32; 3]>,
    spacing: Option<(f32, f32, f32)>,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from a directory containing `.dcm` files.
    ///
    /// Slices are ordered by Image Position (Patient) z, falling back to
    /// Instance Number when a slice carries no position.
    pub fn load_from_directory(dir: impl AsRef<Path>) -> Result<Volume, VolumeError> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(VolumeError::NoSlices(dir.to_path_buf()));
        }

        let mut records = Vec::with_capacity(paths.len());
        for path in &paths {
            records.push(Self::read_slice(path)?);
        }

        Self::validate_geometry(&records)?;

        records.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(Ordering::Equal));

        let spacing = records
            .iter()
            .find_map(|record| record.spacing)
            .ok_or(VolumeError::MissingSpacing)?;
        let origin = records
            .first()
            .and_then(|record| record.position)
            .unwrap_or([0.0; 3]);

        let data = Self::assemble(&records);
        Ok(Volume::new(data, spacing, origin))
    }

    fn read_slice(path: &Path) -> Result<SliceRecord, VolumeError> {
        let file = file_name_of(path);

        let object = open_file(path).map_err(|e| VolumeError::UnreadableSlice {
            file: file.clone(),
            message: e.to_string(),
        })?;

        let image = Self::decode_image(&object).map_err(|message| {
            VolumeError::UndecodableSlice {
                file: file.clone(),
                message,
            }
        })?;

        let position = multi_f32(&object, tags::IMAGE_POSITION_PATIENT)
            .and_then(|values| <[f32; 3]>::try_from(values.as_slice()).ok());
        let orientation = multi_f32(&object, tags::IMAGE_ORIENTATION_PATIENT)
            .and_then(|values| <[f32; 6]>::try_from(values.as_slice()).ok());

        let order = position
            .map(|p| p[2])
            .or_else(|| instance_number(&object))
            .unwrap_or(0.0);

        let spacing = multi_f32(&object, tags::PIXEL_SPACING)
            .filter(|values| values.len() >= 2)
            .zip(single_f32(&object, tags::SLICE_THICKNESS))
            .map(|(pixel_spacing, thickness)| (pixel_spacing[0], pixel_spacing[1], thickness));

        Ok(SliceRecord {
            file,
            order,
            image,
            orientation,
            position,
            spacing,
        })
    }

    fn decode_image(object: &FileDicomObject<InMemDicomObject>) -> Result<Array2<u16>, String> {
        let pixel_data = object.decode_pixel_data().map_err(|e| e.to_string())?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::First);
        let array = pixel_data
            .to_ndarray_with_options::<u16>(&options)
            .map_err(|e| e.to_string())?;
        Ok(array.slice_move(s![0, .., .., 0]))
    }

    fn validate_geometry(records: &[SliceRecord]) -> Result<(), VolumeError> {
        let expected = records[0].image.dim();
        for record in records {
            let found = record.image.dim();
            if found != expected {
                return Err(VolumeError::InconsistentDimensions {
                    file: record.file.clone(),
                    expected,
                    found,
                });
            }
        }

        if let Some(reference) = records.iter().find_map(|record| record.orientation) {
            for record in records {
                if let Some(orientation) = record.orientation {
                    if !orientations_parallel(&reference, &orientation) {
                        return Err(VolumeError::NonParallelOrientation {
                            file: record.file.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    fn assemble(records: &[SliceRecord]) -> Array3<u16> {
        let (height, width) = records[0].image.dim();
        let mut volume = Array3::<u16>::zeros((records.len(), height, width));
        for (i, record) in records.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&record.image);
        }
        volume
    }
}

fn orientations_parallel(a: &[f32; 6], b: &[f32; 6]) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (x - y).abs() <= ORIENTATION_TOLERANCE)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn multi_f32(object: &FileDicomObject<InMemDicomObject>, tag: dicom::core::Tag) -> Option<Vec<f32>> {
    object.element(tag).ok()?.to_multi_float32().ok()
}

fn single_f32(object: &FileDicomObject<InMemDicomObject>, tag: dicom::core::Tag) -> Option<f32> {
    object.element(tag).ok()?.to_float32().ok()
}

fn instance_number(object: &FileDicomObject<InMemDicomObject>) -> Option<f32> {
    object
        .element(tags::INSTANCE_NUMBER)
        .ok()?
        .to_int::<i32>()
        .ok()
        .map(|n| n as f32)
}
