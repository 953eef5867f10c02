//! Converts one DICOM slice into a standalone 8-bit grayscale PNG.

use std::path::{Path, PathBuf};

use dicom::object::open_file;
use dicom::pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption};
use image::{ImageBuffer, Luma};
use ndarray::s;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("could not read slice: {0}")]
    Read(String),

    #[error("could not decode pixel data: {0}")]
    Decode(String),

    #[error("could not write raster: {0}")]
    Encode(String),
}

/// Decode `slice_path` and write `<stem>.png` beside it, returning the
/// raster's path. Intensities are min-max scaled to 8 bits so the upload is
/// a plain grayscale image regardless of the slice's bit depth.
pub fn slice_to_png(slice_path: &Path) -> Result<PathBuf, RasterError> {
    let object = open_file(slice_path).map_err(|e| RasterError::Read(e.to_string()))?;
    let pixel_data = object
        .decode_pixel_data()
        .map_err(|e| RasterError::Decode(e.to_string()))?;
    let options = ConvertOptions::new().with_voi_lut(VoiLutOption::First);
    let array = pixel_data
        .to_ndarray_with_options::<u16>(&options)
        .map_err(|e| RasterError::Decode(e.to_string()))?;
    let slice = array.slice_move(s![0, .., .., 0]);

    let (height, width) = slice.dim();
    let (min, max) = slice
        .iter()
        .fold((u16::MAX, u16::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max.saturating_sub(min).max(1) as f32;
    let pixels: Vec<u8> = slice
        .iter()
        .map(|&v| ((v - min) as f32 / range * 255.0) as u8)
        .collect();

    let image: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_raw(width as u32, height as u32, pixels)
            .ok_or_else(|| RasterError::Encode("pixel buffer does not match dimensions".into()))?;

    let png_path = slice_path.with_extension("png");
    image
        .save(&png_path)
        .map_err(|e| RasterError::Encode(e.to_string()))?;
    Ok(png_path)
}
