//! In-memory volume model shared between the loader and the web viewer.

pub mod loader;

use ndarray::Array3;
use serde::Serialize;

/// A 3D reconstruction of an ordered DICOM slice series.
///
/// `data` is indexed `(depth, height, width)`; `spacing` is `(x, y, z)` in
/// millimeters; `origin` is the patient-space position of the first voxel.
/// Built once at startup and owned by the presentation shell for the
/// process lifetime.
pub struct Volume {
    data: Array3<u16>,
    spacing: (f32, f32, f32),
    origin: [f32; 3],
}

/// Renderer-facing description of a volume. The voxel buffer itself travels
/// separately as raw little-endian `u16` bytes.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeState {
    /// `[width, height, depth]`, x-fastest to match the voxel byte order.
    pub dimensions: [usize; 3],
    pub spacing: [f32; 3],
    pub origin: [f32; 3],
    pub scalar_range: [u16; 2],
}

impl Volume {
    pub fn new(data: Array3<u16>, spacing: (f32, f32, f32), origin: [f32; 3]) -> Self {
        Self {
            data,
            spacing,
            origin,
        }
    }

    /// Dimensions as (depth, height, width).
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn spacing(&self) -> (f32, f32, f32) {
        self.spacing
    }

    pub fn data(&self) -> &Array3<u16> {
        &self.data
    }

    /// Smallest and largest voxel intensity in the buffer.
    pub fn scalar_range(&self) -> (u16, u16) {
        let mut range = (u16::MAX, u16::MIN);
        for &value in self.data.iter() {
            range.0 = range.0.min(value);
            range.1 = range.1.max(value);
        }
        if range.0 > range.1 {
            (0, 0)
        } else {
            range
        }
    }

    pub fn state(&self) -> VolumeState {
        let (depth, height, width) = self.dim();
        let (min, max) = self.scalar_range();
        VolumeState {
            dimensions: [width, height, depth],
            spacing: [self.spacing.0, self.spacing.1, self.spacing.2],
            origin: self.origin,
            scalar_range: [min, max],
        }
    }

    /// Voxel buffer as little-endian `u16` bytes, x-fastest, then y, then z.
    pub fn voxel_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() * 2);
        for &value in self.data.iter() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }
}
