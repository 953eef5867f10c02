//! Scanlens — DICOM volume viewer with one-click AI findings reports.
//!
//! At startup the configured slice directory is reconstructed into an
//! in-memory volume and served to a browser-based 3D viewer. A single
//! "Submit Analysis" action converts every slice to PNG, uploads the batch
//! to the configured vision-capable inference provider, and renders the
//! returned findings text in the page.

pub mod config;
pub mod inference;
pub mod pipeline;
pub mod server;
pub mod volume;

#[cfg(test)]
pub(crate) mod test_fixtures;
