//! End-to-end report pipeline: stage, rasterize, upload, generate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::inference::{AssetHandle, InferenceError, VisionClient};

use super::raster::{self, RasterError};
use super::staging::StagingArea;
use super::FailurePolicy;

/// Instruction sent with the single generation request covering the batch.
const REPORT_INSTRUCTION: &str = "These are sequential MRI scans of one series. \
    Analyze them as a complete scan and summarize any significant findings or \
    abnormalities you observe.";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No slice files to analyze in {0}")]
    NoSlices(PathBuf),

    #[error("Error processing {file}: {source}")]
    Slice { file: String, source: SliceError },

    #[error("Report generation failed: {0}")]
    Generation(InferenceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SliceError {
    #[error("{0}")]
    Raster(#[from] RasterError),

    #[error("upload failed: {0}")]
    Upload(#[from] InferenceError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Runs the whole slice-directory-to-report flow for one trigger.
///
/// Construction wires in the provider client and the failure policy; `run`
/// is synchronous and expects to execute on a blocking worker thread, never
/// on the async runtime.
#[derive(Clone)]
pub struct ReportPipeline {
    scan_dir: PathBuf,
    policy: FailurePolicy,
    client: Arc<dyn VisionClient>,
}

impl ReportPipeline {
    pub fn new(scan_dir: PathBuf, policy: FailurePolicy, client: Arc<dyn VisionClient>) -> Self {
        Self {
            scan_dir,
            policy,
            client,
        }
    }

    /// Produce the findings report for the configured slice directory.
    ///
    /// The returned error's `Display` text is exactly what the user sees in
    /// the output panel. One generation request is issued per run, carrying
    /// one handle per slice that made it through decode, re-encode, and
    /// upload; if no slice does, the run short-circuits before generation.
    pub fn run(&self) -> Result<String, PipelineError> {
        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, dir = %self.scan_dir.display(), "Analysis requested");

        let staging = StagingArea::acquire()?;
        let mut handles: Vec<AssetHandle> = Vec::new();
        let mut failed: Vec<String> = Vec::new();

        for (file, path) in self.slice_entries()? {
            match self.process_slice(&staging, &path) {
                Ok(handle) => handles.push(handle),
                Err(source) => match self.policy {
                    FailurePolicy::Strict => {
                        return Err(PipelineError::Slice { file, source });
                    }
                    FailurePolicy::BestEffort => {
                        tracing::warn!(
                            run_id = %run_id,
                            file = %file,
                            error = %source,
                            "Skipping failed slice"
                        );
                        failed.push(file);
                    }
                },
            }
        }

        if handles.is_empty() {
            return Err(PipelineError::NoSlices(self.scan_dir.clone()));
        }

        tracing::info!(run_id = %run_id, slices = handles.len(), "Requesting report");
        let text = self
            .client
            .generate(REPORT_INSTRUCTION, &handles)
            .map_err(PipelineError::Generation)?;
        tracing::info!(run_id = %run_id, chars = text.len(), "Report received");

        staging.release()?;

        if failed.is_empty() {
            Ok(text)
        } else {
            Ok(format!(
                "{text}\n\n[{} slice(s) could not be processed: {}]",
                failed.len(),
                failed.join(", ")
            ))
        }
    }

    /// Directory entries that look like slices, name-sorted for a
    /// deterministic batch order. Non-matching entries are noted and left
    /// out.
    fn slice_entries(&self) -> Result<Vec<(String, PathBuf)>, PipelineError> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.scan_dir)? {
            let entry = entry?;
            let path = entry.path();
            let file = entry.file_name().to_string_lossy().into_owned();
            if path.is_file() && file.to_ascii_lowercase().ends_with(".dcm") {
                entries.push((file, path));
            } else {
                tracing::debug!(file = %file, "Skipping non-DICOM entry");
            }
        }
        entries.sort();
        Ok(entries)
    }

    fn process_slice(
        &self,
        staging: &StagingArea,
        source: &Path,
    ) -> Result<AssetHandle, SliceError> {
        let staged = staging.stage_copy(source)?;
        let png = raster::slice_to_png(&staged)?;
        let handle = self.client.upload_image(&png)?;
        tracing::debug!(file = %staged.display(), handle = %handle, "Slice uploaded");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::MockVisionClient;
    use crate::test_fixtures::SliceFixture;

    fn pipeline(
        dir: &Path,
        policy: FailurePolicy,
        client: Arc<MockVisionClient>,
    ) -> ReportPipeline {
        ReportPipeline::new(dir.to_path_buf(), policy, client)
    }

    #[test]
    fn two_slices_mean_two_uploads_and_one_generation() {
        let dir = tempfile::tempdir().unwrap();
        SliceFixture::new(0, 10).write(&dir.path().join("a.dcm"));
        SliceFixture::new(1, 20).write(&dir.path().join("b.dcm"));
        std::fs::write(dir.path().join("readme.txt"), "notes").unwrap();

        let client = Arc::new(MockVisionClient::new("Unremarkable series."));
        let report = pipeline(dir.path(), FailurePolicy::Strict, client.clone())
            .run()
            .unwrap();

        assert_eq!(report, "Unremarkable series.");
        assert_eq!(client.upload_count(), 2);
        let generations = client.generation_calls();
        assert_eq!(generations.len(), 1);
        assert_eq!(generations[0].1, 2);
        assert!(generations[0].0.contains("MRI scans"));
    }

    #[test]
    fn empty_directory_short_circuits_before_generation() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockVisionClient::new("unused"));

        let err = pipeline(dir.path(), FailurePolicy::Strict, client.clone())
            .run()
            .unwrap_err();

        assert!(matches!(err, PipelineError::NoSlices(_)));
        assert_eq!(client.upload_count(), 0);
        assert!(client.generation_calls().is_empty());
    }

    #[test]
    fn non_matching_names_only_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), "notes").unwrap();
        std::fs::write(dir.path().join("scan.jpeg"), "jpeg").unwrap();
        let client = Arc::new(MockVisionClient::new("unused"));

        let err = pipeline(dir.path(), FailurePolicy::Strict, client.clone())
            .run()
            .unwrap_err();

        assert!(matches!(err, PipelineError::NoSlices(_)));
        assert!(client.generation_calls().is_empty());
    }

    #[test]
    fn undecodable_slice_aborts_naming_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.dcm"), b"not a dicom file").unwrap();
        let client = Arc::new(MockVisionClient::new("unused"));

        let err = pipeline(dir.path(), FailurePolicy::Strict, client.clone())
            .run()
            .unwrap_err();

        assert!(err.to_string().contains("broken.dcm"));
        assert!(client.generation_calls().is_empty());
    }

    #[test]
    fn upload_failure_on_second_slice_aborts_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        SliceFixture::new(0, 10).write(&dir.path().join("a.dcm"));
        SliceFixture::new(1, 20).write(&dir.path().join("b.dcm"));

        let client = Arc::new(MockVisionClient::new("unused").failing_upload_at(2));
        let err = pipeline(dir.path(), FailurePolicy::Strict, client.clone())
            .run()
            .unwrap_err();

        assert!(err.to_string().contains("b.dcm"));
        assert!(client.generation_calls().is_empty());

        // The first slice's staged raster was uploaded before the abort and
        // must still be gone afterwards.
        let uploaded = client.uploaded_paths();
        assert_eq!(uploaded.len(), 1);
        assert!(!uploaded[0].exists());
    }

    #[test]
    fn temp_rasters_are_gone_after_success() {
        let dir = tempfile::tempdir().unwrap();
        SliceFixture::new(0, 10).write(&dir.path().join("a.dcm"));
        SliceFixture::new(1, 20).write(&dir.path().join("b.dcm"));

        let client = Arc::new(MockVisionClient::new("ok"));
        pipeline(dir.path(), FailurePolicy::Strict, client.clone())
            .run()
            .unwrap();

        for path in client.uploaded_paths() {
            assert!(!path.exists());
        }
    }

    #[test]
    fn best_effort_skips_and_annotates() {
        let dir = tempfile::tempdir().unwrap();
        SliceFixture::new(0, 10).write(&dir.path().join("a.dcm"));
        std::fs::write(dir.path().join("broken.dcm"), b"not a dicom file").unwrap();

        let client = Arc::new(MockVisionClient::new("Partial series looks fine."));
        let report = pipeline(dir.path(), FailurePolicy::BestEffort, client.clone())
            .run()
            .unwrap();

        assert!(report.starts_with("Partial series looks fine."));
        assert!(report.contains("broken.dcm"));
        assert_eq!(client.upload_count(), 1);
        assert_eq!(client.generation_calls().len(), 1);
        assert_eq!(client.generation_calls()[0].1, 1);
    }

    #[test]
    fn best_effort_with_nothing_usable_still_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.dcm"), b"not a dicom file").unwrap();
        let client = Arc::new(MockVisionClient::new("unused"));

        let err = pipeline(dir.path(), FailurePolicy::BestEffort, client.clone())
            .run()
            .unwrap_err();

        assert!(matches!(err, PipelineError::NoSlices(_)));
        assert!(client.generation_calls().is_empty());
    }
}
