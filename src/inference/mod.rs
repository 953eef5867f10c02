//! Remote vision-inference providers and the seam they plug into.

pub mod gemini;
pub mod openai;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::config::AppConfig;

/// Which hosted backend serves the analysis request. Fixed for the process
/// lifetime; chosen in configuration, never at request time, and never
/// fanned out or fallen back between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Gemini,
}

impl Provider {
    /// Environment variable conventionally holding this provider's key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(other.to_string()),
        }
    }
}

/// Opaque server-side reference to one uploaded raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHandle(pub String);

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network, auth, and quota failures all surface through this one class;
/// there is no retry policy at this layer.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("cannot reach {0}")]
    Connection(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    ResponseParsing(String),

    #[error("could not read image: {0}")]
    Io(#[from] std::io::Error),
}

/// Boundary to the hosted inference service: upload rasters one by one,
/// then generate a single report over all of them.
pub trait VisionClient: Send + Sync {
    fn upload_image(&self, path: &Path) -> Result<AssetHandle, InferenceError>;

    fn generate(
        &self,
        instruction: &str,
        images: &[AssetHandle],
    ) -> Result<String, InferenceError>;
}

/// Build the configured provider's client.
///
/// Constructs a blocking HTTP client internally, so call it from a blocking
/// context, never on the async runtime.
pub fn build_client(config: &AppConfig) -> Arc<dyn VisionClient> {
    match config.provider {
        Provider::OpenAi => Arc::new(openai::OpenAiClient::new(
            openai::DEFAULT_BASE_URL,
            &config.api_key,
            config.request_timeout_secs,
        )),
        Provider::Gemini => Arc::new(gemini::GeminiClient::new(
            gemini::DEFAULT_BASE_URL,
            &config.api_key,
            config.request_timeout_secs,
        )),
    }
}

/// Reject non-2xx responses, folding status and body into the error.
pub(crate) fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, InferenceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().unwrap_or_default();
        Err(InferenceError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

/// Scriptable client for tests — records calls, never touches the network.
pub struct MockVisionClient {
    response: String,
    fail_upload_at: Option<usize>,
    uploads: Mutex<Vec<PathBuf>>,
    generations: Mutex<Vec<(String, usize)>>,
}

impl MockVisionClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail_upload_at: None,
            uploads: Mutex::new(Vec::new()),
            generations: Mutex::new(Vec::new()),
        }
    }

    /// Make the Nth upload (1-based) fail with a connection error.
    pub fn failing_upload_at(mut self, n: usize) -> Self {
        self.fail_upload_at = Some(n);
        self
    }

    /// Paths of all successfully uploaded rasters, in call order.
    pub fn uploaded_paths(&self) -> Vec<PathBuf> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    /// Every generation call as (instruction, handle count).
    pub fn generation_calls(&self) -> Vec<(String, usize)> {
        self.generations.lock().unwrap().clone()
    }
}

impl VisionClient for MockVisionClient {
    fn upload_image(&self, path: &Path) -> Result<AssetHandle, InferenceError> {
        let mut uploads = self.uploads.lock().unwrap();
        let call = uploads.len() + 1;
        if self.fail_upload_at == Some(call) {
            return Err(InferenceError::Connection("mock upload failure".into()));
        }
        uploads.push(path.to_path_buf());
        Ok(AssetHandle(format!("asset-{call}")))
    }

    fn generate(
        &self,
        instruction: &str,
        images: &[AssetHandle],
    ) -> Result<String, InferenceError> {
        self.generations
            .lock()
            .unwrap()
            .push((instruction.to_string(), images.len()));
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("openai".parse::<Provider>(), Ok(Provider::OpenAi));
        assert_eq!("Gemini".parse::<Provider>(), Ok(Provider::Gemini));
        assert!("mistral".parse::<Provider>().is_err());
    }

    #[test]
    fn provider_key_variables() {
        assert_eq!(Provider::OpenAi.api_key_var(), "OPENAI_API_KEY");
        assert_eq!(Provider::Gemini.api_key_var(), "GEMINI_API_KEY");
    }

    #[test]
    fn mock_records_uploads_and_generations() {
        let client = MockVisionClient::new("report");
        let a = client.upload_image(Path::new("/tmp/a.png")).unwrap();
        let b = client.upload_image(Path::new("/tmp/b.png")).unwrap();
        assert_ne!(a, b);
        assert_eq!(client.upload_count(), 2);

        let text = client.generate("describe", &[a, b]).unwrap();
        assert_eq!(text, "report");
        assert_eq!(client.generation_calls(), vec![("describe".to_string(), 2)]);
    }

    #[test]
    fn mock_scripted_upload_failure() {
        let client = MockVisionClient::new("unused").failing_upload_at(2);
        assert!(client.upload_image(Path::new("/tmp/a.png")).is_ok());
        let err = client.upload_image(Path::new("/tmp/b.png")).unwrap_err();
        assert!(matches!(err, InferenceError::Connection(_)));
        // The failed call is not recorded as an upload.
        assert_eq!(client.upload_count(), 1);
    }

    #[test]
    fn handle_displays_its_id() {
        assert_eq!(AssetHandle("file-abc123".into()).to_string(), "file-abc123");
    }
}
