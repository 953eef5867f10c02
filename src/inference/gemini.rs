//! Gemini backend: media upload plus `generateContent`.

use std::path::Path;

use serde::Deserialize;
use serde_json::json;

use super::{check_status, AssetHandle, InferenceError, VisionClient};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model answering the batch analysis request.
const MODEL: &str = "gemini-2.0-flash";

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        }
    }

    fn map_transport(&self, e: reqwest::Error) -> InferenceError {
        if e.is_connect() {
            InferenceError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            InferenceError::Timeout(self.timeout_secs)
        } else {
            InferenceError::Transport(e.to_string())
        }
    }

    /// Body of the generation request: one `file_data` part per uploaded
    /// raster, then the instruction text.
    fn generate_body(instruction: &str, images: &[AssetHandle]) -> serde_json::Value {
        let mut parts: Vec<serde_json::Value> = images
            .iter()
            .map(|image| {
                json!({
                    "file_data": { "mime_type": "image/png", "file_uri": image.0 }
                })
            })
            .collect();
        parts.push(json!({ "text": instruction }));
        json!({ "contents": [{ "parts": parts }] })
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Deserialize)]
struct UploadedFile {
    uri: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl VisionClient for GeminiClient {
    fn upload_image(&self, path: &Path) -> Result<AssetHandle, InferenceError> {
        let url = format!("{}/upload/v1beta/files?uploadType=media", self.base_url);
        let bytes = std::fs::read(path)?;

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(bytes)
            .send()
            .map_err(|e| self.map_transport(e))?;
        let response = check_status(response)?;

        let parsed: UploadResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;
        Ok(AssetHandle(parsed.file.uri))
    }

    fn generate(
        &self,
        instruction: &str,
        images: &[AssetHandle],
    ) -> Result<String, InferenceError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, MODEL
        );
        let body = Self::generate_body(instruction, images);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| self.map_transport(e))?;
        let response = check_status(response)?;

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        let candidate = parsed
            .candidates
            .first()
            .ok_or_else(|| InferenceError::ResponseParsing("no candidates in response".into()))?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .map(|part| part.text.as_str())
            .collect();

        if text.is_empty() {
            return Err(InferenceError::ResponseParsing(
                "candidate carries no text".into(),
            ));
        }
        Ok(text)
    }
}
