//! OpenAI backend: file upload plus the Responses API.

use std::path::Path;

use serde::Deserialize;
use serde_json::json;

use super::{check_status, AssetHandle, InferenceError, VisionClient};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model answering the batch analysis request.
const MODEL: &str = "gpt-4.1-mini";

pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenAiClient {
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

    /// Body of the generation request: one text part followed by one
    /// `input_image` part per uploaded raster.
    fn generate_body(instruction: &str, images: &[AssetHandle]) -> serde_json::Value {
        let mut content = vec![json!({ "type": "input_text", "text": instruction })];
        content.extend(
            images
                .iter()
                .map(|image| json!({ "type": "input_image", "file_id": image.0 })),
        );
        json!({
            "model": MODEL,
            "input": [{ "role": "user", "content": content }],
        })
    }
}

#[derive(Deserialize)]
struct FileUploadResponse {
    id: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl VisionClient for OpenAiClient {
    fn upload_image(&self, path: &Path) -> Result<AssetHandle, InferenceError> {
        let url = format!("{}/files", self.base_url);
        let form = reqwest::blocking::multipart::Form::new()
            .text("purpose", "vision")
            .file("file", path)?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| self.map_transport(e))?;
        let response = check_status(response)?;

        let parsed: FileUploadResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;
        Ok(AssetHandle(parsed.id))
    }

    fn generate(
        &self,
        instruction: &str,
        images: &[AssetHandle],
    ) -> Result<String, InferenceError> {
        let url = format!("{}/responses", self.base_url);
        let body = Self::generate_body(instruction, images);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| self.map_transport(e))?;
        let response = check_status(response)?;

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        let texts: Vec<&str> = parsed
            .output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter(|part| part.kind == "output_text")
            .map(|part| part.text.as_str())
            .collect();

        if texts.is_empty() {
            return Err(InferenceError::ResponseParsing(
                "no output text in response".into(),
            ));
        }
        Ok(texts.join("\n"))
    }
}
