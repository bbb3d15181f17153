use std::time::Duration;

use base64::Engine;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::services::engine::{EngineError, RecognitionEngine};

const LLAVA_MODEL: &str = "@cf/llava-hf/llava-1.5-7b-hf";

const OCR_PROMPT: &str = concat!(
    "Transcribe all text visible in this image exactly as written, ",
    "preserving line breaks. Return ONLY the transcribed text. ",
    "If the image contains no text, return an empty response."
);

/// Recognition engine backed by the Cloudflare Workers AI LLaVA model.
///
/// Uses a blocking HTTP client, so it must live on a plain worker thread and
/// never inside the async runtime.
pub struct WorkersAiEngine {
    http: Client,
    url: String,
    api_token: String,
}

#[derive(Deserialize)]
struct LlavaResponse {
    result: LlavaResult,
}

#[derive(Deserialize)]
struct LlavaResult {
    description: String,
}

impl WorkersAiEngine {
    pub fn new(account_id: &str, api_token: &str) -> Result<Self, EngineError> {
        if account_id.is_empty() || api_token.is_empty() {
            return Err(EngineError::Unavailable(
                "Workers AI credentials are not configured".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            url: format!(
                "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
                account_id, LLAVA_MODEL
            ),
            api_token: api_token.to_string(),
        })
    }
}

impl RecognitionEngine for WorkersAiEngine {
    fn recognize(&mut self, bytes: &[u8]) -> Result<String, EngineError> {
        // Reject undecodable payloads before spending a network round trip.
        image::guess_format(bytes).map_err(|e| EngineError::Recognition(e.to_string()))?;

        let request_body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(bytes),
            "prompt": OCR_PROMPT,
            "max_tokens": 1024
        });

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()?
            .error_for_status()?;

        let llava_resp: LlavaResponse = serde_json::from_str(&response.text()?)?;

        Ok(llava_resp.result.description.trim().to_string())
    }
}
