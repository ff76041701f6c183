//! Google Gemini over the `generativelanguage` REST API.

use std::time::Duration;

use {
    async_trait::async_trait,
    base64::Engine,
    courier_sessions::{Role, Turn},
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, trace, warn},
};

use crate::{
    error::{Error, Result},
    model::{AiGateway, ImageInput, prior_context},
};

const PROVIDER: &str = "gemini";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_VISION_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Information about a Gemini model returned from the API.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiModelInfo {
    /// Full resource name (e.g., "models/gemini-1.5-flash")
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub input_token_limit: u32,
    #[serde(default)]
    pub output_token_limit: u32,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl GeminiModelInfo {
    /// Extract the model ID from the full resource name.
    /// E.g., "models/gemini-1.5-flash" -> "gemini-1.5-flash"
    pub fn model_id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    /// Check if this model supports text generation.
    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<GeminiModelInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug)]
pub struct GeminiProvider {
    api_key: Secret<String>,
    model: String,
    vision_model: String,
    base_url: String,
    max_output_tokens: u32,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: Secret<String>, model: String, vision_model: String) -> Self {
        Self {
            api_key,
            model,
            vision_model,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            client: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Replace the HTTP client with one that gives up after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(PROVIDER, e))?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn vision_model(&self) -> &str {
        &self.vision_model
    }

    /// List models that support `generateContent`, sorted by name.
    pub async fn list_models(&self) -> Result<Vec<GeminiModelInfo>> {
        let mut all_models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = format!("{}/v1beta/models", self.base_url);
            let mut req = self
                .client
                .get(&url)
                .header("x-goog-api-key", self.api_key.expose_secret());
            if let Some(ref token) = page_token {
                req = req.query(&[("pageToken", token)]);
            }

            let resp = req.send().await.map_err(|e| Error::http(PROVIDER, e))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(api_error(status.as_u16(), &body));
            }

            let list_resp: ListModelsResponse =
                resp.json().await.map_err(|e| Error::http(PROVIDER, e))?;
            all_models.extend(list_resp.models);

            match list_resp.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        let mut models: Vec<_> = all_models
            .into_iter()
            .filter(|m| m.supports_generation())
            .collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = models.len(), "listed gemini models");

        Ok(models)
    }

    async fn generate(&self, model: &str, contents: Vec<serde_json::Value>) -> Result<String> {
        let body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": self.max_output_tokens,
            },
        });

        debug!(model, contents_count = contents_len(&body), "gemini generate request");
        trace!(body = %redact_inline_data(&body), "gemini request body");

        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        let http_resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::http(PROVIDER, e))?;

        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body_text, "gemini API error");
            return Err(api_error(status.as_u16(), &body_text));
        }

        let resp = http_resp
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::http(PROVIDER, e))?;
        trace!(response = %resp, "gemini raw response");

        let text = extract_reply(&resp)?;
        debug!(
            model,
            text_len = text.len(),
            input_tokens = resp["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0),
            output_tokens = resp["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0),
            "gemini generate response"
        );
        Ok(text)
    }
}

#[async_trait]
impl AiGateway for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn chat(&self, history: &[Turn], new_message: &str) -> Result<String> {
        let mut contents = to_gemini_contents(prior_context(history));
        contents.push(serde_json::json!({
            "role": "user",
            "parts": [{ "text": new_message }],
        }));
        self.generate(&self.model, contents).await
    }

    async fn describe_image(&self, image: &ImageInput, prompt: &str) -> Result<String> {
        let data = base64::engine::general_purpose::STANDARD.encode(&image.data);
        let contents = vec![serde_json::json!({
            "role": "user",
            "parts": [
                { "text": prompt },
                { "inlineData": { "mimeType": image.media_type, "data": data } },
            ],
        })];
        self.generate(&self.vision_model, contents).await
    }
}

/// Convert stored turns to Gemini's `contents` array.
fn to_gemini_contents(turns: &[Turn]) -> Vec<serde_json::Value> {
    turns
        .iter()
        .map(|turn| {
            let role = match turn.role() {
                Role::User => "user",
                Role::Model => "model",
            };
            let parts: Vec<serde_json::Value> = turn
                .parts()
                .iter()
                .map(|text| serde_json::json!({ "text": text }))
                .collect();
            serde_json::json!({ "role": role, "parts": parts })
        })
        .collect()
}

/// Pull the reply text out of the first candidate.
fn extract_reply(resp: &serde_json::Value) -> Result<String> {
    let Some(candidate) = resp["candidates"].get(0) else {
        let reason = resp["promptFeedback"]["blockReason"]
            .as_str()
            .unwrap_or("no candidates returned");
        return Err(Error::malformed(PROVIDER, format!("prompt blocked: {reason}")));
    };

    let texts: Vec<&str> = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    if texts.is_empty() {
        let reason = candidate["finishReason"].as_str().unwrap_or("UNKNOWN");
        return Err(Error::malformed(
            PROVIDER,
            format!("no text in response (finish reason: {reason})"),
        ));
    }

    Ok(texts.concat())
}

/// Build an API error, preferring the `error.message` field of Google's JSON
/// error body over the raw body.
fn api_error(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    Error::Api {
        provider: PROVIDER,
        status,
        message,
    }
}

fn contents_len(body: &serde_json::Value) -> usize {
    body["contents"].as_array().map_or(0, Vec::len)
}

/// Request body for trace logs, with image payloads replaced by their size.
fn redact_inline_data(body: &serde_json::Value) -> serde_json::Value {
    let mut body = body.clone();
    if let Some(contents) = body["contents"].as_array_mut() {
        for part in contents
            .iter_mut()
            .filter_map(|c| c["parts"].as_array_mut())
            .flatten()
        {
            if let Some(data) = part["inlineData"]["data"].as_str() {
                let len = data.len();
                part["inlineData"]["data"] = serde_json::json!(format!("<{len} base64 chars>"));
            }
        }
    }
    body
}
