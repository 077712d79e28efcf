use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::BackendError;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_TEXT_MODEL: &str = "superdrew100/llama3-abliterated";
pub const NO_RESPONSE_FALLBACK: &str = "No response from AI";

/// Appended to every image prompt for realism, detail and skin texture (RealVisXL-style)
pub const REALISM_PROMPT_SUFFIX: &str = ", photorealistic, 8k, highly detailed, detailed skin texture, natural skin pores, subtle skin imperfections, professional photography, sharp focus";

// Generation parameters matching the backend's 16GB defaults
const IMAGE_STEPS: u32 = 25;
const IMAGE_WIDTH: u32 = 512;
const IMAGE_HEIGHT: u32 = 512;

#[derive(Serialize)]
struct ChatRequest<'a> {
    prompt: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ImageRequest {
    prompt: String,
    steps: u32,
    width: u32,
    height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
}

impl ImageRequest {
    pub(crate) fn new(prompt: &str, model: Option<&str>) -> Self {
        Self {
            prompt: format!("{}{}", prompt.trim(), REALISM_PROMPT_SUFFIX),
            steps: IMAGE_STEPS,
            width: IMAGE_WIDTH,
            height: IMAGE_HEIGHT,
            model: model.filter(|m| !m.is_empty()).map(str::to_string),
        }
    }
}

#[derive(Deserialize)]
struct ImageResponse {
    image: String,
}

/// An image model the backend can serve
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageModelInfo {
    pub name: String,
    #[allow(dead_code)]
    pub path: String,
    /// Whether the weights are currently resident on the backend
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageModelList {
    pub models: Vec<ImageModelInfo>,
    #[serde(default)]
    pub default: String,
}

/// Wrap a raw base64 PNG payload as a displayable data URI
pub fn png_data_uri(base64_png: &str) -> String {
    format!("data:image/png;base64,{}", base64_png)
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a chat prompt and return the model's reply text.
    pub async fn send_text(&self, prompt: &str, model: &str) -> Result<String, BackendError> {
        let url = format!("{}/chat", self.base_url);
        debug!(%url, model, "sending chat prompt");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { prompt, model })
            .send()
            .await
            .map_err(|e| {
                error!("Failed to send text message: {}", e);
                BackendError::Connection
            })?;

        if !response.status().is_success() {
            error!("Failed to send text message: HTTP status {}", response.status());
            return Err(BackendError::Connection);
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to decode chat response: {}", e);
            BackendError::Connection
        })?;

        Ok(chat_response
            .response
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| NO_RESPONSE_FALLBACK.to_string()))
    }

    /// Generate an image and return it as a `data:image/png;base64,` URI.
    pub async fn send_image(&self, prompt: &str, model: Option<&str>) -> Result<String, BackendError> {
        let url = format!("{}/image", self.base_url);
        let request = ImageRequest::new(prompt, model);
        debug!(%url, model = ?request.model, "requesting image");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to generate image: {}", e);
                BackendError::Connection
            })?;

        if !response.status().is_success() {
            error!("Failed to generate image: HTTP status {}", response.status());
            return Err(BackendError::Connection);
        }

        let image_response: ImageResponse = response.json().await.map_err(|e| {
            error!("Failed to decode image response: {}", e);
            BackendError::Connection
        })?;

        Ok(png_data_uri(&image_response.image))
    }

    pub async fn fetch_image_models(&self) -> Result<ImageModelList, BackendError> {
        let url = format!("{}/models", self.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("Failed to fetch models: {}", e);
            BackendError::ModelsUnavailable
        })?;

        if !response.status().is_success() {
            warn!("Failed to fetch models: HTTP status {}", response.status());
            return Err(BackendError::ModelsUnavailable);
        }

        response.json().await.map_err(|e| {
            warn!("Failed to decode model list: {}", e);
            BackendError::ModelsUnavailable
        })
    }
}
