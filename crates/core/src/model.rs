//! The multimodal model boundary.
//!
//! The model runs out of process behind an OpenAI-compatible chat completions
//! endpoint (vLLM serving Qwen3-Omni, for example). Frame sampling, audio
//! extraction and decoding all happen on the server; this side only sends the
//! prompt and a reference to the video.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{RazmetkaError, Result};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000/v1";
pub const DEFAULT_MODEL: &str = "Qwen/Qwen3-Omni-30B-A3B-Instruct";
pub const DEFAULT_MAX_PIXELS: u32 = 360 * 420;

/// One prompt plus the video it talks about.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub video: &'a Path,
    pub use_audio_in_video: bool,
}

pub trait MultimodalModel {
    fn model_id(&self) -> &str;

    /// Raw generated text for one request.
    ///
    /// Media the model cannot ingest is reported as
    /// [`RazmetkaError::MediaPreprocessing`]; everything else is fatal.
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String>;
}

/// How the video reaches the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MediaTransport {
    /// `file://` URL; the server must be allowed to read the input directory.
    #[default]
    FileUrl,
    /// Base64 `data:` URL in the request body.
    Inline,
}

#[derive(Debug, Clone)]
pub struct OmniConfig {
    pub api_base: String,
    pub model: String,
    pub api_key: Option<String>,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub max_pixels: u32,
    pub media: MediaTransport,
}

impl Default for OmniConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout: None,
            max_tokens: None,
            temperature: None,
            max_pixels: DEFAULT_MAX_PIXELS,
            media: MediaTransport::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    mm_processor_kwargs: ProcessorKwargs,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    VideoUrl { video_url: MediaUrl },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct MediaUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ProcessorKwargs {
    use_audio_in_video: bool,
    max_pixels: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Client for a served Qwen-Omni style model.
pub struct OmniClient {
    client: Client,
    config: OmniConfig,
}

impl OmniClient {
    /// Builds the HTTP client and checks that the server serves `config.model`.
    ///
    /// Meant to be called once per process; the returned handle is passed by
    /// reference to whoever needs the model.
    pub async fn connect(config: OmniConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        let this = Self { client, config };

        let unavailable = |reason: String| RazmetkaError::ModelUnavailable {
            model: this.config.model.clone(),
            api_base: this.config.api_base.clone(),
            reason,
        };

        let response = this
            .authorized(this.client.get(this.endpoint("models")))
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("GET /models returned {status}: {body}")));
        }

        let models: ModelList = response
            .json()
            .await
            .map_err(|e| unavailable(format!("unreadable model list: {e}")))?;
        if !models.data.iter().any(|m| m.id == this.config.model) {
            let served = models
                .data
                .iter()
                .map(|m| m.id.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(unavailable(format!("server only serves [{served}]")));
        }

        info!("Connected to {} at {}", this.config.model, this.config.api_base);
        Ok(this)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn video_url(&self, video: &Path) -> Result<String> {
        let preprocessing = |reason: String| RazmetkaError::MediaPreprocessing {
            path: video.to_path_buf(),
            reason,
        };

        match self.config.media {
            MediaTransport::FileUrl => {
                let absolute: PathBuf = fs::canonicalize(video)
                    .await
                    .map_err(|e| preprocessing(e.to_string()))?;
                Ok(format!("file://{}", absolute.display()))
            }
            MediaTransport::Inline => {
                let bytes = fs::read(video)
                    .await
                    .map_err(|e| preprocessing(e.to_string()))?;
                if bytes.is_empty() {
                    return Err(preprocessing("media file is empty".to_string()));
                }
                Ok(format!(
                    "data:{};base64,{}",
                    video_mime(video),
                    STANDARD.encode(&bytes)
                ))
            }
        }
    }
}

impl MultimodalModel for OmniClient {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String> {
        let url = self.video_url(request.video).await?;
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::VideoUrl {
                        video_url: MediaUrl { url },
                    },
                    ContentPart::Text {
                        text: request.prompt,
                    },
                ],
            }],
            mm_processor_kwargs: ProcessorKwargs {
                use_audio_in_video: request.use_audio_in_video,
                max_pixels: self.config.max_pixels,
            },
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("POST chat/completions for {}", request.video.display());
        let response = self
            .authorized(self.client.post(self.endpoint("chat/completions")))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!(
                "{status}: {}",
                response.text().await.unwrap_or_default().trim()
            );
            return Err(if is_media_rejection(status) {
                RazmetkaError::MediaPreprocessing {
                    path: request.video.to_path_buf(),
                    reason,
                }
            } else {
                RazmetkaError::Generation { reason }
            });
        }

        let response: ChatResponse = response.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RazmetkaError::Generation {
                reason: "response has no message content".to_string(),
            })
    }
}

/// Statuses the server uses when it cannot decode or fit the media.
fn is_media_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::PAYLOAD_TOO_LARGE
            | StatusCode::UNSUPPORTED_MEDIA_TYPE
            | StatusCode::UNPROCESSABLE_ENTITY
    )
}

fn video_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
