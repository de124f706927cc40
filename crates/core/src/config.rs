//! Run configuration.

use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use crate::{
    error::{RazmetkaError, Result},
    model::{DEFAULT_API_BASE, DEFAULT_MAX_PIXELS, DEFAULT_MODEL, MediaTransport, OmniConfig},
    naming::default_output_dir,
};

pub const DEFAULT_INPUT_DIR: &str = "supplements_videos";

#[derive(Debug, Clone)]
pub struct AnnotatorConfig {
    pub input_dir: PathBuf,
    /// Derived from `input_dir` when not set.
    pub output_dir: Option<PathBuf>,
    pub use_audio_in_video: bool,
    pub model: OmniConfig,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: None,
            use_audio_in_video: true,
            model: OmniConfig::default(),
        }
    }
}

impl AnnotatorConfig {
    /// Create config from `RAZMETKA_*` environment variables.
    ///
    /// Unset variables take their defaults; a set but unparsable one is an
    /// error rather than a silent fallback.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &'static str| get(key).map(|value| (key, value));

        Ok(Self {
            input_dir: get("RAZMETKA_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR)),
            output_dir: get("RAZMETKA_OUTPUT_DIR").map(PathBuf::from),
            use_audio_in_video: var("RAZMETKA_USE_AUDIO")
                .map(parse_flag)
                .transpose()?
                .unwrap_or(true),
            model: OmniConfig {
                api_base: get("RAZMETKA_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                model: get("RAZMETKA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                api_key: get("RAZMETKA_API_KEY").filter(|k| !k.trim().is_empty()),
                timeout: var("RAZMETKA_TIMEOUT_SECS")
                    .map(parse_var)
                    .transpose()?
                    .map(Duration::from_secs),
                max_tokens: var("RAZMETKA_MAX_TOKENS").map(parse_var).transpose()?,
                temperature: var("RAZMETKA_TEMPERATURE").map(parse_var).transpose()?,
                max_pixels: var("RAZMETKA_MAX_PIXELS")
                    .map(parse_var)
                    .transpose()?
                    .unwrap_or(DEFAULT_MAX_PIXELS),
                media: var("RAZMETKA_MEDIA")
                    .map(parse_media)
                    .transpose()?
                    .unwrap_or_default(),
            },
        })
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| default_output_dir(&self.input_dir))
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> RazmetkaError {
    RazmetkaError::ConfigInvalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_var<T>((key, value): (&str, String)) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, &value, e.to_string()))
}

fn parse_flag((key, value): (&str, String)) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, &value, "expected true or false")),
    }
}

fn parse_media((key, value): (&str, String)) -> Result<MediaTransport> {
    match value.trim().to_lowercase().as_str() {
        "file" | "file_url" => Ok(MediaTransport::FileUrl),
        "inline" => Ok(MediaTransport::Inline),
        _ => Err(invalid(key, &value, "expected \"file\" or \"inline\"")),
    }
}
