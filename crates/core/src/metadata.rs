use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{RazmetkaError, Result};

/// Sidecar metadata written by the downloader next to each video.
///
/// Only `ext` is required; everything else feeds the prompt and falls back to
/// a placeholder when missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub extractor: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub like_count: Option<Count>,
    #[serde(default)]
    pub view_count: Option<Count>,
    #[serde(default)]
    pub comment_count: Option<Count>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub ext: Option<String>,
}

/// Engagement counter as found in the wild: integer, float or numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Count {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::Integer(n) => write!(f, "{n}"),
            Count::Float(n) if n.fract() == 0.0 => write!(f, "{n:.0}"),
            Count::Float(n) => write!(f, "{n}"),
            Count::Text(s) => write!(f, "{}", s.trim()),
        }
    }
}

impl VideoMetadata {
    /// Strict JSON first, then JSON5 for files with comments or trailing commas.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let metadata = match serde_json::from_str::<VideoMetadata>(text) {
            Ok(metadata) => metadata,
            Err(strict_err) => json5::from_str::<VideoMetadata>(text).map_err(|lenient_err| {
                RazmetkaError::MetadataInvalid {
                    path: path.to_path_buf(),
                    reason: format!("{strict_err} (lenient parse: {lenient_err})"),
                }
            })?,
        };

        if metadata.media_ext().is_none() {
            return Err(RazmetkaError::MetadataInvalid {
                path: path.to_path_buf(),
                reason: "missing \"ext\" field".to_string(),
            });
        }

        Ok(metadata)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).await?;
        Self::parse(&text, path)
    }

    /// Recorded media extension without a leading dot.
    pub fn media_ext(&self) -> Option<&str> {
        self.ext
            .as_deref()
            .map(|ext| ext.trim().trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
    }
}
