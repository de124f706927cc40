//! Instruction prompts.
//!
//! A template is plain text with `{field}` placeholders filled from the
//! record's metadata. The wording belongs to the research campaign, so the
//! built-in templates live in `prompts/` and any other template can be loaded
//! from disk.

use std::path::Path;

use tokio::fs;

use crate::{
    error::{RazmetkaError, Result},
    metadata::{Count, VideoMetadata},
};

static SUPPLEMENTS_PROMPT: &str = include_str!("../prompts/supplements.txt");
static TIMEOUT_PROMPT: &str = include_str!("../prompts/timeout.txt");

pub const PLACEHOLDERS: &[&str] = &[
    "extractor",
    "description",
    "channel",
    "uploader",
    "like_count",
    "view_count",
    "comment_count",
    "title",
];

const UNKNOWN_COUNT: &str = "an unknown number of";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Campaign {
    /// Supplements, vitamins and medication advice.
    #[default]
    Supplements,
    /// Parenting videos about time-outs.
    Timeout,
}

impl Campaign {
    pub fn name(&self) -> &'static str {
        match self {
            Campaign::Supplements => "supplements",
            Campaign::Timeout => "timeout",
        }
    }

    pub fn template(&self) -> PromptTemplate {
        let text = match self {
            Campaign::Supplements => SUPPLEMENTS_PROMPT,
            Campaign::Timeout => TIMEOUT_PROMPT,
        };
        PromptTemplate {
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Checks that every `{placeholder}` is known and at least one is used.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(RazmetkaError::TemplateInvalid {
                reason: "template is empty".to_string(),
            });
        }

        let mut used = 0;
        for name in placeholders(&text) {
            if !PLACEHOLDERS.contains(&name) {
                return Err(RazmetkaError::TemplateInvalid {
                    reason: format!(
                        "unknown placeholder {{{name}}}, expected one of {}",
                        PLACEHOLDERS.join(", ")
                    ),
                });
            }
            used += 1;
        }
        if used == 0 {
            return Err(RazmetkaError::TemplateInvalid {
                reason: "template does not reference any metadata field".to_string(),
            });
        }

        Ok(Self { text })
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).await?;
        Self::new(text).map_err(|e| match e {
            RazmetkaError::TemplateInvalid { reason } => RazmetkaError::TemplateInvalid {
                reason: format!("{}: {reason}", path.display()),
            },
            other => other,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Fills every placeholder. Substituted values are not rescanned, so a
    /// description containing `{channel}` stays literal.
    pub fn render(&self, metadata: &VideoMetadata) -> String {
        let mut out = String::with_capacity(self.text.len() + 512);
        let mut rest = self.text.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_placeholder_name(&after[..close]) => {
                    let name = &after[..close];
                    match field_value(metadata, name) {
                        Some(value) => out.push_str(&value),
                        None => {
                            out.push('{');
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);

        out.trim().to_string()
    }
}

fn placeholders(text: &str) -> impl Iterator<Item = &str> {
    text.split('{').skip(1).filter_map(|chunk| {
        let name = &chunk[..chunk.find('}')?];
        is_placeholder_name(name).then_some(name)
    })
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn text_or(value: Option<&str>, placeholder: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => placeholder.to_string(),
    }
}

fn field_value(metadata: &VideoMetadata, name: &str) -> Option<String> {
    let value = match name {
        "extractor" => text_or(metadata.extractor.as_deref(), "an unknown platform"),
        "description" => text_or(
            metadata.description.as_deref(),
            "no description was provided",
        ),
        "channel" => text_or(metadata.channel.as_deref(), "an unknown channel"),
        "uploader" => text_or(metadata.uploader.as_deref(), "an unknown uploader"),
        "title" => text_or(metadata.title.as_deref(), "an untitled video"),
        "like_count" => count_or_unknown(metadata.like_count.as_ref()),
        "view_count" => count_or_unknown(metadata.view_count.as_ref()),
        "comment_count" => count_or_unknown(metadata.comment_count.as_ref()),
        _ => return None,
    };
    Some(value)
}

fn count_or_unknown(count: Option<&Count>) -> String {
    let rendered = count.map(|c| c.to_string()).unwrap_or_default();
    if rendered.is_empty() {
        UNKNOWN_COUNT.to_string()
    } else {
        rendered
    }
}
