//! Correspondence between metadata files, media files and result files.
//!
//! A record is identified by its stem: `abc123.info.json` has stem `abc123`,
//! its media lives next to it as `abc123.<ext>` and its result is written to
//! `<output_dir>/abc123.result.json`. Nothing here touches the filesystem.

use std::path::{Path, PathBuf};

use crate::error::{RazmetkaError, Result};

pub const DEFAULT_METADATA_SUFFIX: &str = ".info.json";
pub const DEFAULT_RESULT_SUFFIX: &str = ".result.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultNaming {
    metadata_suffix: String,
    result_suffix: String,
}

impl Default for ResultNaming {
    fn default() -> Self {
        Self {
            metadata_suffix: DEFAULT_METADATA_SUFFIX.to_string(),
            result_suffix: DEFAULT_RESULT_SUFFIX.to_string(),
        }
    }
}

impl ResultNaming {
    pub fn new(metadata_suffix: &str, result_suffix: &str) -> Result<Self> {
        for suffix in [metadata_suffix, result_suffix] {
            if suffix.len() < 2 || !suffix.starts_with('.') {
                return Err(RazmetkaError::InvalidNaming {
                    reason: format!("suffix {suffix:?} must start with '.' and be non-empty"),
                });
            }
        }
        if metadata_suffix == result_suffix {
            return Err(RazmetkaError::InvalidNaming {
                reason: format!("metadata and result suffix are both {metadata_suffix:?}"),
            });
        }

        Ok(Self {
            metadata_suffix: metadata_suffix.to_string(),
            result_suffix: result_suffix.to_string(),
        })
    }

    pub fn metadata_suffix(&self) -> &str {
        &self.metadata_suffix
    }

    /// Record identity for a metadata file name, `None` if the suffix does not match.
    pub fn stem_of<'a>(&self, metadata_file_name: &'a str) -> Option<&'a str> {
        metadata_file_name
            .strip_suffix(&self.metadata_suffix)
            .filter(|stem| !stem.is_empty())
    }

    pub fn result_file_name(&self, metadata_file_name: &str) -> Option<String> {
        self.stem_of(metadata_file_name)
            .map(|stem| format!("{stem}{}", self.result_suffix))
    }

    pub fn metadata_file_name(&self, result_file_name: &str) -> Option<String> {
        result_file_name
            .strip_suffix(&self.result_suffix)
            .filter(|stem| !stem.is_empty())
            .map(|stem| format!("{stem}{}", self.metadata_suffix))
    }

    pub fn result_path(&self, output_dir: &Path, metadata_path: &Path) -> Option<PathBuf> {
        let file_name = metadata_path.file_name()?.to_str()?;
        self.result_file_name(file_name)
            .map(|name| output_dir.join(name))
    }

    /// Media file sitting next to the metadata file, `<stem>.<ext>`.
    pub fn media_path(&self, metadata_path: &Path, ext: &str) -> Option<PathBuf> {
        let file_name = metadata_path.file_name()?.to_str()?;
        let stem = self.stem_of(file_name)?;
        let ext = ext.trim().trim_start_matches('.');
        if ext.is_empty() {
            return None;
        }
        Some(metadata_path.with_file_name(format!("{stem}.{ext}")))
    }
}

/// `supplements_videos` → `supplements_results`; anything else gets `_results` appended.
pub fn default_output_dir(input_dir: &Path) -> PathBuf {
    let name = input_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let result_name = if name.contains("videos") {
        name.replacen("videos", "results", 1)
    } else if name.is_empty() {
        "results".to_string()
    } else {
        format!("{name}_results")
    };

    match input_dir.parent() {
        Some(parent) if !name.is_empty() => parent.join(result_name),
        _ => input_dir.join(result_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_name_round_trips() {
        let naming = ResultNaming::default();
        let result = naming.result_file_name("C9x_ab-1.info.json").unwrap();
        assert_eq!(result, "C9x_ab-1.result.json");
        assert_eq!(
            naming.metadata_file_name(&result).as_deref(),
            Some("C9x_ab-1.info.json")
        );
    }

    #[test]
    fn test_non_metadata_files_have_no_result() {
        let naming = ResultNaming::default();
        assert_eq!(naming.result_file_name("video.mp4"), None);
        assert_eq!(naming.result_file_name("notes.json"), None);
        assert_eq!(naming.result_file_name(".info.json"), None);
        assert_eq!(naming.metadata_file_name("other.json"), None);
    }

    #[test]
    fn test_result_path_lands_in_output_dir() {
        let naming = ResultNaming::default();
        let path = naming
            .result_path(
                Path::new("out"),
                Path::new("supplements_videos/123.info.json"),
            )
            .unwrap();
        assert_eq!(path, PathBuf::from("out/123.result.json"));
    }

    #[test]
    fn test_media_path_uses_recorded_extension() {
        let naming = ResultNaming::default();
        let metadata = Path::new("in/7a.b.info.json");
        assert_eq!(
            naming.media_path(metadata, "mp4"),
            Some(PathBuf::from("in/7a.b.mp4"))
        );
        assert_eq!(
            naming.media_path(metadata, ".webm"),
            Some(PathBuf::from("in/7a.b.webm"))
        );
        assert_eq!(naming.media_path(metadata, "  "), None);
    }

    #[test]
    fn test_invalid_suffixes_are_rejected() {
        assert!(ResultNaming::new(".info.json", ".info.json").is_err());
        assert!(ResultNaming::new("info.json", ".result.json").is_err());
        assert!(ResultNaming::new(".", ".result.json").is_err());
        assert!(ResultNaming::new(".meta.json", ".out.txt").is_ok());
    }

    #[test]
    fn test_default_output_dir() {
        assert_eq!(
            default_output_dir(Path::new("supplements_videos")),
            PathBuf::from("supplements_results")
        );
        assert_eq!(
            default_output_dir(Path::new("/data/timeout_videos")),
            PathBuf::from("/data/timeout_results")
        );
        assert_eq!(
            default_output_dir(Path::new("/data/inbox")),
            PathBuf::from("/data/inbox_results")
        );
    }
}
