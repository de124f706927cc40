//! The batch loop: one record at a time, start to finish.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::{
    fs,
    io::{AsyncWrite, AsyncWriteExt},
};
use tracing::{info, warn};

use crate::{
    error::{RazmetkaError, Result},
    metadata::VideoMetadata,
    model::{GenerationRequest, MultimodalModel},
    naming::ResultNaming,
    normalize::strip_code_fences,
    prompt::PromptTemplate,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A result file exists already.
    AlreadyAnnotated,
    /// The model could not ingest the media. Retried on the next run.
    MediaRejected(String),
}

#[derive(Debug)]
pub enum RecordOutcome {
    Success { result_path: PathBuf, bytes: usize },
    Skipped { reason: SkipReason },
    Fatal(RazmetkaError),
}

impl RecordOutcome {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecordOutcome::Fatal(_))
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub written: usize,
    pub already_done: usize,
    /// Records the model rejected, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

pub struct Annotator<'m, M: MultimodalModel> {
    model: &'m M,
    template: PromptTemplate,
    naming: ResultNaming,
    output_dir: PathBuf,
    use_audio_in_video: bool,
    limit: Option<usize>,
}

impl<'m, M: MultimodalModel> Annotator<'m, M> {
    pub fn new(model: &'m M, template: PromptTemplate, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            model,
            template,
            naming: ResultNaming::default(),
            output_dir: output_dir.into(),
            use_audio_in_video: true,
            limit: None,
        }
    }

    pub fn with_naming(mut self, naming: ResultNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_audio(mut self, use_audio_in_video: bool) -> Self {
        self.use_audio_in_video = use_audio_in_video;
        self
    }

    /// Stop after this many records have been attempted.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Process one metadata file end to end.
    pub async fn annotate(&self, metadata_path: &Path) -> RecordOutcome {
        match self.try_annotate(metadata_path).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_transient() => {
                warn!(
                    "Skipping {}: {}. It stays pending for the next run",
                    metadata_path.display(),
                    e
                );
                RecordOutcome::Skipped {
                    reason: SkipReason::MediaRejected(e.to_string()),
                }
            }
            Err(e) => RecordOutcome::Fatal(e),
        }
    }

    async fn try_annotate(&self, metadata_path: &Path) -> Result<RecordOutcome> {
        let result_path = self
            .naming
            .result_path(&self.output_dir, metadata_path)
            .ok_or_else(|| RazmetkaError::MetadataInvalid {
                path: metadata_path.to_path_buf(),
                reason: format!(
                    "file name does not end in {}",
                    self.naming.metadata_suffix()
                ),
            })?;

        if fs::try_exists(&result_path).await? {
            return Ok(RecordOutcome::Skipped {
                reason: SkipReason::AlreadyAnnotated,
            });
        }

        let metadata = VideoMetadata::load(metadata_path).await?;
        let video = metadata
            .media_ext()
            .and_then(|ext| self.naming.media_path(metadata_path, ext))
            .ok_or_else(|| RazmetkaError::MetadataInvalid {
                path: metadata_path.to_path_buf(),
                reason: "missing \"ext\" field".to_string(),
            })?;
        if !fs::try_exists(&video).await? {
            return Err(RazmetkaError::MediaMissing { path: video });
        }

        let prompt = self.template.render(&metadata);
        let raw = self
            .model
            .generate(GenerationRequest {
                prompt: &prompt,
                video: &video,
                use_audio_in_video: self.use_audio_in_video,
            })
            .await?;

        let text = strip_code_fences(&raw);
        match write_new(&result_path, &text).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(RecordOutcome::Skipped {
                    reason: SkipReason::AlreadyAnnotated,
                });
            }
            Err(e) => return Err(e.into()),
        }

        info!("Wrote results to {}", result_path.display());
        Ok(RecordOutcome::Success {
            result_path,
            bytes: text.len(),
        })
    }

    /// Run over `pending` in order, reporting each outcome to `observer`
    /// before moving on. Stops at the first fatal record and returns its
    /// error; results written before it stay on disk.
    pub async fn run<F>(&self, pending: &[PathBuf], mut observer: F) -> Result<BatchSummary>
    where
        F: FnMut(&Path, &RecordOutcome),
    {
        let mut summary = BatchSummary::default();
        let take = self.limit.unwrap_or(usize::MAX);

        for metadata_path in pending.iter().take(take) {
            let outcome = self.annotate(metadata_path).await;
            observer(metadata_path.as_path(), &outcome);

            match outcome {
                RecordOutcome::Success { .. } => summary.written += 1,
                RecordOutcome::Skipped {
                    reason: SkipReason::AlreadyAnnotated,
                } => summary.already_done += 1,
                RecordOutcome::Skipped {
                    reason: SkipReason::MediaRejected(reason),
                } => summary.skipped.push((metadata_path.clone(), reason)),
                RecordOutcome::Fatal(e) => return Err(e),
            }
        }

        Ok(summary)
    }
}

/// Create `path` and write `text`; fails with `AlreadyExists` instead of
/// truncating an existing result.
async fn write_new(path: &Path, text: &str) -> std::io::Result<()> {
    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    write_or_discard(path, file, text.as_bytes()).await
}

/// Fill the freshly created `path` through `writer`. A failed write removes
/// the file again so the record stays pending.
async fn write_or_discard<W>(path: &Path, mut writer: W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut written = writer.write_all(bytes).await;
    if written.is_ok() {
        written = writer.flush().await;
    }
    drop(writer);

    if let Err(e) = written {
        if let Err(remove_err) = fs::remove_file(path).await {
            warn!(
                "Could not remove partial result {}: {}",
                path.display(),
                remove_err
            );
        }
        return Err(e);
    }
    Ok(())
}
