//! Razmetka Core Library
//!
//! Batch annotation of downloaded videos: find records without a result,
//! prompt a multimodal model with the video and its metadata, and store the
//! model's JSON answer next to the other results.

pub mod annotator;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metadata;
pub mod model;
pub mod naming;
pub mod normalize;
pub mod prompt;

// Re-export commonly used items at crate root
pub use annotator::{Annotator, BatchSummary, RecordOutcome, SkipReason};
pub use config::AnnotatorConfig;
pub use discovery::find_pending;
pub use error::{RazmetkaError, Result};
pub use metadata::{Count, VideoMetadata};
pub use model::{GenerationRequest, MediaTransport, MultimodalModel, OmniClient, OmniConfig};
pub use naming::{ResultNaming, default_output_dir};
pub use normalize::strip_code_fences;
pub use prompt::{Campaign, PromptTemplate};
