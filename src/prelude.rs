//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```ignore
//! use gaze_dataset::prelude::*;
//!
//! let config = PipelineConfig::default();
//! let pipeline = EpisodePipeline::from_config(config)?;
//! let outcome = pipeline.process_episode("recordings/12")?;
//! ```
//!
//! # What's Included
//!
//! ## Pipeline
//! - [`EpisodePipeline`], [`EpisodeOutcome`] - one episode end to end
//! - [`BatchProcessor`], [`BatchConfig`], [`ErrorMode`] - many episodes in parallel
//! - [`PipelineConfig`] - every tunable constant
//!
//! ## Stages
//! - [`merge_logs`], [`align`] - nearest-timestamp join
//! - [`ActionEncoder`] - per-episode action derivation
//! - [`SampleAssembler`] - rows to samples
//! - [`DatasetWriter`], [`EpisodeArrays`] - archive output
//!
//! ## Validation
//! - [`check_all`], [`inventory`] - pre-flight reports

// ============================================================================
// Pipeline
// ============================================================================

pub use crate::batch::{
    BatchConfig, BatchOutput, BatchProcessor, CancellationToken, ConsoleProgress, ErrorMode,
    ProgressCallback,
};
pub use crate::config::PipelineConfig;
pub use crate::pipeline::{EpisodeOutcome, EpisodePipeline};

// ============================================================================
// Stages
// ============================================================================

pub use crate::action::{ActionEncoder, ActionVector, Quaternion};
pub use crate::alignment::{align, merge_logs, normalize_telemetry_file, AlignmentReport};
pub use crate::assembler::{Sample, SampleAssembler};
pub use crate::export::{inspect_archive, DatasetWriter, EpisodeArrays};
pub use crate::media::MediaRef;
pub use crate::timestamp::CanonicalTimestamp;

// ============================================================================
// Validation
// ============================================================================

pub use crate::validation::{check_all, check_episode, inventory, CorrespondenceReport};

// ============================================================================
// Errors
// ============================================================================

pub use crate::error::{DatasetError, Result};
