//! Gaze Dataset
//!
//! Builds gaze-regularised imitation-learning datasets from drone flight
//! recordings.
//!
//! # Overview
//!
//! Each recorded episode has a flight telemetry log (pose, orientation,
//! captured frame names), a gaze tracker log and RGB/depth frames on disk.
//! This library brings both logs onto one clock, pairs every telemetry row
//! with the nearest gaze sample, derives control actions from orientation
//! and altitude, and writes one compressed archive of aligned
//! `(image, depth, action, gaze)` tuples per episode.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Gaze Dataset                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  timestamp/     - Canonical clock normalization                 │
//! │  records/       - Telemetry, gaze and merged-table I/O          │
//! │  alignment/     - Nearest-timestamp join, merge stage           │
//! │  action/        - Quaternion → Euler, throttle accumulator      │
//! │  media/         - Frame name resolution                         │
//! │  preprocessing/ - Frame decoding, area resize, gaze scaling     │
//! │  assembler/     - Row filtering into samples                    │
//! │  export/        - Stacking and compressed .npz archives         │
//! │  validation/    - Correspondence, inventory, timestamp checks   │
//! │  pipeline/      - One episode end to end                        │
//! │  batch/         - Parallel multi-episode processing             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use gaze_dataset::prelude::*;
//!
//! let config = PipelineConfig::default();
//! merge_logs("12/airsim_rec.txt", "12/gaze_log.csv", "12/airsim_with_gaze_closest.csv", &config)?;
//!
//! let pipeline = EpisodePipeline::from_config(config.with_output_dir("npz"))?;
//! let outcome = pipeline.process_episode("12")?;
//! println!("{outcome}");
//! ```

pub mod action;
pub mod alignment;
pub mod assembler;
pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod media;
pub mod pipeline;
pub mod prelude;
pub mod preprocessing;
pub mod records;
pub mod timestamp;
pub mod validation;

// Re-exports - Core types
pub use error::{DatasetError, Result};
pub use timestamp::CanonicalTimestamp;

// Re-exports - Config
pub use config::{ClockConfig, ExportConfig, LayoutConfig, PipelineConfig, SamplingConfig};

// Re-exports - Records
pub use records::{GazeRecord, RowSkip, SampleRow, SkipReason, TelemetryRecord};

// Re-exports - Alignment
pub use alignment::{align, merge_logs, nearest_indices, AlignedRow, AlignmentReport, Timestamped};

// Re-exports - Actions
pub use action::{quaternion_to_euler, ActionEncoder, ActionVector, EulerAngles, Quaternion};

// Re-exports - Assembly and export
pub use assembler::{AssembledEpisode, Sample, SampleAssembler};
pub use export::{inspect_archive, ArchiveSummary, DatasetWriter, EpisodeArrays};
pub use media::MediaRef;

// Re-exports - Validation
pub use validation::{
    check_all, check_episode, validate_timestamps, CorrespondenceReport, CorrespondenceStatus,
    ValidationLevel, ValidationResult,
};

// Re-exports - Pipeline
pub use batch::{BatchConfig, BatchOutput, BatchProcessor};
pub use pipeline::{EpisodeOutcome, EpisodePipeline};
