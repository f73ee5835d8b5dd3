//! Sample assembly.
//!
//! Converts the merged rows of one episode into model-ready [`Sample`]s.
//! Row filtering is a sequence transformation:
//!
//! ```text
//! rows ──► resolve media ──► decode + resize ──► survivors ──► encode actions
//!              │                  │
//!              └── MissingMedia ──┴── DecodeFailure ──► skips (logged)
//! ```
//!
//! Actions are encoded over the surviving sequence only, so throttle is the
//! altitude delta between consecutive *emitted* samples and is 0 at the
//! first one. Because images, depth, action and gaze all come from the same
//! surviving row, the four sequences stay index-aligned by construction.

use crate::action::{ActionEncoder, ActionVector};
use crate::config::{LayoutConfig, PipelineConfig};
use crate::media::MediaRef;
use crate::preprocessing::{load_depth, load_rgb, ViewportNormalizer};
use crate::records::{RowSkip, SampleRow, SkipReason};
use ndarray::Array3;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One training example.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Source row in the merged table
    pub row: usize,
    /// `[H, W, 3]` in [0, 1]
    pub image: Array3<f32>,
    /// `[H, W, 1]` in [0, 1]
    pub depth: Array3<f32>,
    pub action: ActionVector,
    /// Gaze divided by the source viewport
    pub gaze: [f64; 2],
}

/// Result of assembling one episode.
#[derive(Debug, Clone, Default)]
pub struct AssembledEpisode {
    pub samples: Vec<Sample>,
    pub skips: Vec<RowSkip>,
}

impl AssembledEpisode {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of skips due to absent files.
    pub fn missing_media(&self) -> usize {
        self.skips.iter().filter(|s| s.is_missing_media()).count()
    }
}

/// Builds [`Sample`]s for one episode directory.
#[derive(Debug, Clone)]
pub struct SampleAssembler {
    episode: String,
    episode_dir: PathBuf,
    layout: LayoutConfig,
    image_size: usize,
    gaze: ViewportNormalizer,
}

impl SampleAssembler {
    pub fn new<P: AsRef<Path>>(episode_dir: P, config: &PipelineConfig) -> Self {
        let episode_dir = episode_dir.as_ref().to_path_buf();
        Self {
            episode: episode_name(&episode_dir),
            episode_dir,
            layout: config.layout.clone(),
            image_size: config.sampling.image_size,
            gaze: ViewportNormalizer::from_config(&config.sampling),
        }
    }

    pub fn episode(&self) -> &str {
        &self.episode
    }

    /// Assemble the episode from its rows, in row order.
    ///
    /// Never fails: every problem with a row becomes a [`RowSkip`].
    pub fn assemble(&self, rows: Vec<SampleRow>) -> AssembledEpisode {
        let mut encoder = ActionEncoder::new();
        let mut out = AssembledEpisode::default();

        for row in rows {
            match self.load_frames(&row) {
                Ok((image, depth)) => {
                    let action = encoder.encode(&row.orientation, row.altitude);
                    out.samples.push(Sample {
                        row: row.row,
                        image,
                        depth,
                        action,
                        gaze: self.gaze.normalize(row.gaze_x, row.gaze_y),
                    });
                }
                Err(skip) => {
                    warn!(episode = %self.episode, row = skip.row, "skipping row: {}", skip.reason);
                    out.skips.push(skip);
                }
            }
        }

        debug!(
            episode = %self.episode,
            samples = out.samples.len(),
            skipped = out.skips.len(),
            "assembled episode"
        );
        out
    }

    fn load_frames(&self, row: &SampleRow) -> Result<(Array3<f32>, Array3<f32>), RowSkip> {
        let media = MediaRef::parse(&row.image_file)
            .ok_or_else(|| RowSkip::parse(row.row, "empty ImageFile field"))?;
        let paths = media.resolve(&self.episode_dir, &self.layout);

        if let Some(missing) = paths.first_missing() {
            return Err(RowSkip {
                row: row.row,
                reason: SkipReason::MissingMedia {
                    path: missing.to_path_buf(),
                },
            });
        }

        let decode_failure = |path: &Path, e: crate::error::DatasetError| RowSkip {
            row: row.row,
            reason: SkipReason::DecodeFailure {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        };

        let image = load_rgb(&paths.rgb, self.image_size).map_err(|e| decode_failure(&paths.rgb, e))?;
        let depth =
            load_depth(&paths.depth, self.image_size).map_err(|e| decode_failure(&paths.depth, e))?;
        Ok((image, depth))
    }
}

/// Episode identifier: the directory's final component.
pub fn episode_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.to_string_lossy().into_owned())
}
