//! Dataset export.
//!
//! Stacks the samples of one episode into arrays and writes them as a
//! single compressed NumPy archive.
//!
//! # Archive layout
//!
//! ```text
//! <output_dir>/<episode>.npz
//!   images       [N, H, W, 3]  f32   RGB in [0, 1]
//!   depth        [N, H, W, 1]  f32   depth in [0, 1]
//!   action       [N, 4, 1]     f64   roll, pitch, throttle, yaw
//!   gaze_coords  [N, 2, 1]     f64   x / width, y / height
//! <output_dir>/<episode>_metadata.json   (optional)
//! ```
//!
//! Element `i` of every array comes from the same source row. The four
//! leading dimensions must agree; otherwise nothing is written.
//!
//! # Atomicity
//!
//! The archive is written to a temporary file in the output directory and
//! renamed onto `<episode>.npz` only after the zip is finalized, so a reader
//! never observes a partial archive.
//!
//! # Example
//!
//! ```ignore
//! use gaze_dataset::export::{DatasetWriter, EpisodeArrays};
//!
//! let arrays = EpisodeArrays::stack(&assembled.samples)?;
//! let writer = DatasetWriter::new("out");
//! let path = writer.write_episode("12", &arrays)?; // out/12.npz
//! ```

use crate::assembler::Sample;
use crate::config::PipelineConfig;
use crate::error::{DatasetError, Result};
use ndarray::{stack, Array3, Array4, ArrayD, ArrayView3, Axis, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// Array names inside the archive, in write order.
pub const ARRAY_NAMES: [&str; 4] = ["images", "depth", "action", "gaze_coords"];

// ============================================================================
// Stacked arrays
// ============================================================================

/// Stacked per-episode arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeArrays {
    pub images: Array4<f32>,
    pub depth: Array4<f32>,
    pub action: Array3<f64>,
    pub gaze_coords: Array3<f64>,
}

impl EpisodeArrays {
    /// Assemble from already-stacked parts, checking leading dimensions.
    pub fn from_parts(
        images: Array4<f32>,
        depth: Array4<f32>,
        action: Array3<f64>,
        gaze_coords: Array3<f64>,
    ) -> Result<Self> {
        let arrays = Self {
            images,
            depth,
            action,
            gaze_coords,
        };
        arrays.check_shapes()?;
        Ok(arrays)
    }

    /// Stack samples along a new leading axis.
    ///
    /// An empty slice yields arrays with `N = 0`. Samples whose frame shapes
    /// differ fail with [`DatasetError::Shape`].
    pub fn stack(samples: &[Sample]) -> Result<Self> {
        let n = samples.len();
        if n == 0 {
            return Ok(Self {
                images: Array4::zeros((0, 0, 0, 3)),
                depth: Array4::zeros((0, 0, 0, 1)),
                action: Array3::zeros((0, 4, 1)),
                gaze_coords: Array3::zeros((0, 2, 1)),
            });
        }

        let images: Vec<ArrayView3<f32>> = samples.iter().map(|s| s.image.view()).collect();
        let depth: Vec<ArrayView3<f32>> = samples.iter().map(|s| s.depth.view()).collect();
        let action = Array3::from_shape_fn((n, 4, 1), |(i, j, _)| samples[i].action.as_array()[j]);
        let gaze_coords = Array3::from_shape_fn((n, 2, 1), |(i, j, _)| samples[i].gaze[j]);

        Self::from_parts(
            stack(Axis(0), &images)?,
            stack(Axis(0), &depth)?,
            action,
            gaze_coords,
        )
    }

    /// Shared leading dimension, or [`DatasetError::ShapeMismatch`].
    pub fn check_shapes(&self) -> Result<usize> {
        let counts = (
            self.images.len_of(Axis(0)),
            self.depth.len_of(Axis(0)),
            self.action.len_of(Axis(0)),
            self.gaze_coords.len_of(Axis(0)),
        );
        let (images, depth, action, gaze) = counts;
        if images == depth && depth == action && action == gaze {
            Ok(images)
        } else {
            Err(DatasetError::ShapeMismatch {
                images,
                depth,
                action,
                gaze,
            })
        }
    }

    /// Number of samples (leading dimension of `images`).
    pub fn n_samples(&self) -> usize {
        self.images.len_of(Axis(0))
    }

    /// Read an archive written by [`DatasetWriter`].
    pub fn read_npz<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut npz = NpzReader::new(File::open(path)?)?;
        let images: Array4<f32> = npz.by_name("images")?;
        let depth: Array4<f32> = npz.by_name("depth")?;
        let action: Array3<f64> = npz.by_name("action")?;
        let gaze_coords: Array3<f64> = npz.by_name("gaze_coords")?;
        Self::from_parts(images, depth, action, gaze_coords)
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Per-episode export metadata (`<episode>_metadata.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub episode: String,
    pub n_samples: usize,
    pub images_shape: Vec<usize>,
    pub depth_shape: Vec<usize>,
    pub action_shape: Vec<usize>,
    pub gaze_shape: Vec<usize>,
    /// Data rows in the merged table
    pub rows_total: usize,
    /// Rows dropped for any reason
    pub rows_skipped: usize,
    /// Rows dropped because a frame was absent
    pub missing_media: usize,
    pub config: PipelineConfig,
    pub export_timestamp: String,
}

impl EpisodeMetadata {
    pub fn new(
        episode: &str,
        arrays: &EpisodeArrays,
        rows_total: usize,
        rows_skipped: usize,
        missing_media: usize,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            episode: episode.to_string(),
            n_samples: arrays.n_samples(),
            images_shape: arrays.images.shape().to_vec(),
            depth_shape: arrays.depth.shape().to_vec(),
            action_shape: arrays.action.shape().to_vec(),
            gaze_shape: arrays.gaze_coords.shape().to_vec(),
            rows_total,
            rows_skipped,
            missing_media,
            config: config.clone(),
            export_timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Writes episode archives into one output directory.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    output_dir: PathBuf,
}

impl DatasetWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Final archive path for an episode.
    pub fn archive_path(&self, episode: &str) -> PathBuf {
        self.output_dir.join(format!("{episode}.npz"))
    }

    /// Write `<episode>.npz`, all-or-nothing.
    ///
    /// # Errors
    ///
    /// - [`DatasetError::ShapeMismatch`] if leading dimensions disagree
    /// - [`DatasetError::EmptyEpisode`] if `N = 0`
    ///
    /// In both cases nothing is created on disk.
    pub fn write_episode(&self, episode: &str, arrays: &EpisodeArrays) -> Result<PathBuf> {
        let n = arrays.check_shapes()?;
        if n == 0 {
            return Err(DatasetError::EmptyEpisode {
                episode: episode.to_string(),
            });
        }

        fs::create_dir_all(&self.output_dir)?;
        let path = self.archive_path(episode);

        let mut tmp = NamedTempFile::new_in(&self.output_dir)?;
        {
            let mut npz = NpzWriter::new_compressed(tmp.as_file_mut());
            npz.add_array("images", &arrays.images)?;
            npz.add_array("depth", &arrays.depth)?;
            npz.add_array("action", &arrays.action)?;
            npz.add_array("gaze_coords", &arrays.gaze_coords)?;
            npz.finish()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        info!(
            episode,
            samples = n,
            path = %path.display(),
            "wrote archive"
        );
        Ok(path)
    }

    /// Write `<episode>_metadata.json`.
    pub fn write_metadata(&self, metadata: &EpisodeMetadata) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self
            .output_dir
            .join(format!("{}_metadata.json", metadata.episode));
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(file, metadata)?;
        Ok(path)
    }
}

// ============================================================================
// Inspection
// ============================================================================

/// Array names and shapes of an archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// `(name, shape)` in archive order, `.npy` suffix removed
    pub arrays: Vec<(String, Vec<usize>)>,
}

impl ArchiveSummary {
    pub fn shape_of(&self, name: &str) -> Option<&[usize]> {
        self.arrays
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.as_slice())
    }
}

impl std::fmt::Display for ArchiveSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.path.display())?;
        for (name, shape) in &self.arrays {
            writeln!(f, "  {name:<12} {shape:?}")?;
        }
        Ok(())
    }
}

/// Read back array shapes of any `.npz` holding f32 or f64 arrays.
pub fn inspect_archive<P: AsRef<Path>>(path: P) -> Result<ArchiveSummary> {
    let path = path.as_ref();
    let mut npz = NpzReader::new(File::open(path)?)?;
    let names = npz.names()?;

    let mut arrays = Vec::with_capacity(names.len());
    for name in names {
        let shape = match npz.by_name::<OwnedRepr<f32>, IxDyn>(&name) {
            Ok(a) => a.shape().to_vec(),
            Err(_) => {
                let a: ArrayD<f64> = npz.by_name(&name)?;
                a.shape().to_vec()
            }
        };
        let short = name.strip_suffix(".npy").unwrap_or(&name).to_string();
        arrays.push((short, shape));
    }

    Ok(ArchiveSummary {
        path: path.to_path_buf(),
        arrays,
    })
}
