//! Per-episode conversion pipeline.
//!
//! Connects the stages that turn one recorded episode directory into one
//! archive:
//!
//! ```text
//! <episode>/                                    <output_dir>/
//!   images/*  ─┐                                  <episode>.npz
//!   depth/*   ─┼─► check ─► read table ─► assemble ─► stack ─► write
//!   airsim_with_gaze_closest.csv ─┘                   <episode>_metadata.json
//! ```
//!
//! - The correspondence check is advisory: a mismatch, or a table the check
//!   cannot count, is logged and the episode is still converted.
//! - Metadata is best effort: once the archive is written, a failed
//!   metadata write is logged and the episode still counts as written.
//! - Row problems become skips; the episode continues.
//! - An episode with no surviving rows is reported as skipped and leaves no
//!   file behind.
//!
//! Each call to [`EpisodePipeline::process_episode`] is self-contained (a
//! fresh action encoder per episode), so the same pipeline can be shared by
//! parallel workers.
//!
//! # Example
//!
//! ```ignore
//! use gaze_dataset::prelude::*;
//!
//! let config = PipelineConfig::default().with_output_dir("npz");
//! let pipeline = EpisodePipeline::from_config(config)?;
//!
//! match pipeline.process_episode("recordings/12")? {
//!     EpisodeOutcome::Written(export) => println!("{} samples", export.n_samples),
//!     EpisodeOutcome::Skipped(skip) => println!("{}", skip.reason),
//! }
//! ```

use crate::assembler::{episode_name, SampleAssembler};
use crate::config::PipelineConfig;
use crate::error::{DatasetError, Result};
use crate::export::{DatasetWriter, EpisodeArrays, EpisodeMetadata};
use crate::records::read_merged_table;
use crate::validation::{check_episode, CorrespondenceReport};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A written episode.
#[derive(Debug, Clone)]
pub struct EpisodeExport {
    pub episode: String,
    pub archive: PathBuf,
    pub metadata: Option<PathBuf>,
    pub n_samples: usize,
    /// Data rows in the merged table
    pub rows_total: usize,
    pub rows_skipped: usize,
    /// `None` if the check itself could not run
    pub correspondence: Option<CorrespondenceReport>,
}

/// An episode that produced no archive.
#[derive(Debug, Clone)]
pub struct EpisodeSkip {
    pub episode: String,
    pub reason: String,
    pub rows_total: usize,
    pub rows_skipped: usize,
}

/// What happened to one episode.
#[derive(Debug, Clone)]
pub enum EpisodeOutcome {
    Written(EpisodeExport),
    Skipped(EpisodeSkip),
}

impl EpisodeOutcome {
    pub fn episode(&self) -> &str {
        match self {
            EpisodeOutcome::Written(e) => &e.episode,
            EpisodeOutcome::Skipped(s) => &s.episode,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, EpisodeOutcome::Written(_))
    }

    /// Samples written (0 when skipped).
    pub fn n_samples(&self) -> usize {
        match self {
            EpisodeOutcome::Written(e) => e.n_samples,
            EpisodeOutcome::Skipped(_) => 0,
        }
    }

    pub fn rows_skipped(&self) -> usize {
        match self {
            EpisodeOutcome::Written(e) => e.rows_skipped,
            EpisodeOutcome::Skipped(s) => s.rows_skipped,
        }
    }
}

impl fmt::Display for EpisodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodeOutcome::Written(e) => write!(
                f,
                "{}: wrote {} samples ({} rows skipped) -> {}",
                e.episode,
                e.n_samples,
                e.rows_skipped,
                e.archive.display()
            ),
            EpisodeOutcome::Skipped(s) => write!(
                f,
                "{}: skipped, {} ({} of {} rows skipped)",
                s.episode, s.reason, s.rows_skipped, s.rows_total
            ),
        }
    }
}

/// Converts episode directories into archives.
#[derive(Debug, Clone)]
pub struct EpisodePipeline {
    config: PipelineConfig,
    writer: DatasetWriter,
}

impl EpisodePipeline {
    /// Create a pipeline from a validated configuration.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate().map_err(DatasetError::InvalidConfig)?;
        let writer = DatasetWriter::new(&config.export.output_dir);
        Ok(Self { config, writer })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn writer(&self) -> &DatasetWriter {
        &self.writer
    }

    /// Convert one episode directory.
    ///
    /// # Errors
    ///
    /// Unreadable merged table (bad header, missing column), I/O failures
    /// and shape mismatches abort this episode only; nothing is written.
    pub fn process_episode<P: AsRef<Path>>(&self, episode_dir: P) -> Result<EpisodeOutcome> {
        let dir = episode_dir.as_ref();
        let episode = episode_name(dir);
        let layout = &self.config.layout;

        let correspondence = match check_episode(dir, layout) {
            Ok(report) if report.is_ok() => {
                info!(episode = %episode, "{report}");
                Some(report)
            }
            Ok(report) => {
                warn!(episode = %episode, "{report}");
                Some(report)
            }
            Err(e) => {
                warn!(episode = %episode, "correspondence check failed: {e}");
                None
            }
        };

        let table_path = dir.join(&layout.merged_table);
        if !table_path.is_file() {
            return Ok(EpisodeOutcome::Skipped(EpisodeSkip {
                episode,
                reason: format!("{} not found", layout.merged_table),
                rows_total: 0,
                rows_skipped: 0,
            }));
        }

        let table = read_merged_table(&table_path)?;
        for skip in &table.dropped {
            warn!(episode = %episode, row = skip.row, "skipping row: {}", skip.reason);
        }
        let rows_total = table.total_rows;
        let table_dropped = table.dropped.len();

        let assembled = SampleAssembler::new(dir, &self.config).assemble(table.rows);
        let rows_skipped = table_dropped + assembled.skips.len();

        if assembled.is_empty() {
            info!(episode = %episode, rows_total, rows_skipped, "no valid samples, episode skipped");
            return Ok(EpisodeOutcome::Skipped(EpisodeSkip {
                episode,
                reason: "no valid samples".to_string(),
                rows_total,
                rows_skipped,
            }));
        }

        let missing_media = assembled.missing_media();
        let arrays = EpisodeArrays::stack(&assembled.samples)?;
        drop(assembled);

        let archive = self.writer.write_episode(&episode, &arrays)?;

        let metadata = if self.config.export.write_metadata {
            let meta = EpisodeMetadata::new(
                &episode,
                &arrays,
                rows_total,
                rows_skipped,
                missing_media,
                &self.config,
            );
            match self.writer.write_metadata(&meta) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(episode = %episode, "archive kept, metadata not written: {e}");
                    None
                }
            }
        } else {
            None
        };

        Ok(EpisodeOutcome::Written(EpisodeExport {
            episode,
            archive,
            metadata,
            n_samples: arrays.n_samples(),
            rows_total,
            rows_skipped,
            correspondence,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "TimeStamp,POS_Z,Q_W,Q_X,Q_Y,Q_Z,ImageFile,absolute_timestamp_iso,x,y,confidence\n";

    fn write_frames(dir: &Path, name: &str) {
        fs::create_dir_all(dir.join("images")).unwrap();
        fs::create_dir_all(dir.join("depth")).unwrap();
        RgbImage::from_pixel(6, 4, Rgb([10, 20, 30]))
            .save(dir.join("images").join(format!("{name}.png")))
            .unwrap();
        GrayImage::from_pixel(6, 4, Luma([99]))
            .save(dir.join("depth").join(format!("{name}_depth.png")))
            .unwrap();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig::default().with_image_size(0);
        assert!(matches!(
            EpisodePipeline::from_config(config),
            Err(DatasetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_episode_written_with_metadata() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let ep = root.path().join("5");
        write_frames(&ep, "a");
        write_frames(&ep, "b");
        fs::write(
            ep.join("airsim_with_gaze_closest.csv"),
            format!(
                "{HEADER}1,-1,1,0,0,0,a.png;a_depth.png,t,320,180,HIGH\n2,-2,1,0,0,0,b.png,t,0,0,LOW\n"
            ),
        )
        .unwrap();

        let config = PipelineConfig::default()
            .with_output_dir(out.path())
            .with_image_size(4)
            .with_metadata(true);
        let pipeline = EpisodePipeline::from_config(config).unwrap();
        let outcome = pipeline.process_episode(&ep).unwrap();

        let EpisodeOutcome::Written(export) = outcome else {
            panic!("expected a written episode");
        };
        assert_eq!(export.n_samples, 2);
        assert_eq!(export.archive, out.path().join("5.npz"));
        assert!(export.correspondence.unwrap().is_ok());
        assert!(export.metadata.unwrap().exists());
    }

    #[test]
    fn test_all_rows_skipped_writes_nothing() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let ep = root.path().join("6");
        fs::create_dir_all(ep.join("images")).unwrap();
        fs::write(
            ep.join("airsim_with_gaze_closest.csv"),
            format!("{HEADER}1,-1,1,0,0,0,gone.png,t,1,1,HIGH\n"),
        )
        .unwrap();

        let pipeline =
            EpisodePipeline::from_config(PipelineConfig::default().with_output_dir(out.path())).unwrap();
        let outcome = pipeline.process_episode(&ep).unwrap();

        assert!(!outcome.is_written());
        assert_eq!(outcome.rows_skipped(), 1);
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
        assert!(outcome.to_string().starts_with("6: skipped"));
    }

    #[test]
    fn test_missing_table_is_skip() {
        let root = TempDir::new().unwrap();
        let ep = root.path().join("7");
        fs::create_dir_all(&ep).unwrap();

        let pipeline = EpisodePipeline::from_config(PipelineConfig::default()).unwrap();
        let outcome = pipeline.process_episode(&ep).unwrap();
        assert!(matches!(outcome, EpisodeOutcome::Skipped(_)));
    }

    #[test]
    fn test_missing_column_is_error() {
        let root = TempDir::new().unwrap();
        let ep = root.path().join("8");
        fs::create_dir_all(&ep).unwrap();
        fs::write(ep.join("airsim_with_gaze_closest.csv"), "ImageFile,x\na.png,1\n").unwrap();

        let pipeline = EpisodePipeline::from_config(PipelineConfig::default()).unwrap();
        let err = pipeline.process_episode(&ep).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { .. }));
    }

    #[test]
    fn test_metadata_failure_keeps_archive() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let ep = root.path().join("9");
        write_frames(&ep, "a");
        fs::write(
            ep.join("airsim_with_gaze_closest.csv"),
            format!("{HEADER}1,-1,1,0,0,0,a.png,t,1,1,HIGH\n"),
        )
        .unwrap();
        // A directory in the way makes the metadata file uncreatable
        fs::create_dir_all(out.path().join("9_metadata.json")).unwrap();

        let config = PipelineConfig::default()
            .with_output_dir(out.path())
            .with_image_size(4)
            .with_metadata(true);
        let pipeline = EpisodePipeline::from_config(config).unwrap();
        let outcome = pipeline.process_episode(&ep).unwrap();

        let EpisodeOutcome::Written(export) = outcome else {
            panic!("expected a written episode");
        };
        assert!(export.metadata.is_none());
        assert!(export.archive.exists());
    }
}
