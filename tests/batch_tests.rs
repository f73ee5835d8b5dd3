//! Parallel batch processing over a recordings root.
//!
//! These tests verify:
//! 1. Parallel results match per-episode processing
//! 2. Error modes behave as documented
//! 3. Cancellation stops new episodes from starting
//! 4. Progress callbacks see every episode

mod common;

use common::create_episode;
use gaze_dataset::batch::{
    BatchConfig, BatchOutput, BatchProcessor, CancellationToken, ErrorMode, ProgressCallback,
    ProgressInfo,
};
use gaze_dataset::{EpisodeArrays, EpisodePipeline, PipelineConfig};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Test Fixtures
// ============================================================================

fn config_for(out: &Path) -> PipelineConfig {
    PipelineConfig::default()
        .with_output_dir(out)
        .with_image_size(4)
}

/// Episode whose merged table lacks required columns.
fn create_broken_episode(root: &Path, name: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("airsim_with_gaze_closest.csv"), "ImageFile\na.png\n").unwrap();
}

#[derive(Default)]
struct CountingProgress {
    started: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl ProgressCallback for CountingProgress {
    fn on_progress(&self, _info: &ProgressInfo) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_complete(&self, _output: &BatchOutput) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Basic Functionality Tests
// ============================================================================

#[test]
fn test_batch_matches_single_episode() {
    let root = TempDir::new().unwrap();
    let batch_out = TempDir::new().unwrap();
    let single_out = TempDir::new().unwrap();
    for (name, n) in [("1", 2), ("2", 3), ("10", 1)] {
        create_episode(root.path(), name, n);
    }

    let processor = BatchProcessor::new(
        config_for(batch_out.path()),
        BatchConfig::new().with_threads(3),
    )
    .unwrap();
    let output = processor.process_root(root.path()).unwrap();

    assert!(output.all_successful());
    assert_eq!(output.written_count(), 3);
    assert_eq!(output.total_samples(), 6);
    let order: Vec<&str> = output
        .results_in_order()
        .iter()
        .map(|r| r.episode.as_str())
        .collect();
    assert_eq!(order, vec!["1", "2", "10"]);

    let single = EpisodePipeline::from_config(config_for(single_out.path())).unwrap();
    single.process_episode(root.path().join("2")).unwrap();
    assert_eq!(
        EpisodeArrays::read_npz(batch_out.path().join("2.npz")).unwrap(),
        EpisodeArrays::read_npz(single_out.path().join("2.npz")).unwrap()
    );
}

#[test]
fn test_empty_episode_counts_as_success() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    create_episode(root.path(), "1", 2);
    fs::create_dir_all(root.path().join("2")).unwrap();

    let processor = BatchProcessor::new(config_for(out.path()), BatchConfig::new()).unwrap();
    let output = processor.process_root(root.path()).unwrap();

    assert_eq!(output.successful_count(), 2);
    assert_eq!(output.written_count(), 1);
    assert_eq!(output.empty_count(), 1);
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_collect_errors_continues() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    create_episode(root.path(), "1", 2);
    create_broken_episode(root.path(), "2");
    create_episode(root.path(), "3", 2);

    let processor = BatchProcessor::new(
        config_for(out.path()),
        BatchConfig::new().with_error_mode(ErrorMode::CollectErrors),
    )
    .unwrap();
    let output = processor.process_root(root.path()).unwrap();

    assert_eq!(output.written_count(), 2);
    assert_eq!(output.failed_count(), 1);
    let failed = output.iter_errors().next().unwrap();
    assert_eq!(failed.episode, "2");
    assert!(failed.error.contains("missing"), "{}", failed.error);
    assert!(out.path().join("1.npz").exists());
    assert!(out.path().join("3.npz").exists());
    assert!(!out.path().join("2.npz").exists());
}

#[test]
fn test_fail_fast_returns_error() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    create_broken_episode(root.path(), "1");

    let processor = BatchProcessor::new(
        config_for(out.path()),
        BatchConfig::new()
            .with_threads(1)
            .with_error_mode(ErrorMode::FailFast),
    )
    .unwrap();

    assert!(processor.process_root(root.path()).is_err());
}

#[test]
fn test_invalid_pipeline_config_rejected() {
    let config = PipelineConfig::default().with_image_size(0);
    assert!(BatchProcessor::new(config, BatchConfig::new()).is_err());
}

// ============================================================================
// Cancellation and Progress
// ============================================================================

#[test]
fn test_cancelled_before_start() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    for name in ["1", "2", "3"] {
        create_episode(root.path(), name, 1);
    }

    let token = CancellationToken::new();
    token.cancel();
    let processor = BatchProcessor::new(config_for(out.path()), BatchConfig::new())
        .unwrap()
        .with_cancellation_token(token);
    let output = processor.process_root(root.path()).unwrap();

    assert!(output.was_cancelled);
    assert_eq!(output.skipped_count, 3);
    assert_eq!(output.successful_count(), 0);
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn test_progress_sees_every_episode() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    for name in ["1", "2", "3", "4"] {
        create_episode(root.path(), name, 1);
    }

    let progress = CountingProgress::default();
    let started = Arc::clone(&progress.started);
    let completed = Arc::clone(&progress.completed);

    let processor = BatchProcessor::new(config_for(out.path()), BatchConfig::new().with_threads(2))
        .unwrap()
        .with_progress_callback(Box::new(progress));
    processor.process_root(root.path()).unwrap();

    assert_eq!(started.load(Ordering::SeqCst), 4);
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}
