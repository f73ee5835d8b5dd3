//! Parallel batch processing for multi-episode recordings.
//!
//! Episodes are independent, so whole episode directories are distributed
//! over a Rayon work-stealing pool. Within an episode everything runs
//! sequentially on one worker; no mutable state is shared between workers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    BatchProcessor                                │
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │                   Rayon Thread Pool                          ││
//! │  │                                                              ││
//! │  │  Thread 1        Thread 2        Thread N                   ││
//! │  │  episode 1       episode 2       episode N                  ││
//! │  │     │               │               │                        ││
//! │  │     ▼               ▼               ▼                        ││
//! │  │  1.npz           2.npz           N.npz                      ││
//! │  │  EpisodeResult   EpisodeResult   EpisodeResult              ││
//! │  └──────────────────────┬───────────────────────────────────────┘│
//! │                         ▼                                        │
//! │                   BatchOutput                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - **Configurable parallelism**: local pool, thread count per processor
//! - **Error handling modes**: fail fast or collect errors and continue
//! - **Progress reporting**: optional callbacks for monitoring
//! - **Graceful cancellation**: stop starting new episodes from any thread
//!
//! # Example
//!
//! ```ignore
//! use gaze_dataset::batch::{BatchConfig, BatchProcessor, ConsoleProgress, ErrorMode};
//!
//! let batch_config = BatchConfig::new()
//!     .with_threads(4)
//!     .with_error_mode(ErrorMode::CollectErrors);
//!
//! let processor = BatchProcessor::new(pipeline_config, batch_config)
//!     .with_progress_callback(Box::new(ConsoleProgress::new()));
//!
//! let output = processor.process_root("recordings")?;
//! println!("{} archives, {} samples", output.written_count(), output.total_samples());
//! ```
//!
//! # Cancellation Support
//!
//! ```ignore
//! let token = CancellationToken::new();
//! let processor = BatchProcessor::new(config, batch_config)
//!     .with_cancellation_token(token.clone());
//!
//! let handle = thread::spawn(move || processor.process_episodes(&dirs));
//! token.cancel();
//!
//! let result = handle.join().unwrap()?;
//! if result.was_cancelled {
//!     println!("Skipped {} episodes", result.skipped_count);
//! }
//! ```

use crate::assembler::episode_name;
use crate::config::PipelineConfig;
use crate::error::{DatasetError, Result};
use crate::pipeline::{EpisodeOutcome, EpisodePipeline};
use crate::validation::{episode_sort_key, list_episode_dirs};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::error;

// ============================================================================
// Configuration
// ============================================================================

/// Error handling mode for batch processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Stop on the first failed episode (default).
    ///
    /// Episodes already running finish; no new ones are started.
    #[default]
    FailFast,

    /// Continue with the remaining episodes and collect all errors.
    CollectErrors,
}

// ============================================================================
// Cancellation Support
// ============================================================================

/// Token for cancelling batch processing.
///
/// Cloneable and shareable across threads. Workers check it before starting
/// each episode; an episode already in progress runs to completion, so no
/// archive is ever abandoned half-written.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Reset the token for reuse. Only call when no processing is active.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Configuration for batch processing.
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    /// Number of threads to use.
    ///
    /// - `None`: Rayon default (typically num_cpus)
    /// - `Some(n)`: exactly n threads
    ///
    /// Each worker holds one episode's decoded frames in memory, so on
    /// memory-constrained machines fewer threads can be preferable.
    pub num_threads: Option<usize>,

    /// How to handle errors during processing.
    pub error_mode: ErrorMode,

    /// Stack size per thread in bytes (advanced).
    pub stack_size: Option<usize>,
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of threads to use.
    ///
    /// # Panics
    ///
    /// Panics if threads is 0.
    pub fn with_threads(mut self, threads: usize) -> Self {
        assert!(threads > 0, "Thread count must be > 0");
        self.num_threads = Some(threads);
        self
    }

    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Set custom stack size per thread (advanced).
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Configured threads or Rayon's default.
    pub fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Result from processing a single episode.
#[derive(Debug, Clone)]
pub struct EpisodeResult {
    pub episode: String,
    pub episode_dir: PathBuf,
    pub outcome: EpisodeOutcome,
    pub elapsed: Duration,
    /// Worker that processed this episode (for debugging).
    pub thread_id: usize,
}

/// A failed episode.
#[derive(Debug, Clone)]
pub struct EpisodeError {
    pub episode: String,
    pub episode_dir: PathBuf,
    pub error: String,
}

/// Aggregated results from batch processing.
#[derive(Debug)]
pub struct BatchOutput {
    /// Episodes that completed (written or skipped as empty).
    pub results: Vec<EpisodeResult>,

    /// Failed episodes (only populated with `ErrorMode::CollectErrors`).
    pub errors: Vec<EpisodeError>,

    /// Total processing time (wall clock).
    pub elapsed: Duration,

    pub threads_used: usize,

    /// Whether processing was cancelled before completion.
    pub was_cancelled: bool,

    /// Episodes never started because of cancellation.
    pub skipped_count: usize,
}

impl BatchOutput {
    /// Episodes that completed without error.
    pub fn successful_count(&self) -> usize {
        self.results.len()
    }

    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    /// Episodes that produced an archive.
    pub fn written_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_written()).count()
    }

    /// Episodes with zero valid samples.
    pub fn empty_count(&self) -> usize {
        self.successful_count() - self.written_count()
    }

    pub fn total_samples(&self) -> usize {
        self.results.iter().map(|r| r.outcome.n_samples()).sum()
    }

    pub fn total_rows_skipped(&self) -> usize {
        self.results.iter().map(|r| r.outcome.rows_skipped()).sum()
    }

    /// Sum of per-episode times over wall clock time.
    pub fn speedup_factor(&self) -> f64 {
        let sequential_time: Duration = self.results.iter().map(|r| r.elapsed).sum();
        sequential_time.as_secs_f64() / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }

    pub fn all_successful(&self) -> bool {
        self.errors.is_empty()
    }

    /// Results in episode order (numeric folder names first).
    pub fn results_in_order(&self) -> Vec<&EpisodeResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by_cached_key(|r| episode_sort_key(&r.episode));
        sorted
    }

    pub fn iter(&self) -> impl Iterator<Item = &EpisodeResult> {
        self.results.iter()
    }

    pub fn iter_errors(&self) -> impl Iterator<Item = &EpisodeError> {
        self.errors.iter()
    }
}

// ============================================================================
// Progress Reporting
// ============================================================================

/// Progress information for callbacks.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub current_episode: String,
    /// Index of the current episode (0-based).
    pub current_index: usize,
    pub total_episodes: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl ProgressInfo {
    /// Completion percentage (0.0 to 100.0).
    pub fn percent_complete(&self) -> f64 {
        if self.total_episodes == 0 {
            100.0
        } else {
            (self.completed + self.failed) as f64 / self.total_episodes as f64 * 100.0
        }
    }

    /// Estimate remaining time based on current progress.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        let done = self.completed + self.failed;
        if done == 0 {
            return None;
        }
        let remaining = self.total_episodes.saturating_sub(done);
        let avg_time = self.elapsed.as_secs_f64() / done as f64;
        Some(Duration::from_secs_f64(avg_time * remaining as f64))
    }
}

/// Receives progress updates during batch processing.
pub trait ProgressCallback: Send + Sync {
    /// Called when an episode is about to start.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called once when the batch completes.
    fn on_complete(&self, output: &BatchOutput);
}

/// Simple console progress reporter.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    pub verbose: bool,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if self.verbose {
            let eta = info
                .estimated_remaining()
                .map(|d| format!(", ~{}s left", d.as_secs()))
                .unwrap_or_default();
            println!(
                "[{:3}/{:3}] Processing: {} ({:.1}% complete{eta})",
                info.completed + info.failed + 1,
                info.total_episodes,
                info.current_episode,
                info.percent_complete()
            );
        } else {
            print!(
                "\r[{:3}/{:3}] {:.1}%",
                info.completed + info.failed,
                info.total_episodes,
                info.percent_complete()
            );
            use std::io::Write;
            std::io::stdout().flush().ok();
        }
    }

    fn on_complete(&self, output: &BatchOutput) {
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!("Batch Processing Complete");
        println!("═══════════════════════════════════════════════════════════════");
        for result in output.results_in_order() {
            println!("  {}", result.outcome);
        }
        for err in output.iter_errors() {
            println!("  {}: FAILED: {}", err.episode, err.error);
        }
        println!("───────────────────────────────────────────────────────────────");
        println!("  Archives written: {}", output.written_count());
        println!("  Empty episodes:   {}", output.empty_count());
        println!("  Failed episodes:  {}", output.failed_count());
        println!("  Total samples:    {}", output.total_samples());
        println!("  Rows skipped:     {}", output.total_rows_skipped());
        if output.was_cancelled {
            println!("  Cancelled, {} episodes not started", output.skipped_count);
        }
        println!("  Total time:       {:?}", output.elapsed);
        println!("  Speedup:          {:.2}x", output.speedup_factor());
        println!("═══════════════════════════════════════════════════════════════");
    }
}

// ============================================================================
// Batch Processor
// ============================================================================

/// Parallel batch processor for episode directories.
///
/// One [`EpisodePipeline`] is shared read-only by every worker; each call to
/// `process_episode` owns all of its per-episode state.
pub struct BatchProcessor {
    pipeline: Arc<EpisodePipeline>,
    batch_config: BatchConfig,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
    cancellation_token: CancellationToken,
}

impl BatchProcessor {
    /// Create a new batch processor.
    ///
    /// Fails if the pipeline configuration does not validate.
    pub fn new(pipeline_config: PipelineConfig, batch_config: BatchConfig) -> Result<Self> {
        Ok(Self {
            pipeline: Arc::new(EpisodePipeline::from_config(pipeline_config)?),
            batch_config,
            progress_callback: None,
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn with_progress_callback(mut self, callback: Box<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(Arc::from(callback));
        self
    }

    /// Set a cancellation token for graceful shutdown.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch_config
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    /// Process every episode folder under `root`.
    pub fn process_root<P: AsRef<Path>>(&self, root: P) -> Result<BatchOutput> {
        let dirs = list_episode_dirs(root)?;
        self.process_episodes(&dirs)
    }

    /// Process episode directories in parallel.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOutput)` - results from all processed episodes
    /// * `Err(...)` - if error mode is FailFast and an episode fails
    pub fn process_episodes<P: AsRef<Path> + Sync>(&self, dirs: &[P]) -> Result<BatchOutput> {
        let start = Instant::now();
        let total_episodes = dirs.len();
        let threads_used = self.batch_config.effective_threads();
        let fail_fast = self.batch_config.error_mode == ErrorMode::FailFast;

        let completed = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        let aborted = AtomicBool::new(false);

        // EpisodeResult is boxed: it is much larger than the other variants
        enum ProcessResult {
            Success(Box<EpisodeResult>),
            Error(EpisodeError),
            Skipped,
        }

        // Local pool so different processors can use different thread counts
        let mut pool_builder = rayon::ThreadPoolBuilder::new().num_threads(threads_used);
        if let Some(stack_size) = self.batch_config.stack_size {
            pool_builder = pool_builder.stack_size(stack_size);
        }
        let pool = pool_builder
            .build()
            .map_err(|e| DatasetError::generic(format!("Failed to create thread pool: {e}")))?;

        let results: Vec<ProcessResult> = pool.install(|| {
            dirs.par_iter()
                .enumerate()
                .map(|(index, dir)| {
                    let dir = dir.as_ref();
                    let episode = episode_name(dir);

                    if self.cancellation_token.is_cancelled() || aborted.load(Ordering::Relaxed) {
                        return ProcessResult::Skipped;
                    }

                    if let Some(ref callback) = self.progress_callback {
                        callback.on_progress(&ProgressInfo {
                            current_episode: episode.clone(),
                            current_index: index,
                            total_episodes,
                            completed: completed.load(Ordering::Relaxed),
                            failed: failed.load(Ordering::Relaxed),
                            elapsed: start.elapsed(),
                        });
                    }

                    let episode_start = Instant::now();
                    match self.pipeline.process_episode(dir) {
                        Ok(outcome) => {
                            completed.fetch_add(1, Ordering::Relaxed);
                            ProcessResult::Success(Box::new(EpisodeResult {
                                episode,
                                episode_dir: dir.to_path_buf(),
                                outcome,
                                elapsed: episode_start.elapsed(),
                                thread_id: rayon::current_thread_index().unwrap_or(0),
                            }))
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            error!(episode = %episode, "episode failed: {e}");
                            if fail_fast {
                                aborted.store(true, Ordering::Relaxed);
                            }
                            ProcessResult::Error(EpisodeError {
                                episode,
                                episode_dir: dir.to_path_buf(),
                                error: e.to_string(),
                            })
                        }
                    }
                })
                .collect()
        });

        let mut successful = Vec::new();
        let mut errors = Vec::new();
        let mut skipped_count = 0usize;

        for result in results {
            match result {
                ProcessResult::Success(r) => successful.push(*r),
                ProcessResult::Error(e) => errors.push(e),
                ProcessResult::Skipped => skipped_count += 1,
            }
        }

        if fail_fast {
            if let Some(first) = errors.first() {
                return Err(DatasetError::generic(format!(
                    "Failed to process {}: {}",
                    first.episode_dir.display(),
                    first.error
                )));
            }
        }

        let output = BatchOutput {
            results: successful,
            errors,
            elapsed: start.elapsed(),
            threads_used,
            was_cancelled: self.cancellation_token.is_cancelled(),
            skipped_count,
        };

        if let Some(ref callback) = self.progress_callback {
            callback.on_complete(&output);
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_defaults() {
        let config = BatchConfig::new();
        assert!(config.num_threads.is_none());
        assert_eq!(config.error_mode, ErrorMode::FailFast);
        assert!(config.stack_size.is_none());
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new()
            .with_threads(8)
            .with_error_mode(ErrorMode::CollectErrors)
            .with_stack_size(4 << 20);

        assert_eq!(config.num_threads, Some(8));
        assert_eq!(config.effective_threads(), 8);
        assert_eq!(config.error_mode, ErrorMode::CollectErrors);
        assert_eq!(config.stack_size, Some(4 << 20));
    }

    #[test]
    #[should_panic(expected = "Thread count must be > 0")]
    fn test_batch_config_zero_threads() {
        BatchConfig::new().with_threads(0);
    }

    #[test]
    fn test_progress_info() {
        let info = ProgressInfo {
            current_episode: "3".to_string(),
            current_index: 0,
            total_episodes: 10,
            completed: 4,
            failed: 1,
            elapsed: Duration::from_secs(10),
        };

        assert_eq!(info.percent_complete(), 50.0);
        assert_eq!(info.estimated_remaining(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_empty_batch_output() {
        let output = BatchOutput {
            results: vec![],
            errors: vec![],
            elapsed: Duration::from_secs(1),
            threads_used: 2,
            was_cancelled: false,
            skipped_count: 0,
        };

        assert_eq!(output.successful_count(), 0);
        assert_eq!(output.written_count(), 0);
        assert_eq!(output.total_samples(), 0);
        assert!(output.all_successful());
    }

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn test_invalid_pipeline_config_rejected() {
        let config = PipelineConfig::default().with_image_size(0);
        assert!(BatchProcessor::new(config, BatchConfig::new()).is_err());
    }
}
