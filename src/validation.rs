//! Validation Module
//!
//! Advisory checks run before (or alongside) conversion. Nothing here
//! mutates data or blocks a conversion on its own.
//!
//! # Checks
//!
//! 1. **Correspondence**: images on disk vs. data rows in the merged table
//! 2. **Inventory**: RGB and depth file counts per episode, with totals
//! 3. **Timestamp Ordering**: monotonic timestamps, gap detection
//!
//! # Usage
//!
//! ```ignore
//! use gaze_dataset::validation::check_all;
//!
//! for report in check_all("recordings", &config.layout)? {
//!     println!("{report}"); // "12: MISMATCH: 50 images, 49 csv rows"
//! }
//! ```

use crate::config::LayoutConfig;
use crate::error::Result;
use crate::timestamp::CanonicalTimestamp;
use csv::ReaderBuilder;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Validation results
// ============================================================================

/// Validation result for a single check.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    /// Data is valid
    Valid,
    /// Data has minor issues (warnings)
    Warning(String),
    /// Data has serious issues (errors)
    Error(String),
}

impl ValidationLevel {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationLevel::Valid)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, ValidationLevel::Warning(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ValidationLevel::Error(_))
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationLevel::Valid => write!(f, "Valid"),
            ValidationLevel::Warning(msg) => write!(f, "Warning: {msg}"),
            ValidationLevel::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Aggregated validation result.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    results: Vec<(String, ValidationLevel)>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validation result.
    pub fn add(&mut self, check_name: &str, level: ValidationLevel) {
        self.results.push((check_name.to_string(), level));
    }

    /// True if no check produced a warning or error.
    pub fn is_valid(&self) -> bool {
        self.results.iter().all(|(_, level)| level.is_valid())
    }

    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_error())
    }

    pub fn has_warnings(&self) -> bool {
        self.results.iter().any(|(_, level)| level.is_warning())
    }

    /// `"<check>: <message>"` for every warning and error.
    pub fn issues(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|(_, level)| !level.is_valid())
            .map(|(name, level)| format!("{name}: {level}"))
            .collect()
    }

    pub fn check_count(&self) -> usize {
        self.results.len()
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|(_, l)| l.is_valid()).count()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let passed = self.passed_count();
        let total = self.check_count();
        writeln!(f, "Validation: {passed}/{total} checks passed")?;

        for (name, level) in &self.results {
            if !level.is_valid() {
                writeln!(f, "  - {name}: {level}")?;
            }
        }

        Ok(())
    }
}

/// Gaps longer than this between consecutive timestamps are reported.
pub const MAX_GAP_WARN_S: f64 = 60.0;

/// Validate timestamp ordering and report the largest gap.
pub fn validate_timestamps(timestamps: &[CanonicalTimestamp]) -> ValidationResult {
    let mut result = ValidationResult::new();

    if timestamps.is_empty() {
        result.add(
            "timestamps",
            ValidationLevel::Warning("No timestamps to validate".to_string()),
        );
        return result;
    }

    let mut monotonic = true;
    let mut max_gap_us = 0i64;

    for i in 1..timestamps.len() {
        let gap = timestamps[i].micros_since(&timestamps[i - 1]);
        if gap < 0 {
            monotonic = false;
            result.add(
                "timestamp_ordering",
                ValidationLevel::Error(format!(
                    "Non-monotonic timestamp at index {}: {} < {}",
                    i,
                    timestamps[i],
                    timestamps[i - 1]
                )),
            );
            break;
        }
        max_gap_us = max_gap_us.max(gap);
    }

    if monotonic {
        result.add("timestamp_ordering", ValidationLevel::Valid);
    }

    let max_gap_s = max_gap_us as f64 / 1e6;
    if max_gap_s > MAX_GAP_WARN_S {
        result.add(
            "timestamp_gaps",
            ValidationLevel::Warning(format!("Max timestamp gap: {max_gap_s:.2} seconds")),
        );
    } else {
        result.add("timestamp_gaps", ValidationLevel::Valid);
    }

    result
}

// ============================================================================
// Episode folders
// ============================================================================

/// Sort key: first run of digits in the name, numerically. Names without
/// digits sort after all numbered ones, by name.
pub fn episode_sort_key(name: &str) -> (u8, u64, String) {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u64>() {
        Ok(n) => (0, n, name.to_string()),
        Err(_) => (1, 0, name.to_string()),
    }
}

/// Immediate subdirectories of `root`, ordered by [`episode_sort_key`].
pub fn list_episode_dirs<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root.as_ref())? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort_by_cached_key(|p| {
        episode_sort_key(&p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default())
    });
    Ok(dirs)
}

fn folder_name(dir: &Path) -> String {
    crate::assembler::episode_name(dir)
}

fn count_files(dir: &Path, filter: impl Fn(&Path) -> bool) -> Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && filter(&entry.path()) {
            count += 1;
        }
    }
    Ok(count)
}

/// Data rows (header excluded) in a comma-separated table.
///
/// Counts raw byte records, so a row that is not valid UTF-8 still counts.
pub fn count_table_rows<P: AsRef<Path>>(path: P) -> Result<usize> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut rows = 0;
    for record in reader.byte_records() {
        record?;
        rows += 1;
    }
    Ok(rows)
}

// ============================================================================
// Correspondence
// ============================================================================

/// Outcome of comparing image count with table rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrespondenceStatus {
    Ok,
    Mismatch { images: usize, rows: usize },
    /// Images directory or merged table absent.
    Missing,
}

/// One line of the correspondence report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrespondenceReport {
    pub folder: String,
    pub status: CorrespondenceStatus,
}

impl CorrespondenceReport {
    pub fn is_ok(&self) -> bool {
        self.status == CorrespondenceStatus::Ok
    }
}

impl fmt::Display for CorrespondenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            CorrespondenceStatus::Ok => write!(f, "{}: OK", self.folder),
            CorrespondenceStatus::Mismatch { images, rows } => write!(
                f,
                "{}: MISMATCH: {images} images, {rows} csv rows",
                self.folder
            ),
            CorrespondenceStatus::Missing => {
                write!(f, "{}: images folder or CSV missing", self.folder)
            }
        }
    }
}

/// Compare the image count of one episode with its merged-table rows.
pub fn check_episode<P: AsRef<Path>>(dir: P, layout: &LayoutConfig) -> Result<CorrespondenceReport> {
    let dir = dir.as_ref();
    let folder = folder_name(dir);
    let images_dir = dir.join(&layout.images_dir);
    let table = dir.join(&layout.merged_table);

    if !images_dir.is_dir() || !table.is_file() {
        return Ok(CorrespondenceReport {
            folder,
            status: CorrespondenceStatus::Missing,
        });
    }

    let images = count_files(&images_dir, |p| layout.is_image_file(p))?;
    let rows = count_table_rows(&table)?;
    let status = if images == rows {
        CorrespondenceStatus::Ok
    } else {
        CorrespondenceStatus::Mismatch { images, rows }
    };

    Ok(CorrespondenceReport { folder, status })
}

/// Check every episode folder under `root`, in episode order.
pub fn check_all<P: AsRef<Path>>(root: P, layout: &LayoutConfig) -> Result<Vec<CorrespondenceReport>> {
    list_episode_dirs(root)?
        .iter()
        .map(|dir| check_episode(dir, layout))
        .collect()
}

// ============================================================================
// Inventory
// ============================================================================

/// File counts of one episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRow {
    pub folder: String,
    /// `None` if the directory is absent
    pub images: Option<usize>,
    /// `None` if the directory is absent
    pub depth: Option<usize>,
}

/// File counts across all episodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderInventory {
    pub rows: Vec<InventoryRow>,
}

impl FolderInventory {
    pub fn total_images(&self) -> usize {
        self.rows.iter().filter_map(|r| r.images).sum()
    }

    pub fn total_depth(&self) -> usize {
        self.rows.iter().filter_map(|r| r.depth).sum()
    }
}

impl fmt::Display for FolderInventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = |n: Option<usize>| n.map_or_else(|| "-".to_string(), |n| n.to_string());
        writeln!(f, "{:<16} {:>8} {:>8}", "folder", "images", "depth")?;
        for row in &self.rows {
            writeln!(f, "{:<16} {:>8} {:>8}", row.folder, cell(row.images), cell(row.depth))?;
        }
        writeln!(
            f,
            "{:<16} {:>8} {:>8}",
            "TOTAL",
            self.total_images(),
            self.total_depth()
        )
    }
}

/// Count files in the RGB and depth directories of every episode.
pub fn inventory<P: AsRef<Path>>(root: P, layout: &LayoutConfig) -> Result<FolderInventory> {
    let mut rows = Vec::new();
    for dir in list_episode_dirs(root)? {
        let count = |sub: &str| -> Result<Option<usize>> {
            let path = dir.join(sub);
            if path.is_dir() {
                Ok(Some(count_files(&path, |_| true)?))
            } else {
                Ok(None)
            }
        };
        rows.push(InventoryRow {
            folder: folder_name(&dir),
            images: count(&layout.images_dir)?,
            depth: count(&layout.depth_dir)?,
        });
    }
    Ok(FolderInventory { rows })
}
