//! Stream alignment - nearest-timestamp join of telemetry and gaze.
//!
//! For every telemetry (reference) record the aligner picks the single gaze
//! (auxiliary) record closest in time. There is no distance cutoff: a match
//! is always produced when the gaze stream is non-empty, and the output has
//! exactly one row per telemetry record.
//!
//! # Algorithm
//!
//! Both streams are sorted ascending, so the best auxiliary index never moves
//! backwards as the reference advances. One cursor walks the auxiliary slice
//! once, giving O(|R| + |A|):
//!
//! ```text
//! A:   4 ─────────── 16
//! R:  0 ───── 10 ───── 20
//!     │       │        │
//!     4       4 (tie)  16
//! ```
//!
//! # Tie-breaking
//!
//! Equidistant candidates resolve to the earlier auxiliary record. Among
//! duplicate auxiliary timestamps the first occurrence wins. The result is a
//! pure function of the (sorted) inputs.
//!
//! # Data-quality note
//!
//! Because nothing is rejected, a gaze sample recorded seconds away from a
//! telemetry row can still become its match (e.g. tracker dropouts). The
//! [`AlignmentReport`] counts matches beyond a configurable distance so such
//! episodes can be spotted, but it never filters.

use crate::config::PipelineConfig;
use crate::error::{DatasetError, Result};
use crate::records::{
    read_gaze, read_telemetry, write_merged, write_normalized_telemetry, GazeRecord,
    TelemetryRecord,
};
use crate::timestamp::CanonicalTimestamp;
use crate::validation::validate_timestamps;
use std::path::Path;
use tracing::{info, warn};

/// Anything carrying a canonical timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> CanonicalTimestamp;
}

impl Timestamped for CanonicalTimestamp {
    #[inline]
    fn timestamp(&self) -> CanonicalTimestamp {
        *self
    }
}

impl Timestamped for TelemetryRecord {
    #[inline]
    fn timestamp(&self) -> CanonicalTimestamp {
        self.timestamp
    }
}

impl Timestamped for GazeRecord {
    #[inline]
    fn timestamp(&self) -> CanonicalTimestamp {
        self.timestamp
    }
}

/// Fail with [`DatasetError::Unsorted`] unless `items` is ascending.
pub fn check_sorted<T: Timestamped>(items: &[T], stream: &'static str) -> Result<()> {
    match items
        .windows(2)
        .position(|w| w[0].timestamp() > w[1].timestamp())
    {
        Some(i) => Err(DatasetError::Unsorted {
            stream,
            index: i + 1,
        }),
        None => Ok(()),
    }
}

/// For each reference item, the index of the nearest auxiliary item.
///
/// # Errors
///
/// - [`DatasetError::EmptyStream`] if either slice is empty
/// - [`DatasetError::Unsorted`] if either slice is not ascending
pub fn nearest_indices<R: Timestamped, A: Timestamped>(
    reference: &[R],
    auxiliary: &[A],
) -> Result<Vec<usize>> {
    if reference.is_empty() {
        return Err(DatasetError::EmptyStream { stream: "reference" });
    }
    if auxiliary.is_empty() {
        return Err(DatasetError::EmptyStream { stream: "auxiliary" });
    }
    check_sorted(reference, "reference")?;
    check_sorted(auxiliary, "auxiliary")?;

    let n = auxiliary.len();
    // First auxiliary index with timestamp >= current reference
    let mut upper = 0usize;
    // First index of the run of equal timestamps just below the reference
    let mut below_start: Option<usize> = None;

    let mut matches = Vec::with_capacity(reference.len());
    for r in reference {
        let t = r.timestamp();
        while upper < n && auxiliary[upper].timestamp() < t {
            if upper == 0 || auxiliary[upper].timestamp() != auxiliary[upper - 1].timestamp() {
                below_start = Some(upper);
            }
            upper += 1;
        }

        let index = match below_start {
            // nothing earlier than t; upper == 0 < n
            None => upper,
            Some(below) if upper == n => below,
            Some(below) => {
                let before = t.micros_since(&auxiliary[below].timestamp());
                let after = auxiliary[upper].timestamp().micros_since(&t);
                if before <= after {
                    below
                } else {
                    upper
                }
            }
        };
        matches.push(index);
    }

    Ok(matches)
}

/// A telemetry record paired with its nearest gaze record.
#[derive(Debug, Clone)]
pub struct AlignedRow {
    pub telemetry: TelemetryRecord,
    pub gaze: GazeRecord,
    /// `gaze - telemetry` in microseconds
    pub offset_us: i64,
}

/// Join telemetry with gaze by nearest timestamp.
///
/// Both inputs are sorted stably by timestamp first, so records sharing a
/// timestamp keep their file order. The output is in telemetry time order
/// and has one row per telemetry record.
pub fn align(
    mut telemetry: Vec<TelemetryRecord>,
    mut gaze: Vec<GazeRecord>,
) -> Result<Vec<AlignedRow>> {
    if telemetry.is_empty() {
        return Err(DatasetError::EmptyStream { stream: "telemetry" });
    }
    if gaze.is_empty() {
        return Err(DatasetError::EmptyStream { stream: "gaze" });
    }

    telemetry.sort_by_key(|r| r.timestamp);
    gaze.sort_by_key(|g| g.timestamp);

    let indices = nearest_indices(&telemetry, &gaze)?;

    Ok(telemetry
        .into_iter()
        .zip(indices)
        .map(|(t, i)| {
            let g = gaze[i].clone();
            let offset_us = g.timestamp.micros_since(&t.timestamp);
            AlignedRow {
                telemetry: t,
                gaze: g,
                offset_us,
            }
        })
        .collect())
}

/// Match-distance statistics for one alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentReport {
    /// Rows produced (= telemetry records)
    pub matched: usize,
    /// Distinct gaze records used
    pub distinct_gaze: usize,
    /// Largest |offset| in microseconds
    pub max_distance_us: u64,
    /// Mean |offset| in microseconds
    pub mean_distance_us: f64,
    /// Threshold used for `beyond_threshold`, in microseconds
    pub threshold_us: u64,
    /// Matches farther apart than the threshold
    pub beyond_threshold: usize,
}

impl AlignmentReport {
    pub fn from_rows(rows: &[AlignedRow], threshold_ms: u64) -> Self {
        let threshold_us = threshold_ms.saturating_mul(1_000);
        let distances: Vec<u64> = rows.iter().map(|r| r.offset_us.unsigned_abs()).collect();
        let mut used: Vec<usize> = rows.iter().map(|r| r.gaze.row).collect();
        used.sort_unstable();
        used.dedup();

        let mean_distance_us = if distances.is_empty() {
            0.0
        } else {
            distances.iter().map(|&d| d as f64).sum::<f64>() / distances.len() as f64
        };

        Self {
            matched: rows.len(),
            distinct_gaze: used.len(),
            max_distance_us: distances.iter().copied().max().unwrap_or(0),
            mean_distance_us,
            threshold_us,
            beyond_threshold: distances.iter().filter(|&&d| d > threshold_us).count(),
        }
    }
}

/// Outcome of [`merge_logs`].
#[derive(Debug, Clone)]
pub struct MergeSummary {
    pub telemetry_rows: usize,
    pub telemetry_dropped: usize,
    pub gaze_rows: usize,
    pub gaze_dropped: usize,
    pub rows_written: usize,
    pub report: AlignmentReport,
}

/// Normalize a telemetry log and write it back with the canonical column.
///
/// Returns `(rows_written, rows_dropped)`.
pub fn normalize_telemetry_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    config: &PipelineConfig,
) -> Result<(usize, usize)> {
    let zone = config.clock.zone()?;
    let log = read_telemetry(input.as_ref(), &zone)?;
    for skip in &log.dropped {
        warn!(
            stream = "telemetry",
            path = %input.as_ref().display(),
            row = skip.row,
            "dropping row: {}",
            skip.reason
        );
    }
    write_normalized_telemetry(output.as_ref(), &log)?;
    info!(
        written = log.records.len(),
        dropped = log.dropped.len(),
        path = %output.as_ref().display(),
        "normalized telemetry"
    );
    Ok((log.records.len(), log.dropped.len()))
}

/// Full merge stage: read both logs, normalize, align, write the merged table.
///
/// # Errors
///
/// [`DatasetError::EmptyStream`] if either log has no usable rows; nothing is
/// written in that case.
pub fn merge_logs<P1, P2, P3>(
    telemetry_path: P1,
    gaze_path: P2,
    output_path: P3,
    config: &PipelineConfig,
) -> Result<MergeSummary>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
    P3: AsRef<Path>,
{
    let zone = config.clock.zone()?;
    let telemetry = read_telemetry(telemetry_path.as_ref(), &zone)?;
    let gaze = read_gaze(gaze_path.as_ref(), &zone)?;

    for skip in &telemetry.dropped {
        warn!(
            stream = "telemetry",
            path = %telemetry_path.as_ref().display(),
            row = skip.row,
            "dropping row: {}",
            skip.reason
        );
    }
    for skip in &gaze.dropped {
        warn!(
            stream = "gaze",
            path = %gaze_path.as_ref().display(),
            row = skip.row,
            "dropping row: {}",
            skip.reason
        );
    }

    // Logs are sorted before the join; report recorder-side disorder first
    let order = validate_timestamps(
        &telemetry
            .records
            .iter()
            .map(|r| r.timestamp)
            .collect::<Vec<_>>(),
    );
    for issue in order.issues() {
        warn!(stream = "telemetry", path = %telemetry_path.as_ref().display(), "{issue}");
    }

    let telemetry_rows = telemetry.records.len();
    let gaze_rows = gaze.records.len();
    let headers = telemetry.headers;

    let aligned = align(telemetry.records, gaze.records)?;
    let report = AlignmentReport::from_rows(&aligned, config.clock.match_distance_warn_ms);

    if report.beyond_threshold > 0 {
        warn!(
            beyond = report.beyond_threshold,
            threshold_ms = config.clock.match_distance_warn_ms,
            max_distance_ms = report.max_distance_us as f64 / 1_000.0,
            "nearest gaze matches exceed the distance threshold (kept, no cutoff is applied)"
        );
    }

    let rows_written = write_merged(
        output_path.as_ref(),
        &headers,
        aligned.iter().map(|r| (&r.telemetry, &r.gaze)),
    )?;

    info!(
        rows = rows_written,
        distinct_gaze = report.distinct_gaze,
        mean_distance_ms = report.mean_distance_us / 1_000.0,
        path = %output_path.as_ref().display(),
        "merged telemetry with gaze"
    );

    Ok(MergeSummary {
        telemetry_rows,
        telemetry_dropped: telemetry.dropped.len(),
        gaze_rows,
        gaze_dropped: gaze.dropped.len(),
        rows_written,
        report,
    })
}
