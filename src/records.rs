//! Tabular records and their readers/writers.
//!
//! Three tables flow through the pipeline:
//!
//! | Table | Delimiter | Produced by | Read by |
//! |-------|-----------|-------------|---------|
//! | telemetry log | tab | simulator recorder | [`read_telemetry`] |
//! | gaze log | comma | gaze tracker | [`read_gaze`] |
//! | merged table | comma | [`write_merged`] | [`read_merged_table`] |
//!
//! Readers never fail on a bad row: the row is dropped and a [`RowSkip`]
//! with its 0-based data-row index is returned alongside the good records.
//! A missing required column, on the other hand, fails the whole read.

use crate::action::Quaternion;
use crate::error::{DatasetError, Result};
use crate::timestamp::{normalize_epoch_ms, parse_canonical, parse_epoch_ms_field, CanonicalTimestamp};
use chrono::FixedOffset;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Column holding the canonical timestamp in normalized/merged tables.
pub const CANONICAL_TS_COLUMN: &str = "absolute_timestamp_iso";

/// Telemetry columns the pipeline needs.
pub const TELEMETRY_REQUIRED: [&str; 7] = ["TimeStamp", "POS_Z", "Q_W", "Q_X", "Q_Y", "Q_Z", "ImageFile"];

/// Gaze columns the pipeline needs.
pub const GAZE_REQUIRED: [&str; 3] = [CANONICAL_TS_COLUMN, "x", "y"];

/// Merged-table columns the assembler needs.
pub const MERGED_REQUIRED: [&str; 7] = ["ImageFile", "POS_Z", "Q_W", "Q_X", "Q_Y", "Q_Z", "x"];

// ============================================================================
// Row diagnostics
// ============================================================================

/// Why a row was excluded.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Unreadable timestamp or malformed field.
    ParseFailure(String),
    /// Referenced RGB or depth file is absent.
    MissingMedia { path: PathBuf },
    /// Referenced file exists but could not be decoded.
    DecodeFailure { path: PathBuf, message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ParseFailure(msg) => write!(f, "parse failure: {msg}"),
            SkipReason::MissingMedia { path } => write!(f, "media not found: {}", path.display()),
            SkipReason::DecodeFailure { path, message } => {
                write!(f, "cannot decode {}: {message}", path.display())
            }
        }
    }
}

/// A dropped row and the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSkip {
    /// 0-based data-row index in the source table
    pub row: usize,
    pub reason: SkipReason,
}

impl RowSkip {
    pub fn parse(row: usize, msg: impl Into<String>) -> Self {
        Self {
            row,
            reason: SkipReason::ParseFailure(msg.into()),
        }
    }

    pub fn is_missing_media(&self) -> bool {
        matches!(self.reason, SkipReason::MissingMedia { .. })
    }
}

impl fmt::Display for RowSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Row {}] {}", self.row, self.reason)
    }
}

// ============================================================================
// Records
// ============================================================================

/// One flight-log row.
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    /// 0-based data-row index in the telemetry log
    pub row: usize,
    /// Raw epoch milliseconds (UTC)
    pub timestamp_ms: i64,
    /// Canonical clock value
    pub timestamp: CanonicalTimestamp,
    /// POS_X, if the log has it
    pub pos_x: Option<f64>,
    /// POS_Y, if the log has it
    pub pos_y: Option<f64>,
    /// POS_Z
    pub altitude: f64,
    pub orientation: Quaternion,
    /// Raw `ImageFile` field (one or two names)
    pub image_file: String,
    /// Every original field, for pass-through into the merged table
    pub fields: StringRecord,
}

/// A parsed telemetry log.
#[derive(Debug, Clone)]
pub struct TelemetryLog {
    pub headers: StringRecord,
    pub records: Vec<TelemetryRecord>,
    pub dropped: Vec<RowSkip>,
}

/// One gaze tracker sample.
#[derive(Debug, Clone, PartialEq)]
pub struct GazeRecord {
    /// 0-based data-row index in the gaze log
    pub row: usize,
    pub timestamp: CanonicalTimestamp,
    /// Tracker-relative time in seconds, if present
    pub relative_s: Option<f64>,
    /// Screen x in source-viewport pixels
    pub x: f64,
    /// Screen y in source-viewport pixels
    pub y: f64,
    /// Tracker confidence label (e.g. `HIGH`, `MEDIUM`)
    pub confidence: String,
}

/// A parsed gaze log.
#[derive(Debug, Clone)]
pub struct GazeLog {
    pub records: Vec<GazeRecord>,
    pub dropped: Vec<RowSkip>,
}

/// Assembler input: everything one sample needs from the merged table.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    /// 0-based data-row index in the merged table
    pub row: usize,
    /// Raw `ImageFile` field
    pub image_file: String,
    /// POS_Z
    pub altitude: f64,
    pub orientation: Quaternion,
    /// Gaze x in source-viewport pixels
    pub gaze_x: f64,
    /// Gaze y in source-viewport pixels
    pub gaze_y: f64,
}

/// Parsed merged table.
#[derive(Debug, Clone)]
pub struct MergedTable {
    pub rows: Vec<SampleRow>,
    pub dropped: Vec<RowSkip>,
    /// Data rows in the file, good and bad
    pub total_rows: usize,
}

// ============================================================================
// Readers
// ============================================================================

fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn require_columns<const N: usize>(
    headers: &StringRecord,
    names: [&str; N],
    path: &Path,
) -> Result<[usize; N]> {
    let mut indices = [0usize; N];
    for (slot, name) in indices.iter_mut().zip(names) {
        *slot = column_index(headers, name).ok_or_else(|| DatasetError::MissingColumn {
            column: name.to_string(),
            path: path.to_path_buf(),
        })?;
    }
    Ok(indices)
}

fn parse_f64_at(record: &StringRecord, index: usize, name: &str) -> std::result::Result<f64, String> {
    let raw = record
        .get(index)
        .ok_or_else(|| format!("missing field {name}"))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid {name} '{raw}'"))
}

/// Read a tab-separated telemetry log and normalize its timestamps.
///
/// Rows with an unparseable `TimeStamp` or non-numeric pose are dropped.
pub fn read_telemetry<P: AsRef<Path>>(path: P, zone: &FixedOffset) -> Result<TelemetryLog> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let [ts_i, z_i, qw_i, qx_i, qy_i, qz_i, img_i] = require_columns(&headers, TELEMETRY_REQUIRED, path)?;
    let x_i = column_index(&headers, "POS_X");
    let y_i = column_index(&headers, "POS_Y");

    let mut records = Vec::new();
    let mut dropped = Vec::new();

    for (row, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                dropped.push(RowSkip::parse(row, e.to_string()));
                continue;
            }
        };

        let raw_ts = record.get(ts_i).unwrap_or("");
        let Some((timestamp_ms, timestamp)) = parse_epoch_ms_field(raw_ts)
            .and_then(|ms| normalize_epoch_ms(ms, zone).map(|ts| (ms, ts)))
        else {
            dropped.push(RowSkip::parse(row, format!("unparseable TimeStamp '{raw_ts}'")));
            continue;
        };

        let pose = (|| -> std::result::Result<(f64, Quaternion), String> {
            let altitude = parse_f64_at(&record, z_i, "POS_Z")?;
            let orientation = Quaternion::new(
                parse_f64_at(&record, qw_i, "Q_W")?,
                parse_f64_at(&record, qx_i, "Q_X")?,
                parse_f64_at(&record, qy_i, "Q_Y")?,
                parse_f64_at(&record, qz_i, "Q_Z")?,
            );
            Ok((altitude, orientation))
        })();

        let (altitude, orientation) = match pose {
            Ok(p) => p,
            Err(msg) => {
                dropped.push(RowSkip::parse(row, msg));
                continue;
            }
        };

        records.push(TelemetryRecord {
            row,
            timestamp_ms,
            timestamp,
            pos_x: x_i.and_then(|i| parse_f64_at(&record, i, "POS_X").ok()),
            pos_y: y_i.and_then(|i| parse_f64_at(&record, i, "POS_Y").ok()),
            altitude,
            orientation,
            image_file: record.get(img_i).unwrap_or("").to_string(),
            fields: record,
        });
    }

    Ok(TelemetryLog {
        headers,
        records,
        dropped,
    })
}

/// Read a comma-separated gaze log.
///
/// `relative_timestamp_s` and `confidence` are optional columns.
pub fn read_gaze<P: AsRef<Path>>(path: P, zone: &FixedOffset) -> Result<GazeLog> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let [ts_i, x_i, y_i] = require_columns(&headers, GAZE_REQUIRED, path)?;
    let rel_i = column_index(&headers, "relative_timestamp_s");
    let conf_i = column_index(&headers, "confidence");

    let mut records = Vec::new();
    let mut dropped = Vec::new();

    for (row, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                dropped.push(RowSkip::parse(row, e.to_string()));
                continue;
            }
        };

        let raw_ts = record.get(ts_i).unwrap_or("");
        let Some(timestamp) = parse_canonical(raw_ts, zone) else {
            dropped.push(RowSkip::parse(
                row,
                format!("unparseable {CANONICAL_TS_COLUMN} '{raw_ts}'"),
            ));
            continue;
        };

        let coords = parse_f64_at(&record, x_i, "x").and_then(|x| Ok((x, parse_f64_at(&record, y_i, "y")?)));
        let (x, y) = match coords {
            Ok(c) => c,
            Err(msg) => {
                dropped.push(RowSkip::parse(row, msg));
                continue;
            }
        };

        records.push(GazeRecord {
            row,
            timestamp,
            relative_s: rel_i.and_then(|i| parse_f64_at(&record, i, "relative_timestamp_s").ok()),
            x,
            y,
            confidence: conf_i
                .and_then(|i| record.get(i))
                .unwrap_or("")
                .to_string(),
        });
    }

    Ok(GazeLog { records, dropped })
}

#[derive(Debug, Deserialize)]
struct MergedRecord {
    #[serde(rename = "ImageFile")]
    image_file: String,
    #[serde(rename = "POS_Z")]
    pos_z: f64,
    #[serde(rename = "Q_W")]
    q_w: f64,
    #[serde(rename = "Q_X")]
    q_x: f64,
    #[serde(rename = "Q_Y")]
    q_y: f64,
    #[serde(rename = "Q_Z")]
    q_z: f64,
    x: f64,
    y: f64,
}

/// Read the merged telemetry + gaze table of one episode.
pub fn read_merged_table<P: AsRef<Path>>(path: P) -> Result<MergedTable> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    require_columns(&headers, MERGED_REQUIRED, path)?;
    require_columns(&headers, ["y"], path)?;

    let mut rows = Vec::new();
    let mut dropped = Vec::new();
    let mut total_rows = 0;

    for (row, result) in reader.deserialize::<MergedRecord>().enumerate() {
        total_rows += 1;
        match result {
            Ok(r) => rows.push(SampleRow {
                row,
                image_file: r.image_file,
                altitude: r.pos_z,
                orientation: Quaternion::new(r.q_w, r.q_x, r.q_y, r.q_z),
                gaze_x: r.x,
                gaze_y: r.y,
            }),
            Err(e) => dropped.push(RowSkip::parse(row, e.to_string())),
        }
    }

    Ok(MergedTable {
        rows,
        dropped,
        total_rows,
    })
}

// ============================================================================
// Writers
// ============================================================================

/// Header for a telemetry table carrying the canonical column.
///
/// Returns the header and the index of the canonical column, which is
/// appended unless the log already has one.
fn headers_with_canonical(headers: &StringRecord) -> (StringRecord, usize) {
    match column_index(headers, CANONICAL_TS_COLUMN) {
        Some(i) => (headers.clone(), i),
        None => {
            let mut out = headers.clone();
            out.push_field(CANONICAL_TS_COLUMN);
            (out, headers.len())
        }
    }
}

/// Original fields with the canonical timestamp set at `canonical_index`.
fn fields_with_canonical(record: &TelemetryRecord, width: usize, canonical_index: usize) -> StringRecord {
    let ts = record.timestamp.to_string();
    let mut out = StringRecord::with_capacity(width * 16, width + 3);
    for i in 0..width {
        if i == canonical_index {
            out.push_field(&ts);
        } else {
            out.push_field(record.fields.get(i).unwrap_or(""));
        }
    }
    out
}

/// Write a telemetry log back out (tab-separated) with its canonical column.
pub fn write_normalized_telemetry<P: AsRef<Path>>(path: P, log: &TelemetryLog) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    let (headers, canonical_index) = headers_with_canonical(&log.headers);
    writer.write_record(&headers)?;
    for record in &log.records {
        writer.write_record(&fields_with_canonical(record, headers.len(), canonical_index))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write merged rows: telemetry columns, canonical timestamp, then the
/// matched gaze `x`, `y`, `confidence`.
///
/// `pairs` holds each telemetry record with its matched gaze record, in
/// output order.
pub fn write_merged<'a, P, I>(path: P, telemetry_headers: &StringRecord, pairs: I) -> Result<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (&'a TelemetryRecord, &'a GazeRecord)>,
{
    let mut writer = WriterBuilder::new().from_path(path)?;
    let (mut headers, canonical_index) = headers_with_canonical(telemetry_headers);
    let width = headers.len();
    headers.push_field("x");
    headers.push_field("y");
    headers.push_field("confidence");
    writer.write_record(&headers)?;

    let mut written = 0;
    for (telemetry, gaze) in pairs {
        let mut out = fields_with_canonical(telemetry, width, canonical_index);
        out.push_field(&gaze.x.to_string());
        out.push_field(&gaze.y.to_string());
        out.push_field(&gaze.confidence);
        writer.write_record(&out)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}
