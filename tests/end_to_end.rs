//! End-to-end tests: raw logs and frames on disk to a written archive.

mod common;

use common::{create_episode, write_frame_pair, write_merged_table, Row, MERGED_HEADER};
use gaze_dataset::prelude::*;
use std::fs;
use tempfile::TempDir;

fn config_for(out: &std::path::Path) -> PipelineConfig {
    PipelineConfig::default()
        .with_output_dir(out)
        .with_image_size(8)
}

// ============================================================================
// Convert
// ============================================================================

#[test]
fn test_missing_depth_row_is_dropped() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let episode = root.path().join("12");

    write_frame_pair(&episode, "a", true);
    write_frame_pair(&episode, "b", false);
    write_frame_pair(&episode, "c", true);
    write_merged_table(
        &episode,
        &[
            Row::new("a.png", -1.0, (320.0, 180.0)),
            Row::new("b.png", -2.0, (0.0, 0.0)),
            Row::new("c.png", -3.0, (640.0, 360.0)),
        ],
    );

    let pipeline = EpisodePipeline::from_config(config_for(out.path())).unwrap();
    let outcome = pipeline.process_episode(&episode).unwrap();
    assert!(outcome.is_written());
    assert_eq!(outcome.n_samples(), 2);
    assert_eq!(outcome.rows_skipped(), 1);

    let arrays = EpisodeArrays::read_npz(out.path().join("12.npz")).unwrap();
    assert_eq!(arrays.images.shape(), &[2, 8, 8, 3]);
    assert_eq!(arrays.depth.shape(), &[2, 8, 8, 1]);
    assert_eq!(arrays.action.shape(), &[2, 4, 1]);
    assert_eq!(arrays.gaze_coords.shape(), &[2, 2, 1]);

    // Throttle runs over surviving rows only: 0, then -3 - (-1)
    assert_eq!(arrays.action[[0, 2, 0]], 0.0);
    assert!((arrays.action[[1, 2, 0]] + 2.0).abs() < 1e-12);

    // Identity orientation: zero roll, pitch and yaw
    for i in 0..2 {
        for j in [0, 1, 3] {
            assert!(arrays.action[[i, j, 0]].abs() < 1e-12);
        }
    }

    assert_eq!(arrays.gaze_coords[[0, 0, 0]], 0.5);
    assert_eq!(arrays.gaze_coords[[0, 1, 0]], 0.5);
    assert_eq!(arrays.gaze_coords[[1, 0, 0]], 1.0);
    assert_eq!(arrays.gaze_coords[[1, 1, 0]], 1.0);

    assert!(arrays.images.iter().all(|v| (0.0..=1.0).contains(v)));
    assert!(arrays.depth.iter().all(|v| (v - 200.0 / 255.0).abs() < 1e-4));
}

#[test]
fn test_non_utf8_row_is_skipped_not_fatal() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let episode = root.path().join("14");
    for stem in ["a", "b", "c"] {
        write_frame_pair(&episode, stem, true);
    }

    let mut table = format!("{MERGED_HEADER}\n").into_bytes();
    table.extend_from_slice(b"SimpleFlight,1,0,0,-1,1,0,0,0,a.png,t,320,180,HIGH\n");
    table.extend_from_slice(b"SimpleFlight,2,0,0,-2,1,0,0,0,b\xff.png,t,320,180,HIGH\n");
    table.extend_from_slice(b"SimpleFlight,3,0,0,-3,1,0,0,0,c.png,t,320,180,HIGH\n");
    fs::write(episode.join("airsim_with_gaze_closest.csv"), table).unwrap();

    let pipeline = EpisodePipeline::from_config(config_for(out.path())).unwrap();
    let outcome = pipeline.process_episode(&episode).unwrap();

    assert!(outcome.is_written());
    assert_eq!(outcome.n_samples(), 2);
    assert_eq!(outcome.rows_skipped(), 1);
    assert!(out.path().join("14.npz").exists());
}

#[test]
fn test_convert_all_rows_skipped_leaves_no_archive() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let episode = root.path().join("3");
    write_merged_table(&episode, &[Row::new("nowhere.png", -1.0, (1.0, 1.0))]);

    let pipeline = EpisodePipeline::from_config(config_for(out.path())).unwrap();
    let outcome = pipeline.process_episode(&episode).unwrap();

    assert!(!outcome.is_written());
    assert!(!out.path().join("3.npz").exists());
}

#[test]
fn test_inspect_reports_archive_shapes() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let episode = create_episode(root.path(), "4", 3);

    let pipeline = EpisodePipeline::from_config(config_for(out.path())).unwrap();
    pipeline.process_episode(&episode).unwrap();

    let summary = inspect_archive(out.path().join("4.npz")).unwrap();
    assert_eq!(summary.shape_of("images"), Some(&[3usize, 8, 8, 3][..]));
    assert_eq!(summary.shape_of("depth"), Some(&[3usize, 8, 8, 1][..]));
    assert_eq!(summary.shape_of("action"), Some(&[3usize, 4, 1][..]));
    assert_eq!(summary.shape_of("gaze_coords"), Some(&[3usize, 2, 1][..]));
    assert!(summary.to_string().contains("gaze_coords"));
}

// ============================================================================
// Merge then convert
// ============================================================================

const TELEMETRY: &str = "VehicleName\tTimeStamp\tPOS_X\tPOS_Y\tPOS_Z\tQ_W\tQ_X\tQ_Y\tQ_Z\tImageFile
SimpleFlight\t1714030200000\t0\t0\t-1.0\t1\t0\t0\t0\tf0.png
SimpleFlight\t1714030200010\t0\t0\t-1.5\t1\t0\t0\t0\tf1.png
SimpleFlight\t1714030200020\t0\t0\t-1.25\t1\t0\t0\t0\tf2.png
";

// 13:00:00.004 and 13:00:00.016 IST, i.e. 4 ms and 16 ms after the first row
const GAZE: &str = "absolute_timestamp_iso,relative_timestamp_s,x,y,confidence
2024-04-25T13:00:00.004000,0.004,64,36,HIGH
2024-04-25T13:00:00.016000,0.016,576,324,MEDIUM
";

#[test]
fn test_merge_then_convert() {
    let root = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let episode = root.path().join("21");
    fs::create_dir_all(&episode).unwrap();
    for stem in ["f0", "f1", "f2"] {
        write_frame_pair(&episode, stem, true);
    }
    let telemetry = episode.join("airsim_rec.txt");
    let gaze = episode.join("gaze_log.csv");
    fs::write(&telemetry, TELEMETRY).unwrap();
    fs::write(&gaze, GAZE).unwrap();

    let config = config_for(out.path());
    let summary = merge_logs(
        &telemetry,
        &gaze,
        episode.join("airsim_with_gaze_closest.csv"),
        &config,
    )
    .unwrap();
    assert_eq!(summary.rows_written, 3);
    assert_eq!(summary.report.distinct_gaze, 2);

    let reports = check_all(root.path(), &config.layout).unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_ok(), "{}", reports[0]);

    let pipeline = EpisodePipeline::from_config(config).unwrap();
    let outcome = pipeline.process_episode(&episode).unwrap();
    assert_eq!(outcome.n_samples(), 3);

    let arrays = EpisodeArrays::read_npz(out.path().join("21.npz")).unwrap();
    // Rows at 0 and 10 ms take the 4 ms gaze (10 is a tie, earlier wins),
    // the row at 20 ms takes the 16 ms gaze
    let gaze_x: Vec<f64> = (0..3).map(|i| arrays.gaze_coords[[i, 0, 0]]).collect();
    assert_eq!(gaze_x, vec![0.1, 0.1, 0.9]);

    let throttle: Vec<f64> = (0..3).map(|i| arrays.action[[i, 2, 0]]).collect();
    assert_eq!(throttle, vec![0.0, -0.5, 0.25]);
}
