//! Shared fixtures: synthetic episode folders on disk.

#![allow(dead_code)]

use image::{GrayImage, Luma, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

pub const MERGED_HEADER: &str =
    "VehicleName,TimeStamp,POS_X,POS_Y,POS_Z,Q_W,Q_X,Q_Y,Q_Z,ImageFile,absolute_timestamp_iso,x,y,confidence";

/// One merged-table row.
pub struct Row {
    pub image_file: String,
    pub altitude: f64,
    pub gaze: (f64, f64),
}

impl Row {
    pub fn new(image_file: &str, altitude: f64, gaze: (f64, f64)) -> Self {
        Self {
            image_file: image_file.to_string(),
            altitude,
            gaze,
        }
    }
}

/// Write a `frame.png` RGB image and `frame_depth.png` grayscale image.
pub fn write_frame_pair(episode: &Path, stem: &str, depth: bool) {
    fs::create_dir_all(episode.join("images")).unwrap();
    fs::create_dir_all(episode.join("depth")).unwrap();
    RgbImage::from_fn(16, 9, |x, y| Rgb([(x * 10) as u8, (y * 20) as u8, 128]))
        .save(episode.join("images").join(format!("{stem}.png")))
        .unwrap();
    if depth {
        GrayImage::from_pixel(16, 9, Luma([200]))
            .save(episode.join("depth").join(format!("{stem}_depth.png")))
            .unwrap();
    }
}

/// Write the merged table for an episode.
pub fn write_merged_table(episode: &Path, rows: &[Row]) -> PathBuf {
    fs::create_dir_all(episode).unwrap();
    let mut text = String::from(MERGED_HEADER);
    text.push('\n');
    for (i, row) in rows.iter().enumerate() {
        text.push_str(&format!(
            "SimpleFlight,{},0,0,{},1,0,0,0,{},2024-04-25T13:00:00.{:06},{},{},HIGH\n",
            1_714_030_200_000i64 + i as i64 * 33,
            row.altitude,
            row.image_file,
            i * 33_000,
            row.gaze.0,
            row.gaze.1
        ));
    }
    let path = episode.join("airsim_with_gaze_closest.csv");
    fs::write(&path, text).unwrap();
    path
}

/// A complete episode with `n` frames, all media present.
pub fn create_episode(root: &Path, name: &str, n: usize) -> PathBuf {
    let episode = root.join(name);
    let rows: Vec<Row> = (0..n)
        .map(|i| {
            let stem = format!("img_{i}");
            write_frame_pair(&episode, &stem, true);
            Row::new(&format!("{stem}.png"), -(i as f64), (320.0, 180.0))
        })
        .collect();
    write_merged_table(&episode, &rows);
    episode
}
