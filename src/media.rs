//! Media references.
//!
//! The telemetry `ImageFile` field names the frames captured with a row. Two
//! conventions exist in recorded data:
//!
//! ```text
//! "frame_001.png;frame_001_depth.png"  ──► Combined { rgb, depth }
//! "frame_001.png"                      ──► LegacySuffix { rgb }   (depth = frame_001_depth.png)
//! ```
//!
//! RGB names resolve under `<episode>/<images_dir>/` and depth names under
//! `<episode>/<depth_dir>/`.

use crate::config::LayoutConfig;
use std::path::{Path, PathBuf};

/// Parsed `ImageFile` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRef {
    /// Explicit RGB and depth names.
    Combined { rgb: String, depth: String },
    /// RGB name only; depth name derived from its stem.
    LegacySuffix { rgb: String },
}

impl MediaRef {
    /// Parse a raw field.
    ///
    /// Splits on `;`, trims each part and drops empty parts. Returns `None`
    /// if nothing is left. Parts beyond the second are ignored.
    pub fn parse(field: &str) -> Option<Self> {
        let mut parts = field.split(';').map(str::trim).filter(|p| !p.is_empty());
        let rgb = parts.next()?.to_string();
        Some(match parts.next() {
            Some(depth) => MediaRef::Combined {
                rgb,
                depth: depth.to_string(),
            },
            None => MediaRef::LegacySuffix { rgb },
        })
    }

    pub fn rgb_name(&self) -> &str {
        match self {
            MediaRef::Combined { rgb, .. } | MediaRef::LegacySuffix { rgb } => rgb,
        }
    }

    /// Depth file name, deriving it for the legacy form.
    pub fn depth_name(&self, legacy_suffix: &str) -> String {
        match self {
            MediaRef::Combined { depth, .. } => depth.clone(),
            MediaRef::LegacySuffix { rgb } => {
                let stem = Path::new(rgb).with_extension("");
                format!("{}{legacy_suffix}", stem.to_string_lossy())
            }
        }
    }

    /// Full paths inside `episode_dir`.
    pub fn resolve(&self, episode_dir: &Path, layout: &LayoutConfig) -> ResolvedMedia {
        ResolvedMedia {
            rgb: episode_dir.join(&layout.images_dir).join(self.rgb_name()),
            depth: episode_dir
                .join(&layout.depth_dir)
                .join(self.depth_name(&layout.legacy_depth_suffix)),
        }
    }
}

/// RGB and depth paths for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub rgb: PathBuf,
    pub depth: PathBuf,
}

impl ResolvedMedia {
    /// First path that does not exist (RGB checked first).
    pub fn first_missing(&self) -> Option<&Path> {
        [&self.rgb, &self.depth]
            .into_iter()
            .find(|p| !p.is_file())
            .map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_combined() {
        let m = MediaRef::parse("a.png;a_d.png").unwrap();
        assert_eq!(
            m,
            MediaRef::Combined {
                rgb: "a.png".into(),
                depth: "a_d.png".into()
            }
        );
    }

    #[test]
    fn test_parse_trims_and_drops_empty_parts() {
        let m = MediaRef::parse(" a.png ; ; b.png ").unwrap();
        assert_eq!(m.rgb_name(), "a.png");
        assert_eq!(m.depth_name("_depth.png"), "b.png");

        let m = MediaRef::parse("a.png;").unwrap();
        assert_eq!(m, MediaRef::LegacySuffix { rgb: "a.png".into() });

        assert!(MediaRef::parse("").is_none());
        assert!(MediaRef::parse(" ; ").is_none());
    }

    #[test]
    fn test_legacy_depth_name() {
        let m = MediaRef::parse("frame_0001.png").unwrap();
        assert_eq!(m.depth_name("_depth.png"), "frame_0001_depth.png");

        let m = MediaRef::parse("shot.v2.jpg").unwrap();
        assert_eq!(m.depth_name("_depth.png"), "shot.v2_depth.png");
    }

    #[test]
    fn test_resolve_and_first_missing() {
        let dir = TempDir::new().unwrap();
        let layout = LayoutConfig::default();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::create_dir_all(dir.path().join("depth")).unwrap();
        fs::write(dir.path().join("images/a.png"), b"x").unwrap();

        let resolved = MediaRef::parse("a.png").unwrap().resolve(dir.path(), &layout);
        assert_eq!(resolved.rgb, dir.path().join("images/a.png"));
        assert_eq!(resolved.depth, dir.path().join("depth/a_depth.png"));
        assert_eq!(resolved.first_missing(), Some(resolved.depth.as_path()));

        fs::write(dir.path().join("depth/a_depth.png"), b"x").unwrap();
        assert_eq!(resolved.first_missing(), None);
    }
}
