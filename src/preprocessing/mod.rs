//! Sample preprocessing.
//!
//! Turns raw frames and gaze coordinates into model-ready values:
//!
//! - **Frames**: decode RGB and depth, scale to [0, 1] by bit depth
//! - **Resize**: area resampling to a square resolution (default 224)
//! - **Gaze**: divide screen pixels by the source viewport (default 640×360)
//!
//! # Example
//!
//! ```ignore
//! use gaze_dataset::preprocessing::{load_depth, load_rgb, ViewportNormalizer};
//!
//! let rgb = load_rgb(Path::new("ep/images/f.png"), 224)?;     // [224, 224, 3]
//! let depth = load_depth(Path::new("ep/depth/f.png"), 224)?;  // [224, 224, 1]
//! let gaze = ViewportNormalizer::default().normalize(320.0, 180.0); // [0.5, 0.5]
//! ```

pub mod frames;
pub mod gaze;
pub mod resize;

pub use frames::{depth_tensor, load_depth, load_rgb, rgb_tensor};
pub use gaze::ViewportNormalizer;
pub use resize::area_resize;
