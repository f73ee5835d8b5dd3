//! Action encoding.
//!
//! Supervision targets are derived from pose, not recorded commands:
//! roll/pitch/yaw come from the orientation quaternion, and throttle is the
//! change in altitude since the previous emitted sample.
//!
//! Throttle is the only stateful part. Its state lives in a
//! [`ThrottleAccumulator`] owned by one [`ActionEncoder`], and a fresh encoder
//! is created for every episode, so no altitude ever carries over between
//! episodes (even when episodes run concurrently).

use serde::{Deserialize, Serialize};

/// Orientation quaternion in (w, x, y, z) order.
///
/// Unit norm is expected but not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }
}

/// Roll, pitch and yaw in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Convert a quaternion to (roll, pitch, yaw).
///
/// ```text
/// roll  = atan2(2(wx + yz), 1 - 2(x² + y²))
/// pitch = asin(clamp(2(wy - zx), -1, 1))
/// yaw   = atan2(2(wz + xy), 1 - 2(y² + z²))
/// ```
///
/// The arcsine argument is clamped: at gimbal lock, rounding can push it a
/// hair past ±1, which would otherwise yield NaN.
pub fn quaternion_to_euler(q: &Quaternion) -> EulerAngles {
    let ysqr = q.y * q.y;

    let t0 = 2.0 * (q.w * q.x + q.y * q.z);
    let t1 = 1.0 - 2.0 * (q.x * q.x + ysqr);
    let roll = t0.atan2(t1);

    let t2 = (2.0 * (q.w * q.y - q.z * q.x)).clamp(-1.0, 1.0);
    let pitch = t2.asin();

    let t3 = 2.0 * (q.w * q.z + q.x * q.y);
    let t4 = 1.0 - 2.0 * (ysqr + q.z * q.z);
    let yaw = t3.atan2(t4);

    EulerAngles { roll, pitch, yaw }
}

/// Four-dimensional control target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionVector {
    /// Radians
    pub roll: f64,
    /// Radians
    pub pitch: f64,
    /// Altitude delta, same unit as position
    pub throttle: f64,
    /// Radians
    pub yaw: f64,
}

impl ActionVector {
    /// Components in export order: roll, pitch, throttle, yaw.
    #[inline]
    pub fn as_array(&self) -> [f64; 4] {
        [self.roll, self.pitch, self.throttle, self.yaw]
    }
}

/// Per-episode altitude memory for throttle.
#[derive(Debug, Clone, Default)]
pub struct ThrottleAccumulator {
    previous_altitude: Option<f64>,
}

impl ThrottleAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Throttle for the next altitude reading: 0 for the first reading,
    /// otherwise `altitude - previous`.
    pub fn next(&mut self, altitude: f64) -> f64 {
        let throttle = match self.previous_altitude {
            Some(previous) => altitude - previous,
            None => 0.0,
        };
        self.previous_altitude = Some(altitude);
        throttle
    }

    /// Forget the previous altitude.
    pub fn reset(&mut self) {
        self.previous_altitude = None;
    }

    /// Whether any reading has been seen since the last reset.
    pub fn is_primed(&self) -> bool {
        self.previous_altitude.is_some()
    }
}

/// Turns (orientation, altitude) readings into [`ActionVector`]s.
///
/// Feed readings in episode order; create one encoder per episode.
#[derive(Debug, Clone, Default)]
pub struct ActionEncoder {
    throttle: ThrottleAccumulator,
}

impl ActionEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode the next reading of the episode.
    pub fn encode(&mut self, orientation: &Quaternion, altitude: f64) -> ActionVector {
        let euler = quaternion_to_euler(orientation);
        ActionVector {
            roll: euler.roll,
            pitch: euler.pitch,
            throttle: self.throttle.next(altitude),
            yaw: euler.yaw,
        }
    }

    /// Start a new episode.
    pub fn reset(&mut self) {
        self.throttle.reset();
    }
}
