//! Quaternion to yaw/pitch/roll projection

use nalgebra::UnitQuaternion;

use crate::math::RAD_TO_DEG;

/// Aerospace Euler angles in degrees
///
/// Derived on demand from the filter quaternion, never stored by the filter.
/// Yaw and roll lie in (-180, 180], pitch in [-90, 90].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Orientation {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl Orientation {
    pub const fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Project a scalar-first quaternion onto yaw, pitch, roll
    ///
    /// ```text
    /// yaw   = atan2(2(q1q2 + q0q3), q0²+q1²-q2²-q3²)
    /// pitch = -asin(2(q1q3 - q0q2))
    /// roll  = atan2(2(q0q1 + q2q3), q0²-q1²-q2²+q3²)
    /// ```
    ///
    /// The `asin` argument is clamped to [-1, 1] so rounding drift near the
    /// gimbal-lock boundary yields ±90° instead of NaN.
    ///
    /// # Example
    /// ```
    /// use nalgebra::UnitQuaternion;
    /// use mpu9250_ahrs::Orientation;
    ///
    /// let level = Orientation::from_quaternion(&UnitQuaternion::identity());
    /// assert_eq!(level, Orientation::new(0.0, 0.0, 0.0));
    /// ```
    pub fn from_quaternion(quaternion: &UnitQuaternion<f64>) -> Self {
        let q = quaternion.as_ref();
        let (q0, q1, q2, q3) = (q.w, q.i, q.j, q.k);

        let yaw = libm::atan2(
            2.0 * (q1 * q2 + q0 * q3),
            q0 * q0 + q1 * q1 - q2 * q2 - q3 * q3,
        );
        let sin_pitch = (2.0 * (q1 * q3 - q0 * q2)).clamp(-1.0, 1.0);
        let pitch = -libm::asin(sin_pitch);
        let roll = libm::atan2(
            2.0 * (q0 * q1 + q2 * q3),
            q0 * q0 - q1 * q1 - q2 * q2 + q3 * q3,
        );

        Self {
            yaw: canonical_angle(yaw * RAD_TO_DEG),
            pitch: pitch * RAD_TO_DEG,
            roll: canonical_angle(roll * RAD_TO_DEG),
        }
    }
}

impl From<UnitQuaternion<f64>> for Orientation {
    fn from(quaternion: UnitQuaternion<f64>) -> Self {
        Self::from_quaternion(&quaternion)
    }
}

/// Map `atan2`'s closed [-180, 180] onto (-180, 180]
fn canonical_angle(degrees: f64) -> f64 {
    if degrees <= -180.0 { degrees + 360.0 } else { degrees }
}
