//! Mathematical utilities and nalgebra extensions

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// Mathematical constants
pub const DEG_TO_RAD: f64 = core::f64::consts::PI / 180.0;
pub const RAD_TO_DEG: f64 = 180.0 / core::f64::consts::PI;

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Normalize the vector, returning `None` if magnitude is zero or not finite
    fn checked_normalize(&self) -> Option<Vector3<f64>>;

    /// Convert degrees to radians
    fn deg_to_rad(&self) -> Vector3<f64>;

    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f64>;
}

impl Vector3Ext for Vector3<f64> {
    fn checked_normalize(&self) -> Option<Vector3<f64>> {
        let norm_squared = self.norm_squared();
        if norm_squared > 0.0 && norm_squared.is_finite() {
            Some(*self / libm::sqrt(norm_squared))
        } else {
            None
        }
    }

    fn deg_to_rad(&self) -> Vector3<f64> {
        *self * DEG_TO_RAD
    }

    fn rad_to_deg(&self) -> Vector3<f64> {
        *self * RAD_TO_DEG
    }
}

/// Extension trait for UnitQuaternion operations
pub trait QuaternionExt {
    /// Scalar-first components `[q0, q1, q2, q3]`
    fn to_array(&self) -> [f64; 4];

    /// Build from scalar-first components, normalizing them
    fn from_array(q: [f64; 4]) -> UnitQuaternion<f64>;

    /// Build the rotation described by aerospace yaw, pitch, roll in degrees
    fn from_yaw_pitch_roll(yaw: f64, pitch: f64, roll: f64) -> UnitQuaternion<f64>;
}

impl QuaternionExt for UnitQuaternion<f64> {
    fn to_array(&self) -> [f64; 4] {
        let q = self.as_ref();
        [q.w, q.i, q.j, q.k]
    }

    fn from_array(q: [f64; 4]) -> UnitQuaternion<f64> {
        UnitQuaternion::from_quaternion(Quaternion::new(q[0], q[1], q[2], q[3]))
    }

    fn from_yaw_pitch_roll(yaw: f64, pitch: f64, roll: f64) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(roll * DEG_TO_RAD, pitch * DEG_TO_RAD, yaw * DEG_TO_RAD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_vector_extensions() {
        let v = Vector3::new(3.0, 4.0, 0.0);
        let normalized = v.checked_normalize().unwrap();
        assert_abs_diff_eq!(normalized.norm(), 1.0, epsilon = 1e-12);

        assert!(Vector3::<f64>::zeros().checked_normalize().is_none());
        assert!(Vector3::new(f64::NAN, 0.0, 1.0).checked_normalize().is_none());
    }

    #[test]
    fn test_quaternion_array_layout() {
        let q = UnitQuaternion::<f64>::identity();
        assert_eq!(q.to_array(), [1.0, 0.0, 0.0, 0.0]);

        let q = UnitQuaternion::from_array([2.0, 0.0, 0.0, 0.0]);
        assert_abs_diff_eq!(q.to_array()[0], 1.0, epsilon = 1e-12);
    }
}
