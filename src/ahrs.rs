//! Attitude filter: Mahony and Madgwick correction laws over a shared
//! quaternion integration step

use log::{debug, trace, warn};
use nalgebra::{Matrix3x4, Quaternion, UnitQuaternion, Vector3, Vector4};

use crate::math::Vector3Ext;
use crate::orientation::Orientation;
use crate::types::{AhrsFlags, AhrsSettings, Algorithm};

/// Seconds per microsecond
const MICROS_TO_SECONDS: f64 = 1e-6;

/// Main AHRS algorithm structure
///
/// Owns the attitude quaternion (scalar-first, body to earth), the Mahony
/// integral feedback term and the timestamp of the previous update. The
/// quaternion starts at identity and is renormalized after every update.
///
/// One instance tracks one sensor. It is not synchronized; callers sharing it
/// across threads must serialize access.
#[derive(Debug, Clone)]
pub struct Ahrs {
    /// Algorithm settings
    settings: AhrsSettings,
    /// Current orientation quaternion
    quaternion: UnitQuaternion<f64>,
    /// Accumulated Mahony error integral
    integral_error: Vector3<f64>,
    /// Timestamp of the previous [`Ahrs::update_at`] call
    last_timestamp_us: Option<u64>,
    flags: AhrsFlags,
}

impl Ahrs {
    /// Create a new AHRS instance with default settings
    pub fn new() -> Self {
        Self::with_settings(AhrsSettings::default())
    }

    /// Create a new AHRS instance with specified settings
    pub fn with_settings(settings: AhrsSettings) -> Self {
        Self {
            settings,
            quaternion: UnitQuaternion::identity(),
            integral_error: Vector3::zeros(),
            last_timestamp_us: None,
            flags: AhrsFlags::default(),
        }
    }

    /// Return to identity attitude and clear the integral term and timestamp
    pub fn reset(&mut self) {
        self.quaternion = UnitQuaternion::identity();
        self.integral_error = Vector3::zeros();
        self.last_timestamp_us = None;
        self.flags = AhrsFlags::default();
    }

    /// Update algorithm settings
    ///
    /// Disabling the integral gain clears the accumulated integral.
    pub fn set_settings(&mut self, settings: AhrsSettings) {
        self.settings = settings;
        if self.settings.mahony.ki <= 0.0 {
            self.integral_error = Vector3::zeros();
        }
    }

    /// Get current algorithm settings
    pub fn settings(&self) -> AhrsSettings {
        self.settings
    }

    /// Get current orientation quaternion
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    /// Set orientation quaternion directly
    pub fn set_quaternion(&mut self, quaternion: UnitQuaternion<f64>) {
        self.quaternion = quaternion;
        self.integral_error = Vector3::zeros();
    }

    /// Current yaw, pitch and roll
    pub fn orientation(&self) -> Orientation {
        Orientation::from_quaternion(&self.quaternion)
    }

    /// Accumulated Mahony error integral
    pub fn integral_error(&self) -> Vector3<f64> {
        self.integral_error
    }

    /// Get algorithm flags
    pub fn flags(&self) -> AhrsFlags {
        self.flags
    }

    /// Unit gravity direction in the sensor frame as estimated by the filter
    pub fn gravity(&self) -> Vector3<f64> {
        self.quaternion.inverse_transform_vector(&Vector3::z())
    }

    /// Update AHRS with gyroscope, accelerometer, and magnetometer data
    ///
    /// # Arguments
    /// * `algorithm` - Correction law for this step
    /// * `gyroscope` - Gyroscope reading in degrees per second
    /// * `accelerometer` - Accelerometer reading in g
    /// * `magnetometer` - Magnetometer reading in µT, aligned to the gyroscope axes
    /// * `delta_time` - Time since the previous update in seconds
    ///
    /// A zero, negative or non-finite `delta_time` skips integration; the
    /// quaternion is only renormalized. A zero accelerometer vector leaves the
    /// gyroscope uncorrected, and a zero magnetometer vector restricts the
    /// correction to gravity.
    pub fn update(
        &mut self,
        algorithm: Algorithm,
        gyroscope: Vector3<f64>,
        accelerometer: Vector3<f64>,
        magnetometer: Vector3<f64>,
        delta_time: f64,
    ) -> UnitQuaternion<f64> {
        if !(delta_time > 0.0 && delta_time.is_finite()) {
            warn!("skipping integration for time step {delta_time} s");
            self.flags.degenerate_time_steps = self.flags.degenerate_time_steps.saturating_add(1);
            self.quaternion.renormalize();
            return self.quaternion;
        }

        let rate = gyroscope.deg_to_rad();
        let Some(accelerometer) = accelerometer.checked_normalize() else {
            self.flags.uncorrected_updates = self.flags.uncorrected_updates.saturating_add(1);
            let derivative = self.rate_derivative(rate);
            return self.integrate(derivative, delta_time);
        };
        let magnetometer = magnetometer.checked_normalize();

        let derivative = match algorithm {
            Algorithm::Mahony => {
                let corrected = self.mahony_rate(rate, accelerometer, magnetometer, delta_time);
                self.rate_derivative(corrected)
            }
            Algorithm::Madgwick => self.madgwick_derivative(rate, accelerometer, magnetometer),
        };

        self.integrate(derivative, delta_time)
    }

    /// Update using a monotonic timestamp instead of an explicit time step
    ///
    /// The time step is the difference to the previous call's timestamp. The
    /// first call after construction or [`Ahrs::reset`] has no reference and
    /// therefore does not integrate.
    pub fn update_at(
        &mut self,
        algorithm: Algorithm,
        gyroscope: Vector3<f64>,
        accelerometer: Vector3<f64>,
        magnetometer: Vector3<f64>,
        timestamp_us: u64,
    ) -> UnitQuaternion<f64> {
        let Some(previous) = self.last_timestamp_us.replace(timestamp_us) else {
            debug!("first timestamp {timestamp_us} us, no time step to integrate");
            self.quaternion.renormalize();
            return self.quaternion;
        };
        let delta_time = (timestamp_us as f64 - previous as f64) * MICROS_TO_SECONDS;
        self.update(algorithm, gyroscope, accelerometer, magnetometer, delta_time)
    }

    /// Quaternion derivative for a body rate in rad/s: `0.5 * q * ω`
    fn rate_derivative(&self, rate: Vector3<f64>) -> Quaternion<f64> {
        self.quaternion.as_ref() * Quaternion::from_parts(0.0, rate) * 0.5
    }

    /// Reference field direction in the sensor frame
    ///
    /// The measured field is rotated to the earth frame, its horizontal part
    /// collapsed onto the x axis, and the result rotated back.
    fn reference_field(&self, magnetometer: Vector3<f64>) -> Vector3<f64> {
        let h = self.quaternion.transform_vector(&magnetometer);
        let b = Vector3::new(libm::sqrt(h.x * h.x + h.y * h.y), 0.0, h.z);
        self.quaternion.inverse_transform_vector(&b)
    }

    /// Mahony: gyroscope rate plus PI feedback on the direction error
    fn mahony_rate(
        &mut self,
        rate: Vector3<f64>,
        accelerometer: Vector3<f64>,
        magnetometer: Option<Vector3<f64>>,
        delta_time: f64,
    ) -> Vector3<f64> {
        let mut error = accelerometer.cross(&self.gravity());
        if let Some(magnetometer) = magnetometer {
            error += magnetometer.cross(&self.reference_field(magnetometer));
        }

        let gains = self.settings.mahony;
        if gains.ki > 0.0 {
            let limit = libm::fabs(gains.integral_limit);
            self.integral_error = (self.integral_error + error * delta_time)
                .map(|component| component.max(-limit).min(limit));
        } else {
            self.integral_error = Vector3::zeros();
        }
        trace!("mahony error {error:?}, integral {:?}", self.integral_error);

        rate + error * gains.kp + self.integral_error * gains.ki
    }

    /// Madgwick: gyroscope derivative minus a normalized gradient step
    fn madgwick_derivative(
        &self,
        rate: Vector3<f64>,
        accelerometer: Vector3<f64>,
        magnetometer: Option<Vector3<f64>>,
    ) -> Quaternion<f64> {
        let q = self.quaternion.as_ref();
        let (w, x, y, z) = (q.w, q.i, q.j, q.k);

        let gravity_residual = self.gravity() - accelerometer;
        #[rustfmt::skip]
        let gravity_jacobian = Matrix3x4::new(
            -2.0 * y, 2.0 * z, -2.0 * w, 2.0 * x,
            2.0 * x, 2.0 * w, 2.0 * z, 2.0 * y,
            0.0, -4.0 * x, -4.0 * y, 0.0,
        );
        let mut gradient: Vector4<f64> = gravity_jacobian.transpose() * gravity_residual;

        if let Some(magnetometer) = magnetometer {
            let h = self.quaternion.transform_vector(&magnetometer);
            let bx = libm::sqrt(h.x * h.x + h.y * h.y);
            let bz = h.z;
            let field_residual = self.reference_field(magnetometer) - magnetometer;
            #[rustfmt::skip]
            let field_jacobian = Matrix3x4::new(
                -2.0 * bz * y,
                2.0 * bz * z,
                -4.0 * bx * y - 2.0 * bz * w,
                -4.0 * bx * z + 2.0 * bz * x,

                -2.0 * bx * z + 2.0 * bz * x,
                2.0 * bx * y + 2.0 * bz * w,
                2.0 * bx * x + 2.0 * bz * z,
                -2.0 * bx * w + 2.0 * bz * y,

                2.0 * bx * y,
                2.0 * bx * z - 4.0 * bz * x,
                2.0 * bx * w - 4.0 * bz * y,
                2.0 * bx * x,
            );
            gradient += field_jacobian.transpose() * field_residual;
        }

        let derivative = self.rate_derivative(rate);
        match gradient.try_normalize(f64::EPSILON) {
            Some(step) => {
                derivative
                    - Quaternion::new(step[0], step[1], step[2], step[3]) * self.settings.madgwick.beta
            }
            None => derivative,
        }
    }

    /// First-order integration followed by renormalization
    fn integrate(&mut self, derivative: Quaternion<f64>, delta_time: f64) -> UnitQuaternion<f64> {
        let next = self.quaternion.as_ref() + derivative * delta_time;
        self.quaternion = UnitQuaternion::from_quaternion(next);
        self.quaternion
    }
}

impl Default for Ahrs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MahonyGains;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_new_ahrs() {
        let ahrs = Ahrs::new();
        assert_eq!(ahrs.quaternion(), UnitQuaternion::identity());
        assert_eq!(ahrs.integral_error(), Vector3::zeros());
        assert_eq!(ahrs.flags(), AhrsFlags::default());
    }

    #[test]
    fn test_gravity_calculation() {
        let ahrs = Ahrs::new();
        let gravity = ahrs.gravity();

        assert_abs_diff_eq!(gravity.norm(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(gravity.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_time_step_skips_integration() {
        let mut ahrs = Ahrs::new();
        let gyro = Vector3::new(100.0, -50.0, 20.0);
        let accel = Vector3::new(0.3, 0.0, 1.0);

        for delta_time in [0.0, -0.01, f64::NAN, f64::INFINITY] {
            ahrs.update(Algorithm::Mahony, gyro, accel, Vector3::zeros(), delta_time);
            ahrs.update(Algorithm::Madgwick, gyro, accel, Vector3::zeros(), delta_time);
        }

        assert_eq!(ahrs.quaternion(), UnitQuaternion::identity());
        assert_eq!(ahrs.flags().degenerate_time_steps, 8);
    }

    #[test]
    fn test_gyroscope_only_integration() {
        let mut ahrs = Ahrs::new();
        let gyro = Vector3::new(0.0, 0.0, 90.0);

        // No accelerometer vector: rate integrates uncorrected
        for _ in 0..100 {
            ahrs.update(Algorithm::Madgwick, gyro, Vector3::zeros(), Vector3::zeros(), 0.01);
        }

        assert_abs_diff_eq!(ahrs.orientation().yaw, 90.0, epsilon = 0.01);
        assert_eq!(ahrs.flags().uncorrected_updates, 100);
    }

    #[test]
    fn test_integral_zeroed_without_gain() {
        let mut ahrs = Ahrs::with_settings(AhrsSettings {
            mahony: MahonyGains {
                ki: 0.5,
                ..Default::default()
            },
            ..Default::default()
        });
        let tilted = Vector3::new(0.5, 0.0, 0.8);
        ahrs.update(Algorithm::Mahony, Vector3::zeros(), tilted, Vector3::zeros(), 0.01);
        assert!(ahrs.integral_error().norm() > 0.0);

        ahrs.set_settings(AhrsSettings::default());
        assert_eq!(ahrs.integral_error(), Vector3::zeros());

        ahrs.update(Algorithm::Mahony, Vector3::zeros(), tilted, Vector3::zeros(), 0.01);
        assert_eq!(ahrs.integral_error(), Vector3::zeros());
    }

    #[test]
    fn test_integral_clamped() {
        let mut ahrs = Ahrs::with_settings(AhrsSettings {
            mahony: MahonyGains {
                kp: 0.0,
                ki: 1.0,
                integral_limit: 0.01,
            },
            ..Default::default()
        });
        let tilted = Vector3::new(1.0, 0.0, 0.0);

        for _ in 0..50 {
            ahrs.update(Algorithm::Mahony, Vector3::zeros(), tilted, Vector3::zeros(), 0.1);
        }

        let integral = ahrs.integral_error();
        for component in integral.iter() {
            assert!(*component <= 0.01 && *component >= -0.01);
        }
    }

    #[test]
    fn test_update_at_derives_time_step() {
        let mut ahrs = Ahrs::new();
        let gyro = Vector3::new(0.0, 0.0, 90.0);

        ahrs.update_at(Algorithm::Mahony, gyro, Vector3::zeros(), Vector3::zeros(), 1_000);
        assert_eq!(ahrs.quaternion(), UnitQuaternion::identity());
        assert_eq!(ahrs.flags().degenerate_time_steps, 0);

        for step in 1..=100u64 {
            let timestamp = 1_000 + step * 10_000;
            ahrs.update_at(Algorithm::Mahony, gyro, Vector3::zeros(), Vector3::zeros(), timestamp);
        }
        assert_abs_diff_eq!(ahrs.orientation().yaw, 90.0, epsilon = 0.01);

        // Clock going backwards is a degenerate step
        let before = ahrs.quaternion();
        ahrs.update_at(Algorithm::Mahony, gyro, Vector3::zeros(), Vector3::zeros(), 0);
        assert_abs_diff_eq!(ahrs.quaternion(), before, epsilon = 1e-12);
        assert_eq!(ahrs.flags().degenerate_time_steps, 1);
    }

    #[test]
    fn test_first_timestamp_after_reset_is_not_degenerate() {
        let mut ahrs = Ahrs::new();
        let gyro = Vector3::new(0.0, 0.0, 90.0);

        ahrs.update_at(Algorithm::Madgwick, gyro, Vector3::zeros(), Vector3::zeros(), 5_000);
        ahrs.update_at(Algorithm::Madgwick, gyro, Vector3::zeros(), Vector3::zeros(), 15_000);
        ahrs.reset();
        ahrs.update_at(Algorithm::Madgwick, gyro, Vector3::zeros(), Vector3::zeros(), 2_000);

        assert_eq!(ahrs.quaternion(), UnitQuaternion::identity());
        assert_eq!(ahrs.flags().degenerate_time_steps, 0);

        ahrs.update_at(Algorithm::Madgwick, gyro, Vector3::zeros(), Vector3::zeros(), 12_000);
        assert_abs_diff_eq!(ahrs.orientation().yaw, 0.9, epsilon = 1e-3);
    }

    #[test]
    fn test_reset() {
        let mut ahrs = Ahrs::new();
        ahrs.update(
            Algorithm::Mahony,
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::zeros(),
            Vector3::zeros(),
            0.1,
        );
        assert_ne!(ahrs.quaternion(), UnitQuaternion::identity());

        ahrs.reset();
        assert_eq!(ahrs.quaternion(), UnitQuaternion::identity());
        assert_eq!(ahrs.flags(), AhrsFlags::default());
    }
}
