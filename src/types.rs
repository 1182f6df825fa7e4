//! Filter settings and algorithm selection

/// Gyroscope measurement error used to derive the default Madgwick gain, deg/s
const GYRO_MEASUREMENT_ERROR: f64 = 40.0;

/// Correction law applied by [`crate::Ahrs::update`]
///
/// Both variants share the quaternion integration step and differ only in how
/// the accelerometer and magnetometer correct the gyroscope rate.
///
/// # Example
/// ```
/// use mpu9250_ahrs::{Ahrs, Algorithm};
/// use nalgebra::Vector3;
///
/// let mut ahrs = Ahrs::new();
/// let gravity = Vector3::new(0.0, 0.0, 1.0);
/// let field = Vector3::new(20.0, 0.0, -40.0);
///
/// ahrs.update(Algorithm::Mahony, Vector3::zeros(), gravity, field, 0.01);
/// ahrs.update(Algorithm::Madgwick, Vector3::zeros(), gravity, field, 0.01);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Algorithm {
    /// Proportional-integral feedback on the vector cross-product error
    #[default]
    Mahony,
    /// Gradient-descent step along the objective function gradient
    Madgwick,
}

/// Mahony filter gains
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MahonyGains {
    /// Proportional gain applied directly to the gyroscope rate
    pub kp: f64,
    /// Integral gain; zero disables the integral term and keeps it cleared
    pub ki: f64,
    /// Bound on each component of the accumulated error integral
    pub integral_limit: f64,
}

impl Default for MahonyGains {
    fn default() -> Self {
        Self {
            kp: 10.0,
            ki: 0.0,
            integral_limit: 1.0,
        }
    }
}

/// Madgwick filter gain
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MadgwickGains {
    /// Gradient step size in rad/s
    ///
    /// The default is `sqrt(3/4)` times a 40 deg/s gyroscope measurement error,
    /// about 0.605. Larger values converge faster and track noise more.
    pub beta: f64,
}

impl Default for MadgwickGains {
    fn default() -> Self {
        let error = core::f64::consts::PI * (GYRO_MEASUREMENT_ERROR / 180.0);
        Self {
            beta: libm::sqrt(3.0 / 4.0) * error,
        }
    }
}

/// AHRS algorithm settings
///
/// Holds the gains of both correction laws so the algorithm can be switched
/// per update without reconfiguring.
///
/// # Example
/// ```
/// use mpu9250_ahrs::{AhrsSettings, MahonyGains};
///
/// let settings = AhrsSettings {
///     mahony: MahonyGains { kp: 2.0, ki: 0.1, ..Default::default() },
///     ..Default::default()
/// };
/// assert_eq!(settings.mahony.integral_limit, 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AhrsSettings {
    pub mahony: MahonyGains,
    pub madgwick: MadgwickGains,
}

/// AHRS algorithm flags
///
/// Counters for conditions handled in place rather than reported as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AhrsFlags {
    /// Updates that skipped integration because the time step was zero,
    /// negative or not finite
    pub degenerate_time_steps: u32,
    /// Updates where the accelerometer vector could not be normalized and the
    /// gyroscope was integrated uncorrected
    pub uncorrected_updates: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_default_gains() {
        let settings = AhrsSettings::default();
        assert_eq!(settings.mahony.kp, 10.0);
        assert_eq!(settings.mahony.ki, 0.0);
        assert_abs_diff_eq!(settings.madgwick.beta, 0.604_599_788, epsilon = 1e-8);
    }
}
