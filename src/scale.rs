//! Full-scale range selection and count-to-unit resolution

/// Counts in the positive half of a signed 16-bit output
const HALF_RANGE: f64 = 32768.0;

/// AK8963 full-scale field in µT
const MAG_FULL_SCALE_UT: f64 = 4912.0;

/// Accelerometer full-scale range
///
/// The discriminant is the value of the `ACCEL_FS_SEL` field in `ACCEL_CONFIG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccelScale {
    /// ±2 g
    #[default]
    G2 = 0,
    /// ±4 g
    G4 = 1,
    /// ±8 g
    G8 = 2,
    /// ±16 g
    G16 = 3,
}

impl AccelScale {
    /// Every supported range, smallest first
    pub const ALL: [AccelScale; 4] = [Self::G2, Self::G4, Self::G8, Self::G16];

    /// Largest measurable magnitude in g
    pub const fn full_scale(self) -> f64 {
        match self {
            Self::G2 => 2.0,
            Self::G4 => 4.0,
            Self::G8 => 8.0,
            Self::G16 => 16.0,
        }
    }

    /// g per count
    pub fn resolution(self) -> f64 {
        self.full_scale() / HALF_RANGE
    }

    /// Counts produced by 1 g at this range
    pub fn counts_per_g(self) -> f64 {
        HALF_RANGE / self.full_scale()
    }

    pub(crate) const fn bits(self) -> u8 {
        self as u8
    }
}

/// Gyroscope full-scale range
///
/// The discriminant is the value of the `GYRO_FS_SEL` field in `GYRO_CONFIG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GyroScale {
    /// ±250 deg/s
    #[default]
    Dps250 = 0,
    /// ±500 deg/s
    Dps500 = 1,
    /// ±1000 deg/s
    Dps1000 = 2,
    /// ±2000 deg/s
    Dps2000 = 3,
}

impl GyroScale {
    /// Every supported range, smallest first
    pub const ALL: [GyroScale; 4] = [Self::Dps250, Self::Dps500, Self::Dps1000, Self::Dps2000];

    /// Largest measurable rate in deg/s
    pub const fn full_scale(self) -> f64 {
        match self {
            Self::Dps250 => 250.0,
            Self::Dps500 => 500.0,
            Self::Dps1000 => 1000.0,
            Self::Dps2000 => 2000.0,
        }
    }

    /// deg/s per count
    pub fn resolution(self) -> f64 {
        self.full_scale() / HALF_RANGE
    }

    pub(crate) const fn bits(self) -> u8 {
        self as u8
    }
}

/// Magnetometer output width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MagResolution {
    /// 14-bit output, 0.6 µT per count
    Bits14 = 0,
    /// 16-bit output, 0.15 µT per count
    #[default]
    Bits16 = 1,
}

impl MagResolution {
    /// µT per count
    pub fn resolution(self) -> f64 {
        match self {
            Self::Bits14 => MAG_FULL_SCALE_UT / 8190.0,
            Self::Bits16 => MAG_FULL_SCALE_UT / 32760.0,
        }
    }

    pub(crate) const fn bits(self) -> u8 {
        self as u8
    }
}

/// AK8963 continuous measurement rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MagMode {
    /// Continuous measurement mode 1
    #[default]
    Continuous8Hz = 0x02,
    /// Continuous measurement mode 2
    Continuous100Hz = 0x06,
}

impl MagMode {
    pub(crate) const fn bits(self) -> u8 {
        self as u8
    }
}

/// Full-scale selection for all three sensors
///
/// Set at initialization through [`crate::Mpu9250::init`] and changed only by
/// [`crate::Mpu9250::configure`].
///
/// # Example
/// ```
/// use mpu9250_ahrs::{AccelScale, GyroScale, ScaleProfile};
///
/// let profile = ScaleProfile {
///     accel: AccelScale::G4,
///     gyro: GyroScale::Dps500,
///     ..Default::default()
/// };
/// assert_eq!(profile.accel_resolution() * 32768.0, 4.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScaleProfile {
    /// Accelerometer range
    pub accel: AccelScale,
    /// Gyroscope range
    pub gyro: GyroScale,
    /// Magnetometer output width
    pub mag: MagResolution,
    /// Magnetometer measurement rate
    pub mag_mode: MagMode,
}

impl ScaleProfile {
    /// g per count
    pub fn accel_resolution(&self) -> f64 {
        self.accel.resolution()
    }

    /// deg/s per count
    pub fn gyro_resolution(&self) -> f64 {
        self.gyro.resolution()
    }

    /// µT per count
    pub fn mag_resolution(&self) -> f64 {
        self.mag.resolution()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_accel_resolution_spans_full_scale() {
        for scale in AccelScale::ALL {
            assert_relative_eq!(scale.resolution() * 32768.0, scale.full_scale(), epsilon = 1e-12);
        }
        assert_relative_eq!(AccelScale::G2.counts_per_g(), 16384.0);
    }

    #[test]
    fn test_gyro_resolution_spans_full_scale() {
        for scale in GyroScale::ALL {
            assert_relative_eq!(scale.resolution() * 32768.0, scale.full_scale(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_mag_resolution_constants() {
        assert_eq!(MagResolution::Bits14.resolution(), 4912.0 / 8190.0);
        assert_eq!(MagResolution::Bits16.resolution(), 4912.0 / 32760.0);
    }

    #[test]
    fn test_default_profile() {
        let profile = ScaleProfile::default();
        assert_eq!(profile.accel, AccelScale::G2);
        assert_eq!(profile.gyro, GyroScale::Dps250);
        assert_eq!(profile.mag, MagResolution::Bits16);
        assert_eq!(profile.mag_mode, MagMode::Continuous8Hz);
    }
}
