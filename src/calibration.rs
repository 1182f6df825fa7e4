//! Sensor calibration: bias and scale estimation, self-test evaluation and
//! correction of raw counts into physical units

use log::warn;
use nalgebra::Vector3;

use crate::scale::{MagMode, ScaleProfile};

/// Accelerometer self-test reference response in counts at ±2 g, gyroscope at ±250 deg/s
const SELF_TEST_REFERENCE: f64 = 2620.0;
/// Growth of the reference response per trim code step
const SELF_TEST_CODE_STEP: f64 = 1.01;

/// Calibration state of one sensor
///
/// Produced by the calibration procedures of [`crate::Mpu9250`] and applied
/// to every scaled reading. Lives as long as the driver; restoring it after a
/// restart is the caller's job (enable the `serde` feature to serialize it).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationProfile {
    /// Gyroscope zero-rate offset in deg/s
    pub gyro_bias: Vector3<f64>,
    /// Accelerometer zero-g offset in g
    pub accel_bias: Vector3<f64>,
    /// Magnetometer hard-iron offset in µT
    pub mag_bias: Vector3<f64>,
    /// Magnetometer soft-iron correction, dimensionless
    pub mag_scale: Vector3<f64>,
    /// AK8963 fuse ROM sensitivity adjustment, dimensionless (about 0.9 to 1.1)
    pub mag_sensitivity: Vector3<f64>,
    /// Most recent self-test result
    pub self_test: SelfTestReport,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            gyro_bias: Vector3::zeros(),
            accel_bias: Vector3::zeros(),
            mag_bias: Vector3::zeros(),
            mag_scale: Vector3::repeat(1.0),
            mag_sensitivity: Vector3::repeat(1.0),
            self_test: SelfTestReport::default(),
        }
    }
}

impl CalibrationProfile {
    /// Accelerometer counts to g with bias removed
    pub fn accel(&self, raw: Vector3<i16>, scale: &ScaleProfile) -> Vector3<f64> {
        correct_inertial(raw, scale.accel_resolution(), self.accel_bias)
    }

    /// Gyroscope counts to deg/s with bias removed
    pub fn gyro(&self, raw: Vector3<i16>, scale: &ScaleProfile) -> Vector3<f64> {
        correct_inertial(raw, scale.gyro_resolution(), self.gyro_bias)
    }

    /// Magnetometer counts to µT with factory adjustment, hard and soft iron
    /// correction applied
    pub fn mag(&self, raw: Vector3<i16>, scale: &ScaleProfile) -> Vector3<f64> {
        correct_magnetic(
            raw,
            scale.mag_resolution(),
            self.mag_sensitivity,
            self.mag_bias,
            self.mag_scale,
        )
    }
}

/// Applies inertial sensor calibration (gyroscope and accelerometer)
///
/// `raw * resolution - bias`
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use mpu9250_ahrs::calibration::correct_inertial;
///
/// let corrected = correct_inertial(Vector3::new(0, 0, 16384), 2.0 / 32768.0, Vector3::zeros());
/// assert_eq!(corrected, Vector3::new(0.0, 0.0, 1.0));
/// ```
pub fn correct_inertial(raw: Vector3<i16>, resolution: f64, bias: Vector3<f64>) -> Vector3<f64> {
    raw.cast::<f64>() * resolution - bias
}

/// Applies magnetometer calibration (factory adjustment, hard and soft iron)
///
/// `(raw * resolution * sensitivity - hard_iron) * soft_iron`, component-wise
pub fn correct_magnetic(
    raw: Vector3<i16>,
    resolution: f64,
    sensitivity: Vector3<f64>,
    hard_iron: Vector3<f64>,
    soft_iron: Vector3<f64>,
) -> Vector3<f64> {
    ((raw.cast::<f64>() * resolution).component_mul(&sensitivity) - hard_iron).component_mul(&soft_iron)
}

/// AK8963 fuse ROM value to sensitivity multiplier: `(asa - 128) / 256 + 1`
pub fn mag_sensitivity(asa: [u8; 3]) -> Vector3<f64> {
    Vector3::from_fn(|i, _| (f64::from(asa[i]) - 128.0) / 256.0 + 1.0)
}

/// Gravity direction the sensor is held in during inertial calibration
///
/// The 1 g reading along this axis is removed from the accelerometer mean.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReferenceGravity {
    /// No gravity compensation
    Zero,
    XN,
    XP,
    YN,
    YP,
    ZN,
    /// Lying flat, face up
    #[default]
    ZP,
}

impl ReferenceGravity {
    /// Expected accelerometer reading at rest, in g
    pub fn vector(self) -> Vector3<f64> {
        match self {
            Self::Zero => Vector3::zeros(),
            Self::XN => -Vector3::x(),
            Self::XP => Vector3::x(),
            Self::YN => -Vector3::y(),
            Self::YP => Vector3::y(),
            Self::ZN => -Vector3::z(),
            Self::ZP => Vector3::z(),
        }
    }
}

/// Stationary gyroscope and accelerometer calibration settings
///
/// The sensor must not move while samples are collected. Movement is not
/// detected and simply ends up in the biases.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InertialCalibrationSettings {
    /// Samples averaged into the biases
    pub samples: u16,
    /// Samples read and discarded before averaging starts
    pub warmup_samples: u16,
    /// Delay between samples in microseconds
    pub sample_delay_us: u32,
    /// Orientation of the sensor during calibration
    pub gravity: ReferenceGravity,
}

impl Default for InertialCalibrationSettings {
    fn default() -> Self {
        Self {
            samples: 200,
            warmup_samples: 30,
            sample_delay_us: 2_000,
            gravity: ReferenceGravity::default(),
        }
    }
}

/// Magnetometer calibration settings
///
/// The sensor must be turned through as many headings as possible while
/// samples are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MagCalibrationSettings {
    pub samples: u16,
    /// Delay between samples in milliseconds
    pub sample_delay_ms: u32,
}

impl MagCalibrationSettings {
    /// About 15 seconds of samples at the magnetometer's output rate
    pub const fn for_mode(mode: MagMode) -> Self {
        match mode {
            MagMode::Continuous8Hz => Self {
                samples: 128,
                sample_delay_ms: 135,
            },
            MagMode::Continuous100Hz => Self {
                samples: 1500,
                sample_delay_ms: 12,
            },
        }
    }
}

impl Default for MagCalibrationSettings {
    fn default() -> Self {
        Self::for_mode(MagMode::default())
    }
}

/// Result of the stationary inertial calibration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InertialBias {
    /// deg/s
    pub gyro: Vector3<f64>,
    /// g
    pub accel: Vector3<f64>,
}

/// Running sums of accelerometer and gyroscope counts
#[derive(Debug, Clone, Copy)]
pub struct MeanAccumulator {
    accel: Vector3<i64>,
    gyro: Vector3<i64>,
    count: u32,
}

impl Default for MeanAccumulator {
    fn default() -> Self {
        Self {
            accel: Vector3::zeros(),
            gyro: Vector3::zeros(),
            count: 0,
        }
    }
}

impl MeanAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, accel: &Vector3<i16>, gyro: &Vector3<i16>) {
        self.accel += accel.cast::<i64>();
        self.gyro += gyro.cast::<i64>();
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Mean accelerometer and gyroscope counts, zero when empty
    pub fn means(&self) -> (Vector3<f64>, Vector3<f64>) {
        if self.count == 0 {
            return (Vector3::zeros(), Vector3::zeros());
        }
        let n = f64::from(self.count);
        (self.accel.cast::<f64>() / n, self.gyro.cast::<f64>() / n)
    }

    /// Biases in physical units with the gravity reading removed
    pub fn biases(&self, scale: &ScaleProfile, gravity: ReferenceGravity) -> InertialBias {
        let (accel, gyro) = self.means();
        InertialBias {
            gyro: gyro * scale.gyro_resolution(),
            accel: accel * scale.accel_resolution() - gravity.vector(),
        }
    }
}

/// Hard and soft iron correction derived from a rotation maneuver
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MagCorrection {
    /// Hard-iron offset in µT
    pub bias: Vector3<f64>,
    /// Soft-iron multiplier
    pub scale: Vector3<f64>,
}

/// Per-axis extremes of magnetometer counts
#[derive(Debug, Clone, Copy)]
pub struct MagExtrema {
    min: Vector3<i16>,
    max: Vector3<i16>,
    count: u32,
}

impl Default for MagExtrema {
    fn default() -> Self {
        Self {
            min: Vector3::repeat(i16::MAX),
            max: Vector3::repeat(i16::MIN),
            count: 0,
        }
    }
}

impl MagExtrema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sample: &Vector3<i16>) {
        self.min = self.min.zip_map(sample, |a, b| a.min(b));
        self.max = self.max.zip_map(sample, |a, b| a.max(b));
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Offset and scale from the tracked extremes
    ///
    /// The offset is the midpoint of each axis range converted to µT. Each
    /// axis' scale is the average half-range over the axes that moved divided
    /// by its own half-range, both in µT after the factory adjustment. An axis
    /// that never moved keeps a scale of 1.
    pub fn correction(&self, mag_resolution: f64, sensitivity: Vector3<f64>) -> MagCorrection {
        if self.count == 0 {
            warn!("magnetometer calibration saw no fresh samples, using identity correction");
            return MagCorrection {
                bias: Vector3::zeros(),
                scale: Vector3::repeat(1.0),
            };
        }

        let min = self.min.cast::<f64>();
        let max = self.max.cast::<f64>();
        let bias = ((max + min) / 2.0 * mag_resolution).component_mul(&sensitivity);
        let chord = ((max - min) / 2.0 * mag_resolution).component_mul(&sensitivity);

        let moving = chord.iter().filter(|c| **c > 0.0).count();
        if moving < 3 {
            warn!("magnetometer calibration saw no rotation on {} axes", 3 - moving);
        }
        let average_chord = if moving > 0 {
            chord.iter().filter(|c| **c > 0.0).sum::<f64>() / moving as f64
        } else {
            0.0
        };
        let scale = chord.map(|c| if c > 0.0 { average_chord / c } else { 1.0 });

        MagCorrection { bias, scale }
    }
}

/// Self-test deviation from the factory response, in percent
///
/// `100 * (excited - normal) / factory_response - 100` per axis. A sensor that
/// does not respond to excitation reports -100 on every axis. Pass/fail limits
/// are left to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelfTestReport {
    pub accel: Vector3<f64>,
    pub gyro: Vector3<f64>,
}

impl Default for SelfTestReport {
    fn default() -> Self {
        Self {
            accel: Vector3::zeros(),
            gyro: Vector3::zeros(),
        }
    }
}

impl SelfTestReport {
    /// Accelerometer x, y, z followed by gyroscope x, y, z
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.accel.x,
            self.accel.y,
            self.accel.z,
            self.gyro.x,
            self.gyro.y,
            self.gyro.z,
        ]
    }
}

/// Factory self-test response in counts for a trim code
///
/// The trim registers hold a code per axis; the response it stands for is
/// `2620 / 2^fs * 1.01^(code - 1)` with `fs` the full-scale setting used
/// during the test.
pub fn factory_response(code: u8, full_scale_bits: u8) -> f64 {
    let range = f64::from(1u16 << full_scale_bits);
    SELF_TEST_REFERENCE / range * libm::pow(SELF_TEST_CODE_STEP, f64::from(code) - 1.0)
}

/// Deviation of the measured self-test response from the factory response
///
/// `normal` and `excited` are mean counts without and with excitation.
pub fn self_test_deviation(
    normal: Vector3<f64>,
    excited: Vector3<f64>,
    codes: [u8; 3],
    full_scale_bits: u8,
) -> Vector3<f64> {
    Vector3::from_fn(|i, _| {
        let response = excited[i] - normal[i];
        100.0 * response / factory_response(codes[i], full_scale_bits) - 100.0
    })
}
