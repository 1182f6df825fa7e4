#![no_std]

//! MPU9250 AHRS - attitude and heading from the InvenSense MPU9250
//!
//! This crate drives an MPU9250 (accelerometer, gyroscope and the embedded
//! AK8963 magnetometer) over any [`embedded_hal::i2c::I2c`] bus, converts raw
//! counts into calibrated physical units and fuses them into an attitude
//! quaternion with either the Mahony or the Madgwick filter.
//!
//! # Features
//!
//! - Device bring-up, full-scale configuration and factory self-test
//! - Stationary gyroscope/accelerometer bias calibration
//! - Magnetometer hard and soft iron calibration
//! - Mahony (PI feedback) and Madgwick (gradient descent) filters sharing one state
//! - Yaw, pitch and roll projection
//! - `#![no_std]` compatible for embedded systems
//! - Optional `serde` support for persisting calibration and settings
//!
//! # Quick Start
//!
//! The filter works on its own with readings from any source:
//!
//! ```rust
//! use nalgebra::Vector3;
//! use mpu9250_ahrs::{Ahrs, Algorithm};
//!
//! let mut ahrs = Ahrs::new();
//!
//! // Sensor readings
//! let gyroscope = Vector3::new(0.1, 0.2, 0.3);       // deg/s
//! let accelerometer = Vector3::new(0.0, 0.0, 1.0);   // g
//! let magnetometer = Vector3::new(20.0, 0.0, -40.0); // µT
//!
//! // Update AHRS
//! ahrs.update(Algorithm::Mahony, gyroscope, accelerometer, magnetometer, 0.005); // 5ms
//!
//! // Get orientation
//! let orientation = ahrs.orientation();
//! assert!(orientation.pitch.abs() < 1.0);
//! ```
//!
//! With hardware, [`Imu`] ties the driver and the filter together:
//!
//! ```rust,ignore
//! use mpu9250_ahrs::{Algorithm, Imu, Mpu9250, ScaleProfile, MPU9250_ADDRESS};
//! use mpu9250_ahrs::calibration::{InertialCalibrationSettings, MagCalibrationSettings};
//!
//! let mut sensor = Mpu9250::new(i2c, MPU9250_ADDRESS);
//! sensor.run_self_test(&mut delay)?;
//! sensor.init(&mut delay, ScaleProfile::default())?;
//! sensor.calibrate_inertial(&mut delay, &InertialCalibrationSettings::default())?;
//! sensor.calibrate_magnetometer(&mut delay, &MagCalibrationSettings::default())?;
//!
//! let mut imu = Imu::new(sensor);
//! loop {
//!     let orientation = imu.update(Algorithm::Madgwick, clock.micros())?;
//! }
//! ```

mod ahrs;
pub mod calibration;
mod error;
mod imu;
mod math;
mod orientation;
pub mod registers;
mod scale;
mod sensor;
mod types;

// Re-export all public types and functions
pub use ahrs::Ahrs;
pub use calibration::CalibrationProfile;
pub use error::Error;
pub use imu::{Imu, align_magnetometer};
pub use math::{DEG_TO_RAD, QuaternionExt, RAD_TO_DEG, Vector3Ext};
pub use orientation::Orientation;
pub use registers::{MPU9250_ADDRESS, MPU9250_ADDRESS_ALT};
pub use scale::{AccelScale, GyroScale, MagMode, MagResolution, ScaleProfile};
pub use sensor::{MagStatus, Mpu9250, SensorSample, temperature_celsius};
pub use types::*;
