//! Acquisition to orientation pipeline

use embedded_hal::i2c::I2c;
use log::trace;
use nalgebra::{UnitQuaternion, Vector3};

use crate::ahrs::Ahrs;
use crate::error::Error;
use crate::orientation::Orientation;
use crate::sensor::Mpu9250;
use crate::types::{AhrsSettings, Algorithm};

/// Magnetometer vector in the accelerometer/gyroscope frame
///
/// The AK8963 die is mounted with x and y swapped and z pointing the other way
/// relative to the MPU9250's inertial sensors.
pub fn align_magnetometer(mag: Vector3<f64>) -> Vector3<f64> {
    Vector3::new(mag.y, mag.x, -mag.z)
}

/// A sensor and the filter fusing its readings
///
/// Owns one [`Mpu9250`] and one [`Ahrs`] and keeps the most recent calibrated
/// readings. Each [`Imu::update`] polls the data-ready flag and reads a new
/// sample only when one is waiting; otherwise the previous readings are fused
/// again over the elapsed time.
pub struct Imu<I> {
    sensor: Mpu9250<I>,
    ahrs: Ahrs,
    accel: Vector3<f64>,
    gyro: Vector3<f64>,
    mag: Vector3<f64>,
    temperature: f64,
    samples: u32,
}

impl<I> Imu<I>
where
    I: I2c,
{
    pub fn new(sensor: Mpu9250<I>) -> Self {
        Self::with_settings(sensor, AhrsSettings::default())
    }

    pub fn with_settings(sensor: Mpu9250<I>, settings: AhrsSettings) -> Self {
        Self {
            sensor,
            ahrs: Ahrs::with_settings(settings),
            accel: Vector3::zeros(),
            gyro: Vector3::zeros(),
            mag: Vector3::zeros(),
            temperature: 0.0,
            samples: 0,
        }
    }

    pub fn sensor(&self) -> &Mpu9250<I> {
        &self.sensor
    }

    /// Driver access for calibration and reconfiguration
    pub fn sensor_mut(&mut self) -> &mut Mpu9250<I> {
        &mut self.sensor
    }

    pub fn ahrs(&self) -> &Ahrs {
        &self.ahrs
    }

    pub fn ahrs_mut(&mut self) -> &mut Ahrs {
        &mut self.ahrs
    }

    /// Split into driver and filter
    pub fn into_parts(self) -> (Mpu9250<I>, Ahrs) {
        (self.sensor, self.ahrs)
    }

    /// Latest acceleration in g
    pub fn accel(&self) -> Vector3<f64> {
        self.accel
    }

    /// Latest angular rate in deg/s
    pub fn gyro(&self) -> Vector3<f64> {
        self.gyro
    }

    /// Latest magnetic field in µT, already in the inertial sensor frame
    pub fn mag(&self) -> Vector3<f64> {
        self.mag
    }

    /// Latest die temperature in °C
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Samples acquired since construction
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Read a sample if the sensor has one waiting
    ///
    /// Returns whether new readings were stored.
    pub fn acquire(&mut self) -> Result<bool, Error<I::Error>> {
        if !self.sensor.data_ready()? {
            return Ok(false);
        }

        let sample = self.sensor.read_sample()?;
        let scale = self.sensor.scale();
        let calibration = self.sensor.calibration();

        self.accel = calibration.accel(sample.accel, &scale);
        self.gyro = calibration.gyro(sample.gyro, &scale);
        self.mag = align_magnetometer(calibration.mag(sample.mag, &scale));
        self.temperature = crate::sensor::temperature_celsius(sample.temperature);
        self.samples = self.samples.wrapping_add(1);
        trace!("accel {:?} g, gyro {:?} deg/s, mag {:?} uT", self.accel, self.gyro, self.mag);
        Ok(true)
    }

    /// Acquire if possible and advance the filter to `timestamp_us`
    ///
    /// `timestamp_us` comes from a monotonic clock. The first update only
    /// records the timestamp.
    pub fn update(&mut self, algorithm: Algorithm, timestamp_us: u64) -> Result<Orientation, Error<I::Error>> {
        self.acquire()?;
        self.ahrs
            .update_at(algorithm, self.gyro, self.accel, self.mag, timestamp_us);
        Ok(self.ahrs.orientation())
    }

    /// Current attitude quaternion
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.ahrs.quaternion()
    }

    /// Current yaw, pitch and roll
    pub fn orientation(&self) -> Orientation {
        self.ahrs.orientation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnetometer_alignment() {
        let aligned = align_magnetometer(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(aligned, Vector3::new(2.0, 1.0, -3.0));
    }
}
