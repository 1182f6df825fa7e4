//! MPU9250 driver: bring-up, raw and scaled acquisition, calibration procedures

use embedded_hal::{delay::DelayNs, i2c::I2c};
use log::{debug, trace, warn};
use nalgebra::Vector3;

use crate::calibration::{
    CalibrationProfile, InertialBias, InertialCalibrationSettings, MagCalibrationSettings,
    MagCorrection, MagExtrema, MeanAccumulator, SelfTestReport, mag_sensitivity,
    self_test_deviation,
};
use crate::error::Error;
use crate::registers::*;
use crate::scale::ScaleProfile;

/// Samples averaged per phase of the self-test
const SELF_TEST_SAMPLES: u16 = 200;
/// Settling time after switching self-test excitation
const SELF_TEST_SETTLE_MS: u32 = 25;
/// Temperature sensor sensitivity, counts per °C
const TEMPERATURE_SENSITIVITY: f64 = 333.87;
/// Temperature reading at zero counts, °C
const TEMPERATURE_OFFSET: f64 = 21.0;

/// One complete acquisition in raw counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSample {
    pub accel: Vector3<i16>,
    pub gyro: Vector3<i16>,
    /// Magnetometer in its own axes; the last good value if the read was skipped
    pub mag: Vector3<i16>,
    pub temperature: i16,
}

/// Outcome of the most recent magnetometer read
///
/// Anything other than [`MagStatus::Fresh`] means the driver returned the last
/// known good sample instead of new data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MagStatus {
    /// New measurement
    #[default]
    Fresh,
    /// No new measurement was available yet
    NotReady,
    /// The measurement overflowed and was discarded
    Overflow,
}

/// InvenSense MPU9250 driver
///
/// The AK8963 magnetometer is accessed through the MPU9250's I2C bypass, so
/// both parts share the bus handed to [`Mpu9250::new`]. Scaled readings have
/// the current [`CalibrationProfile`] applied.
pub struct Mpu9250<I> {
    i2c: I,
    address: u8,
    scale: ScaleProfile,
    calibration: CalibrationProfile,
    last_mag: Vector3<i16>,
    mag_status: MagStatus,
    mag_overflows: u32,
}

impl<I> Mpu9250<I>
where
    I: I2c,
{
    /// Wrap a bus; no traffic is generated until [`Mpu9250::init`]
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            scale: ScaleProfile::default(),
            calibration: CalibrationProfile::default(),
            last_mag: Vector3::zeros(),
            mag_status: MagStatus::default(),
            mag_overflows: 0,
        }
    }

    /// Returns the underlying I2C peripheral, consuming this driver.
    pub fn release(self) -> I {
        self.i2c
    }

    fn read_registers(&mut self, device: u8, register: u8, buf: &mut [u8]) -> Result<(), Error<I::Error>> {
        self.i2c.write_read(device, &[register], buf).map_err(Error::Bus)
    }

    fn read_register(&mut self, device: u8, register: u8) -> Result<u8, Error<I::Error>> {
        let mut buf = [0; 1];
        self.read_registers(device, register, &mut buf)?;
        Ok(buf[0])
    }

    fn write_register(&mut self, device: u8, register: u8, value: u8) -> Result<(), Error<I::Error>> {
        self.i2c.write(device, &[register, value]).map_err(Error::Bus)
    }

    fn modify_register<F>(&mut self, register: Register, f: F) -> Result<(), Error<I::Error>>
    where
        F: FnOnce(u8) -> u8,
    {
        let value = self.read_register(self.address, register.addr())?;
        self.write_register(self.address, register.addr(), f(value))
    }

    fn write_mpu(&mut self, register: Register, value: u8) -> Result<(), Error<I::Error>> {
        self.write_register(self.address, register.addr(), value)
    }

    fn write_mag(&mut self, register: MagRegister, value: u8) -> Result<(), Error<I::Error>> {
        self.write_register(AK8963_ADDRESS, register.addr(), value)
    }

    /// Reads the WHO_AM_I register; should return `0x71`
    pub fn who_am_i(&mut self) -> Result<u8, Error<I::Error>> {
        self.read_register(self.address, Register::WhoAmI.addr())
    }

    /// Reads the AK8963 WIA register; should return `0x48`
    pub fn mag_who_am_i(&mut self) -> Result<u8, Error<I::Error>> {
        self.read_register(AK8963_ADDRESS, MagRegister::Wia.addr())
    }

    /// Bring up both parts with the given ranges
    ///
    /// Wakes the MPU9250, selects the PLL clock, configures the digital
    /// low-pass filters and sample rate, enables the I2C bypass and then
    /// initializes the magnetometer.
    pub fn init(&mut self, delay: &mut impl DelayNs, scale: ScaleProfile) -> Result<(), Error<I::Error>> {
        let found = self.who_am_i()?;
        if found != MPU9250_WHO_AM_I {
            warn!("MPU9250 identity mismatch: 0x{found:02x}");
            return Err(Error::WrongDevice {
                address: self.address,
                expected: MPU9250_WHO_AM_I,
                found,
            });
        }

        self.write_mpu(Register::PwrMgmt1, 0x00)?;
        delay.delay_ms(100);
        self.write_mpu(Register::PwrMgmt1, 0x01)?;
        delay.delay_ms(200);

        self.scale = scale;
        self.configure_sampling()?;
        self.write_full_scale()?;

        self.write_mpu(Register::IntPinCfg, INT_PIN_CFG_BYPASS)?;
        self.write_mpu(Register::IntEnable, INT_STATUS_DATA_READY)?;
        delay.delay_ms(100);
        debug!("MPU9250 initialized with {scale:?}");

        self.init_magnetometer(delay)?;
        Ok(())
    }

    /// Bring up the AK8963 and read its factory sensitivity adjustment
    ///
    /// Requires the I2C bypass enabled by [`Mpu9250::init`]. The adjustment is
    /// stored in the calibration profile and returned.
    pub fn init_magnetometer(&mut self, delay: &mut impl DelayNs) -> Result<Vector3<f64>, Error<I::Error>> {
        let found = self.mag_who_am_i()?;
        if found != AK8963_WHO_AM_I {
            warn!("AK8963 identity mismatch: 0x{found:02x}");
            return Err(Error::WrongDevice {
                address: AK8963_ADDRESS,
                expected: AK8963_WHO_AM_I,
                found,
            });
        }

        self.write_mag(MagRegister::Cntl1, MAG_POWER_DOWN)?;
        delay.delay_ms(10);
        self.write_mag(MagRegister::Cntl1, MAG_FUSE_ROM)?;
        delay.delay_ms(10);

        let mut asa = [0u8; 3];
        self.read_registers(AK8963_ADDRESS, MagRegister::Asax.addr(), &mut asa)?;
        let sensitivity = mag_sensitivity(asa);
        self.calibration.mag_sensitivity = sensitivity;
        debug!("AK8963 sensitivity adjustment {sensitivity:?}");

        self.write_mag_mode(delay)?;
        Ok(sensitivity)
    }

    /// Change the full-scale ranges and magnetometer mode
    ///
    /// Biases are kept in physical units and stay valid across range changes.
    pub fn configure(&mut self, delay: &mut impl DelayNs, scale: ScaleProfile) -> Result<(), Error<I::Error>> {
        self.scale = scale;
        self.write_full_scale()?;
        self.write_mag_mode(delay)?;
        debug!("reconfigured to {scale:?}");
        Ok(())
    }

    fn configure_sampling(&mut self) -> Result<(), Error<I::Error>> {
        // 41 Hz gyro bandwidth, 200 Hz sample rate
        self.write_mpu(Register::Config, 0x03)?;
        self.write_mpu(Register::SmplrtDiv, 0x04)?;
        self.modify_register(Register::AccelConfig2, |value| (value & !ACCEL_DLPF_MASK) | 0x03)
    }

    fn write_full_scale(&mut self) -> Result<(), Error<I::Error>> {
        let gyro = self.scale.gyro.bits() << 3;
        let accel = self.scale.accel.bits() << 3;
        self.modify_register(Register::GyroConfig, |value| {
            (value & !(FCHOICE_B_MASK | FULL_SCALE_MASK | SELF_TEST_ENABLE)) | gyro
        })?;
        self.modify_register(Register::AccelConfig, |value| {
            (value & !(FULL_SCALE_MASK | SELF_TEST_ENABLE)) | accel
        })
    }

    fn write_mag_mode(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<I::Error>> {
        self.write_mag(MagRegister::Cntl1, MAG_POWER_DOWN)?;
        delay.delay_ms(10);
        let control = (self.scale.mag.bits() << 4) | self.scale.mag_mode.bits();
        self.write_mag(MagRegister::Cntl1, control)?;
        delay.delay_ms(10);
        Ok(())
    }

    /// Current full-scale selection
    pub fn scale(&self) -> ScaleProfile {
        self.scale
    }

    /// Current calibration
    pub fn calibration(&self) -> &CalibrationProfile {
        &self.calibration
    }

    /// Replace the calibration, e.g. with one restored by the caller
    pub fn set_calibration(&mut self, calibration: CalibrationProfile) {
        self.calibration = calibration;
    }

    /// Outcome of the most recent magnetometer read
    pub fn mag_status(&self) -> MagStatus {
        self.mag_status
    }

    /// Magnetometer samples discarded because of sensor overflow
    pub fn mag_overflows(&self) -> u32 {
        self.mag_overflows
    }

    /// Whether a new accelerometer/gyroscope sample is waiting
    pub fn data_ready(&mut self) -> Result<bool, Error<I::Error>> {
        let status = self.read_register(self.address, Register::IntStatus.addr())?;
        Ok(status & INT_STATUS_DATA_READY != 0)
    }

    /// Raw accelerometer counts
    pub fn read_accel_raw(&mut self) -> Result<Vector3<i16>, Error<I::Error>> {
        let mut buf = [0u8; 6];
        self.read_registers(self.address, Register::AccelXoutH.addr(), &mut buf)?;
        Ok(decode_be(&buf))
    }

    /// Raw gyroscope counts
    pub fn read_gyro_raw(&mut self) -> Result<Vector3<i16>, Error<I::Error>> {
        let mut buf = [0u8; 6];
        self.read_registers(self.address, Register::GyroXoutH.addr(), &mut buf)?;
        Ok(decode_be(&buf))
    }

    /// Raw temperature count
    pub fn read_temperature_raw(&mut self) -> Result<i16, Error<I::Error>> {
        let mut buf = [0u8; 2];
        self.read_registers(self.address, Register::TempOutH.addr(), &mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    /// Raw magnetometer counts in the AK8963's own axes
    ///
    /// Last-known-good policy: when no new measurement is ready, or the
    /// measurement overflowed, the previous good sample is returned and
    /// [`Mpu9250::mag_status`] says why. Overflows are also counted. Neither
    /// case is an error.
    pub fn read_mag_raw(&mut self) -> Result<Vector3<i16>, Error<I::Error>> {
        let st1 = self.read_register(AK8963_ADDRESS, MagRegister::St1.addr())?;
        if st1 & ST1_DATA_READY == 0 {
            self.mag_status = MagStatus::NotReady;
            return Ok(self.last_mag);
        }

        // Reading through ST2 releases the data registers for the next measurement
        let mut buf = [0u8; 7];
        self.read_registers(AK8963_ADDRESS, MagRegister::Hxl.addr(), &mut buf)?;
        if buf[6] & ST2_OVERFLOW != 0 {
            self.mag_status = MagStatus::Overflow;
            self.mag_overflows = self.mag_overflows.saturating_add(1);
            warn!("magnetometer overflow, keeping previous sample");
            return Ok(self.last_mag);
        }

        self.last_mag = decode_le(&buf[..6]);
        self.mag_status = MagStatus::Fresh;
        Ok(self.last_mag)
    }

    /// Accelerometer, temperature and gyroscope in one burst, then the magnetometer
    pub fn read_sample(&mut self) -> Result<SensorSample, Error<I::Error>> {
        let mut buf = [0u8; 14];
        self.read_registers(self.address, Register::AccelXoutH.addr(), &mut buf)?;
        let accel = decode_be(&buf[0..6]);
        let temperature = i16::from_be_bytes([buf[6], buf[7]]);
        let gyro = decode_be(&buf[8..14]);
        let mag = self.read_mag_raw()?;
        trace!("sample accel {accel:?} gyro {gyro:?} mag {mag:?} temp {temperature}");

        Ok(SensorSample {
            accel,
            gyro,
            mag,
            temperature,
        })
    }

    /// Acceleration in g with bias removed
    pub fn read_accel(&mut self) -> Result<Vector3<f64>, Error<I::Error>> {
        let raw = self.read_accel_raw()?;
        Ok(self.calibration.accel(raw, &self.scale))
    }

    /// Angular rate in deg/s with bias removed
    pub fn read_gyro(&mut self) -> Result<Vector3<f64>, Error<I::Error>> {
        let raw = self.read_gyro_raw()?;
        Ok(self.calibration.gyro(raw, &self.scale))
    }

    /// Magnetic field in µT, AK8963 axes, fully corrected
    pub fn read_mag(&mut self) -> Result<Vector3<f64>, Error<I::Error>> {
        let raw = self.read_mag_raw()?;
        Ok(self.calibration.mag(raw, &self.scale))
    }

    /// Die temperature in °C
    pub fn read_temperature(&mut self) -> Result<f64, Error<I::Error>> {
        let raw = self.read_temperature_raw()?;
        Ok(temperature_celsius(raw))
    }

    /// Factory self-test of accelerometer and gyroscope
    ///
    /// Averages outputs with and without the internal excitation at ±2 g and
    /// ±250 deg/s and compares the difference with the factory response from
    /// the trim registers. The previous sampling and range configuration is
    /// restored afterwards.
    pub fn run_self_test(&mut self, delay: &mut impl DelayNs) -> Result<SelfTestReport, Error<I::Error>> {
        self.write_mpu(Register::SmplrtDiv, 0x00)?;
        self.write_mpu(Register::Config, 0x02)?;
        self.write_mpu(Register::GyroConfig, 0x00)?;
        self.write_mpu(Register::AccelConfig2, 0x02)?;
        self.write_mpu(Register::AccelConfig, 0x00)?;

        let normal = self.collect_means(SELF_TEST_SAMPLES)?;

        self.write_mpu(Register::AccelConfig, SELF_TEST_ENABLE)?;
        self.write_mpu(Register::GyroConfig, SELF_TEST_ENABLE)?;
        delay.delay_ms(SELF_TEST_SETTLE_MS);

        let excited = self.collect_means(SELF_TEST_SAMPLES)?;

        self.write_mpu(Register::GyroConfig, 0x00)?;
        self.write_mpu(Register::AccelConfig, 0x00)?;
        delay.delay_ms(SELF_TEST_SETTLE_MS);

        let mut accel_codes = [0u8; 3];
        self.read_registers(self.address, Register::SelfTestXAccel.addr(), &mut accel_codes)?;
        let mut gyro_codes = [0u8; 3];
        self.read_registers(self.address, Register::SelfTestXGyro.addr(), &mut gyro_codes)?;

        let report = SelfTestReport {
            accel: self_test_deviation(normal.0, excited.0, accel_codes, 0),
            gyro: self_test_deviation(normal.1, excited.1, gyro_codes, 0),
        };

        self.configure_sampling()?;
        self.write_full_scale()?;

        debug!("self-test deviation {:?}", report.to_array());
        self.calibration.self_test = report;
        Ok(report)
    }

    fn collect_means(&mut self, samples: u16) -> Result<(Vector3<f64>, Vector3<f64>), Error<I::Error>> {
        let mut accumulator = MeanAccumulator::new();
        for _ in 0..samples {
            let accel = self.read_accel_raw()?;
            let gyro = self.read_gyro_raw()?;
            accumulator.add(&accel, &gyro);
        }
        Ok(accumulator.means())
    }

    /// Stationary gyroscope and accelerometer bias calibration
    ///
    /// Blocks for roughly `(warmup_samples + samples) * sample_delay_us`. The
    /// sensor must stay still in the orientation named by `settings.gravity`;
    /// movement is not detected and ends up in the biases. The result is stored
    /// in the calibration profile and returned.
    pub fn calibrate_inertial(
        &mut self,
        delay: &mut impl DelayNs,
        settings: &InertialCalibrationSettings,
    ) -> Result<InertialBias, Error<I::Error>> {
        for _ in 0..settings.warmup_samples {
            _ = self.read_accel_raw()?;
            _ = self.read_gyro_raw()?;
            delay.delay_us(settings.sample_delay_us);
        }

        let mut accumulator = MeanAccumulator::new();
        for _ in 0..settings.samples {
            let accel = self.read_accel_raw()?;
            let gyro = self.read_gyro_raw()?;
            accumulator.add(&accel, &gyro);
            delay.delay_us(settings.sample_delay_us);
        }

        let bias = accumulator.biases(&self.scale, settings.gravity);
        self.calibration.gyro_bias = bias.gyro;
        self.calibration.accel_bias = bias.accel;
        debug!("gyro bias {:?} deg/s, accel bias {:?} g", bias.gyro, bias.accel);
        Ok(bias)
    }

    /// Magnetometer hard and soft iron calibration
    ///
    /// Blocks for `samples * sample_delay_ms` while the sensor is turned
    /// through as many headings as possible. Only fresh samples count towards
    /// the extremes. The result is stored in the calibration profile and
    /// returned.
    pub fn calibrate_magnetometer(
        &mut self,
        delay: &mut impl DelayNs,
        settings: &MagCalibrationSettings,
    ) -> Result<MagCorrection, Error<I::Error>> {
        let mut extrema = MagExtrema::new();
        for _ in 0..settings.samples {
            let sample = self.read_mag_raw()?;
            if self.mag_status == MagStatus::Fresh {
                extrema.add(&sample);
            }
            delay.delay_ms(settings.sample_delay_ms);
        }

        let correction = extrema.correction(self.scale.mag_resolution(), self.calibration.mag_sensitivity);
        self.calibration.mag_bias = correction.bias;
        self.calibration.mag_scale = correction.scale;
        debug!(
            "mag bias {:?} uT, scale {:?} from {} samples",
            correction.bias,
            correction.scale,
            extrema.count()
        );
        Ok(correction)
    }
}

/// Raw count to °C
pub fn temperature_celsius(raw: i16) -> f64 {
    f64::from(raw) / TEMPERATURE_SENSITIVITY + TEMPERATURE_OFFSET
}

/// Three big-endian signed 16-bit values, high byte first
fn decode_be(data: &[u8]) -> Vector3<i16> {
    Vector3::new(
        i16::from_be_bytes([data[0], data[1]]),
        i16::from_be_bytes([data[2], data[3]]),
        i16::from_be_bytes([data[4], data[5]]),
    )
}

/// Three little-endian signed 16-bit values, low byte first
fn decode_le(data: &[u8]) -> Vector3<i16> {
    Vector3::new(
        i16::from_le_bytes([data[0], data[1]]),
        i16::from_le_bytes([data[2], data[3]]),
        i16::from_le_bytes([data[4], data[5]]),
    )
}
