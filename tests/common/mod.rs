//! Simulated MPU9250 with its AK8963 behind the I2C bypass

#![allow(dead_code)]

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use mpu9250_ahrs::registers::{AK8963_ADDRESS, MPU9250_ADDRESS};
use nalgebra::Vector3;

/// Next magnetometer measurement outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagEvent {
    Sample(Vector3<i16>),
    Overflow(Vector3<i16>),
    NotReady,
}

/// Delay that returns immediately
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Register file of both parts plus the values their output registers report
///
/// Output registers are generated from the public fields on every read, so a
/// test sets `accel`, `gyro` or `mag` and the driver sees them on its next
/// transaction. Everything else reads back whatever was last written.
pub struct SimulatedImu {
    pub mpu: [u8; 128],
    pub ak: [u8; 32],
    pub accel: Vector3<i16>,
    pub gyro: Vector3<i16>,
    pub temperature: i16,
    pub mag: Vector3<i16>,
    /// Outcomes the AK8963 produces next, one per status poll
    pub mag_queue: VecDeque<MagEvent>,
    /// Added to the outputs while self-test excitation is enabled
    pub accel_self_test_response: Vector3<i16>,
    pub gyro_self_test_response: Vector3<i16>,
    pub data_ready: bool,
    pub mag_ready: bool,
    pub mag_overflow: bool,
    /// Fail every transaction
    pub fail: bool,
    /// `(device, register, value)` for every register written
    pub writes: Vec<(u8, u8, u8)>,
}

impl Default for SimulatedImu {
    fn default() -> Self {
        let mut mpu = [0u8; 128];
        mpu[0x75] = 0x71;
        // Factory trim code 1 for every axis
        mpu[0x00..=0x02].fill(1);
        mpu[0x0D..=0x0F].fill(1);

        let mut ak = [0u8; 32];
        ak[0x00] = 0x48;
        ak[0x10..=0x12].fill(128);

        Self {
            mpu,
            ak,
            accel: Vector3::new(0, 0, 16384),
            gyro: Vector3::zeros(),
            temperature: 0,
            mag: Vector3::zeros(),
            mag_queue: VecDeque::new(),
            accel_self_test_response: Vector3::zeros(),
            gyro_self_test_response: Vector3::zeros(),
            data_ready: true,
            mag_ready: true,
            mag_overflow: false,
            fail: false,
            writes: Vec::new(),
        }
    }
}

impl SimulatedImu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the magnetometer report `samples` in order, one per read
    pub fn queue_mag(&mut self, samples: impl IntoIterator<Item = Vector3<i16>>) {
        self.mag_queue.extend(samples.into_iter().map(MagEvent::Sample));
    }

    fn next_mag_event(&mut self) {
        match self.mag_queue.pop_front() {
            Some(MagEvent::Sample(value)) => {
                self.mag = value;
                self.mag_ready = true;
                self.mag_overflow = false;
            }
            Some(MagEvent::Overflow(value)) => {
                self.mag = value;
                self.mag_ready = true;
                self.mag_overflow = true;
            }
            Some(MagEvent::NotReady) => self.mag_ready = false,
            None => {}
        }
    }

    fn excited(&self, register: u8) -> bool {
        self.mpu[register as usize] & 0xE0 == 0xE0
    }

    fn read_mpu(&self, register: u8) -> u8 {
        let word = |v: Vector3<i16>, base: u8| {
            let offset = usize::from(register - base);
            v[offset / 2].to_be_bytes()[offset % 2]
        };

        match register {
            0x3A => u8::from(self.data_ready),
            0x3B..=0x40 => {
                let mut accel = self.accel;
                if self.excited(0x1C) {
                    accel = accel.zip_map(&self.accel_self_test_response, i16::saturating_add);
                }
                word(accel, 0x3B)
            }
            0x41..=0x42 => self.temperature.to_be_bytes()[usize::from(register - 0x41)],
            0x43..=0x48 => {
                let mut gyro = self.gyro;
                if self.excited(0x1B) {
                    gyro = gyro.zip_map(&self.gyro_self_test_response, i16::saturating_add);
                }
                word(gyro, 0x43)
            }
            _ => self.mpu[usize::from(register)],
        }
    }

    fn read_ak(&mut self, register: u8) -> u8 {
        match register {
            0x02 => {
                self.next_mag_event();
                u8::from(self.mag_ready)
            }
            0x03..=0x08 => {
                let offset = usize::from(register - 0x03);
                self.mag[offset / 2].to_le_bytes()[offset % 2]
            }
            0x09 => {
                if self.mag_overflow {
                    0x08
                } else {
                    0x00
                }
            }
            _ => self.ak[usize::from(register)],
        }
    }

    fn read(&mut self, device: u8, register: u8) -> Result<u8, ErrorKind> {
        match device {
            MPU9250_ADDRESS => Ok(self.read_mpu(register)),
            AK8963_ADDRESS => Ok(self.read_ak(register)),
            _ => Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
        }
    }

    fn write(&mut self, device: u8, register: u8, value: u8) -> Result<(), ErrorKind> {
        match device {
            MPU9250_ADDRESS => self.mpu[usize::from(register)] = value,
            AK8963_ADDRESS => self.ak[usize::from(register)] = value,
            _ => return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
        }
        self.writes.push((device, register, value));
        Ok(())
    }

    /// Last value written to an MPU9250 register, if any
    pub fn last_write(&self, register: u8) -> Option<u8> {
        self.writes
            .iter()
            .rev()
            .find(|(device, r, _)| *device == MPU9250_ADDRESS && *r == register)
            .map(|(_, _, value)| *value)
    }
}

impl ErrorType for SimulatedImu {
    type Error = ErrorKind;
}

impl I2c for SimulatedImu {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        if self.fail {
            return Err(ErrorKind::Bus);
        }

        let mut pointer = None;
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    let (&register, values) = bytes.split_first().ok_or(ErrorKind::Other)?;
                    for (offset, &value) in values.iter().enumerate() {
                        self.write(address, register + offset as u8, value)?;
                    }
                    pointer = Some(register);
                }
                Operation::Read(buf) => {
                    let start = pointer.ok_or(ErrorKind::Other)?;
                    for (offset, byte) in buf.iter_mut().enumerate() {
                        *byte = self.read(address, start + offset as u8)?;
                    }
                }
            }
        }
        Ok(())
    }
}
