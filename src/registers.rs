//! MPU9250 and AK8963 register maps
//!
//! Only the registers used by this crate are listed. The AK8963 magnetometer is
//! reached directly on the bus once the MPU9250 I2C bypass is enabled.

/// MPU9250 address with AD0 low
pub const MPU9250_ADDRESS: u8 = 0x68;
/// MPU9250 address with AD0 high
pub const MPU9250_ADDRESS_ALT: u8 = 0x69;
/// AK8963 address (fixed)
pub const AK8963_ADDRESS: u8 = 0x0C;

/// Expected `WHO_AM_I` value of the MPU9250
pub const MPU9250_WHO_AM_I: u8 = 0x71;
/// Expected `WIA` value of the AK8963
pub const AK8963_WHO_AM_I: u8 = 0x48;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    /// Gyro self-test trim codes (X, Y, Z follow)
    SelfTestXGyro = 0x00,
    SelfTestYGyro = 0x01,
    SelfTestZGyro = 0x02,
    /// Accel self-test trim codes (X, Y, Z follow)
    SelfTestXAccel = 0x0D,
    SelfTestYAccel = 0x0E,
    SelfTestZAccel = 0x0F,
    SmplrtDiv = 0x19,
    /// DLPF and external sync
    Config = 0x1A,
    /// `[7:5]` self-test enable, `[4:3]` full scale, `[1:0]` Fchoice_b
    GyroConfig = 0x1B,
    /// `[7:5]` self-test enable, `[4:3]` full scale
    AccelConfig = 0x1C,
    /// `[3]` Fchoice_b, `[2:0]` DLPF
    AccelConfig2 = 0x1D,
    IntPinCfg = 0x37,
    IntEnable = 0x38,
    /// Bit 0 is raw data ready
    IntStatus = 0x3A,
    AccelXoutH = 0x3B,
    TempOutH = 0x41,
    GyroXoutH = 0x43,
    PwrMgmt1 = 0x6B,
    WhoAmI = 0x75,
}

impl Register {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MagRegister {
    /// Device ID
    Wia = 0x00,
    /// Bit 0 is data ready
    St1 = 0x02,
    /// First of six little-endian output bytes
    Hxl = 0x03,
    /// Bit 3 is magnetic sensor overflow; must be read to end a measurement
    St2 = 0x09,
    /// `[4]` output width, `[3:0]` mode
    Cntl1 = 0x0A,
    /// Fuse ROM sensitivity adjustment (Y, Z follow)
    Asax = 0x10,
}

impl MagRegister {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// `INT_STATUS` raw data ready
pub const INT_STATUS_DATA_READY: u8 = 0x01;
/// `ST1` data ready
pub const ST1_DATA_READY: u8 = 0x01;
/// `ST2` magnetic sensor overflow
pub const ST2_OVERFLOW: u8 = 0x08;
/// Self-test excitation on all three axes in `GYRO_CONFIG` / `ACCEL_CONFIG`
pub const SELF_TEST_ENABLE: u8 = 0xE0;
/// Full-scale field mask in `GYRO_CONFIG` / `ACCEL_CONFIG`
pub const FULL_SCALE_MASK: u8 = 0x18;
/// Fchoice_b field in `GYRO_CONFIG`
pub const FCHOICE_B_MASK: u8 = 0x03;
/// DLPF field in `ACCEL_CONFIG2`
pub const ACCEL_DLPF_MASK: u8 = 0x0F;
/// Bypass the internal I2C master so the AK8963 shows up on the host bus
pub const INT_PIN_CFG_BYPASS: u8 = 0x22;
/// `CNTL1` power down
pub const MAG_POWER_DOWN: u8 = 0x00;
/// `CNTL1` fuse ROM access
pub const MAG_FUSE_ROM: u8 = 0x0F;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_addresses() {
        assert_eq!(Register::SelfTestXAccel.addr(), 0x0D);
        assert_eq!(Register::IntStatus.addr(), 0x3A);
        assert_eq!(Register::PwrMgmt1.addr(), 0x6B);
        assert_eq!(Register::WhoAmI.addr(), 0x75);
        assert_eq!(MagRegister::St2.addr(), 0x09);
        assert_eq!(MagRegister::Cntl1.addr(), 0x0A);
        assert_eq!(MagRegister::Asax.addr(), 0x10);
    }
}
