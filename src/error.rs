//! Error types for sensor operations

use core::fmt::{self, Debug, Display, Formatter};

/// Error for sensor operations, generic over the bus error type.
///
/// Only conditions the caller can act on are errors. Skipped magnetometer
/// samples, degenerate time steps and clamped numerical domains are handled in
/// place and reported through counters instead.
#[derive(Debug)]
pub enum Error<E> {
    /// A bus transaction did not complete
    Bus(E),
    /// Identity register did not hold the expected value
    WrongDevice {
        /// Bus address of the device that answered
        address: u8,
        expected: u8,
        found: u8,
    },
}

impl<E: Debug> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus transaction failed: {e:?}"),
            Self::WrongDevice {
                address,
                expected,
                found,
            } => write!(
                f,
                "unexpected device at 0x{address:02x}: expected id 0x{expected:02x}, found 0x{found:02x}"
            ),
        }
    }
}

impl<E: Debug> core::error::Error for Error<E> {}
