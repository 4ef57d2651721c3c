use core::fmt::{self, Debug};
use embedded_hal::spi::SpiDevice;

use crate::address::AddressError;
use crate::identification::Identification;

/// The error type used by this library.
///
/// This can encapsulate an SPI error, and adds its own protocol errors
/// on top of that.
pub enum Error<SPI: SpiDevice> {
    /// An SPI transfer failed.
    Spi(SPI::Error),
    /// The computed address is past the end of the device, or the page number
    /// exceeds the last page.
    AddressOutOfRange { address: u32 },
    /// The access would cross a page boundary and page overflow is disabled.
    PageOverflowNotAllowed { address: u32, len: usize },
    /// The BUSY bit did not clear within the readiness budget.
    BusyTimeout,
    /// Reading back a freshly written span returned different data.
    /// The write itself is not rolled back.
    VerificationMismatch { address: u32, expected: u8, found: u8 },
    /// The JEDEC ID is not in the configured identity table.
    UnrecognizedDevice(Identification),
    /// The identity table entry for the device declares a capacity that is
    /// zero, not page aligned, or too large for 3-byte addressing.
    UnsupportedCapacity { capacity: u32 },
    /// A data operation was attempted before a successful `init`.
    NotInitialized,
    /// The device is in deep power-down and ignores everything but release.
    PoweredDown,
}

impl<SPI: SpiDevice> From<AddressError> for Error<SPI> {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::OutOfRange { address } => Error::AddressOutOfRange { address },
            AddressError::PageOverflow { address, len } => {
                Error::PageOverflowNotAllowed { address, len }
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl<SPI: SpiDevice> defmt::Format for Error<SPI>
where
    SPI::Error: Debug,
{
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Spi(_spi) => defmt::write!(fmt, "Error::Spi"),
            Error::AddressOutOfRange { address } => {
                defmt::write!(fmt, "Error::AddressOutOfRange({=u32:#x})", address)
            }
            Error::PageOverflowNotAllowed { address, len } => defmt::write!(
                fmt,
                "Error::PageOverflowNotAllowed({=u32:#x}, len {=usize})",
                address,
                len
            ),
            Error::BusyTimeout => defmt::write!(fmt, "Error::BusyTimeout"),
            Error::VerificationMismatch {
                address,
                expected,
                found,
            } => defmt::write!(
                fmt,
                "Error::VerificationMismatch({=u32:#x}: wrote {=u8:#x}, read {=u8:#x})",
                address,
                expected,
                found
            ),
            Error::UnrecognizedDevice(id) => {
                defmt::write!(fmt, "Error::UnrecognizedDevice({})", id)
            }
            Error::UnsupportedCapacity { capacity } => {
                defmt::write!(fmt, "Error::UnsupportedCapacity({=u32})", capacity)
            }
            Error::NotInitialized => defmt::write!(fmt, "Error::NotInitialized"),
            Error::PoweredDown => defmt::write!(fmt, "Error::PoweredDown"),
        }
    }
}

impl<SPI: SpiDevice> Debug for Error<SPI>
where
    SPI::Error: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(spi) => write!(f, "Error::Spi({:?})", spi),
            Error::AddressOutOfRange { address } => {
                write!(f, "Error::AddressOutOfRange({:#08x})", address)
            }
            Error::PageOverflowNotAllowed { address, len } => {
                write!(f, "Error::PageOverflowNotAllowed({:#08x}, len {})", address, len)
            }
            Error::BusyTimeout => f.write_str("Error::BusyTimeout"),
            Error::VerificationMismatch {
                address,
                expected,
                found,
            } => write!(
                f,
                "Error::VerificationMismatch({:#08x}: wrote {:#04x}, read {:#04x})",
                address, expected, found
            ),
            Error::UnrecognizedDevice(id) => write!(f, "Error::UnrecognizedDevice({:?})", id),
            Error::UnsupportedCapacity { capacity } => {
                write!(f, "Error::UnsupportedCapacity({})", capacity)
            }
            Error::NotInitialized => f.write_str("Error::NotInitialized"),
            Error::PoweredDown => f.write_str("Error::PoweredDown"),
        }
    }
}
