//! Blocking driver for Winbond W25-series SPI NOR flash.
//!
//! The chip is reached through an [`embedded_hal::spi::SpiDevice`], which owns
//! the chip-select line and releases it after every transaction, and timed
//! through an [`embedded_hal::delay::DelayNs`].
//!
//! Data is addressed by page (256 bytes) and offset within the page. Whether
//! an access may run past the end of its page is decided by
//! [`Config::page_overflow`].
//!
//! ```ignore
//! let mut flash = FlashSpi::new(spi, delay, Config::default());
//! flash.init()?;
//! flash.write_value(10, 254, &0xCAFE_F00Du32, true)?;
//! let back: u32 = flash.read_value(10, 254)?;
//! ```
#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod address;
pub mod comms;
pub mod config;
pub mod dump;
pub mod error;
pub mod identification;
mod pages;
pub mod traits;
pub mod value;

#[cfg(test)]
mod sim;

pub use address::{Geometry, PAGE_SIZE};
pub use comms::{FlashSpi, Status, Status2};
pub use config::{Config, Timeouts};
pub use dump::{DumpFormat, PageDump};
pub use error::Error;
pub use identification::{Identification, KnownDevice, WINBOND_W25};
pub use traits::HardwareFlashDevice;
pub use value::FlashValue;
