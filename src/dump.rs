//! Human readable page dumps for bring-up and debugging.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::address::PAGE_SIZE;
use crate::comms::FlashSpi;
use crate::error::Error;

const HEX_ROW: usize = 16;
const CHAR_ROW: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DumpFormat {
    /// Two hex digits per byte, 16 bytes per row.
    Hex,
    /// Printable ASCII, `.` for everything else, 64 bytes per row.
    Char,
}

/// Snapshot of one page, rendered through [`fmt::Display`].
#[derive(Clone)]
pub struct PageDump {
    pub page: u16,
    pub format: DumpFormat,
    pub data: [u8; PAGE_SIZE],
}

impl fmt::Display for PageDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Page {}:", self.page)?;
        match self.format {
            DumpFormat::Hex => {
                for (row, bytes) in self.data.chunks(HEX_ROW).enumerate() {
                    write!(f, "{:02x}:", row * HEX_ROW)?;
                    for b in bytes {
                        write!(f, " {:02x}", b)?;
                    }
                    writeln!(f)?;
                }
            }
            DumpFormat::Char => {
                for bytes in self.data.chunks(CHAR_ROW) {
                    for &b in bytes {
                        let c = if b.is_ascii_graphic() || b == b' ' {
                            b as char
                        } else {
                            '.'
                        };
                        write!(f, "{}", c)?;
                    }
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for PageDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageDump")
            .field("page", &self.page)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl<SPI, D> FlashSpi<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    pub fn dump_page(&mut self, page: u16, format: DumpFormat) -> Result<PageDump, Error<SPI>> {
        let mut data = [0u8; PAGE_SIZE];
        self.read_page(page, &mut data)?;
        Ok(PageDump { page, format, data })
    }

    /// Reads every page in order and hands each one to `sink`.
    pub fn dump_all_pages<F>(&mut self, format: DumpFormat, mut sink: F) -> Result<(), Error<SPI>>
    where
        F: FnMut(&PageDump),
    {
        let max_page = self.ready_geometry()?.max_page();
        for page in 0..=max_page {
            sink(&self.dump_page(page, format)?);
        }
        Ok(())
    }
}
