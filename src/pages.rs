//! Page/offset addressed reads, writes and erases, with optional read-back
//! verification.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::address::{Geometry, PageChunks, WrapChunks, PAGE_SIZE};
use crate::comms::FlashSpi;
use crate::error::Error;
use crate::traits::HardwareFlashDevice;

/// Stack buffer used while comparing written data against the device.
const VERIFY_CHUNK: usize = 32;

impl<SPI, D> FlashSpi<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    /// Reads `buf.len()` bytes starting at byte `offset` of `page`.
    ///
    /// With page overflow enabled the read continues through the following
    /// pages and wraps to page 0 at the end of the device.
    pub fn read_bytes(&mut self, page: u16, offset: u8, buf: &mut [u8]) -> Result<(), Error<SPI>> {
        let geometry = self.ready_geometry()?;
        let address = geometry.span(page, offset, buf.len(), self.config().page_overflow)?;
        self.read_span(&geometry, address, buf)
    }

    pub fn read_byte(&mut self, page: u16, offset: u8) -> Result<u8, Error<SPI>> {
        let mut buf = [0u8; 1];
        self.read_bytes(page, offset, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read_page(&mut self, page: u16, buf: &mut [u8; PAGE_SIZE]) -> Result<(), Error<SPI>> {
        self.read_bytes(page, 0, buf)
    }

    /// Programs `data` starting at byte `offset` of `page`.
    ///
    /// A span crossing the end of the page continues at the start of the next
    /// page when page overflow is enabled, one page program per page touched.
    /// Otherwise the whole request is refused with
    /// [`Error::PageOverflowNotAllowed`] before anything is sent.
    pub fn write_bytes(
        &mut self,
        page: u16,
        offset: u8,
        data: &[u8],
        verify: bool,
    ) -> Result<(), Error<SPI>> {
        let geometry = self.ready_geometry()?;
        let address = geometry.span(page, offset, data.len(), self.config().page_overflow)?;
        for (addr, range) in PageChunks::new(&geometry, address, data.len()) {
            if range.start > 0 {
                trace!("Spilling into page {}", addr / PAGE_SIZE as u32);
            }
            self.page_program(addr, &data[range])?;
        }
        if verify {
            self.verify_span(&geometry, address, data)?;
        }
        Ok(())
    }

    pub fn write_byte(
        &mut self,
        page: u16,
        offset: u8,
        value: u8,
        verify: bool,
    ) -> Result<(), Error<SPI>> {
        self.write_bytes(page, offset, &[value], verify)
    }

    /// Programs a whole page from offset 0. Never crosses a page boundary.
    pub fn write_page(
        &mut self,
        page: u16,
        buf: &[u8; PAGE_SIZE],
        verify: bool,
    ) -> Result<(), Error<SPI>> {
        self.write_bytes(page, 0, buf, verify)
    }

    /// Erases the 4 KiB sector containing `page`.
    pub fn erase_sector(&mut self, page: u16) -> Result<(), Error<SPI>> {
        let address = self.ready_geometry()?.address(page, 0)?;
        self.sector_erase(address)
    }

    /// Erases the 32 KiB block containing `page`.
    pub fn erase_block_32k(&mut self, page: u16) -> Result<(), Error<SPI>> {
        let address = self.ready_geometry()?.address(page, 0)?;
        self.block_erase_32k(address)
    }

    /// Erases the 64 KiB block containing `page`.
    pub fn erase_block_64k(&mut self, page: u16) -> Result<(), Error<SPI>> {
        let address = self.ready_geometry()?.address(page, 0)?;
        self.block_erase_64k(address)
    }

    pub fn erase_chip(&mut self) -> Result<(), Error<SPI>> {
        self.chip_erase()
    }

    /// Reads a validated span, splitting only where it wraps past the device end.
    pub(crate) fn read_span(
        &mut self,
        geometry: &Geometry,
        address: u32,
        buf: &mut [u8],
    ) -> Result<(), Error<SPI>> {
        for (addr, range) in WrapChunks::new(geometry, address, buf.len()) {
            self.read(addr, &mut buf[range])?;
        }
        Ok(())
    }

    /// Re-reads the span written at `address` and compares it byte for byte.
    pub(crate) fn verify_span(
        &mut self,
        geometry: &Geometry,
        address: u32,
        expected: &[u8],
    ) -> Result<(), Error<SPI>> {
        let mut buf = [0u8; VERIFY_CHUNK];
        for (start, range) in WrapChunks::new(geometry, address, expected.len()) {
            let mut addr = start;
            for want in expected[range].chunks(VERIFY_CHUNK) {
                let got = &mut buf[..want.len()];
                self.read(addr, got)?;
                if let Some(i) = want.iter().zip(got.iter()).position(|(w, g)| w != g) {
                    let address = addr + i as u32;
                    warn!(
                        "Verification failed at {}: wrote {}, read {}",
                        address, want[i], got[i]
                    );
                    return Err(Error::VerificationMismatch {
                        address,
                        expected: want[i],
                        found: got[i],
                    });
                }
                addr += want.len() as u32;
            }
        }
        Ok(())
    }
}
