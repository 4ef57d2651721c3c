/// Refer to datasheet:
/// https://datasheet.lcsc.com/lcsc/1912111437_Winbond-Elec-W25Q128JVSIQ_C113767.pdf
/// The command set and section numbers are shared by the smaller W25Q parts.
use crate::address::{Geometry, BLOCK_32K_SIZE, BLOCK_64K_SIZE, SECTOR_SIZE};
use crate::config::Config;
use crate::error::Error;
use crate::identification::Identification;
use crate::traits::HardwareFlashDevice;
use core::fmt::Debug;
use core::time::Duration;
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{Operation, SpiDevice};

/// tSUS: suspend to BUSY cleared.
const SUSPEND_LATENCY: Duration = Duration::from_micros(20);
/// tDP: /CS high to power-down mode.
const POWER_DOWN_LATENCY_US: u32 = 3;
/// tRES1: /CS high to standby after release.
const RELEASE_LATENCY_US: u32 = 3;
/// tRST: no instruction is accepted during the reset period.
const RESET_LATENCY_US: u32 = 30;

pub struct FlashSpi<SPI, D> {
    spi: SPI,
    delay: D,
    config: Config,
    geometry: Option<Geometry>,
    powered_down: bool,
}

impl<SPI, D> Debug for FlashSpi<SPI, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlashSpi")
            .field("geometry", &self.geometry)
            .field("page_overflow", &self.config.page_overflow)
            .field("powered_down", &self.powered_down)
            .finish()
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Opcode {
    /// Read the 8-bit manufacturer and device IDs.
    ReadMfDId = 0x90,
    /// Read 16-bit manufacturer ID and 8-bit device ID.
    ReadJedecId = 0x9F,
    /// Set the write enable latch.
    WriteEnable = 0x06,
    /// Clear the write enable latch.
    WriteDisable = 0x04,
    /// Read the 8-bit status register.
    ReadStatus = 0x05,
    ReadStatus2 = 0x35,
    Read = 0x03,
    PageProg = 0x02,
    SectorErase = 0x20,
    BlockErase32K = 0x52,
    BlockErase64K = 0xD8,
    ChipErase = 0xC7,
    Suspend = 0x75,
    Resume = 0x7A,
    PowerDown = 0xB9,
    ReleasePowerDown = 0xAB,
    EnableReset = 0x66,
    Reset = 0x99,
}

bitflags::bitflags! {
    /// Status register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Erase or write in progress.
        const BUSY = 1 << 0;
        /// Status of the **W**rite **E**nable **L**atch.
        const WEL = 1 << 1;
        /// The 3 protection region bits.
        const PROT = 0b00011100;
        /// **S**tatus **R**egister **W**rite **D**isable bit.
        const SRWD = 1 << 7;
    }
}

bitflags::bitflags! {
    /// Status register 2 bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status2: u8 {
        /// Status register protect 1.
        const SRP1 = 1 << 0;
        /// Quad enable.
        const QE = 1 << 1;
        /// One-time-programmable security register locks.
        const LB = 0b00111000;
        /// Complement protect.
        const CMP = 1 << 6;
        /// An erase or program is suspended.
        const SUS = 1 << 7;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Status({=u8:#010b})", self.bits())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status2 {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Status2({=u8:#010b})", self.bits())
    }
}

/// Opcode followed by a 24-bit big-endian address.
fn addressed(opcode: Opcode, addr: u32) -> [u8; 4] {
    [opcode as u8, (addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}

impl<SPI, D> HardwareFlashDevice for FlashSpi<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    type Error = Error<SPI>;

    fn capacity(&self) -> Result<u32, Error<SPI>> {
        Ok(self.ready_geometry()?.capacity())
    }

    /// From datasheet section 8.2.6 (Read Data (03h))
    /// Reads flash contents into `buf`, starting at `addr`.
    ///
    /// The span must end at or before the end of the device. Only 24 bits of
    /// `addr` are transferred, limiting 25-series chips to 16 MiB.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error<SPI>> {
        let geometry = self.ready_geometry()?;
        if addr >= geometry.capacity() || buf.len() > geometry.device_remaining(addr) {
            return Err(Error::AddressOutOfRange { address: addr });
        }
        if buf.is_empty() {
            return Ok(());
        }

        self.wait_ready(self.config.timeouts.idle)?;
        self.spi
            .transaction(&mut [
                Operation::Write(&addressed(Opcode::Read, addr)),
                Operation::Read(buf),
            ])
            .map_err(Error::Spi)
    }

    /// From datasheet section 8.2.13
    /// The Page Program instruction allows from one byte to 256 bytes (a page) of data
    /// to be programmed at previously erased (FFh) memory locations. A Write Enable
    /// instruction must be executed before the device will accept the Page Program
    /// Instruction (Status Register bit WEL= 1). Addresses past the end of the page
    /// would wrap to its start inside the device, so such spans are refused here.
    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Error<SPI>> {
        let geometry = self.ready_geometry()?;
        if addr >= geometry.capacity() {
            return Err(Error::AddressOutOfRange { address: addr });
        }
        if data.len() > Geometry::page_remaining(addr) {
            return Err(Error::PageOverflowNotAllowed {
                address: addr,
                len: data.len(),
            });
        }
        if data.is_empty() {
            return Ok(());
        }

        self.wait_ready(self.config.timeouts.idle)?;
        self.write_enable_unchecked()?;
        if !self.is_wel()? {
            warn!("WEL should be set: {:?}", self.read_status()?);
        }

        self.spi
            .transaction(&mut [
                Operation::Write(&addressed(Opcode::PageProg, addr)),
                Operation::Write(data),
            ])
            .map_err(Error::Spi)?;
        self.wait_ready(self.config.timeouts.program)
    }

    /// Sector erase (see datasheet 8.2.15)
    /// The Sector Erase instruction sets all memory within a specified sector
    /// (4K-bytes) to the erased state of all 1s (FFh). A Write Enable instruction
    /// must be executed before the device will accept the Sector Erase Instruction
    /// (Status Register bit WEL must equal 1).
    fn sector_erase(&mut self, addr: u32) -> Result<(), Error<SPI>> {
        let budget = self.config.timeouts.sector_erase;
        self.erase_region(Opcode::SectorErase, addr, SECTOR_SIZE, budget)
    }

    /// 32KB Block Erase (see datasheet 8.2.16)
    fn block_erase_32k(&mut self, addr: u32) -> Result<(), Error<SPI>> {
        let budget = self.config.timeouts.block_erase_32k;
        self.erase_region(Opcode::BlockErase32K, addr, BLOCK_32K_SIZE, budget)
    }

    /// 64KB Block Erase (see datasheet 8.2.17)
    fn block_erase_64k(&mut self, addr: u32) -> Result<(), Error<SPI>> {
        let budget = self.config.timeouts.block_erase_64k;
        self.erase_region(Opcode::BlockErase64K, addr, BLOCK_64K_SIZE, budget)
    }

    /// Chip Erase (see datasheet 8.2.18)
    /// The Chip Erase instruction sets all memory within the device to the erased
    /// state of all 1s (FFh). A Write Enable instruction must be executed before
    /// the device will accept the Chip Erase Instruction (Status Register bit WEL
    /// must equal 1).
    fn chip_erase(&mut self) -> Result<(), Error<SPI>> {
        self.ready_geometry()?;
        self.wait_ready(self.config.timeouts.idle)?;
        self.write_enable_unchecked()?;
        self.command(&[Opcode::ChipErase as u8])?;
        self.wait_ready(self.config.timeouts.chip_erase)
    }
}

impl<SPI, D> FlashSpi<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    /// Creates an uninitialized driver. Call [`FlashSpi::init`] before any
    /// data operation.
    pub fn new(spi: SPI, delay: D, config: Config) -> Self {
        Self {
            spi,
            delay,
            config,
            geometry: None,
            powered_down: false,
        }
    }

    /// Wakes the device, waits for any cycle left over from before reset, then
    /// reads the JEDEC ID and sizes the device from the configured identity
    /// table.
    ///
    /// On failure the driver stays uninitialized and every data operation
    /// returns [`Error::NotInitialized`].
    pub fn init(&mut self) -> Result<Identification, Error<SPI>> {
        self.geometry = None;
        // A chip still in deep power-down ignores everything else and reads as busy.
        self.power_up()?;
        self.wait_ready(self.config.timeouts.chip_erase)?;
        let id = self.read_jedec_id()?;
        let Some(device) = id.resolve(self.config.identities) else {
            error!("Unrecognized flash identity: {:?}", id);
            return Err(Error::UnrecognizedDevice(id));
        };
        let Some(geometry) = Geometry::checked(device.capacity) else {
            error!("{} declares unsupported capacity {}", device.name, device.capacity);
            return Err(Error::UnsupportedCapacity {
                capacity: device.capacity,
            });
        };
        info!(
            "Found {} ({:?}): {} bytes, {} pages",
            device.name,
            id,
            geometry.capacity(),
            geometry.page_count()
        );
        self.geometry = Some(geometry);
        Ok(id)
    }

    /// Gives back the bus and the delay.
    pub fn release(self) -> (SPI, D) {
        (self.spi, self.delay)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_page_overflow(&mut self, allow: bool) {
        self.config.page_overflow = allow;
    }

    /// Device size, known once `init` succeeded.
    pub fn geometry(&self) -> Option<Geometry> {
        self.geometry
    }

    pub fn max_page(&self) -> Option<u16> {
        self.geometry.map(|g| g.max_page())
    }

    pub fn is_powered_down(&self) -> bool {
        self.powered_down
    }

    pub(crate) fn ensure_awake(&self) -> Result<(), Error<SPI>> {
        if self.powered_down {
            return Err(Error::PoweredDown);
        }
        Ok(())
    }

    /// Geometry of an initialized, awake device.
    pub(crate) fn ready_geometry(&self) -> Result<Geometry, Error<SPI>> {
        self.ensure_awake()?;
        self.geometry.ok_or(Error::NotInitialized)
    }

    pub fn is_busy(&mut self) -> Result<bool, Error<SPI>> {
        let status = self.read_status()?;
        Ok(status.contains(Status::BUSY))
    }

    pub fn is_wel(&mut self) -> Result<bool, Error<SPI>> {
        let status = self.read_status()?;
        Ok(status.contains(Status::WEL))
    }

    pub fn is_suspended(&mut self) -> Result<bool, Error<SPI>> {
        let status = self.read_status2()?;
        Ok(status.contains(Status2::SUS))
    }

    /// Writes a command to the SPI bus
    fn command(&mut self, bytes: &[u8]) -> Result<(), Error<SPI>> {
        self.spi
            .transaction(&mut [Operation::Write(bytes)])
            .map_err(Error::Spi)?;
        Ok(())
    }

    /// Writes a command to the SPI bus and reads the response into `response`
    fn command_with_response(
        &mut self,
        instruction: &[u8],
        response: &mut [u8],
    ) -> Result<(), Error<SPI>> {
        self.spi
            .transaction(&mut [Operation::Write(instruction), Operation::Read(response)])
            .map_err(Error::Spi)?;
        Ok(())
    }

    /// Reads the status register.
    pub fn read_status(&mut self) -> Result<Status, Error<SPI>> {
        let mut response = [0u8; 1];
        self.command_with_response(&[Opcode::ReadStatus as u8], &mut response)?;

        Ok(Status::from_bits_truncate(response[0]))
    }

    /// Reads status register 2.
    pub fn read_status2(&mut self) -> Result<Status2, Error<SPI>> {
        let mut response = [0u8; 1];
        self.command_with_response(&[Opcode::ReadStatus2 as u8], &mut response)?;

        Ok(Status2::from_bits_truncate(response[0]))
    }

    /// Manufacturer and device ID (90h).
    pub fn read_manufacturer_device_id(&mut self) -> Result<[u8; 2], Error<SPI>> {
        self.ensure_awake()?;
        let mut response = [0u8; 2];
        self.command_with_response(&[Opcode::ReadMfDId as u8, 0, 0, 0], &mut response)?;
        Ok(response)
    }

    /// Reads the JEDEC manufacturer/device identification.
    pub fn read_jedec_id(&mut self) -> Result<Identification, Error<SPI>> {
        self.ensure_awake()?;
        // Optimistically read enough for a few continuation codes
        let mut buf = [0u8; 8];
        self.command_with_response(&[Opcode::ReadJedecId as u8], &mut buf)?;
        Ok(Identification::from_jedec_id(&buf))
    }

    /// Polls the BUSY bit until it clears, sleeping `poll_interval` between
    /// polls. Fails with [`Error::BusyTimeout`] once `budget` worth of delay
    /// has elapsed without seeing the device idle.
    pub fn wait_ready(&mut self, budget: Duration) -> Result<(), Error<SPI>> {
        let budget_us = u64::try_from(budget.as_micros()).unwrap_or(u64::MAX);
        let step_us = u32::try_from(self.config.poll_interval.as_micros())
            .unwrap_or(u32::MAX)
            .max(1);
        let mut waited_us: u64 = 0;
        loop {
            let status = self.read_status()?;
            if !status.contains(Status::BUSY) {
                return Ok(());
            }
            if waited_us >= budget_us {
                warn!("Flash still busy after {} us: {:?}", waited_us, status);
                return Err(Error::BusyTimeout);
            }
            self.delay.delay_us(step_us);
            waited_us += u64::from(step_us);
        }
    }

    /// From datasheet section 8.2.1
    /// The Write Enable instruction sets the Write Enable Latch (WEL) bit
    /// in the Status Register to a 1. The WEL bit must be set prior to every Page Program,
    /// Quad Page Program, Sector Erase, Block Erase, Chip Erase, Write Status Register
    /// and Erase/Program Security Registers instruction.
    pub fn write_enable(&mut self) -> Result<(), Error<SPI>> {
        self.ensure_awake()?;
        self.write_enable_unchecked()
    }

    fn write_enable_unchecked(&mut self) -> Result<(), Error<SPI>> {
        self.command(&[Opcode::WriteEnable as u8])
    }

    /// Write Disable (see datasheet 8.2.3)
    /// Resets the WEL bit. WEL is also cleared automatically after every
    /// program and erase.
    pub fn write_disable(&mut self) -> Result<(), Error<SPI>> {
        self.ensure_awake()?;
        self.command(&[Opcode::WriteDisable as u8])
    }

    fn erase_region(
        &mut self,
        opcode: Opcode,
        addr: u32,
        size: u32,
        budget: Duration,
    ) -> Result<(), Error<SPI>> {
        let geometry = self.ready_geometry()?;
        if addr >= geometry.capacity() {
            return Err(Error::AddressOutOfRange { address: addr });
        }
        let base = Geometry::region_base(addr, size);
        debug!("Erasing {} bytes at {}", size, base);

        self.wait_ready(self.config.timeouts.idle)?;
        self.write_enable_unchecked()?;
        self.command(&addressed(opcode, base))?;
        self.wait_ready(budget)
    }

    /// Erase/Program Suspend (see datasheet 8.2.20)
    /// Interrupts an in-flight sector/block erase or page program. With nothing
    /// in flight, or with an operation already suspended, nothing is sent.
    pub fn suspend_prog(&mut self) -> Result<(), Error<SPI>> {
        self.ensure_awake()?;
        if !self.is_busy()? || self.is_suspended()? {
            debug!("No program or erase to suspend");
            return Ok(());
        }
        self.command(&[Opcode::Suspend as u8])?;
        self.wait_ready(SUSPEND_LATENCY)
    }

    /// Erase/Program Resume (see datasheet 8.2.21)
    /// Continues a suspended operation; the device turns busy again until it
    /// completes. Without a suspended operation this is a no-op.
    pub fn resume_prog(&mut self) -> Result<(), Error<SPI>> {
        self.ensure_awake()?;
        if !self.is_suspended()? {
            debug!("No suspended operation to resume");
            return Ok(());
        }
        self.command(&[Opcode::Resume as u8])
    }

    /// Power-down (see datasheet 8.2.22)
    /// Enters the lowest consumption mode. Until [`FlashSpi::power_up`] every
    /// other operation fails with [`Error::PoweredDown`].
    pub fn power_down(&mut self) -> Result<(), Error<SPI>> {
        if self.powered_down {
            return Ok(());
        }
        self.wait_ready(self.config.timeouts.idle)?;
        self.command(&[Opcode::PowerDown as u8])?;
        self.delay.delay_us(POWER_DOWN_LATENCY_US);
        self.powered_down = true;
        debug!("Flash powered down");
        Ok(())
    }

    /// Release Power-down (see datasheet 8.2.23)
    pub fn power_up(&mut self) -> Result<(), Error<SPI>> {
        self.command(&[Opcode::ReleasePowerDown as u8])?;
        self.delay.delay_us(RELEASE_LATENCY_US);
        self.powered_down = false;
        debug!("Flash released from power-down");
        Ok(())
    }

    /// Software reset (see datasheet 6.4)
    /// The device can be reset to the initial power-on state by a software Reset
    /// sequence. This sequence must include two consecutive instructions: Enable Reset
    /// (66h) & Reset (99h). The device takes approximately 30μS (tRST) to reset.
    /// Any in-flight or suspended operation is lost.
    pub fn software_reset(&mut self) -> Result<(), Error<SPI>> {
        self.ensure_awake()?;
        self.command(&[Opcode::EnableReset as u8])?;
        self.command(&[Opcode::Reset as u8])?;
        self.delay.delay_us(RESET_LATENCY_US);
        Ok(())
    }
}
