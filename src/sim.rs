//! A W25Q80-like chip behind an `SpiDevice`, for unit tests.
//!
//! Commands take effect when /CS is released, like on the real part. Page
//! programs wrap inside their page, programming only clears bits and the
//! device ignores everything but status reads and suspend while busy.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{self, ErrorKind, ErrorType, Operation, SpiDevice};

use crate::address::PAGE_SIZE;
use crate::comms::FlashSpi;
use crate::config::Config;

pub const WRITE_ENABLE: u8 = 0x06;
pub const WRITE_DISABLE: u8 = 0x04;
pub const READ_STATUS: u8 = 0x05;
pub const READ_STATUS2: u8 = 0x35;
pub const READ: u8 = 0x03;
pub const PAGE_PROGRAM: u8 = 0x02;
pub const SECTOR_ERASE: u8 = 0x20;
pub const BLOCK_ERASE_32K: u8 = 0x52;
pub const BLOCK_ERASE_64K: u8 = 0xD8;
pub const CHIP_ERASE: u8 = 0xC7;
pub const SUSPEND: u8 = 0x75;
pub const RESUME: u8 = 0x7A;
pub const POWER_DOWN: u8 = 0xB9;
pub const RELEASE_POWER_DOWN: u8 = 0xAB;
pub const JEDEC_ID: u8 = 0x9F;
pub const MANUFACTURER_DEVICE_ID: u8 = 0x90;
pub const ENABLE_RESET: u8 = 0x66;
pub const RESET: u8 = 0x99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

impl spi::Error for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct Chip {
    pub memory: Vec<u8>,
    pub jedec: [u8; 3],
    pub device_id: u8,
    pub wel: bool,
    /// Status polls left before BUSY clears.
    pub busy_remaining: u32,
    pub busy_forever: bool,
    pub program_busy_polls: u32,
    pub erase_busy_polls: u32,
    /// Busy polls left of the suspended operation.
    pub suspended: Option<u32>,
    pub powered_down: bool,
    reset_enabled: bool,
    /// Fail the next transaction with [`SimError`].
    pub fail_next: bool,
    /// First byte of every transaction, in order.
    pub opcodes: Vec<u8>,
    pub status_reads: usize,
    delayed_ns: u64,
}

pub type ChipHandle = Rc<RefCell<Chip>>;

impl Chip {
    pub fn w25q80() -> Self {
        Chip {
            memory: vec![0xFF; 1 << 20],
            jedec: [0xEF, 0x40, 0x14],
            device_id: 0x13,
            wel: false,
            busy_remaining: 0,
            busy_forever: false,
            program_busy_polls: 1,
            erase_busy_polls: 3,
            suspended: None,
            powered_down: false,
            reset_enabled: false,
            fail_next: false,
            opcodes: Vec::new(),
            status_reads: 0,
            delayed_ns: 0,
        }
    }

    /// Resizes the array to `1 << code` erased bytes and reports `code` in the JEDEC ID.
    pub fn set_capacity_code(&mut self, code: u8) {
        self.jedec[2] = code;
        self.memory = vec![0xFF; 1 << code];
    }

    /// Pretends an erase was started by someone else and is still running.
    pub fn start_erase_cycle(&mut self, polls: u32) {
        self.busy_remaining = polls;
    }

    /// Total time requested through the delay provider.
    pub fn delayed_us(&self) -> u64 {
        self.delayed_ns / 1_000
    }

    fn is_busy(&self) -> bool {
        self.busy_forever || self.busy_remaining > 0
    }

    fn status(&self) -> u8 {
        u8::from(self.is_busy()) | (u8::from(self.wel) << 1)
    }

    fn status2(&self) -> u8 {
        if self.suspended.is_some() {
            1 << 7
        } else {
            0
        }
    }

    fn address(mosi: &[u8]) -> Option<usize> {
        match mosi {
            [_, a2, a1, a0, ..] => {
                Some((usize::from(*a2) << 16) | (usize::from(*a1) << 8) | usize::from(*a0))
            }
            _ => None,
        }
    }

    /// Byte shifted out at position `pos` of a transaction whose command bytes
    /// so far are `mosi`.
    fn respond(&self, mosi: &[u8], pos: usize, status: u8) -> u8 {
        if self.powered_down {
            return 0xFF;
        }
        match mosi.first().copied() {
            Some(READ_STATUS) => status,
            Some(READ_STATUS2) => self.status2(),
            Some(JEDEC_ID) => self.jedec.get(pos - 1).copied().unwrap_or(0),
            Some(MANUFACTURER_DEVICE_ID) if pos >= 4 => {
                [self.jedec[0], self.device_id][(pos - 4) % 2]
            }
            Some(READ) if !self.is_busy() && pos >= 4 => match Self::address(mosi) {
                Some(addr) => self.memory[(addr + pos - 4) % self.memory.len()],
                None => 0xFF,
            },
            _ => 0xFF,
        }
    }

    fn erase(&mut self, addr: usize, size: usize) {
        let base = addr & !(size - 1);
        self.memory[base..base + size].fill(0xFF);
        self.wel = false;
        self.busy_remaining = self.erase_busy_polls;
    }

    /// Runs a command once /CS goes high.
    fn execute(&mut self, mosi: &[u8]) {
        let Some(&op) = mosi.first() else {
            return;
        };
        if self.powered_down {
            if op == RELEASE_POWER_DOWN {
                self.powered_down = false;
            }
            return;
        }
        if op == ENABLE_RESET {
            self.reset_enabled = true;
            return;
        }
        let reset_enabled = core::mem::take(&mut self.reset_enabled);

        match op {
            READ_STATUS | READ_STATUS2 | JEDEC_ID | MANUFACTURER_DEVICE_ID | READ => {}
            SUSPEND => {
                if self.busy_remaining > 0 && self.suspended.is_none() {
                    self.suspended = Some(self.busy_remaining);
                    self.busy_remaining = 0;
                }
            }
            RESUME => {
                if let Some(remaining) = self.suspended.take() {
                    self.busy_remaining = remaining.max(1);
                }
            }
            RESET if reset_enabled => {
                self.wel = false;
                self.busy_remaining = 0;
                self.suspended = None;
            }
            _ if self.is_busy() => {}
            WRITE_ENABLE => self.wel = true,
            WRITE_DISABLE => self.wel = false,
            PAGE_PROGRAM if self.wel => {
                if let Some(addr) = Self::address(mosi) {
                    let page_base = addr & !(PAGE_SIZE - 1);
                    for (i, byte) in mosi[4..].iter().enumerate() {
                        let offset = (addr + i) % PAGE_SIZE;
                        self.memory[page_base + offset] &= byte;
                    }
                    self.wel = false;
                    self.busy_remaining = self.program_busy_polls;
                }
            }
            SECTOR_ERASE | BLOCK_ERASE_32K | BLOCK_ERASE_64K if self.wel => {
                if let Some(addr) = Self::address(mosi) {
                    let size = match op {
                        SECTOR_ERASE => 4 * 1024,
                        BLOCK_ERASE_32K => 32 * 1024,
                        _ => 64 * 1024,
                    };
                    self.erase(addr, size);
                }
            }
            CHIP_ERASE if self.wel => {
                let size = self.memory.len();
                self.erase(0, size);
            }
            POWER_DOWN => self.powered_down = true,
            _ => {}
        }
    }
}

#[derive(Clone)]
pub struct SimSpi(pub ChipHandle);

impl ErrorType for SimSpi {
    type Error = SimError;
}

impl SpiDevice for SimSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SimError> {
        let mut chip = self.0.borrow_mut();
        if chip.fail_next {
            chip.fail_next = false;
            return Err(SimError);
        }

        let mut mosi: Vec<u8> = Vec::new();
        let mut pos = 0;
        let mut status = None;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(data) => {
                    mosi.extend_from_slice(data);
                    pos += data.len();
                }
                Operation::Read(buf) => {
                    if mosi.first() == Some(&READ_STATUS) && status.is_none() {
                        // one poll per transaction
                        status = Some(chip.status());
                        chip.status_reads += 1;
                        chip.busy_remaining = chip.busy_remaining.saturating_sub(1);
                    }
                    for b in buf.iter_mut() {
                        *b = chip.respond(&mosi, pos, status.unwrap_or(0xFF));
                        pos += 1;
                    }
                }
                Operation::DelayNs(ns) => chip.delayed_ns += u64::from(*ns),
                _ => {}
            }
        }
        if let Some(&op) = mosi.first() {
            chip.opcodes.push(op);
        }
        chip.execute(&mosi);
        Ok(())
    }
}

pub struct SimDelay(pub ChipHandle);

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().delayed_ns += u64::from(ns);
    }
}

pub fn uninit(config: Config) -> (FlashSpi<SimSpi, SimDelay>, ChipHandle) {
    let chip = Rc::new(RefCell::new(Chip::w25q80()));
    let flash = FlashSpi::new(SimSpi(chip.clone()), SimDelay(chip.clone()), config);
    (flash, chip)
}

pub fn flash(config: Config) -> (FlashSpi<SimSpi, SimDelay>, ChipHandle) {
    let (mut flash, chip) = uninit(config);
    flash.init().unwrap();
    (flash, chip)
}
