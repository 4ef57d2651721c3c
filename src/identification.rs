//! JEDEC identification and the identity table used to size the device.

use core::fmt;

/// Manufacturer ID continuation code. Banks beyond the first are announced
/// by repeating this byte before the actual manufacturer code.
const CONTINUATION_CODE: u8 = 0x7F;

/// Identity triplet returned by the Read JEDEC ID (9Fh) instruction.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Identification {
    /// Manufacturer, memory type and capacity code, in that order.
    bytes: [u8; 3],
    /// Number of continuation codes that preceded the manufacturer ID.
    continuations: u8,
}

impl Identification {
    /// Build an identification from the raw response of the JEDEC ID command.
    ///
    /// Leading continuation codes are counted and skipped. Missing bytes read
    /// as zero, which never matches a known device.
    pub fn from_jedec_id(buf: &[u8]) -> Identification {
        let continuations = buf
            .iter()
            .take_while(|&&b| b == CONTINUATION_CODE)
            .count();
        let mut bytes = [0u8; 3];
        for (dst, src) in bytes.iter_mut().zip(&buf[continuations..]) {
            *dst = *src;
        }
        Identification {
            bytes,
            continuations: continuations as u8,
        }
    }

    /// The JEDEC manufacturer code (0xEF for Winbond).
    pub fn mfr_code(&self) -> u8 {
        self.bytes[0]
    }

    /// The memory type byte, identifying the device family.
    pub fn memory_type(&self) -> u8 {
        self.bytes[1]
    }

    /// The capacity code. For 25-series parts the capacity is `1 << code` bytes.
    pub fn capacity_code(&self) -> u8 {
        self.bytes[2]
    }

    /// Manufacturer bank, counted from 0.
    pub fn continuation_count(&self) -> u8 {
        self.continuations
    }

    /// All three identity bytes.
    pub fn bytes(&self) -> [u8; 3] {
        self.bytes
    }

    /// Packs the identity as `0x00MMTTCC`, matching the classic `getID()` word.
    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes([0, self.bytes[0], self.bytes[1], self.bytes[2]])
    }

    /// Looks this identity up in `table`, returning the matching entry.
    pub fn resolve<'a>(&self, table: &'a [KnownDevice]) -> Option<&'a KnownDevice> {
        table.iter().find(|dev| dev.matches(self))
    }
}

impl fmt::Debug for Identification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Identification({:02X} {:02X} {:02X})",
            self.bytes[0], self.bytes[1], self.bytes[2]
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Identification {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "Identification({=u8:#x} {=u8:#x} {=u8:#x})",
            self.bytes[0],
            self.bytes[1],
            self.bytes[2]
        )
    }
}

/// One row of the identity table: an identity code and the capacity it declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KnownDevice {
    pub name: &'static str,
    pub manufacturer: u8,
    pub memory_type: u8,
    pub capacity_code: u8,
    /// Total addressable bytes.
    pub capacity: u32,
}

impl KnownDevice {
    /// A 25-series part whose capacity is `1 << capacity_code` bytes.
    pub const fn series25(
        name: &'static str,
        manufacturer: u8,
        memory_type: u8,
        capacity_code: u8,
    ) -> Self {
        KnownDevice {
            name,
            manufacturer,
            memory_type,
            capacity_code,
            capacity: 1 << capacity_code,
        }
    }

    pub fn matches(&self, id: &Identification) -> bool {
        self.manufacturer == id.mfr_code()
            && self.memory_type == id.memory_type()
            && self.capacity_code == id.capacity_code()
    }
}

pub const WINBOND: u8 = 0xEF;

/// Winbond W25X (type 30h) and W25Q (type 40h) parts up to the 24-bit
/// addressing limit of 16 MiB.
pub const WINBOND_W25: &[KnownDevice] = &[
    KnownDevice::series25("W25X10", WINBOND, 0x30, 0x11),
    KnownDevice::series25("W25X20", WINBOND, 0x30, 0x12),
    KnownDevice::series25("W25X40", WINBOND, 0x30, 0x13),
    KnownDevice::series25("W25X80", WINBOND, 0x30, 0x14),
    KnownDevice::series25("W25X16", WINBOND, 0x30, 0x15),
    KnownDevice::series25("W25X32", WINBOND, 0x30, 0x16),
    KnownDevice::series25("W25X64", WINBOND, 0x30, 0x17),
    KnownDevice::series25("W25Q10", WINBOND, 0x40, 0x11),
    KnownDevice::series25("W25Q20", WINBOND, 0x40, 0x12),
    KnownDevice::series25("W25Q40", WINBOND, 0x40, 0x13),
    KnownDevice::series25("W25Q80", WINBOND, 0x40, 0x14),
    KnownDevice::series25("W25Q16", WINBOND, 0x40, 0x15),
    KnownDevice::series25("W25Q32", WINBOND, 0x40, 0x16),
    KnownDevice::series25("W25Q64", WINBOND, 0x40, 0x17),
    KnownDevice::series25("W25Q128", WINBOND, 0x40, 0x18),
];
