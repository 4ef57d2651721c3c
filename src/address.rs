//! Page/offset addressing. Everything here is pure arithmetic, no bus access.

/// Program unit of every supported part.
pub const PAGE_SIZE: usize = 256;
/// Smallest erase unit.
pub const SECTOR_SIZE: u32 = 4 * 1024;
pub const BLOCK_32K_SIZE: u32 = 32 * 1024;
pub const BLOCK_64K_SIZE: u32 = 64 * 1024;
/// Largest device reachable with 3-byte addresses.
pub const MAX_CAPACITY: u32 = 1 << 24;

/// Reasons an address translation can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressError {
    /// The page lies beyond the last page, or the span is larger than the device.
    OutOfRange { address: u32 },
    /// The span crosses a page boundary while overflow is disabled.
    PageOverflow { address: u32, len: usize },
}

/// Size of an identified device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    capacity: u32,
}

impl Geometry {
    /// `capacity` must be a non-zero multiple of [`PAGE_SIZE`].
    pub const fn new(capacity: u32) -> Self {
        Geometry { capacity }
    }

    /// Like [`Geometry::new`], but `None` for a capacity that is zero, not a
    /// whole number of pages, or beyond [`MAX_CAPACITY`].
    pub fn checked(capacity: u32) -> Option<Self> {
        if capacity == 0 || capacity % PAGE_SIZE as u32 != 0 || capacity > MAX_CAPACITY {
            return None;
        }
        Some(Geometry { capacity })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    pub fn page_count(&self) -> u32 {
        self.capacity / PAGE_SIZE as u32
    }

    /// Highest valid page number.
    pub fn max_page(&self) -> u16 {
        (self.page_count() - 1) as u16
    }

    /// Linear address of byte `offset` of `page`.
    pub fn address(&self, page: u16, offset: u8) -> Result<u32, AddressError> {
        let address = u32::from(page) * PAGE_SIZE as u32 + u32::from(offset);
        if page > self.max_page() || address >= self.capacity {
            return Err(AddressError::OutOfRange { address });
        }
        Ok(address)
    }

    /// Validates a `len`-byte access starting at (`page`, `offset`) and returns
    /// its start address.
    pub fn span(
        &self,
        page: u16,
        offset: u8,
        len: usize,
        page_overflow: bool,
    ) -> Result<u32, AddressError> {
        let address = self.address(page, offset)?;
        if page_overflow {
            if len > self.capacity as usize {
                return Err(AddressError::OutOfRange { address });
            }
        } else if usize::from(offset) + len > PAGE_SIZE {
            return Err(AddressError::PageOverflow { address, len });
        }
        Ok(address)
    }

    /// Address following `address` after `len` bytes, wrapping at the device end.
    pub fn advance(&self, address: u32, len: usize) -> u32 {
        ((u64::from(address) + len as u64) % u64::from(self.capacity)) as u32
    }

    /// Bytes left in the page containing `address`.
    pub fn page_remaining(address: u32) -> usize {
        PAGE_SIZE - (address as usize % PAGE_SIZE)
    }

    /// Bytes left before the device end.
    pub fn device_remaining(&self, address: u32) -> usize {
        (self.capacity - address) as usize
    }

    /// Start of the `size`-byte region containing `address`. `size` is a power of two.
    pub fn region_base(address: u32, size: u32) -> u32 {
        address & !(size - 1)
    }
}

/// Splits a validated span into page-program sized chunks, `(address, range)`
/// pairs where `range` indexes into the caller's buffer.
pub struct PageChunks<'a> {
    geometry: &'a Geometry,
    address: u32,
    done: usize,
    len: usize,
}

impl<'a> PageChunks<'a> {
    pub fn new(geometry: &'a Geometry, address: u32, len: usize) -> Self {
        PageChunks {
            geometry,
            address,
            done: 0,
            len,
        }
    }
}

impl Iterator for PageChunks<'_> {
    type Item = (u32, core::ops::Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done >= self.len {
            return None;
        }
        let n = Geometry::page_remaining(self.address).min(self.len - self.done);
        let item = (self.address, self.done..self.done + n);
        self.done += n;
        self.address = self.geometry.advance(self.address, n);
        Some(item)
    }
}

/// Splits a validated span at the device end only. Reads stream across page
/// boundaries on their own.
pub struct WrapChunks<'a> {
    geometry: &'a Geometry,
    address: u32,
    done: usize,
    len: usize,
}

impl<'a> WrapChunks<'a> {
    pub fn new(geometry: &'a Geometry, address: u32, len: usize) -> Self {
        WrapChunks {
            geometry,
            address,
            done: 0,
            len,
        }
    }
}

impl Iterator for WrapChunks<'_> {
    type Item = (u32, core::ops::Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done >= self.len {
            return None;
        }
        let n = self
            .geometry
            .device_remaining(self.address)
            .min(self.len - self.done);
        let item = (self.address, self.done..self.done + n);
        self.done += n;
        self.address = self.geometry.advance(self.address, n);
        Some(item)
    }
}
