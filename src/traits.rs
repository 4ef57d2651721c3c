/// Linear-address access to a NOR flash device.
///
/// Every call blocks until the device has finished the operation.
pub trait HardwareFlashDevice {
    type Error;

    /// Total addressable bytes.
    fn capacity(&self) -> Result<u32, Self::Error>;

    /// Reads flash contents into `buf`, starting at `addr`.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Programs `data` at `addr`. The span must stay inside one page;
    /// only 1 bits can be cleared, erased (FFh) locations are expected.
    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error>;

    /// Sets the 4 KiB sector containing `addr` to the erased state of all 1s (FFh).
    fn sector_erase(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// Erases the 32 KiB block containing `addr`.
    fn block_erase_32k(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// Erases the 64 KiB block containing `addr`.
    fn block_erase_64k(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// Sets the whole device to the erased state of all 1s (FFh).
    fn chip_erase(&mut self) -> Result<(), Self::Error>;
}
