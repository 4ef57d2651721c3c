//! Fixed-size values stored as little-endian bytes.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::comms::FlashSpi;
use crate::error::Error;

/// A value with a fixed, portable byte representation on flash.
///
/// Numbers are stored little-endian regardless of the host. Implement this
/// for your own records by concatenating the encodings of their fields.
pub trait FlashValue: Sized {
    /// Byte image of the value, usually `[u8; N]`.
    type Bytes: AsRef<[u8]> + AsMut<[u8]>;

    /// A zeroed buffer of the right size to read a value into.
    fn blank() -> Self::Bytes;

    fn to_flash_bytes(&self) -> Self::Bytes;

    fn from_flash_bytes(bytes: &Self::Bytes) -> Self;
}

macro_rules! impl_flash_value_for_num {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FlashValue for $ty {
                type Bytes = [u8; core::mem::size_of::<$ty>()];

                fn blank() -> Self::Bytes {
                    [0; core::mem::size_of::<$ty>()]
                }

                fn to_flash_bytes(&self) -> Self::Bytes {
                    self.to_le_bytes()
                }

                fn from_flash_bytes(bytes: &Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(*bytes)
                }
            }
        )*
    };
}

impl_flash_value_for_num!(u8, i8, u16, i16, u32, i32, u64, i64, u128, i128, f32, f64);

/// Stored as a single byte; anything other than 0 reads back as `true`.
impl FlashValue for bool {
    type Bytes = [u8; 1];

    fn blank() -> Self::Bytes {
        [0]
    }

    fn to_flash_bytes(&self) -> Self::Bytes {
        [u8::from(*self)]
    }

    fn from_flash_bytes(bytes: &Self::Bytes) -> Self {
        bytes[0] != 0
    }
}

impl<const N: usize> FlashValue for [u8; N] {
    type Bytes = [u8; N];

    fn blank() -> Self::Bytes {
        [0; N]
    }

    fn to_flash_bytes(&self) -> Self::Bytes {
        *self
    }

    fn from_flash_bytes(bytes: &Self::Bytes) -> Self {
        *bytes
    }
}

impl<SPI, D> FlashSpi<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    /// Writes the byte image of `value` at (`page`, `offset`). A value that
    /// straddles a page boundary follows the same overflow policy as
    /// [`FlashSpi::write_bytes`].
    pub fn write_value<T: FlashValue>(
        &mut self,
        page: u16,
        offset: u8,
        value: &T,
        verify: bool,
    ) -> Result<(), Error<SPI>> {
        let bytes = value.to_flash_bytes();
        self.write_bytes(page, offset, bytes.as_ref(), verify)
    }

    pub fn read_value<T: FlashValue>(&mut self, page: u16, offset: u8) -> Result<T, Error<SPI>> {
        let mut bytes = T::blank();
        self.read_bytes(page, offset, bytes.as_mut())?;
        Ok(T::from_flash_bytes(&bytes))
    }
}
