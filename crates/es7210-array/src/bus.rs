//! Register bus transport.
//!
//! The crate never drives I²C itself beyond "read one register" and "write
//! one register". Any `embedded_hal_async::i2c::I2c` implementation is a
//! [`RegisterBus`]; blocking `embedded_hal::i2c::I2c` implementations can be
//! wrapped in [`Blocking`].
//!
//! Retries, bus locking between unrelated drivers, and clock stretching are
//! the transport's business.

use crate::error::BusError;

/// Byte-wide register access on a shared bus.
pub trait RegisterBus {
    /// Read `register` of the chip at `address`.
    async fn read_register(&mut self, address: u8, register: u8) -> Result<u8, BusError>;

    /// Write `value` to `register` of the chip at `address`.
    async fn write_register(&mut self, address: u8, register: u8, value: u8)
        -> Result<(), BusError>;
}

impl<I> RegisterBus for I
where
    I: embedded_hal_async::i2c::I2c,
{
    async fn read_register(&mut self, address: u8, register: u8) -> Result<u8, BusError> {
        use embedded_hal_async::i2c::Error as _;

        let mut value = [0u8; 1];
        self.write_read(address, &[register], &mut value)
            .await
            .map_err(|e| BusError::from(e.kind()))?;
        let [byte] = value;
        Ok(byte)
    }

    async fn write_register(
        &mut self,
        address: u8,
        register: u8,
        value: u8,
    ) -> Result<(), BusError> {
        use embedded_hal_async::i2c::Error as _;

        self.write(address, &[register, value])
            .await
            .map_err(|e| BusError::from(e.kind()))
    }
}

/// Adapter running a blocking `embedded_hal::i2c::I2c` as a [`RegisterBus`].
///
/// Each access blocks the executor for one I²C transaction (two bytes out,
/// at most one byte in), which is acceptable on the control path.
#[derive(Debug)]
pub struct Blocking<I>(pub I);

impl<I> Blocking<I> {
    /// Give the wrapped bus back.
    pub fn into_inner(self) -> I {
        self.0
    }
}

impl<I> RegisterBus for Blocking<I>
where
    I: embedded_hal::i2c::I2c,
{
    async fn read_register(&mut self, address: u8, register: u8) -> Result<u8, BusError> {
        use embedded_hal::i2c::Error as _;

        let mut value = [0u8; 1];
        self.0
            .write_read(address, &[register], &mut value)
            .map_err(|e| BusError::from(e.kind()))?;
        let [byte] = value;
        Ok(byte)
    }

    async fn write_register(
        &mut self,
        address: u8,
        register: u8,
        value: u8,
    ) -> Result<(), BusError> {
        use embedded_hal::i2c::Error as _;

        self.0
            .write(address, &[register, value])
            .map_err(|e| BusError::from(e.kind()))
    }
}
