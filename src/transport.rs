//! The gauge only ever talks in "register + payload" terms, so the bus is
//! abstracted down to two operations. Any async I2C bus implements it out of the box.

use embedded_hal_async::i2c;

/// Largest payload the gauge accepts in a single transfer (one data-flash block)
pub const MAX_TRANSFER: usize = 32;

/// Register-level access to the bus.
///
/// Implementations own the timeout policy: a transfer that does not complete in
/// bounded time must come back as an error, the driver never retries.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Error;

    /// Writes `data` starting at `register`
    async fn write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Fills `data` starting at `register`
    async fn read(&mut self, address: u8, register: u8, data: &mut [u8])
        -> Result<(), Self::Error>;
}

impl<I: i2c::I2c> Transport for I {
    type Error = I::Error;

    async fn write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<(), Self::Error> {
        let mut frame = [0u8; MAX_TRANSFER + 1];

        // The register pointer auto-increments, longer payloads are split
        for (index, chunk) in data.chunks(MAX_TRANSFER).enumerate() {
            frame[0] = register.wrapping_add((index * MAX_TRANSFER) as u8);
            frame[1..=chunk.len()].copy_from_slice(chunk);

            i2c::I2c::write(self, address, &frame[..=chunk.len()]).await?;
        }

        Ok(())
    }

    async fn read(
        &mut self,
        address: u8,
        register: u8,
        data: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.write_read(address, &[register], data).await
    }
}
