//! Data-flash block access
//!
//! Battery parameters such as the design capacity are not reachable through
//! standard commands and have to be read and written here. The data flash is organized in subclasses, each one split into 32-byte
//! blocks. A block is selected by writing the subclass and the block index,
//! after which its contents show up in the BlockData() window. Every block is
//! guarded by a one byte checksum that has to be written after the data, and
//! the gauge only commits the block if the checksum matches.

use embedded_hal_async::delay;

use crate::registers::{commands, StatusFlags};
use crate::{Bq27441, ChipError, Transport};

pub const MEMBLOCK_SIZE: usize = 32;

/// How long the gauge needs to settle after a block selection or a checksum write
const BLOCK_SETTLE_MS: u32 = 5;

/// Block checksum: 255 minus the byte sum, modulo 256
pub fn checksum(data: &[u8]) -> u8 {
    let mut csum: u8 = 0;

    for b in data.iter() {
        csum = csum.wrapping_add(*b);
    }

    255 - csum
}

/// Splits a subclass offset into the block index and the position inside that block
fn locate(offset: u8, len: usize) -> Option<(u8, usize)> {
    let block = offset / MEMBLOCK_SIZE as u8;
    let start = offset as usize % MEMBLOCK_SIZE;

    if len == 0 || start + len > MEMBLOCK_SIZE {
        None
    } else {
        Some((block, start))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    pub raw: [u8; MEMBLOCK_SIZE],
}

impl MemoryBlock {
    pub fn new() -> Self {
        Self {
            raw: [0; MEMBLOCK_SIZE],
        }
    }

    pub fn checksum(&self) -> u8 {
        checksum(&self.raw)
    }
}

impl Default for MemoryBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[u8; MEMBLOCK_SIZE]> for MemoryBlock {
    fn from(raw: [u8; MEMBLOCK_SIZE]) -> Self {
        Self { raw }
    }
}

impl<T, D, E> Bq27441<T, D>
where
    D: delay::DelayNs,
    T: Transport<Error = E>,
{
    /// Checksum register of the currently selected block
    async fn read_checksum(&mut self) -> Result<u8, ChipError<E>> {
        let mut checksum = [0];

        self.transport
            .read(
                self.config.address,
                commands::BLOCK_DATA_CHECKSUM,
                &mut checksum,
            )
            .await?;

        Ok(checksum[0])
    }

    async fn write_register(&mut self, register: u8, data: &[u8]) -> Result<(), ChipError<E>> {
        self.transport
            .write(self.config.address, register, data)
            .await?;
        Ok(())
    }

    /// Points the BlockData() window at `block` of `class`
    async fn memblock_prepare_op(&mut self, class: u8, block: u8) -> Result<(), ChipError<E>> {
        self.write_register(commands::BLOCK_DATA_CONTROL, &[0]).await?;
        self.write_register(commands::DATA_CLASS, &[class]).await?;
        self.write_register(commands::DATA_BLOCK, &[block]).await?;

        self.delay.delay_ms(BLOCK_SETTLE_MS).await;

        Ok(())
    }

    /// Selects and reads one 32-byte block
    ///
    /// A block whose contents do not match the checksum reported by the gauge
    /// means the selection did not take, which is reported as
    /// [`ChipError::BlockSelect`].
    pub async fn read_block(&mut self, class: u8, block: u8) -> Result<MemoryBlock, ChipError<E>> {
        self.memblock_prepare_op(class, block).await?;

        let mut memblock = MemoryBlock::new();
        let checksum = self.read_checksum().await?;

        self.transport
            .read(self.config.address, commands::BLOCK_DATA, &mut memblock.raw)
            .await?;

        if checksum != memblock.checksum() {
            warn!(
                "block {}:{} does not match its checksum {:#x}",
                class,
                block,
                checksum
            );
            Err(ChipError::BlockSelect)
        } else {
            Ok(memblock)
        }
    }

    /// Reads `data.len()` bytes of the subclass starting at `offset`.
    /// The range must not cross a block boundary.
    pub async fn read_block_data(
        &mut self,
        class: u8,
        offset: u8,
        data: &mut [u8],
    ) -> Result<(), ChipError<E>> {
        let (block, start) = locate(offset, data.len()).ok_or(ChipError::OutOfRange)?;
        let memblock = self.read_block(class, block).await?;

        data.copy_from_slice(&memblock.raw[start..start + data.len()]);
        Ok(())
    }

    /// Writes the entire memory block followed by its checksum.
    /// The gauge has to be in config update mode already.
    pub async fn write_block(
        &mut self,
        class: u8,
        block: u8,
        memblock: &MemoryBlock,
    ) -> Result<(), ChipError<E>> {
        if !self.get_flags().await?.contains(StatusFlags::CFGUPMODE) {
            return Err(ChipError::NotInConfigMode);
        }

        self.memblock_prepare_op(class, block).await?;

        debug!("writing datablock {}:{}", class, block);
        self.write_register(commands::BLOCK_DATA, &memblock.raw)
            .await?;

        // Checksum goes last, this is what makes the gauge commit the block
        let checksum = memblock.checksum();
        self.write_register(commands::BLOCK_DATA_CHECKSUM, &[checksum])
            .await?;

        // Commit time
        self.delay.delay_ms(BLOCK_SETTLE_MS).await;

        if !self.config.verify_writes {
            return Ok(());
        }

        // A rejected block leaves the old checksum in place
        self.memblock_prepare_op(class, block).await?;

        let chip_checksum = self.read_checksum().await?;
        if checksum == chip_checksum {
            Ok(())
        } else {
            warn!(
                "checksum mismatch: written {:#x}, gauge has {:#x}",
                checksum,
                chip_checksum
            );
            Err(ChipError::ChecksumMismatch)
        }
    }

    /// Reads a data-flash parameter, entering config mode for the duration
    /// of the read unless the caller controls config mode.
    pub async fn read_extended(
        &mut self,
        class: u8,
        offset: u8,
        data: &mut [u8],
    ) -> Result<(), ChipError<E>> {
        locate(offset, data.len()).ok_or(ChipError::OutOfRange)?;

        let owned = self.begin_update().await?;
        self.read_block_data(class, offset, data).await?;
        self.end_update(owned, false).await
    }

    /// Read-modify-write of a data-flash parameter: the whole block is read,
    /// `data` is patched in at `offset`, and the block is written back with a
    /// fresh checksum. Config mode is entered before and left with resimulation
    /// after the write unless the caller controls config mode.
    pub async fn write_extended(
        &mut self,
        class: u8,
        offset: u8,
        data: &[u8],
    ) -> Result<(), ChipError<E>> {
        let (block, start) = locate(offset, data.len()).ok_or(ChipError::OutOfRange)?;

        let owned = self.begin_update().await?;

        let mut memblock = self.read_block(class, block).await?;
        memblock.raw[start..start + data.len()].copy_from_slice(data);
        self.write_block(class, block, &memblock).await?;

        self.end_update(owned, true).await
    }
}
