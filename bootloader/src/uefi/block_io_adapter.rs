//! UEFI BlockIo to gpt_disk_io::BlockIo adapter
//!
//! Lets `abboot_core::disk::BlockIoDisk` read partitions through the
//! firmware's BlockIo protocol.

use super::block_io::BlockIoProtocol;
use abboot_core::disk::{is_io_aligned, AlignedBuffer};
use core::fmt;
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

#[derive(Debug, Clone, Copy)]
pub enum UefiBlockIoError {
    /// Media reports a block size `gpt_disk_types` rejects
    BadBlockSize(u32),
    /// No memory for an aligned bounce buffer
    OutOfMemory,
    /// Writes are not supported
    ReadOnly,
    Status(usize),
}

impl fmt::Display for UefiBlockIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadBlockSize(size) => write!(f, "unsupported block size {}", size),
            Self::OutOfMemory => f.write_str("out of memory for aligned read"),
            Self::ReadOnly => f.write_str("block device opened read-only"),
            Self::Status(status) => write!(f, "UEFI BlockIo error: {:#x}", status),
        }
    }
}

/// Wrapper around UEFI BlockIoProtocol implementing gpt_disk_io::BlockIo
pub struct UefiBlockIo {
    protocol: *mut BlockIoProtocol,
    block_size: BlockSize,
    num_blocks: u64,
    io_align: u32,
}

impl UefiBlockIo {
    /// # Safety
    /// The protocol pointer must be valid for the lifetime of this wrapper.
    pub unsafe fn new(protocol: *mut BlockIoProtocol) -> Result<Self, UefiBlockIoError> {
        let media = &*(*protocol).media;
        let block_size =
            BlockSize::new(media.block_size).ok_or(UefiBlockIoError::BadBlockSize(media.block_size))?;

        Ok(Self {
            protocol,
            block_size,
            num_blocks: media.last_block + 1,
            io_align: media.io_align,
        })
    }
}

impl BlockIo for UefiBlockIo {
    type Error = UefiBlockIoError;

    fn block_size(&self) -> BlockSize {
        self.block_size
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok(self.num_blocks)
    }

    fn read_blocks(&mut self, start_lba: Lba, buffer: &mut [u8]) -> Result<(), Self::Error> {
        if buffer.is_empty() {
            return Ok(());
        }

        // SAFETY: Protocol pointer is valid (guaranteed by constructor)
        let protocol = unsafe { &mut *self.protocol };
        if is_io_aligned(buffer, self.io_align) {
            return protocol
                .read_sectors(start_lba.0, buffer)
                .map_err(UefiBlockIoError::Status);
        }

        let mut bounce = AlignedBuffer::new(buffer.len(), self.io_align as usize)
            .ok_or(UefiBlockIoError::OutOfMemory)?;
        protocol
            .read_sectors(start_lba.0, &mut bounce)
            .map_err(UefiBlockIoError::Status)?;
        buffer.copy_from_slice(&bounce);
        Ok(())
    }

    fn write_blocks(&mut self, _start_lba: Lba, _buffer: &[u8]) -> Result<(), Self::Error> {
        Err(UefiBlockIoError::ReadOnly)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
