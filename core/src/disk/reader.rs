//! Byte-offset reads on top of a block device

use super::DiskRead;
use crate::error::{BootError, Result};
use alloc::vec;
use alloc::vec::Vec;
use gpt_disk_io::BlockIo;
use gpt_disk_types::Lba;
use log::error;

/// Adapts any `gpt_disk_io::BlockIo` to unaligned byte reads.
///
/// Whole blocks are read straight into the caller's buffer; partial blocks
/// at either end go through a one-block bounce buffer.
pub struct BlockIoDisk<B: BlockIo> {
    io: B,
    block_size: u64,
    capacity: u64,
    bounce: Vec<u8>,
}

impl<B: BlockIo> BlockIoDisk<B> {
    pub fn new(mut io: B) -> Result<Self> {
        let block_size = io.block_size().to_u64();
        let num_blocks = io.num_blocks().map_err(|err| {
            error!("Failed to query block count: {}", err);
            BootError::DeviceError
        })?;
        let capacity = num_blocks
            .checked_mul(block_size)
            .ok_or(BootError::DeviceError)?;

        Ok(Self {
            io,
            block_size,
            capacity,
            bounce: vec![0u8; block_size as usize],
        })
    }
}

fn read_lba<B: BlockIo>(io: &mut B, lba: u64, buf: &mut [u8]) -> Result<()> {
    io.read_blocks(Lba(lba), buf).map_err(|err| {
        error!("Block read at LBA {} failed: {}", lba, err);
        BootError::DeviceError
    })
}

impl<B: BlockIo> DiskRead for BlockIoDisk<B> {
    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or(BootError::DeviceError)?;
        if end > self.capacity {
            return Err(BootError::DeviceError);
        }

        let bs = self.block_size;
        let mut done = 0usize;

        while done < buf.len() {
            let pos = offset + done as u64;
            let lba = pos / bs;
            let within = (pos % bs) as usize;
            let remaining = buf.len() - done;

            if within == 0 && remaining as u64 >= bs {
                let whole = (remaining as u64 / bs * bs) as usize;
                read_lba(&mut self.io, lba, &mut buf[done..done + whole])?;
                done += whole;
                continue;
            }

            read_lba(&mut self.io, lba, &mut self.bounce)?;
            let take = remaining.min(bs as usize - within);
            buf[done..done + take].copy_from_slice(&self.bounce[within..within + take]);
            done += take;
        }

        Ok(())
    }
}
