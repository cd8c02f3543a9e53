//! Partition discovery and byte-granular disk reads

pub mod aligned;
pub mod reader;
pub mod resolver;

pub use aligned::{is_io_aligned, AlignedBuffer};
pub use reader::BlockIoDisk;
pub use resolver::{resolve, MatchKind, Resolved};

use crate::error::Result;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use gpt_disk_types::GptPartitionName;

/// A GPT partition living on the same disk as the launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionCandidate<H> {
    pub handle: H,
    pub name: String,
}

/// Sibling-partition enumeration on the boot disk
pub trait PartitionEnumerator {
    type Handle: Copy + PartialEq + fmt::Debug;

    /// GPT partitions sharing the physical disk of `device`
    fn sibling_partitions(
        &mut self,
        device: Self::Handle,
    ) -> Result<Vec<PartitionCandidate<Self::Handle>>>;

    /// 1-based GPT index of `partition`, 0 when it carries none
    fn partition_index(&mut self, partition: Self::Handle) -> u32;
}

/// Random-access reads with byte offsets
pub trait DiskRead {
    /// Readable size in bytes
    fn capacity(&self) -> u64;

    /// Fill `buf` from `offset`. Reads past `capacity` fail.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;
}

/// Enumeration plus a way to open a reader on a resolved partition
pub trait PartitionReader: PartitionEnumerator {
    type Reader: DiskRead;

    fn open(&mut self, partition: Self::Handle) -> Result<Self::Reader>;
}

/// Decode a GPT partition name (UCS-2, NUL-terminated)
pub fn partition_label(name: &GptPartitionName) -> String {
    let units = name
        .0
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0);

    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
