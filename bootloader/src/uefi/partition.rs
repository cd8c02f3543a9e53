//! Sibling GPT partitions through EFI_PARTITION_INFO_PROTOCOL

use super::block_io::{BlockIoProtocol, EFI_BLOCK_IO_PROTOCOL_GUID};
use super::block_io_adapter::UefiBlockIo;
use super::device_path::{device_path_of, split_hard_drive};
use super::{handle_protocol, locate_handles, EfiHandle};
use crate::BootServices;
use abboot_core::disk::{
    partition_label, BlockIoDisk, PartitionCandidate, PartitionEnumerator, PartitionReader,
};
use abboot_core::error::{BootError, Result};
use alloc::vec::Vec;
use core::ptr;
use gpt_disk_types::GptPartitionEntry;
use log::{debug, error};

pub const EFI_PARTITION_INFO_PROTOCOL_GUID: [u8; 16] = [
    0x2c, 0xf6, 0xf2, 0x8c, 0x9b, 0xbc, 0x21, 0x48, 0x80, 0x8d, 0xec, 0x9e, 0xc4, 0x21, 0xa1, 0xa0,
];

const PARTITION_TYPE_GPT: u32 = 0x02;

/// Packed protocol header; the MBR/GPT entry union follows it
#[repr(C, packed)]
struct PartitionInfoHeader {
    _revision: u32,
    kind: u32,
    _system: u8,
    _reserved: [u8; 7],
}

/// GPT entry of a partition handle, `None` for MBR and unknown types
fn gpt_entry(bs: &BootServices, handle: EfiHandle) -> Option<GptPartitionEntry> {
    let info = handle_protocol::<u8>(bs, handle, &EFI_PARTITION_INFO_PROTOCOL_GUID).ok()?;

    // SAFETY: the protocol is a packed header followed by a full partition
    // entry; both reads tolerate any alignment
    unsafe {
        let header = ptr::read_unaligned(info as *const PartitionInfoHeader);
        let kind = header.kind;
        if kind != PARTITION_TYPE_GPT {
            return None;
        }
        let entry = info.add(core::mem::size_of::<PartitionInfoHeader>());
        Some(ptr::read_unaligned(entry as *const GptPartitionEntry))
    }
}

pub struct UefiPartitions<'a> {
    bs: &'a BootServices,
}

impl<'a> UefiPartitions<'a> {
    pub fn new(bs: &'a BootServices) -> Self {
        Self { bs }
    }
}

impl PartitionEnumerator for UefiPartitions<'_> {
    type Handle = EfiHandle;

    fn sibling_partitions(&mut self, device: EfiHandle) -> Result<Vec<PartitionCandidate<EfiHandle>>> {
        let device_path = device_path_of(self.bs, device).ok_or_else(|| {
            error!("Boot device has no device path");
            BootError::NotFound
        })?;
        let (disk, _) = split_hard_drive(device_path).ok_or_else(|| {
            error!("Boot device is not a hard drive partition");
            BootError::DeviceError
        })?;

        let handles = locate_handles(self.bs, &EFI_PARTITION_INFO_PROTOCOL_GUID).map_err(|status| {
            error!("Failed to locate partitions: {:#x}", status);
            BootError::DeviceError
        })?;

        let mut siblings = Vec::new();
        for handle in handles {
            let on_disk = device_path_of(self.bs, handle)
                .and_then(split_hard_drive)
                .is_some_and(|(prefix, _)| prefix == disk);
            if !on_disk {
                continue;
            }
            if let Some(entry) = gpt_entry(self.bs, handle) {
                siblings.push(PartitionCandidate {
                    handle,
                    name: partition_label(&entry.name),
                });
            }
        }

        debug!("{} GPT partitions on boot disk", siblings.len());
        Ok(siblings)
    }

    fn partition_index(&mut self, partition: EfiHandle) -> u32 {
        device_path_of(self.bs, partition)
            .and_then(split_hard_drive)
            .map_or(0, |(_, number)| number)
    }
}

impl PartitionReader for UefiPartitions<'_> {
    type Reader = BlockIoDisk<UefiBlockIo>;

    fn open(&mut self, partition: EfiHandle) -> Result<Self::Reader> {
        let protocol = handle_protocol::<BlockIoProtocol>(self.bs, partition, &EFI_BLOCK_IO_PROTOCOL_GUID)
            .map_err(|status| {
                error!("Failed to get BlockIo on partition: {:#x}", status);
                BootError::DeviceError
            })?;

        // SAFETY: the protocol stays installed while boot services are up
        let io = unsafe { UefiBlockIo::new(protocol) }.map_err(|err| {
            error!("{}", err);
            BootError::DeviceError
        })?;
        BlockIoDisk::new(io)
    }
}
