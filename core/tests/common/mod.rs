//! Common test utilities: in-memory disks, variables and firmware

#![allow(dead_code)]

pub mod builder;
pub use builder::{fdt_blob, BootImageBuilder};

use abboot_core::disk::{BlockIoDisk, PartitionCandidate, PartitionEnumerator, PartitionReader};
use abboot_core::error::{BootError, Result};
use abboot_core::image::BootImage;
use abboot_core::platform::{DeviceTreeRef, Firmware, InstalledTree};
use abboot_core::vars::counters::STATUS_NORMAL;
use abboot_core::vars::{RootfsVar, VarError, Variable, VariableStore};
use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};
use std::collections::{HashMap, HashSet};
use std::io;

pub const BLOCK_SIZE: usize = 512;

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    /// Pads `data` up to a whole number of blocks
    pub fn new(mut data: Vec<u8>) -> Self {
        let padded = data.len().div_ceil(BLOCK_SIZE).max(1) * BLOCK_SIZE;
        data.resize(padded, 0);
        Self {
            data,
            block_size: BLOCK_SIZE,
        }
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> std::result::Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> std::result::Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + dst.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read beyond end of device",
            ));
        }
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> std::result::Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + src.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write beyond end of device",
            ));
        }
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> std::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// Variable store backed by a map, with per-name failure injection
#[derive(Debug, Default)]
pub struct MemoryVariableStore {
    pub values: HashMap<String, (u32, u32)>,
    pub fail_get: HashSet<String>,
    pub fail_set: HashSet<String>,
    pub reads: Vec<String>,
    pub writes: Vec<(String, u32)>,
    pub deletes: Vec<String>,
}

impl MemoryVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with both status counters present and healthy
    pub fn with_slots(retry_a: Option<u32>, retry_b: Option<u32>) -> Self {
        let mut store = Self::new();
        store.put(&RootfsVar::StatusA.variable(), STATUS_NORMAL);
        store.put(&RootfsVar::StatusB.variable(), STATUS_NORMAL);
        if let Some(retry) = retry_a {
            store.put(&RootfsVar::RetryA.variable(), retry);
        }
        if let Some(retry) = retry_b {
            store.put(&RootfsVar::RetryB.variable(), retry);
        }
        store
    }

    /// Seed a value without recording a write
    pub fn put(&mut self, var: &Variable, value: u32) {
        self.values
            .insert(var.name.to_string(), (var.attributes, value));
    }

    pub fn value(&self, var: &Variable) -> Option<u32> {
        self.values.get(var.name).map(|&(_, value)| value)
    }

    pub fn attributes(&self, var: &Variable) -> Option<u32> {
        self.values.get(var.name).map(|&(attributes, _)| attributes)
    }

    pub fn counter(&self, var: RootfsVar) -> Option<u32> {
        self.value(&var.variable())
    }

    pub fn clear_log(&mut self) {
        self.reads.clear();
        self.writes.clear();
        self.deletes.clear();
    }
}

impl VariableStore for MemoryVariableStore {
    fn get(&mut self, var: &Variable) -> std::result::Result<Option<u32>, VarError> {
        self.reads.push(var.name.to_string());
        if self.fail_get.contains(var.name) {
            return Err(VarError::Firmware(0x8000_0000_0000_0007));
        }
        Ok(self.value(var))
    }

    fn set(&mut self, var: &Variable, value: u32) -> std::result::Result<(), VarError> {
        if self.fail_set.contains(var.name) {
            return Err(VarError::Firmware(0x8000_0000_0000_0008));
        }
        self.writes.push((var.name.to_string(), value));
        self.put(var, value);
        Ok(())
    }

    fn delete(&mut self, var: &Variable) -> std::result::Result<(), VarError> {
        self.deletes.push(var.name.to_string());
        self.values.remove(var.name);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FakePartition {
    pub name: String,
    pub index: u32,
    pub data: Vec<u8>,
}

/// Disk with named partitions; handles are positions in `partitions`
#[derive(Debug, Default)]
pub struct FakeDisks {
    pub partitions: Vec<FakePartition>,
    pub opened: Vec<String>,
}

/// Handle of the disk the launcher was started from
pub const BOOT_DEVICE: usize = usize::MAX;

impl FakeDisks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, data: Vec<u8>) -> Self {
        let index = self.partitions.len() as u32 + 1;
        self.partitions.push(FakePartition {
            name: name.to_string(),
            index,
            data,
        });
        self
    }

    pub fn names(names: &[&str]) -> Self {
        names
            .iter()
            .fold(Self::new(), |disks, name| disks.with(name, vec![0u8; BLOCK_SIZE]))
    }

    pub fn handle_of(&self, name: &str) -> usize {
        self.partitions
            .iter()
            .position(|p| p.name == name)
            .expect("partition exists")
    }
}

impl PartitionEnumerator for FakeDisks {
    type Handle = usize;

    fn sibling_partitions(&mut self, _device: usize) -> Result<Vec<PartitionCandidate<usize>>> {
        Ok(self
            .partitions
            .iter()
            .enumerate()
            .map(|(handle, p)| PartitionCandidate {
                handle,
                name: p.name.clone(),
            })
            .collect())
    }

    fn partition_index(&mut self, partition: usize) -> u32 {
        self.partitions.get(partition).map_or(0, |p| p.index)
    }
}

impl PartitionReader for FakeDisks {
    type Reader = BlockIoDisk<MemoryBlockDevice>;

    fn open(&mut self, partition: usize) -> Result<Self::Reader> {
        let p = self.partitions.get(partition).ok_or(BootError::NotFound)?;
        self.opened.push(p.name.clone());
        BlockIoDisk::new(MemoryBlockDevice::new(p.data.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedKernel {
    pub kernel: Vec<u8>,
    pub ramdisk: Option<Vec<u8>>,
    pub cmdline: String,
}

/// Firmware double recording every call
#[derive(Debug)]
pub struct FakeFirmware {
    pub acpi: bool,
    pub active: Option<DeviceTreeRef>,
    pub installed: Vec<Vec<u8>>,
    pub restored: Vec<DeviceTreeRef>,
    pub released: Vec<InstalledTree>,
    pub started: Vec<StartedKernel>,
    pub start_result: Result<()>,
    pub stalls: Vec<u64>,
    pub announcements: Vec<String>,
    pub next_address: u64,
}

impl Default for FakeFirmware {
    fn default() -> Self {
        Self {
            acpi: false,
            active: None,
            installed: Vec::new(),
            restored: Vec::new(),
            released: Vec::new(),
            started: Vec::new(),
            start_result: Ok(()),
            stalls: Vec::new(),
            announcements: Vec::new(),
            next_address: 0x8000_0000,
        }
    }
}

impl FakeFirmware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_tree(address: u64) -> Self {
        Self {
            active: Some(DeviceTreeRef(address)),
            ..Self::default()
        }
    }

    pub fn failing_kernel() -> Self {
        Self {
            start_result: Err(BootError::TransferError),
            ..Self::default()
        }
    }
}

impl Firmware for FakeFirmware {
    fn has_acpi_tables(&mut self) -> bool {
        self.acpi
    }

    fn active_device_tree(&mut self) -> Option<DeviceTreeRef> {
        self.active
    }

    fn install_device_tree(&mut self, tree: &[u8]) -> Result<InstalledTree> {
        let installed = InstalledTree {
            address: self.next_address,
            pages: tree.len().div_ceil(4096),
        };
        self.next_address += 0x10_0000;
        self.installed.push(tree.to_vec());
        self.active = Some(DeviceTreeRef(installed.address));
        Ok(installed)
    }

    fn restore_device_tree(&mut self, previous: DeviceTreeRef) -> Result<()> {
        self.restored.push(previous);
        self.active = Some(previous);
        Ok(())
    }

    fn release_device_tree(&mut self, tree: InstalledTree) {
        if self.active == Some(DeviceTreeRef(tree.address)) {
            self.active = None;
        }
        self.released.push(tree);
    }

    fn start_kernel(&mut self, image: &BootImage<'_>) -> Result<()> {
        self.started.push(StartedKernel {
            kernel: image.kernel.to_vec(),
            ramdisk: image.ramdisk.map(<[u8]>::to_vec),
            cmdline: image.cmdline.clone(),
        });
        self.start_result
    }

    fn stall(&mut self, micros: u64) {
        self.stalls.push(micros);
    }

    fn announce(&mut self, message: &str) {
        self.announcements.push(message.to_string());
    }

    fn reset_cold(&mut self) -> ! {
        panic!("cold reset");
    }
}
