//! Firmware services used after a partition has been chosen
//!
//! Configuration tables, kernel hand-off, timing and reset. The bootloader
//! implements this on top of UEFI boot and runtime services.

use crate::error::Result;
use crate::image::BootImage;

/// Address of a device tree published by firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTreeRef(pub u64);

/// Device tree copied into firmware-owned pages by `install_device_tree`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstalledTree {
    pub address: u64,
    pub pages: usize,
}

pub trait Firmware {
    /// ACPI tables are published, so no device tree is needed
    fn has_acpi_tables(&mut self) -> bool;

    /// Device tree currently published, if any
    fn active_device_tree(&mut self) -> Option<DeviceTreeRef>;

    /// Copy `tree` into firmware memory and publish it
    fn install_device_tree(&mut self, tree: &[u8]) -> Result<InstalledTree>;

    /// Publish `previous` again
    fn restore_device_tree(&mut self, previous: DeviceTreeRef) -> Result<()>;

    /// Unpublish `tree` if it is still published and free its pages
    fn release_device_tree(&mut self, tree: InstalledTree);

    /// Hand control to the kernel. `Ok` means the kernel returned success.
    fn start_kernel(&mut self, image: &BootImage<'_>) -> Result<()>;

    fn stall(&mut self, micros: u64);

    /// Console message that must reach the user regardless of log level
    fn announce(&mut self, message: &str);

    fn reset_cold(&mut self) -> !;
}
