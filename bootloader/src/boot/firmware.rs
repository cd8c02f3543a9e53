//! `Firmware` on UEFI boot and runtime services

use super::efi_stub::{boot_via_efi_stub, EfiStubError};
use crate::uefi::console::Console;
use crate::uefi::{EfiHandle, EFI_SUCCESS};
use crate::{BootServices, ConfigurationTable, RuntimeServices, SystemTable};
use abboot_core::error::{BootError, Result};
use abboot_core::image::BootImage;
use abboot_core::platform::{DeviceTreeRef, Firmware, InstalledTree};
use core::ptr;
use log::{error, warn};

pub const ACPI_20_TABLE_GUID: [u8; 16] = [
    0x71, 0xe8, 0x68, 0x88, 0xf1, 0xe4, 0xd3, 0x11, 0xbc, 0x22, 0x00, 0x80, 0xc7, 0x3c, 0x88, 0x81,
];

pub const FDT_TABLE_GUID: [u8; 16] = [
    0xd5, 0x21, 0xb6, 0xb1, 0x9c, 0xf1, 0xa5, 0x41, 0x83, 0x0b, 0xd9, 0x15, 0x2c, 0x69, 0xaa, 0xe0,
];

const PAGE_SIZE: usize = 4096;
const ALLOCATE_ANY_PAGES: usize = 0;
const EFI_BOOT_SERVICES_DATA: usize = 4;
const RESET_COLD: u32 = 0;

pub struct UefiFirmware {
    system_table: *const SystemTable,
    image_handle: EfiHandle,
    console: Console,
}

impl UefiFirmware {
    pub fn new(system_table: *const SystemTable, image_handle: EfiHandle, console: Console) -> Self {
        Self {
            system_table,
            image_handle,
            console,
        }
    }

    fn boot_services(&self) -> &BootServices {
        // SAFETY: valid until ExitBootServices, which the kernel calls
        unsafe { &*(*self.system_table).boot_services }
    }

    fn runtime_services(&self) -> &RuntimeServices {
        unsafe { &*(*self.system_table).runtime_services }
    }

    /// Look up a configuration table by GUID
    fn find_table(&self, guid: &[u8; 16]) -> Option<*const ()> {
        // InstallConfigurationTable may move the array, so re-read both fields
        let (count, tables) = unsafe {
            let st = self.system_table;
            (
                ptr::read_volatile(ptr::addr_of!((*st).number_of_table_entries)),
                ptr::read_volatile(ptr::addr_of!((*st).configuration_table)),
            )
        };
        if tables.is_null() {
            return None;
        }

        // SAFETY: firmware keeps `count` entries at `tables`
        let tables: &[ConfigurationTable] = unsafe { core::slice::from_raw_parts(tables, count) };
        tables
            .iter()
            .find(|table| &table.vendor_guid == guid)
            .map(|table| table.vendor_table)
    }

    fn publish_tree(&self, table: *const ()) -> Result<()> {
        let status =
            (self.boot_services().install_configuration_table)(&FDT_TABLE_GUID, table as *const _);
        if status == EFI_SUCCESS {
            Ok(())
        } else {
            error!("InstallConfigurationTable failed: {:#x}", status);
            Err(BootError::DeviceError)
        }
    }
}

impl Firmware for UefiFirmware {
    fn has_acpi_tables(&mut self) -> bool {
        self.find_table(&ACPI_20_TABLE_GUID).is_some()
    }

    fn active_device_tree(&mut self) -> Option<DeviceTreeRef> {
        self.find_table(&FDT_TABLE_GUID)
            .filter(|table| !table.is_null())
            .map(|table| DeviceTreeRef(table as u64))
    }

    fn install_device_tree(&mut self, tree: &[u8]) -> Result<InstalledTree> {
        let pages = tree.len().div_ceil(PAGE_SIZE);
        let mut address = 0u64;
        let status = (self.boot_services().allocate_pages)(
            ALLOCATE_ANY_PAGES,
            EFI_BOOT_SERVICES_DATA,
            pages,
            &mut address,
        );
        if status != EFI_SUCCESS {
            error!("Failed to allocate {} pages for DTB: {:#x}", pages, status);
            return Err(BootError::OutOfResources);
        }

        // SAFETY: freshly allocated, `pages` pages cover `tree`
        unsafe { ptr::copy_nonoverlapping(tree.as_ptr(), address as *mut u8, tree.len()) };

        let installed = InstalledTree { address, pages };
        if let Err(err) = self.publish_tree(address as *const ()) {
            (self.boot_services().free_pages)(address, pages);
            return Err(err);
        }
        Ok(installed)
    }

    fn restore_device_tree(&mut self, previous: DeviceTreeRef) -> Result<()> {
        self.publish_tree(previous.0 as *const ())
    }

    fn release_device_tree(&mut self, tree: InstalledTree) {
        if self.active_device_tree() == Some(DeviceTreeRef(tree.address)) {
            // A null table removes the entry
            if self.publish_tree(ptr::null()).is_err() {
                warn!("Leaving DTB at {:#x} installed", tree.address);
                return;
            }
        }
        (self.boot_services().free_pages)(tree.address, tree.pages);
    }

    fn start_kernel(&mut self, image: &BootImage<'_>) -> Result<()> {
        boot_via_efi_stub(self.boot_services(), self.image_handle, image).map_err(|err| {
            error!("Failed to start kernel: {}", err);
            match err {
                EfiStubError::NotPe => BootError::ParseError,
                _ => BootError::TransferError,
            }
        })
    }

    fn stall(&mut self, micros: u64) {
        (self.boot_services().stall)(micros as usize);
    }

    fn announce(&mut self, message: &str) {
        self.console.print_line(message);
    }

    fn reset_cold(&mut self) -> ! {
        (self.runtime_services().reset_system)(RESET_COLD, EFI_SUCCESS, 0, ptr::null())
    }
}
