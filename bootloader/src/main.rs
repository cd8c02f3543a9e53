//! abboot UEFI application
//!
//! Reads the boot chain from firmware variables, runs the rootfs failover
//! check and starts the kernel from the matching boot/dtb partition pair on
//! the disk this image was loaded from. Everything except the firmware glue
//! lives in `abboot-core`.

#![no_std]
#![no_main]

extern crate alloc;

use abboot_core::{logger, Launcher, LauncherConfig};
use alloc::boxed::Box;
use alloc::format;
use core::panic::PanicInfo;
use log::{error, info, LevelFilter};

mod boot;
mod uefi;
mod uefi_allocator;

use boot::firmware::UefiFirmware;
use uefi::console::Console;
use uefi::loaded_image::LoadedImageProtocol;
use uefi::partition::UefiPartitions;
use uefi::variables::RuntimeVariables;
use uefi::{EfiHandle, EFI_SUCCESS};

#[repr(C)]
pub struct SimpleTextOutputProtocol {
    _reset: extern "efiapi" fn(*mut SimpleTextOutputProtocol, bool) -> usize,
    pub output_string: extern "efiapi" fn(*mut SimpleTextOutputProtocol, *const u16) -> usize,
    // Remaining members are never called
}

#[repr(C)]
pub struct SystemTable {
    _header: [u8; 24],
    _firmware_vendor: *const u16,
    _firmware_revision: u32,
    _console_in_handle: *const (),
    _con_in: *const (),
    _console_out_handle: *const (),
    pub con_out: *mut SimpleTextOutputProtocol,
    _stderr_handle: *const (),
    _stderr: *const (),
    pub runtime_services: *const RuntimeServices,
    pub boot_services: *const BootServices,
    pub number_of_table_entries: usize,
    pub configuration_table: *const ConfigurationTable,
}

#[repr(C)]
pub struct RuntimeServices {
    _header: [u8; 24],
    // Time Services
    _get_time: usize,
    _set_time: usize,
    _get_wakeup_time: usize,
    _set_wakeup_time: usize,
    // Virtual Memory Services
    _set_virtual_address_map: usize,
    _convert_pointer: usize,
    // Variable Services
    pub get_variable: extern "efiapi" fn(
        name: *const u16,
        vendor: *const [u8; 16],
        attributes: *mut u32,
        data_size: *mut usize,
        data: *mut u8,
    ) -> usize,
    _get_next_variable_name: usize,
    pub set_variable: extern "efiapi" fn(
        name: *const u16,
        vendor: *const [u8; 16],
        attributes: u32,
        data_size: usize,
        data: *const u8,
    ) -> usize,
    // Miscellaneous Services
    _get_next_high_monotonic_count: usize,
    pub reset_system: extern "efiapi" fn(
        reset_type: u32, // 0=Cold, 1=Warm, 2=Shutdown, 3=PlatformSpecific
        reset_status: usize,
        data_size: usize,
        reset_data: *const (),
    ) -> !,
}

#[repr(C)]
pub struct ConfigurationTable {
    pub vendor_guid: [u8; 16],
    pub vendor_table: *const (),
}

#[repr(C)]
pub struct BootServices {
    _header: [u8; 24],
    // Task Priority Services
    _raise_tpl: usize,
    _restore_tpl: usize,
    // Memory Services
    pub allocate_pages: extern "efiapi" fn(
        allocate_type: usize,
        memory_type: usize,
        pages: usize,
        memory: *mut u64,
    ) -> usize,
    pub free_pages: extern "efiapi" fn(memory: u64, pages: usize) -> usize,
    _get_memory_map: usize,
    pub allocate_pool:
        extern "efiapi" fn(pool_type: usize, size: usize, buffer: *mut *mut u8) -> usize,
    pub free_pool: extern "efiapi" fn(buffer: *mut u8) -> usize,
    // Event & Timer Services
    _create_event: usize,
    _set_timer: usize,
    _wait_for_event: usize,
    _signal_event: usize,
    _close_event: usize,
    _check_event: usize,
    // Protocol Handler Services
    pub install_protocol_interface: extern "efiapi" fn(
        handle: *mut EfiHandle,
        protocol: *const [u8; 16],
        interface_type: usize,
        interface: *mut core::ffi::c_void,
    ) -> usize,
    _reinstall_protocol_interface: usize,
    pub uninstall_protocol_interface: extern "efiapi" fn(
        handle: EfiHandle,
        protocol: *const [u8; 16],
        interface: *mut core::ffi::c_void,
    ) -> usize,
    pub handle_protocol: extern "efiapi" fn(
        handle: EfiHandle,
        protocol: *const [u8; 16],
        interface: *mut *mut (),
    ) -> usize,
    _reserved: usize,
    _register_protocol_notify: usize,
    pub locate_handle: extern "efiapi" fn(
        search_type: usize,
        protocol: *const [u8; 16],
        search_key: *const (),
        buffer_size: *mut usize,
        buffer: *mut EfiHandle,
    ) -> usize,
    _locate_device_path: usize,
    pub install_configuration_table:
        extern "efiapi" fn(guid: *const [u8; 16], table: *const core::ffi::c_void) -> usize,
    // Image Services
    pub load_image: extern "efiapi" fn(
        boot_policy: bool,
        parent_image_handle: EfiHandle,
        file_path: *const (),
        source_buffer: *const core::ffi::c_void,
        source_size: usize,
        image_handle: *mut EfiHandle,
    ) -> usize,
    pub start_image: extern "efiapi" fn(
        image_handle: EfiHandle,
        exit_data_size: *mut usize,
        exit_data: *mut *mut u16,
    ) -> usize,
    _exit: usize,
    pub unload_image: extern "efiapi" fn(image_handle: EfiHandle) -> usize,
    _exit_boot_services: usize,
    // Miscellaneous Services
    _get_next_monotonic_count: usize,
    /// Stall for microseconds
    pub stall: extern "efiapi" fn(microseconds: usize) -> usize,
}

#[no_mangle]
pub extern "efiapi" fn efi_main(image_handle: EfiHandle, system_table: *const SystemTable) -> usize {
    // SAFETY: firmware passes a valid system table that outlives boot services
    let st = unsafe { &*system_table };
    let bs = unsafe { &*st.boot_services };
    let rt = unsafe { &*st.runtime_services };

    uefi_allocator::set_boot_services(st.boot_services);

    let mut console = Console::new(st.con_out);
    let sink: &'static mut Console = Box::leak(Box::new(Console::new(st.con_out)));
    // Console shows Info and above, the history also keeps debug lines
    if logger::init(sink, LevelFilter::Debug).is_err() {
        console.print_line("abboot: logger already installed, continuing without log history");
    }

    let loaded_image = match LoadedImageProtocol::of(bs, image_handle) {
        Ok(loaded_image) => loaded_image,
        Err(status) => {
            error!("Failed to get LoadedImage protocol: {:#x}", status);
            return status;
        }
    };
    let device = loaded_image.device_handle();
    let options = loaded_image.load_options();
    info!("abboot {}", env!("CARGO_PKG_VERSION"));

    let mut launcher = Launcher::new(
        RuntimeVariables::new(rt),
        UefiPartitions::new(bs),
        UefiFirmware::new(system_table, image_handle, Console::new(st.con_out)),
        LauncherConfig::default(),
    );

    match launcher.run(device, options.as_deref()) {
        Ok(()) => EFI_SUCCESS,
        Err(err) => {
            error!("Boot attempt failed: {}", err);
            dump_log_history(&mut console);
            uefi::status_of(err)
        }
    }
}

/// Replay the retained log, debug lines included, after a failed attempt
fn dump_log_history(console: &mut Console) {
    console.print_line(&format!(
        "--- last {} of {} log lines ---",
        logger::log_count(),
        logger::total_logged()
    ));
    for line in logger::get_logs() {
        console.print_line(&line);
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    error!("{}", info);
    loop {
        core::hint::spin_loop();
    }
}
