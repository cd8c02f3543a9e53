//! Kernel hand-off through LoadImage/StartImage
//!
//! The kernel is loaded from memory with a memory-mapped device path, the
//! command line goes into the loaded image's load options, and the ramdisk
//! is served through a LoadFile2 protocol on the Linux initrd media path.

use crate::uefi::device_path::EFI_DEVICE_PATH_PROTOCOL_GUID;
use crate::uefi::loaded_image::{LoadedImageProtocol, EFI_LOADED_IMAGE_PROTOCOL_GUID};
use crate::uefi::{
    handle_protocol, EfiHandle, EFI_BUFFER_TOO_SMALL, EFI_INVALID_PARAMETER, EFI_SUCCESS,
};
use crate::BootServices;
use abboot_core::image::BootImage;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ffi::c_void;
use core::fmt;
use core::mem::size_of;
use core::ptr;

const EFI_NATIVE_INTERFACE: usize = 0;
const EFI_LOADER_DATA: u32 = 2;
const EFI_HARDWARE_DEVICE_PATH_TYPE: u8 = 0x01;
const EFI_MEDIA_DEVICE_PATH_TYPE: u8 = 0x04;
const EFI_MEMORY_MAPPED_DEVICE_PATH_SUBTYPE: u8 = 0x03;
const EFI_VENDOR_MEDIA_DEVICE_PATH_SUBTYPE: u8 = 0x03;
const EFI_END_DEVICE_PATH_TYPE: u8 = 0x7f;
const EFI_END_ENTIRE_DEVICE_PATH_SUBTYPE: u8 = 0xff;

const EFI_LOAD_FILE2_PROTOCOL_GUID: [u8; 16] = [
    0xc1, 0xc0, 0x06, 0x40, 0xb3, 0xfc, 0x3e, 0x40, 0x99, 0x6d, 0x4a, 0x6c, 0x87, 0x24, 0xe0, 0x6d,
];

const LINUX_EFI_INITRD_MEDIA_GUID: [u8; 16] = [
    0x27, 0xe4, 0x68, 0x55, 0xfc, 0x68, 0x3d, 0x4f, 0xac, 0x74, 0xca, 0x55, 0x52, 0x31, 0xcc, 0x68,
];

#[repr(C)]
struct DevicePathHeader {
    r#type: u8,
    sub_type: u8,
    length: [u8; 2],
}

impl DevicePathHeader {
    const fn new(r#type: u8, sub_type: u8, len: usize) -> Self {
        Self {
            r#type,
            sub_type,
            length: (len as u16).to_le_bytes(),
        }
    }

    const fn end() -> Self {
        Self::new(
            EFI_END_DEVICE_PATH_TYPE,
            EFI_END_ENTIRE_DEVICE_PATH_SUBTYPE,
            size_of::<DevicePathHeader>(),
        )
    }
}

#[repr(C, packed)]
struct MemoryMappedNode {
    header: DevicePathHeader,
    memory_type: u32,
    start_address: u64,
    end_address: u64,
}

#[repr(C, packed)]
struct KernelDevicePath {
    mem: MemoryMappedNode,
    end: DevicePathHeader,
}

impl KernelDevicePath {
    fn new(kernel: &[u8]) -> Self {
        let start = kernel.as_ptr() as u64;
        Self {
            mem: MemoryMappedNode {
                header: DevicePathHeader::new(
                    EFI_HARDWARE_DEVICE_PATH_TYPE,
                    EFI_MEMORY_MAPPED_DEVICE_PATH_SUBTYPE,
                    size_of::<MemoryMappedNode>(),
                ),
                memory_type: EFI_LOADER_DATA,
                start_address: start,
                end_address: start + kernel.len() as u64 - 1,
            },
            end: DevicePathHeader::end(),
        }
    }
}

#[repr(C, packed)]
struct InitrdDevicePath {
    header: DevicePathHeader,
    vendor_guid: [u8; 16],
    end: DevicePathHeader,
}

impl InitrdDevicePath {
    const fn new() -> Self {
        Self {
            header: DevicePathHeader::new(
                EFI_MEDIA_DEVICE_PATH_TYPE,
                EFI_VENDOR_MEDIA_DEVICE_PATH_SUBTYPE,
                size_of::<DevicePathHeader>() + 16,
            ),
            vendor_guid: LINUX_EFI_INITRD_MEDIA_GUID,
            end: DevicePathHeader::end(),
        }
    }
}

#[repr(C)]
struct LoadFile2Protocol {
    load_file: unsafe extern "efiapi" fn(
        this: *mut LoadFile2Protocol,
        file_path: *mut c_void,
        boot_policy: bool,
        buffer_size: *mut usize,
        buffer: *mut c_void,
    ) -> usize,
}

/// LoadFile2 instance followed by the ramdisk it serves
#[repr(C)]
struct InitrdLoadFile2 {
    protocol: LoadFile2Protocol,
    data_ptr: *const u8,
    data_len: usize,
}

unsafe extern "efiapi" fn initrd_load_file(
    this: *mut LoadFile2Protocol,
    _file_path: *mut c_void,
    _boot_policy: bool,
    buffer_size: *mut usize,
    buffer: *mut c_void,
) -> usize {
    if this.is_null() || buffer_size.is_null() {
        return EFI_INVALID_PARAMETER;
    }

    let loader = this as *mut InitrdLoadFile2;
    let required = (*loader).data_len;

    if buffer.is_null() || *buffer_size < required {
        *buffer_size = required;
        return EFI_BUFFER_TOO_SMALL;
    }

    ptr::copy_nonoverlapping((*loader).data_ptr, buffer as *mut u8, required);
    *buffer_size = required;
    EFI_SUCCESS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfiStubError {
    /// Kernel is not a PE image
    NotPe,
    LoadImage(usize),
    HandleProtocol(usize),
    InstallInitrd(usize),
    /// The kernel ran and returned this status
    StartImage(usize),
}

impl fmt::Display for EfiStubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPe => f.write_str("kernel is not an EFI stub image"),
            Self::LoadImage(status) => write!(f, "LoadImage failed: {:#x}", status),
            Self::HandleProtocol(status) => write!(f, "LoadedImage lookup failed: {:#x}", status),
            Self::InstallInitrd(status) => write!(f, "initrd protocol install failed: {:#x}", status),
            Self::StartImage(status) => write!(f, "kernel returned {:#x}", status),
        }
    }
}

/// Protocols published for the ramdisk during StartImage
struct InitrdProtocols<'a> {
    bs: &'a BootServices,
    handle: EfiHandle,
    loader: *mut InitrdLoadFile2,
    device_path: *mut InitrdDevicePath,
}

impl<'a> InitrdProtocols<'a> {
    fn install(bs: &'a BootServices, initrd: &[u8]) -> Result<Self, EfiStubError> {
        let loader = Box::into_raw(Box::new(InitrdLoadFile2 {
            protocol: LoadFile2Protocol {
                load_file: initrd_load_file,
            },
            data_ptr: initrd.as_ptr(),
            data_len: initrd.len(),
        }));
        let device_path = Box::into_raw(Box::new(InitrdDevicePath::new()));

        let mut protocols = Self {
            bs,
            handle: ptr::null_mut(),
            loader,
            device_path,
        };

        let status = (bs.install_protocol_interface)(
            &mut protocols.handle,
            &EFI_DEVICE_PATH_PROTOCOL_GUID,
            EFI_NATIVE_INTERFACE,
            device_path as *mut c_void,
        );
        if status != EFI_SUCCESS {
            return Err(EfiStubError::InstallInitrd(status));
        }

        let status = (bs.install_protocol_interface)(
            &mut protocols.handle,
            &EFI_LOAD_FILE2_PROTOCOL_GUID,
            EFI_NATIVE_INTERFACE,
            loader as *mut c_void,
        );
        if status != EFI_SUCCESS {
            return Err(EfiStubError::InstallInitrd(status));
        }

        Ok(protocols)
    }
}

impl Drop for InitrdProtocols<'_> {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            let _ = (self.bs.uninstall_protocol_interface)(
                self.handle,
                &EFI_LOAD_FILE2_PROTOCOL_GUID,
                self.loader as *mut c_void,
            );
            let _ = (self.bs.uninstall_protocol_interface)(
                self.handle,
                &EFI_DEVICE_PATH_PROTOCOL_GUID,
                self.device_path as *mut c_void,
            );
        }
        // SAFETY: both came from Box::into_raw in `install`
        unsafe {
            drop(Box::from_raw(self.loader));
            drop(Box::from_raw(self.device_path));
        }
    }
}

/// Loaded but not yet started kernel image
struct KernelHandle<'a> {
    bs: &'a BootServices,
    handle: EfiHandle,
}

impl Drop for KernelHandle<'_> {
    fn drop(&mut self) {
        let _ = (self.bs.unload_image)(self.handle);
    }
}

/// Start `image` through the kernel's EFI stub.
///
/// Returns `Ok` when the kernel exits with success; a running kernel never
/// returns here.
pub fn boot_via_efi_stub(
    bs: &BootServices,
    parent: EfiHandle,
    image: &BootImage<'_>,
) -> Result<(), EfiStubError> {
    let kernel = image.kernel;
    if kernel.len() < 2 || &kernel[0..2] != b"MZ" {
        return Err(EfiStubError::NotPe);
    }

    let device_path = KernelDevicePath::new(kernel);
    let mut handle: EfiHandle = ptr::null_mut();
    let status = (bs.load_image)(
        false,
        parent,
        &device_path as *const KernelDevicePath as *const (),
        kernel.as_ptr() as *const c_void,
        kernel.len(),
        &mut handle,
    );
    if status != EFI_SUCCESS {
        return Err(EfiStubError::LoadImage(status));
    }
    let loaded = KernelHandle { bs, handle };

    let proto = handle_protocol::<LoadedImageProtocol>(bs, loaded.handle, &EFI_LOADED_IMAGE_PROTOCOL_GUID)
        .map_err(EfiStubError::HandleProtocol)?;

    // Must outlive StartImage
    let mut options: Vec<u16> = image.cmdline.encode_utf16().collect();
    options.push(0);
    // SAFETY: protocol belongs to the image loaded above
    unsafe {
        if image.cmdline.is_empty() {
            (*proto).load_options = ptr::null_mut();
            (*proto).load_options_size = 0;
        } else {
            (*proto).load_options = options.as_mut_ptr() as *mut c_void;
            (*proto).load_options_size = (options.len() * size_of::<u16>()) as u32;
        }
    }

    let _initrd = match image.ramdisk.filter(|data| !data.is_empty()) {
        Some(ramdisk) => Some(InitrdProtocols::install(bs, ramdisk)?),
        None => None,
    };

    let status = (bs.start_image)(loaded.handle, ptr::null_mut(), ptr::null_mut());
    // StartImage unloads an image that exited
    core::mem::forget(loaded);

    if status == EFI_SUCCESS {
        Ok(())
    } else {
        Err(EfiStubError::StartImage(status))
    }
}
