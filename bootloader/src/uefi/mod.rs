//! UEFI protocol bindings and adapters onto the core traits

pub mod block_io;
pub mod block_io_adapter;
pub mod console;
pub mod device_path;
pub mod loaded_image;
pub mod partition;
pub mod variables;

use crate::BootServices;
use abboot_core::BootError;
use alloc::vec;
use alloc::vec::Vec;
use core::mem::size_of;
use core::ptr;

pub type EfiHandle = *mut ();

pub const EFI_SUCCESS: usize = 0;
const EFI_ERROR_BIT: usize = 1usize << (size_of::<usize>() * 8 - 1);
pub const EFI_LOAD_ERROR: usize = EFI_ERROR_BIT | 1;
pub const EFI_INVALID_PARAMETER: usize = EFI_ERROR_BIT | 2;
pub const EFI_UNSUPPORTED: usize = EFI_ERROR_BIT | 3;
pub const EFI_BUFFER_TOO_SMALL: usize = EFI_ERROR_BIT | 5;
pub const EFI_DEVICE_ERROR: usize = EFI_ERROR_BIT | 7;
pub const EFI_OUT_OF_RESOURCES: usize = EFI_ERROR_BIT | 9;
pub const EFI_VOLUME_CORRUPTED: usize = EFI_ERROR_BIT | 10;
pub const EFI_NOT_FOUND: usize = EFI_ERROR_BIT | 14;

const BY_PROTOCOL: usize = 2;

/// Exit status reported to the boot manager for a failed attempt
pub fn status_of(err: BootError) -> usize {
    match err {
        BootError::InvalidParameter => EFI_INVALID_PARAMETER,
        BootError::NotFound => EFI_NOT_FOUND,
        BootError::DeviceError => EFI_DEVICE_ERROR,
        BootError::DuplicatePartition => EFI_UNSUPPORTED,
        BootError::LoadError | BootError::TransferError => EFI_LOAD_ERROR,
        BootError::ParseError => EFI_VOLUME_CORRUPTED,
        BootError::OutOfResources => EFI_OUT_OF_RESOURCES,
    }
}

/// All handles carrying `protocol`
pub fn locate_handles(bs: &BootServices, protocol: &[u8; 16]) -> Result<Vec<EfiHandle>, usize> {
    let mut buffer_size: usize = 0;
    let status = (bs.locate_handle)(
        BY_PROTOCOL,
        protocol,
        ptr::null(),
        &mut buffer_size,
        ptr::null_mut(),
    );
    match status {
        EFI_BUFFER_TOO_SMALL => {}
        EFI_NOT_FOUND => return Ok(Vec::new()),
        EFI_SUCCESS => return Ok(Vec::new()),
        other => return Err(other),
    }

    let mut handles: Vec<EfiHandle> =
        vec![ptr::null_mut(); buffer_size.div_ceil(size_of::<EfiHandle>())];
    let status = (bs.locate_handle)(
        BY_PROTOCOL,
        protocol,
        ptr::null(),
        &mut buffer_size,
        handles.as_mut_ptr(),
    );
    if status != EFI_SUCCESS {
        return Err(status);
    }

    handles.truncate(buffer_size / size_of::<EfiHandle>());
    Ok(handles)
}

/// Interface pointer of `protocol` on `handle`
pub fn handle_protocol<T>(
    bs: &BootServices,
    handle: EfiHandle,
    protocol: &[u8; 16],
) -> Result<*mut T, usize> {
    let mut interface: *mut () = ptr::null_mut();
    let status = (bs.handle_protocol)(handle, protocol, &mut interface);
    if status != EFI_SUCCESS {
        return Err(status);
    }
    if interface.is_null() {
        return Err(EFI_NOT_FOUND);
    }
    Ok(interface as *mut T)
}
