//! EFI_LOADED_IMAGE_PROTOCOL

use super::{handle_protocol, EfiHandle};
use crate::BootServices;
use abboot_core::config::decode_load_options;
use alloc::string::String;
use core::ffi::c_void;
use core::slice;

pub const EFI_LOADED_IMAGE_PROTOCOL_GUID: [u8; 16] = [
    0xa1, 0x31, 0x1b, 0x5b, 0x62, 0x95, 0xd2, 0x11, 0x8e, 0x3f, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b,
];

#[repr(C)]
pub struct LoadedImageProtocol {
    _revision: u32,
    _parent_handle: EfiHandle,
    _system_table: *mut (),
    device_handle: EfiHandle,
    _file_path: *mut (),
    _reserved: *mut (),
    pub load_options_size: u32,
    pub load_options: *mut c_void,
    _image_base: *mut c_void,
    _image_size: u64,
    _image_code_type: u32,
    _image_data_type: u32,
    _unload: usize,
}

impl LoadedImageProtocol {
    pub fn of(bs: &BootServices, image: EfiHandle) -> Result<&'static mut Self, usize> {
        let proto = handle_protocol::<Self>(bs, image, &EFI_LOADED_IMAGE_PROTOCOL_GUID)?;
        // SAFETY: the protocol lives as long as the image is loaded
        Ok(unsafe { &mut *proto })
    }

    /// Partition the image was loaded from
    pub fn device_handle(&self) -> EfiHandle {
        self.device_handle
    }

    /// Load options as text, `None` when absent
    pub fn load_options(&self) -> Option<String> {
        if self.load_options.is_null() {
            return None;
        }

        // Byte view: firmware does not promise 2-byte alignment
        // SAFETY: firmware guarantees `load_options_size` readable bytes
        let raw = unsafe {
            slice::from_raw_parts(self.load_options as *const u8, self.load_options_size as usize)
        };
        decode_load_options(raw)
    }
}
