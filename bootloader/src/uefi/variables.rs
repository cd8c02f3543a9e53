//! Launcher variables over Get/SetVariable

use super::{EFI_BUFFER_TOO_SMALL, EFI_NOT_FOUND, EFI_SUCCESS};
use crate::RuntimeServices;
use abboot_core::vars::{VarError, Variable, VariableStore};
use alloc::vec::Vec;
use core::mem::size_of;
use core::ptr;

/// NUL-terminated UCS-2 copy of a variable name
fn ucs2_name(name: &str) -> Vec<u16> {
    name.encode_utf16().chain(core::iter::once(0)).collect()
}

pub struct RuntimeVariables<'a> {
    rt: &'a RuntimeServices,
}

impl<'a> RuntimeVariables<'a> {
    pub fn new(rt: &'a RuntimeServices) -> Self {
        Self { rt }
    }
}

impl VariableStore for RuntimeVariables<'_> {
    fn get(&mut self, var: &Variable) -> Result<Option<u32>, VarError> {
        let name = ucs2_name(var.name);
        let vendor = var.vendor.to_bytes();
        let mut attributes = 0u32;
        let mut data = [0u8; size_of::<u32>()];
        let mut size = data.len();

        let status = (self.rt.get_variable)(
            name.as_ptr(),
            &vendor,
            &mut attributes,
            &mut size,
            data.as_mut_ptr(),
        );
        match status {
            EFI_SUCCESS if size == data.len() => Ok(Some(u32::from_le_bytes(data))),
            EFI_SUCCESS | EFI_BUFFER_TOO_SMALL => Err(VarError::BadSize(size)),
            EFI_NOT_FOUND => Ok(None),
            status => Err(VarError::Firmware(status)),
        }
    }

    fn set(&mut self, var: &Variable, value: u32) -> Result<(), VarError> {
        let name = ucs2_name(var.name);
        let vendor = var.vendor.to_bytes();
        let data = value.to_le_bytes();

        match (self.rt.set_variable)(name.as_ptr(), &vendor, var.attributes, data.len(), data.as_ptr()) {
            EFI_SUCCESS => Ok(()),
            status => Err(VarError::Firmware(status)),
        }
    }

    fn delete(&mut self, var: &Variable) -> Result<(), VarError> {
        let name = ucs2_name(var.name);
        let vendor = var.vendor.to_bytes();

        // Zero size with the stored attributes removes the variable
        match (self.rt.set_variable)(name.as_ptr(), &vendor, var.attributes, 0, ptr::null()) {
            EFI_SUCCESS | EFI_NOT_FOUND => Ok(()),
            status => Err(VarError::Firmware(status)),
        }
    }
}
