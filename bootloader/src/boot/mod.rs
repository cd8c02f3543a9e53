// Boot module - firmware services behind the core `Firmware` trait and the
// EFI stub hand-off

pub mod efi_stub;
pub mod firmware;
