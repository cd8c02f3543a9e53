//! Android boot image (header versions 0-2)
//!
//! ```text
//! +-----------------+
//! | boot header     | 1 page
//! +-----------------+
//! | kernel          | n pages
//! +-----------------+
//! | ramdisk         | m pages
//! +-----------------+
//! | second stage    | o pages
//! +-----------------+
//! ```

use alloc::string::String;
use alloc::vec::Vec;
use core::mem::size_of;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

pub const BOOT_MAGIC: [u8; 8] = *b"ANDROID!";
pub const BOOT_NAME_SIZE: usize = 16;
pub const BOOT_ARGS_SIZE: usize = 512;
pub const BOOT_ID_SIZE: usize = 32;
pub const BOOT_EXTRA_ARGS_SIZE: usize = 1024;
/// Newest header layout this module understands
pub const MAX_HEADER_VERSION: u32 = 2;

type Le32 = U32<LittleEndian>;

#[repr(C)]
#[derive(FromZeroes, FromBytes, AsBytes, Clone, Copy)]
pub struct BootImageHeader {
    pub magic: [u8; 8],
    pub kernel_size: Le32,
    pub kernel_addr: Le32,
    pub ramdisk_size: Le32,
    pub ramdisk_addr: Le32,
    pub second_size: Le32,
    pub second_addr: Le32,
    pub tags_addr: Le32,
    pub page_size: Le32,
    pub header_version: Le32,
    pub os_version: Le32,
    pub name: [u8; BOOT_NAME_SIZE],
    pub cmdline: [u8; BOOT_ARGS_SIZE],
    pub id: [u8; BOOT_ID_SIZE],
    pub extra_cmdline: [u8; BOOT_EXTRA_ARGS_SIZE],
}

/// Byte offsets of each section inside the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    pub page_size: u64,
    pub kernel_offset: u64,
    pub kernel_size: u64,
    pub ramdisk_offset: u64,
    pub ramdisk_size: u64,
    pub second_offset: u64,
    pub second_size: u64,
    /// Header page plus every page-aligned section
    pub total_size: u64,
}

fn align_up(value: u64, align: u64) -> Option<u64> {
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}

impl BootImageHeader {
    pub const SIZE: usize = size_of::<Self>();

    /// Parse a header from the start of `bytes`.
    ///
    /// Rejects a wrong magic, header versions past 2, a page size that is
    /// zero or not a power of two, and section sizes whose aligned sum
    /// overflows.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let header = Self::read_from_prefix(bytes)?;
        if header.magic != BOOT_MAGIC || header.header_version.get() > MAX_HEADER_VERSION {
            return None;
        }
        header.layout()?;
        Some(header)
    }

    pub fn layout(&self) -> Option<ImageLayout> {
        let page = u64::from(self.page_size.get());
        if !page.is_power_of_two() {
            return None;
        }

        let kernel_size = u64::from(self.kernel_size.get());
        let ramdisk_size = u64::from(self.ramdisk_size.get());
        let second_size = u64::from(self.second_size.get());

        let kernel_offset = page;
        let ramdisk_offset = kernel_offset.checked_add(align_up(kernel_size, page)?)?;
        let second_offset = ramdisk_offset.checked_add(align_up(ramdisk_size, page)?)?;
        let total_size = second_offset.checked_add(align_up(second_size, page)?)?;

        Some(ImageLayout {
            page_size: page,
            kernel_offset,
            kernel_size,
            ramdisk_offset,
            ramdisk_size,
            second_offset,
            second_size,
            total_size,
        })
    }

    /// Kernel command line: `cmdline` followed by `extra_cmdline`
    pub fn command_line(&self) -> String {
        let mut raw: Vec<u8> = nul_terminated(&self.cmdline).to_vec();
        if raw.len() == BOOT_ARGS_SIZE {
            raw.extend_from_slice(nul_terminated(&self.extra_cmdline));
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    pub fn product_name(&self) -> String {
        String::from_utf8_lossy(nul_terminated(&self.name)).into_owned()
    }
}

fn nul_terminated(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// A loaded image split into the pieces handed to the kernel transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootImage<'a> {
    pub kernel: &'a [u8],
    pub ramdisk: Option<&'a [u8]>,
    pub cmdline: String,
}

impl<'a> BootImage<'a> {
    /// Split `image` (header included) according to `header`
    pub fn split(header: &BootImageHeader, image: &'a [u8]) -> Option<Self> {
        let layout = header.layout()?;
        if (image.len() as u64) < layout.total_size {
            return None;
        }

        let section = |offset: u64, size: u64| {
            let start = offset as usize;
            &image[start..start + size as usize]
        };

        let ramdisk = section(layout.ramdisk_offset, layout.ramdisk_size);
        Some(Self {
            kernel: section(layout.kernel_offset, layout.kernel_size),
            ramdisk: (!ramdisk.is_empty()).then_some(ramdisk),
            cmdline: header.command_line(),
        })
    }
}
