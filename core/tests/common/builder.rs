//! Builders for boot image and device tree test fixtures

use abboot_core::image::bootimg::{BootImageHeader, BOOT_MAGIC};
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromZeroes};

/// Android boot image, optionally behind a signature header
pub struct BootImageBuilder {
    page_size: u32,
    kernel: Vec<u8>,
    ramdisk: Vec<u8>,
    cmdline: String,
    prefix: usize,
}

impl BootImageBuilder {
    pub fn new() -> Self {
        Self {
            page_size: 2048,
            kernel: b"MZ-kernel".to_vec(),
            ramdisk: Vec::new(),
            cmdline: String::new(),
            prefix: 0,
        }
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn kernel(mut self, kernel: &[u8]) -> Self {
        self.kernel = kernel.to_vec();
        self
    }

    pub fn ramdisk(mut self, ramdisk: &[u8]) -> Self {
        self.ramdisk = ramdisk.to_vec();
        self
    }

    pub fn cmdline(mut self, cmdline: &str) -> Self {
        self.cmdline = cmdline.to_string();
        self
    }

    /// Place the image after `len` bytes of signature header
    pub fn signed(mut self, len: usize) -> Self {
        self.prefix = len;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let page = self.page_size as usize;
        let align = |len: usize| len.div_ceil(page) * page;

        let mut header = BootImageHeader::new_zeroed();
        header.magic = BOOT_MAGIC;
        header.page_size = U32::<LittleEndian>::new(self.page_size);
        header.kernel_size = U32::new(self.kernel.len() as u32);
        header.ramdisk_size = U32::new(self.ramdisk.len() as u32);
        header.cmdline[..self.cmdline.len()].copy_from_slice(self.cmdline.as_bytes());

        let mut image = vec![0u8; self.prefix];
        image.extend_from_slice(header.as_bytes());
        image.resize(self.prefix + page, 0);

        image.extend_from_slice(&self.kernel);
        image.resize(self.prefix + page + align(self.kernel.len()), 0);

        image.extend_from_slice(&self.ramdisk);
        image.resize(
            self.prefix + page + align(self.kernel.len()) + align(self.ramdisk.len()),
            0,
        );
        image
    }
}

fn push32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Minimal version 17 device tree: a root node with a `model` property
pub fn fdt_blob() -> Vec<u8> {
    let strings = b"model\0";

    let mut structure = Vec::new();
    push32(&mut structure, 0x1); // FDT_BEGIN_NODE
    push32(&mut structure, 0); // root name
    push32(&mut structure, 0x3); // FDT_PROP
    push32(&mut structure, 8);
    push32(&mut structure, 0);
    structure.extend_from_slice(b"abboot\0\0");
    push32(&mut structure, 0x2); // FDT_END_NODE
    push32(&mut structure, 0x9); // FDT_END

    let rsv_off = 40;
    let struct_off = rsv_off + 16;
    let strings_off = struct_off + structure.len();
    let total = strings_off + strings.len();

    let mut blob = Vec::new();
    push32(&mut blob, 0xd00d_feed);
    push32(&mut blob, total as u32);
    push32(&mut blob, struct_off as u32);
    push32(&mut blob, strings_off as u32);
    push32(&mut blob, rsv_off as u32);
    push32(&mut blob, 17);
    push32(&mut blob, 16);
    push32(&mut blob, 0);
    push32(&mut blob, strings.len() as u32);
    push32(&mut blob, structure.len() as u32);
    blob.resize(struct_off, 0);
    blob.extend_from_slice(&structure);
    blob.extend_from_slice(strings);
    blob
}
