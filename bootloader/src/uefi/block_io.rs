// UEFI Block I/O Protocol, read side

use super::EFI_SUCCESS;

#[repr(C)]
pub struct BlockIoProtocol {
    pub revision: u64,
    pub media: *const BlockIoMedia,
    _reset: usize,
    pub read_blocks: extern "efiapi" fn(
        *mut BlockIoProtocol,
        u32,     // MediaId
        u64,     // LBA
        usize,   // BufferSize
        *mut u8, // Buffer
    ) -> usize,
    // Launcher never writes
    _write_blocks: usize,
    _flush_blocks: usize,
}

#[repr(C)]
pub struct BlockIoMedia {
    pub media_id: u32,
    pub removable_media: bool,
    pub media_present: bool,
    pub logical_partition: bool,
    pub read_only: bool,
    pub write_caching: bool,
    pub block_size: u32,
    pub io_align: u32,
    pub last_block: u64,
}

pub const EFI_BLOCK_IO_PROTOCOL_GUID: [u8; 16] = [
    0x21, 0x5b, 0x4e, 0x96, 0x59, 0x64, 0xd2, 0x11, 0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b,
];

impl BlockIoProtocol {
    /// Read whole blocks starting at `lba`.
    ///
    /// `buffer` must be a block multiple and meet the media's `io_align`.
    pub fn read_sectors(&mut self, lba: u64, buffer: &mut [u8]) -> Result<(), usize> {
        if buffer.is_empty() {
            return Ok(());
        }

        // SAFETY: media is owned by the protocol instance
        let media_id = unsafe { (*self.media).media_id };
        let status = (self.read_blocks)(self, media_id, lba, buffer.len(), buffer.as_mut_ptr());

        if status == EFI_SUCCESS {
            Ok(())
        } else {
            Err(status)
        }
    }
}
