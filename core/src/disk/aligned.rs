//! Heap buffers with a device-imposed alignment
//!
//! Block devices may report an IoAlign requirement for transfer buffers.
//! Reads into memory that does not meet it go through an `AlignedBuffer`.

use alloc::alloc::{alloc_zeroed, dealloc, Layout};
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use core::slice;

/// Zeroed byte buffer whose start is aligned to `align`
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl AlignedBuffer {
    /// `None` for an empty buffer, an alignment that is not a power of two,
    /// or an allocation failure. An alignment of 0 means byte alignment.
    pub fn new(len: usize, align: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        let layout = Layout::from_size_align(len, align.max(1)).ok()?;
        // SAFETY: layout has a non-zero size
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) })?;
        Some(Self { ptr, layout })
    }
}

impl Deref for AlignedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: `ptr` owns `layout.size()` initialised bytes
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl DerefMut for AlignedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` is exclusive
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with this layout
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// Whether `buf` meets a device IoAlign value (0 and 1 accept any address)
pub fn is_io_aligned(buf: &[u8], io_align: u32) -> bool {
    io_align <= 1 || buf.as_ptr() as usize % io_align as usize == 0
}
