//! Global allocator on UEFI pool memory
//!
//! Only valid while boot services are up; the launcher never calls
//! ExitBootServices itself, the kernel's EFI stub does.

use crate::BootServices;
use core::alloc::{GlobalAlloc, Layout};
use core::mem::size_of;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

const EFI_LOADER_DATA: usize = 2;
/// Pool allocations are 8-byte aligned
const POOL_ALIGN: usize = 8;

static BOOT_SERVICES: AtomicPtr<BootServices> = AtomicPtr::new(ptr::null_mut());

pub fn set_boot_services(bs: *const BootServices) {
    BOOT_SERVICES.store(bs as *mut BootServices, Ordering::Release);
}

pub struct UefiPoolAllocator;

unsafe impl GlobalAlloc for UefiPoolAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let bs = BOOT_SERVICES.load(Ordering::Acquire);
        if bs.is_null() {
            return ptr::null_mut();
        }

        let align = layout.align();
        if align <= POOL_ALIGN {
            let mut buffer: *mut u8 = ptr::null_mut();
            let status = ((*bs).allocate_pool)(EFI_LOADER_DATA, layout.size(), &mut buffer);
            return if status == 0 { buffer } else { ptr::null_mut() };
        }

        // Over-allocate and keep the pool pointer just below the aligned block
        let Some(size) = layout.size().checked_add(align) else {
            return ptr::null_mut();
        };
        let mut raw: *mut u8 = ptr::null_mut();
        if ((*bs).allocate_pool)(EFI_LOADER_DATA, size, &mut raw) != 0 || raw.is_null() {
            return ptr::null_mut();
        }
        let offset = align - (raw as usize % align);
        let aligned = raw.add(offset);
        (aligned as *mut *mut u8).sub(1).write_unaligned(raw);
        aligned
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let bs = BOOT_SERVICES.load(Ordering::Acquire);
        if bs.is_null() || ptr.is_null() {
            return;
        }

        let raw = if layout.align() <= POOL_ALIGN {
            ptr
        } else {
            (ptr as *mut *mut u8).sub(1).read_unaligned()
        };
        ((*bs).free_pool)(raw);
    }
}

#[global_allocator]
static ALLOCATOR: UefiPoolAllocator = UefiPoolAllocator;

const _: () = assert!(size_of::<*mut u8>() <= POOL_ALIGN);
