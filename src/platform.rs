use std::{
    ptr::NonNull,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::Pointer;

/// Abstraction for platform specific memory handling. The arena reserves one
/// contiguous range of address space up front and bumps its break inside it,
/// so all we need from the kernel is a way to reserve that range and give it
/// back when the heap is dropped.
trait VirtualMemory {
    /// Reserves a range where `length` bytes can be read and written. Pages
    /// should be backed lazily when the platform allows it, the arena might
    /// only ever touch a small prefix of the range.
    unsafe fn reserve(length: usize) -> Pointer<u8>;

    /// Gives a range obtained from [`Self::reserve`] back to the kernel.
    unsafe fn release(base: NonNull<u8>, length: usize);

    /// Virtual memory page size in bytes.
    unsafe fn query_page_size() -> usize;
}

/// Implements [`VirtualMemory`] once per target.
struct Platform;

/// Cached page size, `0` until the first call to [`page_size`].
static PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// We only know the page size at runtime, so ask the platform once and reuse
/// the answer.
#[inline]
pub(crate) fn page_size() -> usize {
    match PAGE_SIZE.load(Ordering::Relaxed) {
        0 => {
            let size = unsafe { Platform::query_page_size() };
            PAGE_SIZE.store(size, Ordering::Relaxed);
            size
        }
        size => size,
    }
}

/// Reserves `length` readable and writable bytes. See [`VirtualMemory::reserve`].
#[inline]
pub(crate) unsafe fn reserve(length: usize) -> Pointer<u8> {
    Platform::reserve(length)
}

/// Unmaps a range returned by [`reserve`].
#[inline]
pub(crate) unsafe fn release(base: NonNull<u8>, length: usize) {
    Platform::release(base, length)
}

#[cfg(unix)]
#[cfg(not(miri))]
mod unix {
    use std::ptr::{self, NonNull};

    use super::{Platform, VirtualMemory};
    use crate::Pointer;

    /// Don't reserve swap for the whole range, pages are only backed once the
    /// arena break moves over them.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    const NO_RESERVE: libc::c_int = libc::MAP_NORESERVE;

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    const NO_RESERVE: libc::c_int = 0;

    impl VirtualMemory for Platform {
        unsafe fn reserve(length: usize) -> Pointer<u8> {
            let prot = libc::PROT_READ | libc::PROT_WRITE;
            let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | NO_RESERVE;
            let base = libc::mmap(ptr::null_mut(), length, prot, flags, -1, 0);

            (base != libc::MAP_FAILED).then(|| NonNull::new(base.cast())).flatten()
        }

        unsafe fn release(base: NonNull<u8>, length: usize) {
            if libc::munmap(base.as_ptr().cast(), length) != 0 {
                log::warn!("munmap of {length} bytes at {base:?} failed");
            }
        }

        unsafe fn query_page_size() -> usize {
            libc::sysconf(libc::_SC_PAGESIZE) as usize
        }
    }
}

#[cfg(windows)]
#[cfg(not(miri))]
mod windows {
    use std::{mem::MaybeUninit, ptr::NonNull};

    use windows::Win32::System::{Memory, SystemInformation};

    use super::{Platform, VirtualMemory};
    use crate::Pointer;

    impl VirtualMemory for Platform {
        unsafe fn reserve(length: usize) -> Pointer<u8> {
            // Committed pages are only backed by physical memory once touched,
            // so committing the whole reservation up front is fine.
            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;
            let base = Memory::VirtualAlloc(None, length, flags, Memory::PAGE_READWRITE);

            NonNull::new(base.cast())
        }

        unsafe fn release(base: NonNull<u8>, _length: usize) {
            // MEM_RELEASE frees the whole reservation and wants a length of 0.
            if !Memory::VirtualFree(base.as_ptr().cast(), 0, Memory::MEM_RELEASE).as_bool() {
                log::warn!("VirtualFree at {base:?} failed");
            }
        }

        unsafe fn query_page_size() -> usize {
            let mut info = MaybeUninit::uninit();
            SystemInformation::GetSystemInfo(info.as_mut_ptr());

            info.assume_init().dwPageSize as usize
        }
    }
}

#[cfg(miri)]
mod miri {
    //! Miri has no FFI support, so we mock the kernel with the global
    //! allocator. Leaked arenas show up as Miri leak reports.

    use std::{alloc, ptr::NonNull};

    use super::{page_size, Platform, VirtualMemory};
    use crate::Pointer;

    fn to_layout(length: usize) -> Option<alloc::Layout> {
        alloc::Layout::from_size_align(length, page_size()).ok()
    }

    impl VirtualMemory for Platform {
        unsafe fn reserve(length: usize) -> Pointer<u8> {
            NonNull::new(alloc::alloc(to_layout(length)?))
        }

        unsafe fn release(base: NonNull<u8>, length: usize) {
            if let Some(layout) = to_layout(length) {
                alloc::dealloc(base.as_ptr(), layout);
            }
        }

        unsafe fn query_page_size() -> usize {
            4096
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_cached_power_of_two() {
        let size = page_size();
        assert!(size.is_power_of_two());
        assert_eq!(page_size(), size);
    }

    #[test]
    fn reserve_and_release() {
        let length = page_size() * 4;
        unsafe {
            let base = reserve(length).unwrap();
            assert_eq!(base.as_ptr() as usize % page_size(), 0);

            // Whole range must be writable.
            base.as_ptr().write_bytes(0xAB, length);
            assert_eq!(*base.as_ptr().add(length - 1), 0xAB);

            release(base, length);
        }
    }
}
