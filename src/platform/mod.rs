//! Platform memory primitives (A5): page-size query, reserve-only mapping,
//! commit, combined reserve-and-commit, and unmap.
//!
//! [`crate::allocator::page::PageAllocator`] and
//! [`crate::allocator::reserve::ReservingPageAllocator`] are the only
//! consumers; everything here is a thin, `std::io::Result`-returning
//! wrapper over the platform's virtual memory calls, grounded in
//! `original_source/include/okay/platform/memory_map.h`.

use std::io;

use cfg_if::cfg_if;

/// Page size of the current platform, in bytes. Cached after first query.
pub fn get_page_size() -> usize {
    static PAGE_SIZE: once_cell_page_size::PageSizeCache = once_cell_page_size::PageSizeCache::new();
    PAGE_SIZE.get()
}

mod once_cell_page_size {
    use core::sync::atomic::{AtomicUsize, Ordering};

    pub struct PageSizeCache(AtomicUsize);

    impl PageSizeCache {
        pub const fn new() -> Self {
            Self(AtomicUsize::new(0))
        }

        pub fn get(&self) -> usize {
            let cached = self.0.load(Ordering::Relaxed);
            if cached != 0 {
                return cached;
            }
            let fresh = super::query_page_size();
            self.0.store(fresh, Ordering::Relaxed);
            fresh
        }
    }
}

cfg_if! {
    if #[cfg(unix)] {
        fn query_page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
        }

        /// Reserves `num_pages` pages of address space with no backing
        /// storage (`PROT_NONE`). The range is not readable or writable
        /// until committed with [`commit_pages`].
        pub fn reserve_pages(num_pages: usize) -> io::Result<*mut u8> {
            let len = num_pages * get_page_size();
            let ptr = unsafe {
                libc::mmap(
                    core::ptr::null_mut(),
                    len,
                    libc::PROT_NONE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            if ptr == libc::MAP_FAILED {
                Err(io::Error::last_os_error())
            } else {
                Ok(ptr as *mut u8)
            }
        }

        /// Commits `num_pages` pages starting at `addr`, previously reserved
        /// by [`reserve_pages`], making them readable and writable.
        ///
        /// # Safety
        /// `addr` must point at (a prefix of) a live reservation of at least
        /// `num_pages` pages made by this process.
        pub unsafe fn commit_pages(addr: *mut u8, num_pages: usize) -> io::Result<()> {
            let len = num_pages * get_page_size();
            let rc = unsafe {
                libc::mprotect(addr as *mut libc::c_void, len, libc::PROT_READ | libc::PROT_WRITE)
            };
            if rc != 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(())
            }
        }

        /// Reserves and immediately commits `num_pages` pages.
        pub fn alloc_pages(num_pages: usize) -> io::Result<*mut u8> {
            let len = num_pages * get_page_size();
            let ptr = unsafe {
                libc::mmap(
                    core::ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            if ptr == libc::MAP_FAILED {
                Err(io::Error::last_os_error())
            } else {
                Ok(ptr as *mut u8)
            }
        }

        /// Unmaps `num_pages` pages starting at `addr`.
        ///
        /// # Safety
        /// `addr`/`num_pages` must describe a range previously returned by
        /// [`reserve_pages`] or [`alloc_pages`] on this process, not already
        /// unmapped.
        pub unsafe fn memory_unmap(addr: *mut u8, num_pages: usize) -> io::Result<()> {
            let len = num_pages * get_page_size();
            let rc = unsafe { libc::munmap(addr as *mut libc::c_void, len) };
            if rc != 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(())
            }
        }
    } else if #[cfg(windows)] {
        use winapi::um::memoryapi::{VirtualAlloc, VirtualFree};
        use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};
        use winapi::um::winnt::{MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_NOACCESS, PAGE_READWRITE};

        fn query_page_size() -> usize {
            unsafe {
                let mut info: SYSTEM_INFO = core::mem::zeroed();
                GetSystemInfo(&mut info);
                info.dwPageSize as usize
            }
        }

        pub fn reserve_pages(num_pages: usize) -> io::Result<*mut u8> {
            let len = num_pages * get_page_size();
            let ptr = unsafe {
                VirtualAlloc(core::ptr::null_mut(), len, MEM_RESERVE, PAGE_NOACCESS)
            };
            if ptr.is_null() {
                Err(io::Error::last_os_error())
            } else {
                Ok(ptr as *mut u8)
            }
        }

        /// # Safety
        /// `addr` must point at (a prefix of) a live reservation of at least
        /// `num_pages` pages made by this process.
        pub unsafe fn commit_pages(addr: *mut u8, num_pages: usize) -> io::Result<()> {
            let len = num_pages * get_page_size();
            let ptr = unsafe {
                VirtualAlloc(addr as *mut _, len, MEM_COMMIT, PAGE_READWRITE)
            };
            if ptr.is_null() {
                Err(io::Error::last_os_error())
            } else {
                Ok(())
            }
        }

        pub fn alloc_pages(num_pages: usize) -> io::Result<*mut u8> {
            let len = num_pages * get_page_size();
            let ptr = unsafe {
                VirtualAlloc(core::ptr::null_mut(), len, MEM_RESERVE | MEM_COMMIT, PAGE_READWRITE)
            };
            if ptr.is_null() {
                Err(io::Error::last_os_error())
            } else {
                Ok(ptr as *mut u8)
            }
        }

        /// # Safety
        /// `addr` must describe the base of a region previously returned by
        /// [`reserve_pages`] or [`alloc_pages`] on this process, not already
        /// freed. `num_pages` is ignored by `VirtualFree(MEM_RELEASE)`, which
        /// always releases the whole region a base address was reserved
        /// with, but is kept in the signature for parity with unix.
        pub unsafe fn memory_unmap(addr: *mut u8, _num_pages: usize) -> io::Result<()> {
            let rc = unsafe { VirtualFree(addr as *mut _, 0, MEM_RELEASE) };
            if rc == 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(())
            }
        }
    } else {
        fn query_page_size() -> usize {
            4096
        }

        pub fn reserve_pages(_num_pages: usize) -> io::Result<*mut u8> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no platform memory primitives"))
        }

        pub unsafe fn commit_pages(_addr: *mut u8, _num_pages: usize) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no platform memory primitives"))
        }

        pub fn alloc_pages(_num_pages: usize) -> io::Result<*mut u8> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no platform memory primitives"))
        }

        pub unsafe fn memory_unmap(_addr: *mut u8, _num_pages: usize) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no platform memory primitives"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_sane() {
        let size = get_page_size();
        assert!(size >= 4096);
        assert!(size.is_power_of_two());
    }

    #[test]
    #[cfg(any(unix, windows))]
    fn reserve_commit_unmap_roundtrip() {
        let ptr = reserve_pages(4).expect("reserve");
        unsafe {
            commit_pages(ptr, 1).expect("commit");
            core::ptr::write_bytes(ptr, 0xAB, get_page_size());
            assert_eq!(*ptr, 0xAB);
            memory_unmap(ptr, 4).expect("unmap");
        }
    }

    #[test]
    #[cfg(any(unix, windows))]
    fn alloc_pages_is_immediately_writable() {
        let ptr = alloc_pages(2).expect("alloc");
        unsafe {
            core::ptr::write_bytes(ptr, 0x11, get_page_size() * 2);
            memory_unmap(ptr, 2).expect("unmap");
        }
    }
}
