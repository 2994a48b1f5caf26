//! The reserving page allocator (C4): reserves a fixed virtual range per
//! allocation up front and commits only as much as each call needs.
//!
//! Grounded on
//! `original_source/include/okay/allocators/reserving_page_allocator.h`:
//! reallocation is almost always in-place since the reservation already
//! covers the grown size, shrinking never decommits (no per-allocation
//! bookkeeping exists to track how many pages were originally reserved), and
//! `reallocate` requires `LEAVE_NONZEROED` because committing fresh pages
//! through `mprotect` does not predictably zero already-committed neighbors.

use core::ptr::NonNull;

use crate::descriptor::{ByteSpan, MaybeDefinedMemory, UndefinedByteSpan};
use crate::error::{AllocError, AllocResult};
use crate::platform;
use crate::utils::align_up;

use super::{
    AllocFeatures, AllocFlags, AllocRequest, Allocator, ReallocExtendedRequest,
    ReallocExtendedResult, ReallocRequest,
};

/// Pages reserved per allocation, matching the reference implementation's
/// "four gigabytes on 4K-page systems" comment.
pub const DEFAULT_PAGES_RESERVED: usize = 1_000_000;

/// Reserves `pages_reserved` pages per allocation and commits incrementally.
#[derive(Debug, Clone, Copy)]
pub struct ReservingPageAllocator {
    pages_reserved: usize,
}

impl ReservingPageAllocator {
    #[inline]
    pub const fn new(pages_reserved: usize) -> Self {
        Self { pages_reserved }
    }
}

impl Default for ReservingPageAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGES_RESERVED)
    }
}

unsafe impl Allocator for ReservingPageAllocator {
    unsafe fn allocate(&self, request: AllocRequest) -> AllocResult<MaybeDefinedMemory> {
        request.validate()?;
        let page_size = platform::get_page_size();
        if request.alignment > page_size {
            return Err(AllocError::unsupported());
        }

        let total_bytes = align_up(request.num_bytes.max(1), page_size);
        let num_pages_needed = total_bytes / page_size;

        let reservation = platform::reserve_pages(self.pages_reserved)
            .map_err(|_| AllocError::oom(request))?;

        if let Err(_) = unsafe { platform::commit_pages(reservation, num_pages_needed) } {
            let _ = unsafe { platform::memory_unmap(reservation, self.pages_reserved) };
            return Err(AllocError::oom(request));
        }

        let ptr = NonNull::new(reservation).ok_or_else(|| AllocError::oom(request))?;
        let span = unsafe { UndefinedByteSpan::new(ptr, total_bytes) };

        if request.leave_nonzeroed() {
            Ok(MaybeDefinedMemory::Undefined(span))
        } else {
            Ok(MaybeDefinedMemory::Defined(unsafe { span.zero_and_assume_init() }))
        }
    }

    unsafe fn deallocate(&self, memory: ByteSpan) {
        let _ =
            unsafe { platform::memory_unmap(memory.data().as_ptr(), self.pages_reserved) };
    }

    unsafe fn reallocate(&self, request: ReallocRequest) -> AllocResult<MaybeDefinedMemory> {
        request.validate()?;
        if !request.leave_nonzeroed() {
            return Err(AllocError::usage(
                "reserving page allocator requires LEAVE_NONZEROED on reallocate",
            ));
        }

        let page_size = platform::get_page_size();
        debug_assert_eq!(request.memory.addr() % page_size, 0);

        if request.new_size <= request.memory.len() {
            let shrunk = unsafe { ByteSpan::new(request.memory.data(), request.new_size) };
            return Ok(MaybeDefinedMemory::Defined(shrunk));
        }

        let actual_size = request.preferred_size.max(request.new_size);
        let num_bytes = align_up(actual_size, page_size);
        let num_pages = num_bytes / page_size;

        unsafe { platform::commit_pages(request.memory.data().as_ptr(), num_pages) }
            .map_err(|_| AllocError::oom(AllocRequest::new(num_bytes, page_size)))?;

        let span = unsafe { UndefinedByteSpan::new(request.memory.data(), num_bytes) };
        Ok(MaybeDefinedMemory::Undefined(span))
    }

    unsafe fn reallocate_extended(
        &self,
        _request: ReallocExtendedRequest,
    ) -> AllocResult<ReallocExtendedResult> {
        Err(AllocError::unsupported())
    }

    fn clear(&self) -> AllocResult<()> {
        log::warn!("ReservingPageAllocator::clear() called; nothing to clear per-instance");
        Err(AllocError::unsupported())
    }

    fn features(&self) -> AllocFeatures {
        AllocFeatures::CAN_EXPAND_BACK
            | AllocFeatures::CAN_RECLAIM
            | AllocFeatures::CAN_PREDICTABLY_REALLOC_IN_PLACE
    }
}
