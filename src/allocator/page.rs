//! The page allocator (C3): direct OS page mapping, allocate/deallocate
//! only. Grounded on `original_source/include/okay/allocators/page_allocator.h`
//! and the platform primitives in `crate::platform`.

use core::ptr::NonNull;

use crate::descriptor::{MaybeDefinedMemory, UndefinedByteSpan, ByteSpan};
use crate::error::{AllocError, AllocResult};
use crate::platform;

use super::{
    AllocFeatures, AllocFlags, AllocRequest, Allocator, ReallocExtendedRequest,
    ReallocExtendedResult, ReallocRequest,
};

/// Maps whole pages directly from the OS. Keeps no bookkeeping: the caller
/// must deallocate the exact span `allocate` returned, since freeing a
/// sub-range is a leak (or worse) on some platforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageAllocator;

impl PageAllocator {
    #[inline]
    pub const fn new() -> Self {
        Self
    }

    fn pages_for(&self, num_bytes: usize) -> usize {
        let page_size = platform::get_page_size();
        (num_bytes + page_size - 1) / page_size
    }
}

unsafe impl Allocator for PageAllocator {
    unsafe fn allocate(&self, request: AllocRequest) -> AllocResult<MaybeDefinedMemory> {
        request.validate()?;
        let page_size = platform::get_page_size();
        if request.alignment > page_size {
            return Err(AllocError::unsupported());
        }
        let num_pages = self.pages_for(request.num_bytes.max(1));
        let raw = platform::alloc_pages(num_pages)
            .map_err(|_| AllocError::platform_failure("alloc_pages failed"))?;
        let ptr = NonNull::new(raw).ok_or_else(|| AllocError::oom(request))?;
        let span = unsafe { UndefinedByteSpan::new(ptr, num_pages * page_size) };

        if request.leave_nonzeroed() {
            Ok(MaybeDefinedMemory::Undefined(span))
        } else {
            // Freshly mapped pages are already zero from the OS; no write
            // needed, but the type system still requires the explicit
            // promotion step.
            Ok(MaybeDefinedMemory::Defined(unsafe { span.assume_init() }))
        }
    }

    unsafe fn deallocate(&self, memory: ByteSpan) {
        let num_pages = self.pages_for(memory.len());
        let _ = unsafe { platform::memory_unmap(memory.data().as_ptr(), num_pages) };
    }

    unsafe fn reallocate(&self, _request: ReallocRequest) -> AllocResult<MaybeDefinedMemory> {
        Err(AllocError::unsupported())
    }

    unsafe fn reallocate_extended(
        &self,
        _request: ReallocExtendedRequest,
    ) -> AllocResult<ReallocExtendedResult> {
        Err(AllocError::unsupported())
    }

    fn clear(&self) -> AllocResult<()> {
        log::warn!("PageAllocator::clear() called; this allocator has no clearable state");
        Err(AllocError::unsupported())
    }

    fn features(&self) -> AllocFeatures {
        AllocFeatures::CAN_RECLAIM
    }
}
