//! Allocator wrappers (C10): [`DisableFreeing`] strips deallocation,
//! [`EmulateExpandFront`] synthesizes front growth for an inner allocator
//! that doesn't support it natively.
//!
//! Grounded on `original_source/include/okay/allocators/disable_freeing_allocator.h`
//! and `original_source/include/okay/allocators/emulate_expand_front_allocator.h`.
//! The `DisableFreeing::features()` computation intentionally does NOT
//! reproduce the original source's `can_expand_front` bit: that reads as a
//! copy/paste artifact carried over from the sibling `EmulateExpandFront`
//! wrapper rather than an intended capability (recorded in `DESIGN.md`).

use crate::descriptor::{ByteSpan, MaybeDefinedMemory};
use crate::error::{AllocError, AllocResult};

use super::{
    AllocFeatures, AllocFlags, AllocRequest, Allocator, ReallocExtendedRequest,
    ReallocExtendedResult, ReallocRequest, SideRequest,
};

/// Forwards every operation to `A` except `deallocate`, which becomes a
/// no-op. Useful for arenas-within-arenas and other contexts where
/// individual frees are meaningless but the allocation API is still needed.
pub struct DisableFreeing<A: Allocator> {
    inner: A,
}

impl<A: Allocator> DisableFreeing<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

unsafe impl<A: Allocator> Allocator for DisableFreeing<A> {
    unsafe fn allocate(&self, request: AllocRequest) -> AllocResult<MaybeDefinedMemory> {
        unsafe { self.inner.allocate(request) }
    }

    unsafe fn deallocate(&self, _memory: ByteSpan) {}

    unsafe fn reallocate(&self, request: ReallocRequest) -> AllocResult<MaybeDefinedMemory> {
        unsafe { self.inner.reallocate(request) }
    }

    unsafe fn reallocate_extended(
        &self,
        request: ReallocExtendedRequest,
    ) -> AllocResult<ReallocExtendedResult> {
        unsafe { self.inner.reallocate_extended(request) }
    }

    fn clear(&self) -> AllocResult<()> {
        self.inner.clear()
    }

    fn features(&self) -> AllocFeatures {
        (self.inner.features() - AllocFeatures::CAN_RECLAIM) | AllocFeatures::CAN_ONLY_ALLOC
    }
}

/// Synthesizes front growth on top of an inner allocator that lacks
/// `CAN_EXPAND_FRONT`: a front-growing `reallocate_extended` call allocates a
/// fresh buffer, copies the old payload to the right by the grown amount,
/// and frees the old buffer through `A`.
pub struct EmulateExpandFront<A: Allocator> {
    inner: A,
}

impl<A: Allocator> EmulateExpandFront<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

unsafe impl<A: Allocator> Allocator for EmulateExpandFront<A> {
    unsafe fn allocate(&self, request: AllocRequest) -> AllocResult<MaybeDefinedMemory> {
        unsafe { self.inner.allocate(request) }
    }

    unsafe fn deallocate(&self, memory: ByteSpan) {
        unsafe { self.inner.deallocate(memory) };
    }

    unsafe fn reallocate(&self, request: ReallocRequest) -> AllocResult<MaybeDefinedMemory> {
        unsafe { self.inner.reallocate(request) }
    }

    unsafe fn reallocate_extended(
        &self,
        request: ReallocExtendedRequest,
    ) -> AllocResult<ReallocExtendedResult> {
        request.validate()?;

        let expanding_front =
            request.flags.contains(AllocFlags::EXPAND_FRONT) && request.front.required > 0;
        if !expanding_front {
            return unsafe { self.inner.reallocate_extended(request) };
        }
        if request.flags.contains(AllocFlags::IN_PLACE_ORELSE_FAIL) {
            return Err(AllocError::couldnt_expand_in_place());
        }

        let old_len = request.memory.len();
        let back_growth = if request.flags.contains(AllocFlags::EXPAND_BACK) {
            request.back.required
        } else {
            0
        };
        let back_shrink = if request.flags.contains(AllocFlags::SHRINK_BACK) {
            request.back.required
        } else {
            0
        };

        let front_growth = request.front.required;
        let new_total = front_growth + old_len + back_growth - back_shrink;

        let fresh = AllocRequest::new(new_total, 1).with_flags(AllocFlags::LEAVE_NONZEROED);
        let mem = unsafe { self.inner.allocate(fresh) }?;
        let (new_ptr, _) = mem.data_maybe_defined();

        unsafe {
            core::ptr::copy_nonoverlapping(
                request.memory.data().as_ptr(),
                new_ptr.as_ptr().add(front_growth),
                old_len - back_shrink,
            );
            core::ptr::write_bytes(new_ptr.as_ptr(), 0, front_growth);
            if back_growth > 0 {
                core::ptr::write_bytes(
                    new_ptr.as_ptr().add(front_growth + old_len),
                    0,
                    back_growth,
                );
            }
        }

        unsafe { self.inner.deallocate(request.memory) };

        let new_span = unsafe { ByteSpan::new(new_ptr, new_total) };
        Ok(ReallocExtendedResult { memory: MaybeDefinedMemory::Defined(new_span), front_growth_offset: front_growth })
    }

    fn clear(&self) -> AllocResult<()> {
        self.inner.clear()
    }

    fn features(&self) -> AllocFeatures {
        self.inner.features() | AllocFeatures::CAN_EXPAND_FRONT
    }
}
