//! The slab allocator (C9): a fixed set of block allocators dispatched by
//! size class.
//!
//! Grounded on `original_source/include/okay/allocators/block_allocator.h`
//! (the per-class allocator this wraps is exactly [`super::block::BlockAllocator`])
//! and `SPEC_FULL.md` §4.7's resolution of the distilled spec's alignment
//! Open Question in favor of `>=` over strict equality: a size class serves a
//! request when its block size and alignment are each at least as large as
//! what was asked for.

use alloc::vec::Vec;

use crate::descriptor::{ByteSpan, MaybeDefinedMemory};
use crate::error::{AllocError, AllocResult};

use super::block::BlockAllocator;
use super::{
    AllocFeatures, AllocRequest, Allocator, ReallocExtendedRequest, ReallocExtendedResult,
    ReallocRequest,
};

/// One size class: the block shape a [`BlockAllocator`] inside a
/// [`SlabAllocator`] was built with, plus how many blocks it starts with.
#[derive(Debug, Clone, Copy)]
pub struct SizeClass {
    pub block_size: usize,
    pub block_align: usize,
    pub initial_block_count: usize,
}

impl SizeClass {
    pub const fn new(block_size: usize, block_align: usize, initial_block_count: usize) -> Self {
        Self { block_size, block_align, initial_block_count }
    }
}

/// Dispatches allocation requests to the smallest size class that can serve
/// them. Size classes are fixed at construction; there is no fallback to a
/// backing allocator when every class is exhausted or none fits.
pub struct SlabAllocator {
    classes: Vec<BlockAllocator>,
}

impl SlabAllocator {
    /// Builds a slab over `classes`, which must already be sorted ascending
    /// by block size, and `buffers`, one caller-provided backing buffer per
    /// class (sized at least `block_size * initial_block_count`).
    pub fn new(classes: &[SizeClass], buffers: Vec<ByteSpan>) -> AllocResult<Self> {
        if classes.len() != buffers.len() {
            return Err(AllocError::usage("one buffer is required per size class"));
        }
        if classes.windows(2).any(|w| w[0].block_size > w[1].block_size) {
            return Err(AllocError::usage("size classes must be sorted ascending by block size"));
        }

        let mut allocators = Vec::with_capacity(classes.len());
        for (class, buffer) in classes.iter().zip(buffers) {
            allocators.push(BlockAllocator::new(buffer, class.block_size, class.block_align)?);
        }
        Ok(Self { classes: allocators })
    }

    fn class_for(&self, num_bytes: usize, alignment: usize) -> Option<usize> {
        self.classes
            .iter()
            .position(|c| c.block_size() >= num_bytes && c.block_align() >= alignment)
    }

}

unsafe impl Allocator for SlabAllocator {
    unsafe fn allocate(&self, request: AllocRequest) -> AllocResult<MaybeDefinedMemory> {
        request.validate()?;
        let idx = self
            .class_for(request.num_bytes, request.alignment)
            .ok_or_else(|| AllocError::oom(request))?;
        unsafe { self.classes[idx].allocate(request) }
    }

    unsafe fn deallocate(&self, memory: ByteSpan) {
        let idx = self
            .classes
            .iter()
            .position(|c| c.contains_addr(memory.addr()))
            .expect("freeing pointer not owned by any size class");
        unsafe { self.classes[idx].deallocate(memory) };
    }

    unsafe fn reallocate(&self, request: ReallocRequest) -> AllocResult<MaybeDefinedMemory> {
        request.validate()?;
        let idx = self
            .classes
            .iter()
            .position(|c| c.contains_addr(request.memory.addr()))
            .ok_or_else(|| AllocError::usage("reallocating pointer not owned by this slab"))?;
        unsafe { self.classes[idx].reallocate(request) }.map_err(|e| {
            if e.kind() == crate::error::AllocErrorKind::Oom {
                // the class can't grow past its own block size; promoting to
                // a larger class would require a copy this call isn't
                // authorized to make.
                AllocError::unsupported()
            } else {
                e
            }
        })
    }

    unsafe fn reallocate_extended(
        &self,
        _request: ReallocExtendedRequest,
    ) -> AllocResult<ReallocExtendedResult> {
        Err(AllocError::unsupported())
    }

    fn clear(&self) -> AllocResult<()> {
        for class in &self.classes {
            class.reset_free_list();
        }
        Ok(())
    }

    fn features(&self) -> AllocFeatures {
        AllocFeatures::CAN_EXPAND_BACK
            | AllocFeatures::CAN_PREDICTABLY_REALLOC_IN_PLACE
            | AllocFeatures::CAN_CLEAR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ptr::NonNull;

    fn leak_buffer(len: usize) -> ByteSpan {
        let buf = alloc::vec![0u8; len].into_boxed_slice();
        let ptr = NonNull::new(alloc::boxed::Box::leak(buf).as_mut_ptr()).unwrap();
        unsafe { ByteSpan::new(ptr, len) }
    }

    fn make_slab() -> SlabAllocator {
        let classes =
            [SizeClass::new(16, 8, 4), SizeClass::new(64, 8, 4), SizeClass::new(256, 8, 4)];
        let buffers = alloc::vec![leak_buffer(16 * 4), leak_buffer(64 * 4), leak_buffer(256 * 4)];
        SlabAllocator::new(&classes, buffers).unwrap()
    }

    #[test]
    fn dispatches_to_smallest_fitting_class() {
        let slab = make_slab();
        let small = unsafe { slab.allocate(AllocRequest::new(10, 8)).unwrap() };
        assert_eq!(small.len(), 16);
        let mid = unsafe { slab.allocate(AllocRequest::new(40, 8)).unwrap() };
        assert_eq!(mid.len(), 64);
    }

    #[test]
    fn oversized_request_is_oom() {
        let slab = make_slab();
        assert!(unsafe { slab.allocate(AllocRequest::new(1024, 8)) }.is_err());
    }

    #[test]
    fn deallocate_returns_to_owning_class() {
        let slab = make_slab();
        let mem = unsafe { slab.allocate(AllocRequest::new(10, 8)).unwrap() };
        let span = mem.as_bytes().unwrap();
        unsafe { slab.deallocate(span) };
        let again = unsafe { slab.allocate(AllocRequest::new(10, 8)) };
        assert!(again.is_ok());
    }

    #[test]
    fn clear_resets_every_class() {
        let slab = make_slab();
        let _ = unsafe { slab.allocate(AllocRequest::new(10, 8)).unwrap() };
        slab.clear().unwrap();
        for _ in 0..4 {
            assert!(unsafe { slab.allocate(AllocRequest::new(10, 8)) }.is_ok());
        }
    }

    #[test]
    fn reallocate_past_its_class_is_unsupported_not_oom() {
        use crate::error::AllocErrorKind;

        let slab = make_slab();
        let mem = unsafe { slab.allocate(AllocRequest::new(10, 8)).unwrap() };
        let span = mem.as_bytes().unwrap();

        // 10 bytes lands in the 16-byte class; 40 would need the 64-byte
        // class, a promotion reallocate is not authorized to make.
        let req = ReallocRequest::new(span, 40);
        let err = unsafe { slab.reallocate(req) }.unwrap_err();
        assert_eq!(err.kind(), AllocErrorKind::Unsupported);
    }
}
