//! The block allocator (C7): fixed-size, fixed-alignment blocks carved from
//! a single buffer, freed onto a LIFO free list.
//!
//! Grounded on `original_source/include/okay/allocators/block_allocator.h`:
//! block size and alignment are normalized at construction to fit a free
//! block's `prev` pointer, and the free list is built by walking the whole
//! buffer once, threading every block onto it.

use core::cell::Cell;
use core::ptr::NonNull;

use crate::descriptor::{ByteSpan, MaybeDefinedMemory};
use crate::error::{AllocError, AllocResult};
use crate::utils::{align_up, is_aligned};

use super::{
    AllocFeatures, AllocRequest, Allocator, ReallocExtendedRequest, ReallocExtendedResult,
    ReallocRequest,
};

#[repr(C)]
struct FreeBlock {
    prev: *mut FreeBlock,
}

/// Carves fixed-size blocks out of a single buffer and recycles them through
/// a LIFO free list. `reallocate` succeeds trivially when the new size still
/// fits in a block; otherwise it's an `Oom`, since the allocator cannot grow
/// an allocation beyond one block.
pub struct BlockAllocator {
    memory: ByteSpan,
    block_size: usize,
    block_align: usize,
    free_head: Cell<*mut FreeBlock>,
}

impl BlockAllocator {
    /// Builds a block allocator over `memory`, with blocks at least
    /// `min_block_size` bytes and `min_align` aligned. Both are rounded up
    /// to fit a free-list node and to be a power of two.
    pub fn new(memory: ByteSpan, min_block_size: usize, min_align: usize) -> AllocResult<Self> {
        let block_align = min_align.max(core::mem::align_of::<FreeBlock>()).next_power_of_two();
        let block_size = align_up(
            min_block_size.max(core::mem::size_of::<FreeBlock>()),
            block_align,
        );

        let num_blocks = memory.len() / block_size;
        if num_blocks == 0 {
            return Err(AllocError::usage(
                "buffer too small to fit any blocks in this block allocator",
            ));
        }

        let mut free_head: *mut FreeBlock = core::ptr::null_mut();
        for i in 0..num_blocks {
            let block_ptr = unsafe { memory.data().as_ptr().add(i * block_size) } as *mut FreeBlock;
            unsafe { (*block_ptr).prev = free_head };
            free_head = block_ptr;
        }

        Ok(Self { memory, block_size, block_align, free_head: Cell::new(free_head) })
    }

    #[inline]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub const fn block_align(&self) -> usize {
        self.block_align
    }

    #[inline]
    fn contains(&self, addr: usize) -> bool {
        addr >= self.memory.addr() && addr < self.memory.addr() + self.memory.len()
    }

    /// Whether `addr` falls within this allocator's backing buffer. Used by
    /// [`super::slab::SlabAllocator`] to find which size class owns a
    /// pointer being freed or reallocated.
    #[inline]
    pub fn contains_addr(&self, addr: usize) -> bool {
        self.contains(addr)
    }

    #[inline]
    fn block_start(&self, addr: usize) -> usize {
        let offset = addr - self.memory.addr();
        self.memory.addr() + (offset / self.block_size) * self.block_size
    }

    /// Rebuilds the free list over the whole buffer, as if freshly
    /// constructed. Not exposed as `Allocator::clear`: this allocator alone
    /// has no way to tell a caller still holds one of the blocks being
    /// reclaimed, so only callers that know that (like
    /// [`super::slab::SlabAllocator`], which only calls this between size
    /// classes it owns outright) may invoke it.
    pub(crate) fn reset_free_list(&self) {
        let num_blocks = self.memory.len() / self.block_size;
        let mut free_head: *mut FreeBlock = core::ptr::null_mut();
        for i in 0..num_blocks {
            let block_ptr =
                unsafe { self.memory.data().as_ptr().add(i * self.block_size) } as *mut FreeBlock;
            unsafe { (*block_ptr).prev = free_head };
            free_head = block_ptr;
        }
        self.free_head.set(free_head);
    }
}

unsafe impl Allocator for BlockAllocator {
    unsafe fn allocate(&self, request: AllocRequest) -> AllocResult<MaybeDefinedMemory> {
        request.validate()?;
        if request.num_bytes > self.block_size || request.alignment > self.block_align {
            return Err(AllocError::usage("request exceeds this block allocator's block shape"));
        }

        let head = self.free_head.get();
        if head.is_null() {
            return Err(AllocError::oom(request));
        }
        let next = unsafe { (*head).prev };
        self.free_head.set(next);

        let ptr = NonNull::new(head as *mut u8).unwrap();
        debug_assert!(is_aligned(ptr.as_ptr() as usize, self.block_align));
        let span = unsafe { ByteSpan::new(ptr, self.block_size) };

        if !request.leave_nonzeroed() {
            unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, self.block_size) };
        }
        Ok(MaybeDefinedMemory::Defined(span))
    }

    unsafe fn deallocate(&self, memory: ByteSpan) {
        let start = self.block_start(memory.addr());
        let block_ptr = start as *mut FreeBlock;
        unsafe { (*block_ptr).prev = self.free_head.get() };
        self.free_head.set(block_ptr);
    }

    unsafe fn reallocate(&self, request: ReallocRequest) -> AllocResult<MaybeDefinedMemory> {
        request.validate()?;
        if request.new_size > self.block_size {
            return Err(AllocError::oom(AllocRequest::new(request.new_size, 1)));
        }
        let span = unsafe { ByteSpan::new(request.memory.data(), request.new_size) };
        Ok(MaybeDefinedMemory::Defined(span))
    }

    unsafe fn reallocate_extended(
        &self,
        _request: ReallocExtendedRequest,
    ) -> AllocResult<ReallocExtendedResult> {
        Err(AllocError::unsupported())
    }

    fn clear(&self) -> AllocResult<()> {
        Err(AllocError::unsupported())
    }

    fn features(&self) -> AllocFeatures {
        AllocFeatures::CAN_EXPAND_BACK | AllocFeatures::CAN_PREDICTABLY_REALLOC_IN_PLACE
    }
}

// SAFETY: not advertised as IS_THREADSAFE; the free list uses plain pointer
// writes, not atomics.
unsafe impl Send for BlockAllocator {}
