//! The linked blockpool (C8): a growing linked list of block pools, one
//! size class.
//!
//! Grounded on
//! `original_source/include/okay/allocators/linked_blockpool_allocator.h`:
//! each pool carries a small header (`prev`, block size/count bookkeeping)
//! followed by its blocks, pools are linked newest-first, and a new pool's
//! byte size is the previous pool's byte size times the growth factor
//! (`SPEC_FULL.md` §4.6 / Design Notes, resolving the distilled spec's
//! growth-base Open Question in favor of byte size over block count).

use core::cell::Cell;
use core::ptr::NonNull;

use crate::config;
use crate::descriptor::{ByteSpan, MaybeDefinedMemory};
use crate::error::{AllocError, AllocResult};
use crate::utils::align_up;

use super::{
    AllocFeatures, AllocFlags, AllocRequest, Allocator, ReallocExtendedRequest,
    ReallocExtendedResult, ReallocRequest,
};

#[repr(C)]
struct FreeBlock {
    prev: *mut FreeBlock,
}

#[repr(C)]
struct PoolHeader {
    prev: *mut PoolHeader,
    byte_size: usize,
    blocks_start: *mut u8,
    num_blocks: usize,
}

/// A growing linked list of block pools sharing one block size/alignment
/// class. Grows by requesting a new pool from its (mandatory) backing
/// allocator whenever the current free list is exhausted.
pub struct LinkedBlockPool {
    backing: alloc::boxed::Box<dyn Allocator>,
    block_size: usize,
    block_align: usize,
    growth_factor: f32,
    free_head: Cell<*mut FreeBlock>,
    last_pool: Cell<*mut PoolHeader>,
}

impl LinkedBlockPool {
    /// `initial_block_count` sizes the first pool; later pools grow by
    /// `growth_factor` applied to the previous pool's byte size.
    pub fn new(
        backing: alloc::boxed::Box<dyn Allocator>,
        block_size: usize,
        block_align: usize,
        initial_block_count: usize,
    ) -> AllocResult<Self> {
        let block_align = block_align.max(core::mem::align_of::<FreeBlock>()).next_power_of_two();
        let block_size =
            align_up(block_size.max(core::mem::size_of::<FreeBlock>()), block_align);
        if growth_factor_invalid(config::get().default_pool_config.growth_factor) {
            return Err(AllocError::usage("pool growth factor must be >= 1.0"));
        }

        let pool = Self {
            backing,
            block_size,
            block_align,
            growth_factor: config::get().default_pool_config.growth_factor,
            free_head: Cell::new(core::ptr::null_mut()),
            last_pool: Cell::new(core::ptr::null_mut()),
        };

        let initial_bytes = block_size * initial_block_count.max(1);
        pool.alloc_new_pool(initial_bytes)?;
        Ok(pool)
    }

    #[inline]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub const fn block_align(&self) -> usize {
        self.block_align
    }

    fn header_layout(&self) -> (usize, usize) {
        let header_size = core::mem::size_of::<PoolHeader>();
        let blocks_offset = align_up(header_size, self.block_align);
        (header_size, blocks_offset)
    }

    fn alloc_new_pool(&self, min_byte_size: usize) -> AllocResult<()> {
        let (_, blocks_offset) = self.header_layout();
        let total_size = blocks_offset + min_byte_size.max(self.block_size);

        let req = AllocRequest::new(total_size, core::mem::align_of::<PoolHeader>())
            .with_flags(AllocFlags::LEAVE_NONZEROED);
        let mem = unsafe { self.backing.allocate(req) }?;
        let (ptr, len) = mem.data_maybe_defined();

        let header_ptr = ptr.as_ptr() as *mut PoolHeader;
        let blocks_start = unsafe { ptr.as_ptr().add(blocks_offset) };
        let num_blocks = (len - blocks_offset) / self.block_size;
        if num_blocks == 0 {
            unsafe { self.backing.deallocate(ByteSpan::new(ptr, len)) };
            return Err(AllocError::oom(req));
        }

        unsafe {
            header_ptr.write(PoolHeader {
                prev: self.last_pool.get(),
                byte_size: len,
                blocks_start,
                num_blocks,
            });
        }
        self.last_pool.set(header_ptr);

        let mut free_head = self.free_head.get();
        for i in 0..num_blocks {
            let block_ptr = unsafe { blocks_start.add(i * self.block_size) } as *mut FreeBlock;
            unsafe { (*block_ptr).prev = free_head };
            free_head = block_ptr;
        }
        self.free_head.set(free_head);
        Ok(())
    }

    fn grow(&self) -> AllocResult<()> {
        let previous_byte_size = if self.last_pool.get().is_null() {
            self.block_size
        } else {
            unsafe { (*self.last_pool.get()).byte_size }
        };
        let next_size = ((previous_byte_size as f32) * self.growth_factor) as usize;
        self.alloc_new_pool(next_size.max(self.block_size))
    }

    #[cfg(debug_assertions)]
    fn owns(&self, addr: usize) -> bool {
        let mut pool = self.last_pool.get();
        while !pool.is_null() {
            let header = unsafe { &*pool };
            let start = header.blocks_start as usize;
            let end = start + header.num_blocks * self.block_size;
            if addr >= start && addr < end {
                return true;
            }
            pool = header.prev;
        }
        false
    }
}

fn growth_factor_invalid(factor: f32) -> bool {
    factor < 1.0
}

unsafe impl Allocator for LinkedBlockPool {
    unsafe fn allocate(&self, request: AllocRequest) -> AllocResult<MaybeDefinedMemory> {
        request.validate()?;
        if request.num_bytes > self.block_size || request.alignment > self.block_align {
            return Err(AllocError::usage("request exceeds this blockpool's block shape"));
        }

        if self.free_head.get().is_null() {
            self.grow()?;
        }

        let head = self.free_head.get();
        let next = unsafe { (*head).prev };
        self.free_head.set(next);

        let ptr = NonNull::new(head as *mut u8).unwrap();
        let span = unsafe { ByteSpan::new(ptr, self.block_size) };

        if !request.leave_nonzeroed() {
            unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, self.block_size) };
        }
        Ok(MaybeDefinedMemory::Defined(span))
    }

    unsafe fn deallocate(&self, memory: ByteSpan) {
        #[cfg(debug_assertions)]
        debug_assert!(self.owns(memory.addr()), "freeing pointer not owned by this blockpool");

        let block_ptr = memory.data().as_ptr() as *mut FreeBlock;
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
        log::warn!("LinkedBlockPool::clear() called; this allocator does not support bulk clear");
        Err(AllocError::unsupported())
    }

    fn features(&self) -> AllocFeatures {
        AllocFeatures::CAN_EXPAND_BACK | AllocFeatures::CAN_PREDICTABLY_REALLOC_IN_PLACE
    }
}

impl Drop for LinkedBlockPool {
    fn drop(&mut self) {
        let mut pool = self.last_pool.get();
        while !pool.is_null() {
            let header = unsafe { &*pool };
            let prev = header.prev;
            let byte_size = header.byte_size;
            let base = pool as *mut u8;
            let span = unsafe { ByteSpan::new(NonNull::new_unchecked(base), byte_size) };
            unsafe { self.backing.deallocate(span) };
            pool = prev;
        }
    }
}
