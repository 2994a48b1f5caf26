//! The arena (C6): a bump allocator with an optional backing allocator for
//! growth, plus scoped rewind with destructor registration.
//!
//! The destructor list is grounded directly on
//! `original_source/include/okay/allocators/destruction_callbacks.h`: each
//! node is bump-allocated from the arena itself (not the system heap) and
//! holds one `(context, callback)` pair plus a `previous` pointer; closing a
//! scope walks `previous` back to the saved checkpoint, i.e. LIFO /
//! reverse-of-registration order, since a destructor may reference state
//! registered after it.

use alloc::boxed::Box;
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

type DestructorThunk = fn(*mut ());

struct DestructorNode {
    context: *mut (),
    callback: DestructorThunk,
    previous: *mut DestructorNode,
}

/// Bump allocator. `deallocate` is a no-op; `reallocate*` is unsupported;
/// `clear()` rewinds to the original buffer and, in debug builds, fills the
/// reclaimed region with the configured debug pattern.
pub struct Arena {
    owned: Cell<ByteSpan>,
    available: Cell<ByteSpan>,
    destructor_list_head: Cell<*mut DestructorNode>,
    parent: Option<Box<dyn Allocator>>,
    growth_factor: f32,
    max_chunk_size: usize,
}

impl Arena {
    /// Builds an arena over a caller-supplied buffer with no backing
    /// allocator; once `owned` is exhausted, further allocations fail with
    /// `Oom`.
    pub fn new(buffer: ByteSpan) -> Self {
        Self {
            owned: Cell::new(buffer),
            available: Cell::new(buffer),
            destructor_list_head: Cell::new(core::ptr::null_mut()),
            parent: None,
            growth_factor: config::get().default_arena_config.growth_factor,
            max_chunk_size: config::get().default_arena_config.max_chunk_size,
        }
    }

    /// Builds an arena over `initial_chunk`, growing through `parent` when
    /// exhausted. `initial_chunk` must itself have come from `parent`:
    /// ownership transfers to the arena, which deallocates it through
    /// `parent` once grown past, or on drop.
    pub fn with_parent(parent: Box<dyn Allocator>, initial_chunk: ByteSpan) -> Self {
        Self {
            owned: Cell::new(initial_chunk),
            available: Cell::new(initial_chunk),
            destructor_list_head: Cell::new(core::ptr::null_mut()),
            parent: Some(parent),
            growth_factor: config::get().default_arena_config.growth_factor,
            max_chunk_size: config::get().default_arena_config.max_chunk_size,
        }
    }

    /// Opens a rewind scope. Allocations made while the scope is open may
    /// register a destructor via [`Self::register_destructor`]; dropping the
    /// returned [`ArenaScope`] runs them in LIFO order and rewinds the bump
    /// cursor.
    pub fn scope(&self) -> ArenaScope<'_> {
        ArenaScope {
            arena: self,
            saved_available: self.available.get(),
            saved_head: self.destructor_list_head.get(),
            closed: false,
        }
    }

    /// Registers `callback(context)` to run when the currently open scope
    /// closes (or, with no open scope, when the arena itself is dropped via
    /// [`Self::run_all_destructors`]). The node is bump-allocated from this
    /// arena.
    ///
    /// # Safety
    /// `context` must remain valid until the destructor runs.
    pub unsafe fn register_destructor(&self, context: *mut (), callback: DestructorThunk) -> AllocResult<()> {
        let layout_req = AllocRequest::new(
            core::mem::size_of::<DestructorNode>(),
            core::mem::align_of::<DestructorNode>(),
        );
        let mem = unsafe { self.allocate(layout_req) }?;
        let span = mem.as_bytes().expect("arena allocate always zeroes or is explicitly undefined");
        let node_ptr = span.data().as_ptr() as *mut DestructorNode;
        unsafe {
            node_ptr.write(DestructorNode {
                context,
                callback,
                previous: self.destructor_list_head.get(),
            });
        }
        self.destructor_list_head.set(node_ptr);
        Ok(())
    }

    fn grow_for(&self, additional: usize) -> AllocResult<()> {
        let parent = self.parent.as_ref().ok_or_else(AllocError::unsupported)?;
        let previous = self.owned.get();
        let mut new_chunk_size = ((previous.len() as f32) * self.growth_factor) as usize;
        new_chunk_size = new_chunk_size.max(additional).min(self.max_chunk_size.max(additional));

        let req = AllocRequest::new(new_chunk_size, 1).with_flags(AllocFlags::LEAVE_NONZEROED);
        let mem = unsafe { parent.allocate(req) }?;
        let (ptr, len) = mem.data_maybe_defined();
        let new_owned = unsafe { ByteSpan::new(ptr, len) };
        unsafe { parent.deallocate(previous) };
        self.owned.set(new_owned);
        self.available.set(new_owned);
        Ok(())
    }
}

impl Drop for Arena {
    /// Returns the current chunk to `parent`, if any. The buffer passed to
    /// [`Self::new`] has no backing allocator and is left to its caller.
    fn drop(&mut self) {
        if let Some(parent) = self.parent.as_ref() {
            unsafe { parent.deallocate(self.owned.get()) };
        }
    }
}

unsafe impl Allocator for Arena {
    unsafe fn allocate(&self, request: AllocRequest) -> AllocResult<MaybeDefinedMemory> {
        request.validate()?;
        loop {
            let available = self.available.get();
            let start = align_up(available.addr(), request.alignment);
            let padding = start - available.addr();
            let needed = padding + request.num_bytes;

            if needed <= available.len() {
                let carved = unsafe { available.sub_span(padding, request.num_bytes) };
                let rest = unsafe {
                    available.sub_span(needed, available.len() - needed)
                };
                self.available.set(rest);

                return Ok(if request.leave_nonzeroed() {
                    MaybeDefinedMemory::Undefined(carved.into_undefined())
                } else {
                    unsafe {
                        core::ptr::write_bytes(carved.data().as_ptr(), 0, carved.len());
                    }
                    MaybeDefinedMemory::Defined(carved)
                });
            }

            if self.parent.is_none() {
                return Err(AllocError::oom(request));
            }
            self.grow_for(needed)?;
        }
    }

    unsafe fn deallocate(&self, _memory: ByteSpan) {}

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
        let owned = self.owned.get();
        #[cfg(debug_assertions)]
        unsafe {
            core::ptr::write_bytes(
                owned.data().as_ptr(),
                config::get().default_arena_config.debug_fill_byte,
                owned.len(),
            );
        }
        self.available.set(owned);
        self.destructor_list_head.set(core::ptr::null_mut());
        Ok(())
    }

    fn features(&self) -> AllocFeatures {
        AllocFeatures::CAN_ONLY_ALLOC | AllocFeatures::CAN_CLEAR
    }
}

/// A save point returned by [`Arena::scope`]. Closing it (explicitly via
/// [`Self::close`] or implicitly on drop) runs every destructor registered
/// since it was opened, in LIFO order, then rewinds the bump cursor.
pub struct ArenaScope<'a> {
    arena: &'a Arena,
    saved_available: ByteSpan,
    saved_head: *mut DestructorNode,
    closed: bool,
}

impl<'a> ArenaScope<'a> {
    pub fn close(mut self) {
        self.close_impl();
    }

    fn close_impl(&mut self) {
        if self.closed {
            return;
        }
        let mut node = self.arena.destructor_list_head.get();
        while !core::ptr::eq(node, self.saved_head) {
            debug_assert!(!node.is_null(), "arena scope closed out of LIFO order");
            let current = unsafe { &*node };
            (current.callback)(current.context);
            node = current.previous;
        }
        self.arena.destructor_list_head.set(self.saved_head);
        self.arena.available.set(self.saved_available);
        self.closed = true;
    }
}

impl<'a> Drop for ArenaScope<'a> {
    fn drop(&mut self) {
        self.close_impl();
    }
}
