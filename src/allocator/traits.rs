//! The allocator contract (C2): capability flags, request value types, and
//! the `Allocator` trait every concrete allocator in this crate implements.

use bitflags::bitflags;

use crate::descriptor::{ByteSpan, MaybeDefinedMemory};
use crate::error::{AllocError, AllocResult};
use crate::utils::is_power_of_two;

bitflags! {
    /// Capability flags an allocator advertises through [`Allocator::features`].
    ///
    /// Not all combinations are valid — see the invariants documented on each
    /// flag below and enforced by the concrete allocators that set them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AllocFeatures: u16 {
        /// Concurrent calls from multiple threads are permitted.
        const IS_THREADSAFE = 1 << 0;
        /// `clear` truly resets the allocator to its freshly constructed state.
        const CAN_CLEAR = 1 << 1;
        /// `deallocate` is a no-op and `reallocate*` returns `Unsupported`.
        const CAN_ONLY_ALLOC = 1 << 2;
        /// Deallocation is only valid in LIFO order. Mutually exclusive with
        /// `IS_THREADSAFE` and `CAN_ONLY_ALLOC`.
        const IS_STACKLIKE = 1 << 3;
        /// Reallocation may grow by extending the back of the allocation.
        const CAN_EXPAND_BACK = 1 << 4;
        /// Reallocation may grow by extending the front of the allocation.
        const CAN_EXPAND_FRONT = 1 << 5;
        /// Shrink calls actually return memory to the allocator.
        const CAN_RECLAIM = 1 << 6;
        /// Supports `AllocFlags::IN_PLACE_ORELSE_FAIL`.
        const CAN_PREDICTABLY_REALLOC_IN_PLACE = 1 << 7;

        const NONE = 0;
    }
}

bitflags! {
    /// Flags controlling a single allocate/reallocate call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AllocFlags: u16 {
        /// Returned memory (and any newly acquired region on grow) is left
        /// undefined; the allocator skips zeroing.
        const LEAVE_NONZEROED = 1 << 0;
        /// Grow the back of the allocation (reallocate-extended).
        const EXPAND_BACK = 1 << 1;
        /// Grow the front of the allocation (reallocate-extended).
        const EXPAND_FRONT = 1 << 2;
        /// Shrink the back of the allocation (reallocate-extended).
        const SHRINK_BACK = 1 << 3;
        /// Shrink the front of the allocation (reallocate-extended).
        const SHRINK_FRONT = 1 << 4;
        /// Hint that the caller would accept a move even if in-place would
        /// succeed.
        const TRY_DEFRAGMENT = 1 << 5;
        /// Only allocators with `CAN_PREDICTABLY_REALLOC_IN_PLACE` honor this;
        /// others return `Unsupported`.
        const IN_PLACE_ORELSE_FAIL = 1 << 6;

        const NONE = 0;
    }
}

/// A request to allocate fresh memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocRequest {
    pub num_bytes: usize,
    pub alignment: usize,
    pub flags: AllocFlags,
}

impl AllocRequest {
    /// A request at the given alignment.
    #[inline]
    pub const fn new(num_bytes: usize, alignment: usize) -> Self {
        Self { num_bytes, alignment, flags: AllocFlags::NONE }
    }

    #[inline]
    pub const fn with_flags(mut self, flags: AllocFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub const fn leave_nonzeroed(&self) -> bool {
        self.flags.contains(AllocFlags::LEAVE_NONZEROED)
    }

    /// Validates the request shape against the universal invariants in
    /// `SPEC_FULL.md` §3.2 / §8 invariant 4.
    pub fn validate(&self) -> AllocResult<()> {
        if !is_power_of_two(self.alignment) {
            return Err(AllocError::usage("alignment must be a power of two"));
        }
        if self.num_bytes > isize::MAX as usize - (self.alignment - 1) {
            return Err(AllocError::usage("requested size overflows isize::MAX"));
        }
        Ok(())
    }
}

/// A request to reallocate an existing allocation, growing or shrinking
/// from the back only.
#[derive(Debug, Clone, Copy)]
pub struct ReallocRequest {
    pub memory: ByteSpan,
    pub new_size: usize,
    /// `0` or strictly greater than `new_size`; a hint that the allocator
    /// may reserve more than requested if it's cheap to do so.
    pub preferred_size: usize,
    pub flags: AllocFlags,
}

impl ReallocRequest {
    #[inline]
    pub const fn new(memory: ByteSpan, new_size: usize) -> Self {
        Self { memory, new_size, preferred_size: 0, flags: AllocFlags::NONE }
    }

    #[inline]
    pub const fn with_flags(mut self, flags: AllocFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub const fn leave_nonzeroed(&self) -> bool {
        self.flags.contains(AllocFlags::LEAVE_NONZEROED)
    }

    pub fn validate(&self) -> AllocResult<()> {
        if self.new_size == 0 {
            return Err(AllocError::usage("new_size must be nonzero"));
        }
        if self.preferred_size != 0 && self.preferred_size <= self.new_size {
            return Err(AllocError::usage(
                "preferred_size must be strictly greater than new_size",
            ));
        }
        Ok(())
    }
}

/// One side (front or back) of a [`ReallocExtendedRequest`]. `0`/`0` means
/// "this side is unchanged".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideRequest {
    pub required: usize,
    pub preferred: usize,
}

impl SideRequest {
    pub const UNCHANGED: Self = Self { required: 0, preferred: 0 };

    #[inline]
    pub const fn is_unchanged(&self) -> bool {
        self.required == 0 && self.preferred == 0
    }
}

/// A request to grow or shrink an existing allocation independently on its
/// front and back.
#[derive(Debug, Clone, Copy)]
pub struct ReallocExtendedRequest {
    pub memory: ByteSpan,
    pub front: SideRequest,
    pub back: SideRequest,
    pub flags: AllocFlags,
}

impl ReallocExtendedRequest {
    pub fn validate(&self) -> AllocResult<()> {
        if self.front.is_unchanged() && self.back.is_unchanged() {
            return Err(AllocError::usage("at least one side must change"));
        }
        let front_is_shrink = self.flags.contains(AllocFlags::SHRINK_FRONT);
        let back_is_shrink = self.flags.contains(AllocFlags::SHRINK_BACK);
        if front_is_shrink && self.front.preferred != 0 {
            return Err(AllocError::usage("preferred must be 0 when shrinking front"));
        }
        if back_is_shrink && self.back.preferred != 0 {
            return Err(AllocError::usage("preferred must be 0 when shrinking back"));
        }
        if front_is_shrink && self.front.required >= self.memory.len() {
            return Err(AllocError::usage("front shrink must be strictly smaller"));
        }
        if back_is_shrink && self.back.required >= self.memory.len() {
            return Err(AllocError::usage("back shrink must be strictly smaller"));
        }
        Ok(())
    }
}

/// Result of a successful [`Allocator::reallocate_extended`] call.
#[derive(Debug, Clone, Copy)]
pub struct ReallocExtendedResult {
    pub memory: MaybeDefinedMemory,
    /// Nonzero only when the front grew: the number of bytes by which the
    /// payload moved rightward inside the new allocation.
    pub front_growth_offset: usize,
}

/// The allocator contract every concrete allocator implements.
///
/// # Safety
/// Implementors must uphold the universal invariants documented in
/// `SPEC_FULL.md` §4.1 and §8: returned memory must satisfy the requested
/// alignment and be at least the requested size, and zeroing must happen
/// unless `AllocFlags::LEAVE_NONZEROED` was set.
pub unsafe trait Allocator {
    /// Allocates fresh memory satisfying `request`.
    unsafe fn allocate(&self, request: AllocRequest) -> AllocResult<MaybeDefinedMemory>;

    /// Returns memory previously returned by `allocate`/`reallocate*` back
    /// to the allocator. May be a no-op (see `AllocFeatures::CAN_ONLY_ALLOC`).
    ///
    /// # Safety
    /// `memory` must have been returned by a prior call to this allocator
    /// and not already deallocated.
    unsafe fn deallocate(&self, memory: ByteSpan);

    /// Grows or shrinks an existing allocation from the back only.
    ///
    /// # Safety
    /// `request.memory` must have been returned by a prior call to this
    /// allocator.
    unsafe fn reallocate(&self, request: ReallocRequest) -> AllocResult<MaybeDefinedMemory>;

    /// Grows or shrinks an existing allocation independently on front and
    /// back.
    ///
    /// # Safety
    /// `request.memory` must have been returned by a prior call to this
    /// allocator.
    unsafe fn reallocate_extended(
        &self,
        request: ReallocExtendedRequest,
    ) -> AllocResult<ReallocExtendedResult>;

    /// Resets the allocator to its freshly constructed state, if
    /// `AllocFeatures::CAN_CLEAR` is advertised.
    fn clear(&self) -> AllocResult<()>;

    /// The capability flags this allocator advertises.
    fn features(&self) -> AllocFeatures;
}

/// Marker trait for allocators that advertise `AllocFeatures::IS_THREADSAFE`
/// and are genuinely `Sync + Send`. Implementors must only provide this
/// when `features().contains(AllocFeatures::IS_THREADSAFE)` always holds.
///
/// # Safety
/// Implementing this trait asserts the allocator may be called
/// concurrently from multiple threads without external synchronization.
pub unsafe trait ThreadSafeAllocator: Allocator + Sync + Send {}

/// Default-method extensions layered on top of the raw contract.
pub trait TypedAllocExt: Allocator {
    /// Attempts an in-place reallocation; on failure (and only on that
    /// specific failure), allocates a fresh buffer of `request.new_size`
    /// without copying — the caller is responsible for moving the payload.
    ///
    /// # Safety
    /// Same preconditions as `reallocate`.
    unsafe fn reallocate_in_place_orelse_keep_old_nocopy(
        &self,
        request: ReallocRequest,
    ) -> AllocResult<MaybeDefinedMemory>
    where
        Self: Sized,
    {
        let in_place_request =
            request.with_flags(request.flags | AllocFlags::IN_PLACE_ORELSE_FAIL);
        match unsafe { self.reallocate(in_place_request) } {
            Ok(mem) => Ok(mem),
            Err(e) if e.kind() == crate::error::AllocErrorKind::CouldntExpandInPlace => {
                let fresh = AllocRequest::new(request.new_size, 1)
                    .with_flags(AllocFlags::LEAVE_NONZEROED);
                unsafe { self.allocate(fresh) }
            }
            Err(e) => Err(e),
        }
    }
}

impl<A: Allocator + ?Sized> TypedAllocExt for A {}
