//! The arc payload (C11): refcounts, a backing allocator pointer, and
//! contiguous object storage, plus the strong-count lock-bit protocol.
//!
//! Grounded on `original_source/include/okay/smart_pointers/arc.h`'s
//! `arc_payload_t` and the free functions built around it: refcounts and
//! payload are always allocated together, so an undropped weak handle keeps
//! the allocation alive even after the object itself has been destructed.

use core::mem::MaybeUninit;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::allocator::{AllocFlags, AllocRequest, Allocator};
use crate::descriptor::ByteSpan;
use crate::error::AllocResult;
use crate::utils::Backoff;

/// High bit of the strong count: a spinlock guarding every transition that
/// reads or writes the low (count) bits.
pub(crate) const LOCK_BIT: u64 = 1 << 63;

#[repr(C)]
pub(crate) struct ArcPayload<T> {
    pub(crate) strong: AtomicU64,
    pub(crate) weak: AtomicU64,
    allocator: NonNull<dyn Allocator>,
    object: MaybeUninit<T>,
}

impl<T> ArcPayload<T> {
    /// Spins until this payload's strong count's lock bit is clear, then
    /// claims it. Returns the low bits observed at the moment the lock was
    /// acquired.
    pub(crate) fn lock_strong(&self) -> u64 {
        let mut backoff = Backoff::new();
        loop {
            let old = self.strong.fetch_or(LOCK_BIT, Ordering::SeqCst);
            if old & LOCK_BIT == 0 {
                return old;
            }
            backoff.spin();
        }
    }

    /// Releases the strong-count lock, leaving `new_low` as the count.
    pub(crate) fn unlock_strong(&self, new_low: u64) {
        debug_assert!(new_low & LOCK_BIT == 0);
        self.strong.store(new_low, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn object_ptr(&self) -> *const T {
        self.object.as_ptr()
    }

    #[inline]
    pub(crate) fn object_mut_ptr(&self) -> *mut T {
        self.object.as_ptr() as *mut T
    }
}

/// Allocates and initializes a fresh payload holding `value`, with
/// `strong = LOCK_BIT` (unique-rw owns it) and `weak = 1` (the baseline tick
/// kept alive for as long as the object or any handle chain referencing it
/// exists).
///
/// # Safety
/// `allocator` must remain valid for as long as any handle derived from the
/// returned payload is alive.
pub(crate) unsafe fn allocate<T>(
    value: T,
    allocator: NonNull<dyn Allocator>,
) -> AllocResult<NonNull<ArcPayload<T>>> {
    let request = AllocRequest::new(
        core::mem::size_of::<ArcPayload<T>>(),
        core::mem::align_of::<ArcPayload<T>>(),
    )
    .with_flags(AllocFlags::LEAVE_NONZEROED);
    let mem = unsafe { allocator.as_ref().allocate(request) }?;
    let (ptr, _) = mem.data_maybe_defined();
    let payload_ptr = ptr.cast::<ArcPayload<T>>();

    unsafe {
        core::ptr::addr_of_mut!((*payload_ptr.as_ptr()).strong)
            .write(AtomicU64::new(LOCK_BIT));
        core::ptr::addr_of_mut!((*payload_ptr.as_ptr()).weak).write(AtomicU64::new(1));
        core::ptr::addr_of_mut!((*payload_ptr.as_ptr()).allocator).write(allocator);
        core::ptr::addr_of_mut!((*payload_ptr.as_ptr()).object)
            .write(MaybeUninit::new(value));
    }
    Ok(payload_ptr)
}

/// Returns the payload's backing memory to its allocator. Caller must ensure
/// no handle still references `payload` and the object has already been
/// dropped if it was ever initialized.
///
/// # Safety
/// `payload` must have come from [`allocate`] and not already be freed.
pub(crate) unsafe fn deallocate<T>(payload: NonNull<ArcPayload<T>>) {
    let allocator = unsafe { (*payload.as_ptr()).allocator };
    let span =
        unsafe { ByteSpan::new(payload.cast::<u8>(), core::mem::size_of::<ArcPayload<T>>()) };
    unsafe { allocator.as_ref().deallocate(span) };
}
