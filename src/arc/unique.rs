//! The unique, mutable arc handle (C12): exclusive read/write access to an
//! arc payload's object.
//!
//! Grounded on `unique_rw_arc_t` in
//! `original_source/include/okay/smart_pointers/arc.h`: while a unique
//! handle is alive the strong count is exactly `LOCK_BIT` (the lock held,
//! zero low bits), so no readonly duplication or weak promotion can ever
//! observe a nonzero strong count concurrently with mutable access.

use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use core::sync::atomic::Ordering;

use crate::allocator::Allocator;
use crate::error::AllocResult;

use super::payload::{self, ArcPayload, LOCK_BIT};
use super::shared::SharedArc;
use super::weak::WeakArc;

/// Exclusive owner of an arc payload's object. Only one `UniqueArc<T>` can
/// exist per payload at a time; demoting to [`SharedArc`] or spawning a
/// [`WeakArc`] gives up that exclusivity.
pub struct UniqueArc<T> {
    payload: Option<NonNull<ArcPayload<T>>>,
}

// SAFETY: a `UniqueArc<T>` never exposes its payload pointer to another
// thread without transitioning through the lock-protected handle protocol.
unsafe impl<T: Send> Send for UniqueArc<T> {}
unsafe impl<T: Send + Sync> Sync for UniqueArc<T> {}

impl<T> UniqueArc<T> {
    /// Allocates a payload through `allocator`, constructs `value` in place,
    /// and returns a unique handle to it.
    ///
    /// # Safety
    /// `allocator` must outlive every handle spawned from the returned arc
    /// (unique, shared, weak, or variant) — there is no lifetime tying this
    /// handle to the allocator reference, matching the rest of this crate's
    /// allocator contract.
    pub unsafe fn new_in(value: T, allocator: &dyn Allocator) -> AllocResult<Self> {
        let allocator_ptr = NonNull::from(allocator);
        let payload = unsafe { payload::allocate(value, allocator_ptr) }?;
        Ok(Self { payload: Some(payload) })
    }

    #[inline]
    fn payload(&self) -> &ArcPayload<T> {
        unsafe {
            self.payload
                .expect("use of a consumed UniqueArc (moved-from or demoted)")
                .as_ref()
        }
    }

    /// Converts this handle into a [`SharedArc`], releasing exclusivity.
    /// The strong count becomes `1` (lock released).
    pub fn demote_to_readonly(mut self) -> SharedArc<T> {
        let payload_ptr = self.payload.take().expect("use of a consumed UniqueArc");
        let payload = unsafe { payload_ptr.as_ref() };
        debug_assert_eq!(payload.strong.load(Ordering::SeqCst), LOCK_BIT);
        payload.strong.store(1, Ordering::SeqCst);
        SharedArc::from_raw(payload_ptr)
    }

    /// Spawns a [`WeakArc`] that does not keep the object alive but keeps
    /// the payload's memory alive for a future promotion attempt.
    pub fn spawn_weak(&self) -> WeakArc<T> {
        let payload_ptr = self.payload.expect("use of a consumed UniqueArc");
        unsafe { payload_ptr.as_ref() }.weak.fetch_add(1, Ordering::Release);
        WeakArc::from_raw(payload_ptr)
    }

    fn destroy(&mut self) {
        let Some(payload_ptr) = self.payload.take() else { return };
        let payload = unsafe { payload_ptr.as_ref() };

        let before_unlock = payload.strong.fetch_and(!LOCK_BIT, Ordering::SeqCst);
        debug_assert_eq!(before_unlock, LOCK_BIT);

        unsafe { core::ptr::drop_in_place(payload.object_mut_ptr()) };

        // Release the implicit weak tick held by the strong side. If that
        // was the last tick (no weak handles outstanding), deallocate.
        if payload.weak.fetch_sub(1, Ordering::AcqRel) == 1 {
            unsafe { payload::deallocate(payload_ptr) };
        }
    }
}

impl<T> Deref for UniqueArc<T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.payload().object_ptr() }
    }
}

impl<T> DerefMut for UniqueArc<T> {
    fn deref_mut(&mut self) -> &mut T {
        let payload_ptr = self.payload.expect("use of a consumed UniqueArc");
        unsafe { &mut *payload_ptr.as_ref().object_mut_ptr() }
    }
}

impl<T> Drop for UniqueArc<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<T> UniqueArc<T> {
    pub(crate) fn from_raw(payload: NonNull<ArcPayload<T>>) -> Self {
        Self { payload: Some(payload) }
    }

    /// Extracts the raw payload pointer without running destroy logic.
    /// Used by [`super::variant::VariantArc`] to move ownership in and out
    /// of the runtime-tagged handle.
    pub(crate) fn into_raw(mut self) -> NonNull<ArcPayload<T>> {
        self.payload.take().expect("use of a consumed UniqueArc")
    }
}
