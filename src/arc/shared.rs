//! The shared, read-only arc handle (C12): any number of `SharedArc<T>`
//! instances may coexist, each granting immutable access to the payload's
//! object.
//!
//! Grounded on `ro_arc_t` in
//! `original_source/include/okay/smart_pointers/arc.h`: duplication and
//! destruction both acquire the strong-count lock bit, since both need to
//! read-modify-write the low bits atomically with respect to the last
//! reference dropping and destructing the object.

use core::ops::Deref;
use core::ptr::NonNull;
use core::sync::atomic::Ordering;

use super::payload::{self, ArcPayload, LOCK_BIT};
use super::unique::UniqueArc;
use super::weak::WeakArc;

/// A shared, read-only reference to an arc payload's object.
pub struct SharedArc<T> {
    payload: Option<NonNull<ArcPayload<T>>>,
}

unsafe impl<T: Sync + Send> Send for SharedArc<T> {}
unsafe impl<T: Sync + Send> Sync for SharedArc<T> {}

impl<T> SharedArc<T> {
    pub(crate) fn from_raw(payload: NonNull<ArcPayload<T>>) -> Self {
        Self { payload: Some(payload) }
    }

    /// Extracts the raw payload pointer without running destroy logic.
    /// Used by [`super::variant::VariantArc`] to move ownership in and out
    /// of the runtime-tagged handle.
    pub(crate) fn into_raw(mut self) -> NonNull<ArcPayload<T>> {
        self.payload.take().expect("use of a consumed SharedArc")
    }

    #[inline]
    fn payload_ref(&self) -> &ArcPayload<T> {
        unsafe {
            self.payload.expect("use of a consumed SharedArc (moved-from)").as_ref()
        }
    }

    /// Spawns a [`WeakArc`] while keeping this handle alive. Safe to
    /// increment the weak count unconditionally since a live strong
    /// reference guarantees the payload hasn't been deallocated.
    pub fn spawn_weak(&self) -> WeakArc<T> {
        let payload_ptr = self.payload.expect("use of a consumed SharedArc");
        unsafe { payload_ptr.as_ref() }.weak.fetch_add(1, Ordering::Release);
        WeakArc::from_raw(payload_ptr)
    }

    /// Converts this handle into a [`WeakArc`]: bumps the weak count while a
    /// strong reference is still held (so it's safe without the lock), then
    /// runs the ordinary readonly-destroy path on this reference.
    pub fn demote_to_weak(mut self) -> WeakArc<T> {
        let payload_ptr = self.payload.take().expect("use of a consumed SharedArc");
        unsafe { payload_ptr.as_ref() }.weak.fetch_add(1, Ordering::Release);
        destroy_one(payload_ptr);
        WeakArc::from_raw(payload_ptr)
    }

    /// If this is the sole remaining strong reference, consumes it into a
    /// [`UniqueArc`]. Otherwise returns `self` unchanged so the caller can
    /// keep using it.
    pub fn try_promote_to_unique(mut self) -> Result<UniqueArc<T>, Self> {
        let payload_ptr = self.payload.take().expect("use of a consumed SharedArc");
        let payload = unsafe { payload_ptr.as_ref() };

        let old = payload.lock_strong();
        debug_assert_ne!(old, 0, "lock observed with strong count already zero");

        if old == 1 {
            payload.strong.store(LOCK_BIT, Ordering::SeqCst);
            Ok(UniqueArc::from_raw(payload_ptr))
        } else {
            payload.unlock_strong(old);
            self.payload = Some(payload_ptr);
            Err(self)
        }
    }
}

impl<T> Clone for SharedArc<T> {
    /// Duplicates this handle, incrementing the strong count under the lock.
    fn clone(&self) -> Self {
        let payload_ptr = self.payload.expect("use of a consumed SharedArc");
        let payload = unsafe { payload_ptr.as_ref() };
        let old = payload.lock_strong();
        debug_assert_ne!(old, 0, "cloning a SharedArc with no live strong reference");
        payload.unlock_strong(old + 1);
        Self { payload: Some(payload_ptr) }
    }
}

impl<T> Deref for SharedArc<T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.payload_ref().object_ptr() }
    }
}

/// Runs the readonly-destroy protocol on one strong reference to `payload`:
/// decrements the low bits under the lock, destructing the object and
/// potentially deallocating if this was the last strong reference.
fn destroy_one<T>(payload_ptr: NonNull<ArcPayload<T>>) {
    let payload = unsafe { payload_ptr.as_ref() };
    let old = payload.lock_strong();
    debug_assert_ne!(old, 0);

    if old != 1 {
        payload.unlock_strong(old - 1);
        return;
    }

    unsafe { core::ptr::drop_in_place(payload.object_mut_ptr()) };
    payload.unlock_strong(0);

    // Release the implicit weak tick held by the strong side. If that was
    // the last tick (no weak handles outstanding), deallocate.
    if payload.weak.fetch_sub(1, Ordering::AcqRel) == 1 {
        unsafe { payload::deallocate(payload_ptr) };
    }
}

impl<T> Drop for SharedArc<T> {
    fn drop(&mut self) {
        if let Some(payload_ptr) = self.payload.take() {
            destroy_one(payload_ptr);
        }
    }
}
