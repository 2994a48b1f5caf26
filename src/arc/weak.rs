//! The weak arc handle (C12): keeps a payload's allocation alive without
//! keeping its object alive, so a live strong reference can be promoted back
//! to readonly even after a previous strong chain has already destructed the
//! object.
//!
//! Grounded on `weak_arc_t` in
//! `original_source/include/okay/smart_pointers/arc.h`. `try_spawn_readonly`
//! deliberately does not decrement the weak count on success: the weak
//! reference effectively converts into the baseline weak tick that every
//! live strong chain already holds, matching the original's behavior exactly
//! (confirmed against both the distilled and expanded specifications).

use core::ptr::NonNull;
use core::sync::atomic::Ordering;

use super::payload::{self, ArcPayload, LOCK_BIT};
use super::shared::SharedArc;
use crate::utils::Backoff;

/// A handle that keeps an arc payload's memory allocated without keeping its
/// object alive.
pub struct WeakArc<T> {
    payload: Option<NonNull<ArcPayload<T>>>,
}

unsafe impl<T: Sync + Send> Send for WeakArc<T> {}
unsafe impl<T: Sync + Send> Sync for WeakArc<T> {}

impl<T> WeakArc<T> {
    pub(crate) fn from_raw(payload: NonNull<ArcPayload<T>>) -> Self {
        Self { payload: Some(payload) }
    }

    /// Extracts the raw payload pointer without running destroy logic.
    /// Used by [`super::variant::VariantArc`] to move ownership in and out
    /// of the runtime-tagged handle.
    pub(crate) fn into_raw(mut self) -> NonNull<ArcPayload<T>> {
        self.payload.take().expect("use of a consumed WeakArc")
    }

    /// If the object is still alive, promotes this weak reference into a
    /// [`SharedArc`] without decrementing the weak count — the weak tick
    /// becomes the new readonly reference's share of the baseline count.
    /// Otherwise returns `self` unchanged.
    ///
    /// Gives up immediately, rather than spinning, if the lock is held by a
    /// unique-rw handle (observed strong count exactly `LOCK_BIT`): that
    /// handle may hold exclusive access indefinitely, so waiting on it could
    /// block forever.
    pub fn try_spawn_readonly(mut self) -> Result<SharedArc<T>, Self> {
        let payload_ptr = self.payload.take().expect("use of a consumed WeakArc");
        let payload = unsafe { payload_ptr.as_ref() };

        let mut backoff = Backoff::new();
        let old = loop {
            let observed = payload.strong.fetch_or(LOCK_BIT, Ordering::SeqCst);
            if observed & LOCK_BIT == 0 {
                break observed;
            }
            if observed == LOCK_BIT {
                self.payload = Some(payload_ptr);
                return Err(self);
            }
            backoff.spin();
        };

        if old == 0 {
            payload.unlock_strong(0);
            self.payload = Some(payload_ptr);
            return Err(self);
        }
        payload.unlock_strong(old + 1);
        Ok(SharedArc::from_raw(payload_ptr))
    }
}

impl<T> Clone for WeakArc<T> {
    /// Duplicates this weak reference. No lock needed: the weak count only
    /// ever needs to be read under the strong-count lock to decide
    /// deallocation, and increments here can never race with that read in a
    /// way that under-counts.
    fn clone(&self) -> Self {
        let payload_ptr = self.payload.expect("use of a consumed WeakArc");
        unsafe { payload_ptr.as_ref() }.weak.fetch_add(1, Ordering::Release);
        Self { payload: Some(payload_ptr) }
    }
}

impl<T> Drop for WeakArc<T> {
    fn drop(&mut self) {
        let Some(payload_ptr) = self.payload.take() else { return };
        let payload = unsafe { payload_ptr.as_ref() };
        let old = payload.weak.fetch_sub(1, Ordering::AcqRel);
        if old == 1 {
            unsafe { payload::deallocate(payload_ptr) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arc::unique::UniqueArc;
    use crate::allocator::system::CAllocator;

    #[test]
    fn promote_succeeds_while_object_alive() {
        let allocator = CAllocator::new();
        let unique = unsafe { UniqueArc::new_in(11u32, &allocator).unwrap() };
        let weak = unique.spawn_weak();
        let shared = unique.demote_to_readonly();
        let promoted = weak.try_spawn_readonly();
        assert!(promoted.is_ok());
        assert_eq!(*promoted.unwrap(), 11);
        drop(shared);
    }

    #[test]
    fn promote_fails_after_object_destroyed() {
        let allocator = CAllocator::new();
        let unique = unsafe { UniqueArc::new_in(3u32, &allocator).unwrap() };
        let weak = unique.spawn_weak();
        drop(unique);
        assert!(weak.try_spawn_readonly().is_err());
    }

    #[test]
    fn clone_keeps_allocation_alive_until_last_weak_drops() {
        let allocator = CAllocator::new();
        let unique = unsafe { UniqueArc::new_in(3u32, &allocator).unwrap() };
        let weak_a = unique.spawn_weak();
        let weak_b = weak_a.clone();
        drop(unique);
        drop(weak_a);
        drop(weak_b);
    }
}
