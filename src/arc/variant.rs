//! The runtime-tagged arc handle (C12): holds exactly one of unique, shared,
//! or weak ownership, remembered as a small enum tag alongside the payload
//! pointer, so a container can hold a mix of ownership modes behind one
//! type.
//!
//! Grounded on `variant_arc_t` in
//! `original_source/include/okay/smart_pointers/arc.h`. Conversion and
//! consumption methods mirror the original's `opt_t`-returning member
//! functions, translated into `Option`/`Result<Self, Self>` so a failed
//! conversion hands the variant back to the caller instead of leaving it in
//! a moved-from state.

use core::mem::ManuallyDrop;
use core::ptr::NonNull;

use super::payload::ArcPayload;
use super::shared::SharedArc;
use super::unique::UniqueArc;
use super::weak::WeakArc;

/// Which of the three ownership modes a [`VariantArc`] currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcMode {
    UniqueRw,
    SharedRo,
    Weak,
}

/// An arc handle whose ownership mode (unique, shared read-only, or weak) is
/// decided at runtime rather than by its type.
pub struct VariantArc<T> {
    payload: NonNull<ArcPayload<T>>,
    mode: ArcMode,
}

unsafe impl<T: Sync + Send> Send for VariantArc<T> {}
unsafe impl<T: Sync + Send> Sync for VariantArc<T> {}

impl<T> From<UniqueArc<T>> for VariantArc<T> {
    fn from(handle: UniqueArc<T>) -> Self {
        Self { payload: handle.into_raw(), mode: ArcMode::UniqueRw }
    }
}

impl<T> From<SharedArc<T>> for VariantArc<T> {
    fn from(handle: SharedArc<T>) -> Self {
        Self { payload: handle.into_raw(), mode: ArcMode::SharedRo }
    }
}

impl<T> From<WeakArc<T>> for VariantArc<T> {
    fn from(handle: WeakArc<T>) -> Self {
        Self { payload: handle.into_raw(), mode: ArcMode::Weak }
    }
}

impl<T> VariantArc<T> {
    pub fn ownership_mode(&self) -> ArcMode {
        self.mode
    }

    /// Spawns a weak handle regardless of which mode this variant is in.
    pub fn spawn_weak_arc(&self) -> WeakArc<T> {
        match self.mode {
            ArcMode::UniqueRw => {
                ManuallyDrop::new(UniqueArc::from_raw(self.payload)).spawn_weak()
            }
            ArcMode::SharedRo => {
                ManuallyDrop::new(SharedArc::from_raw(self.payload)).spawn_weak()
            }
            ArcMode::Weak => (*ManuallyDrop::new(WeakArc::from_raw(self.payload))).clone(),
        }
    }

    /// Duplicates this variant, if its current mode supports duplication.
    /// Unique-rw handles can never be duplicated.
    pub fn try_duplicate(&self) -> Option<VariantArc<T>> {
        match self.mode {
            ArcMode::UniqueRw => None,
            ArcMode::SharedRo => {
                let dup = (*ManuallyDrop::new(SharedArc::from_raw(self.payload))).clone();
                Some(VariantArc::from(dup))
            }
            ArcMode::Weak => {
                let dup = (*ManuallyDrop::new(WeakArc::from_raw(self.payload))).clone();
                Some(VariantArc::from(dup))
            }
        }
    }

    /// Reads the object, if this variant currently holds a live reference to
    /// it (unique-rw or shared-ro; a weak variant never can).
    pub fn try_deref(&self) -> Option<&T> {
        match self.mode {
            ArcMode::UniqueRw | ArcMode::SharedRo => {
                Some(unsafe { &*self.payload.as_ref().object_ptr() })
            }
            ArcMode::Weak => None,
        }
    }

    /// Mutably reads the object. Only possible in unique-rw mode.
    pub fn try_deref_mut(&mut self) -> Option<&mut T> {
        match self.mode {
            ArcMode::UniqueRw => Some(unsafe { &mut *self.payload.as_ref().object_mut_ptr() }),
            _ => None,
        }
    }

    pub fn try_consume_into_contained_unique_arc(self) -> Result<UniqueArc<T>, Self> {
        if self.mode != ArcMode::UniqueRw {
            return Err(self);
        }
        let payload = self.payload;
        core::mem::forget(self);
        Ok(UniqueArc::from_raw(payload))
    }

    pub fn try_consume_into_contained_readonly_arc(self) -> Result<SharedArc<T>, Self> {
        if self.mode != ArcMode::SharedRo {
            return Err(self);
        }
        let payload = self.payload;
        core::mem::forget(self);
        Ok(SharedArc::from_raw(payload))
    }

    pub fn try_consume_into_contained_weak_arc(self) -> Result<WeakArc<T>, Self> {
        if self.mode != ArcMode::Weak {
            return Err(self);
        }
        let payload = self.payload;
        core::mem::forget(self);
        Ok(WeakArc::from_raw(payload))
    }

    /// Converts into a shared read-only handle, promoting a weak variant if
    /// the object is still alive. Hands `self` back unchanged on failure.
    pub fn try_convert_and_consume_into_readonly_arc(self) -> Result<SharedArc<T>, Self> {
        match self.mode {
            ArcMode::UniqueRw => {
                let payload = self.payload;
                core::mem::forget(self);
                Ok(UniqueArc::from_raw(payload).demote_to_readonly())
            }
            ArcMode::SharedRo => {
                let payload = self.payload;
                core::mem::forget(self);
                Ok(SharedArc::from_raw(payload))
            }
            ArcMode::Weak => {
                let weak = WeakArc::from_raw(self.payload);
                match weak.try_spawn_readonly() {
                    Ok(shared) => {
                        core::mem::forget(self);
                        Ok(shared)
                    }
                    Err(weak) => {
                        core::mem::forget(weak);
                        Err(self)
                    }
                }
            }
        }
    }

    /// Converts into a unique handle, promoting through shared-readonly if
    /// necessary. A weak variant that promotes to readonly but then fails to
    /// reach sole ownership is demoted back to weak, exactly undoing the
    /// intermediate promotion, and handed back unchanged.
    pub fn try_convert_and_consume_into_unique_arc(self) -> Result<UniqueArc<T>, Self> {
        match self.mode {
            ArcMode::UniqueRw => {
                let payload = self.payload;
                core::mem::forget(self);
                Ok(UniqueArc::from_raw(payload))
            }
            ArcMode::SharedRo => {
                let shared = SharedArc::from_raw(self.payload);
                match shared.try_promote_to_unique() {
                    Ok(unique) => {
                        core::mem::forget(self);
                        Ok(unique)
                    }
                    Err(shared) => {
                        core::mem::forget(shared);
                        Err(self)
                    }
                }
            }
            ArcMode::Weak => {
                let weak = WeakArc::from_raw(self.payload);
                let shared = match weak.try_spawn_readonly() {
                    Ok(shared) => shared,
                    Err(weak) => {
                        core::mem::forget(weak);
                        return Err(self);
                    }
                };
                match shared.try_promote_to_unique() {
                    Ok(unique) => {
                        core::mem::forget(self);
                        Ok(unique)
                    }
                    Err(shared) => {
                        core::mem::forget(shared.demote_to_weak());
                        Err(self)
                    }
                }
            }
        }
    }
}

impl<T> Drop for VariantArc<T> {
    fn drop(&mut self) {
        match self.mode {
            ArcMode::UniqueRw => drop(UniqueArc::from_raw(self.payload)),
            ArcMode::SharedRo => drop(SharedArc::from_raw(self.payload)),
            ArcMode::Weak => drop(WeakArc::from_raw(self.payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::system::CAllocator;

    #[test]
    fn dereferences_by_mode() {
        let allocator = CAllocator::new();
        let unique = unsafe { UniqueArc::new_in(4u32, &allocator).unwrap() };
        let mut variant: VariantArc<u32> = unique.into();
        assert_eq!(variant.ownership_mode(), ArcMode::UniqueRw);
        assert_eq!(*variant.try_deref().unwrap(), 4);
        *variant.try_deref_mut().unwrap() += 1;
        assert_eq!(*variant.try_deref().unwrap(), 5);
    }

    #[test]
    fn weak_variant_cannot_deref() {
        let allocator = CAllocator::new();
        let unique = unsafe { UniqueArc::new_in(1u32, &allocator).unwrap() };
        let weak = unique.spawn_weak();
        drop(unique);
        let variant: VariantArc<u32> = weak.into();
        assert_eq!(variant.ownership_mode(), ArcMode::Weak);
        assert!(variant.try_deref().is_none());
    }

    #[test]
    fn convert_weak_into_readonly_when_alive() {
        let allocator = CAllocator::new();
        let unique = unsafe { UniqueArc::new_in(8u32, &allocator).unwrap() };
        let weak = unique.spawn_weak();
        let shared = unique.demote_to_readonly();
        let variant: VariantArc<u32> = weak.into();
        let readonly = variant.try_convert_and_consume_into_readonly_arc();
        assert!(readonly.is_ok());
        assert_eq!(*readonly.unwrap(), 8);
        drop(shared);
    }

    #[test]
    fn convert_weak_into_readonly_fails_when_dead() {
        let allocator = CAllocator::new();
        let unique = unsafe { UniqueArc::new_in(2u32, &allocator).unwrap() };
        let weak = unique.spawn_weak();
        drop(unique);
        let variant: VariantArc<u32> = weak.into();
        assert!(variant.try_convert_and_consume_into_readonly_arc().is_err());
    }
}
