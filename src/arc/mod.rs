//! Atomic, lock-bit-protected reference counting (C11/C12).
//!
//! [`payload`] holds the shared cell and the strong-count lock protocol;
//! [`UniqueArc`], [`SharedArc`], [`WeakArc`], and [`VariantArc`] are the
//! handle family built on top of it, grounded on `unique_rw_arc_t`,
//! `ro_arc_t`, `weak_arc_t`, and `variant_arc_t` in
//! `original_source/include/okay/smart_pointers/arc.h`.

mod payload;
mod shared;
mod unique;
mod variant;
mod weak;

pub use shared::SharedArc;
pub use unique::UniqueArc;
pub use variant::{ArcMode, VariantArc};
pub use weak::WeakArc;

use crate::allocator::Allocator;
use crate::error::AllocResult;

/// Allocates `value` through `allocator` and wraps it in a fresh
/// [`UniqueArc`]. Mirrors the original's free `into_arc` factory function.
///
/// # Safety
/// `allocator` must outlive every handle spawned from the returned arc.
pub unsafe fn into_arc<T>(value: T, allocator: &dyn Allocator) -> AllocResult<UniqueArc<T>> {
    unsafe { UniqueArc::new_in(value, allocator) }
}
