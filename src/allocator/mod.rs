//! Concrete allocators (C3–C10) built on the [`Allocator`] contract (C2).
//!
//! Each submodule grounds one row of `SPEC_FULL.md`'s component table: page
//! mapping, reservation-with-commit, the system `malloc` wrapper, the arena
//! bump allocator with scoped rewind, fixed-size blocks, a growing linked
//! pool of blocks, a slab dispatched by size class, and the two
//! feature-recomputing wrappers.

mod traits;

pub mod arena;
pub mod block;
pub mod blockpool;
pub mod page;
pub mod reserve;
pub mod slab;
pub mod system;
pub mod wrappers;

pub use arena::{Arena, ArenaScope};
pub use block::BlockAllocator;
pub use blockpool::LinkedBlockPool;
pub use page::PageAllocator;
pub use reserve::ReservingPageAllocator;
pub use slab::{SizeClass, SlabAllocator};
pub use system::CAllocator;
pub use traits::{
    AllocFeatures, AllocFlags, AllocRequest, Allocator, ReallocExtendedRequest,
    ReallocExtendedResult, ReallocRequest, SideRequest, ThreadSafeAllocator, TypedAllocExt,
};
pub use wrappers::{DisableFreeing, EmulateExpandFront};
