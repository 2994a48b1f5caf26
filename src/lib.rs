//! Memory descriptors, a polymorphic allocator contract, and an atomic arc
//! core for building allocators and reference-counted containers without
//! going through the global allocator.
//!
//! The crate is organized around the pieces a caller composes:
//!
//! - [`descriptor`]: typed views over raw memory (`ByteSpan`,
//!   `UndefinedByteSpan`, `MaybeDefinedMemory`).
//! - [`allocator`]: the [`allocator::Allocator`] trait plus every concrete
//!   allocator (page, reserving page, C/libc, arena, block, blockpool, slab)
//!   and the wrapper allocators that adapt one allocator's capabilities.
//! - [`arc`]: an atomic, lock-bit-protected reference count and the handle
//!   family built on top of it (unique, shared read-only, weak, variant).
//! - [`error`]: the error vocabulary shared by all of the above.
//! - [`config`]: process-wide defaults for pool/arena sizing and memory
//!   pressure thresholds.
//! - [`platform`]: OS page size queries and mmap/mprotect-style primitives.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod allocator;
pub mod arc;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod platform;
pub mod utils;

pub use allocator::{AllocFeatures, AllocFlags, Allocator};
pub use descriptor::{ByteSpan, MaybeDefinedMemory, UndefinedByteSpan};
pub use error::{AllocError, AllocErrorKind, AllocResult, MemoryError, MemoryResult};
