//! Error vocabulary for allocation and memory-management failures.
//!
//! Two layers, matching the boundary between the raw allocator contract and
//! everything built on top of it:
//!
//! - [`AllocError`] / [`AllocErrorKind`]: the low-level vocabulary every
//!   [`crate::allocator::Allocator`] implementation returns. Hand-rolled
//!   rather than `thiserror`-derived because it carries a `#[track_caller]`
//!   location and a request payload that varies per call site.
//! - [`MemoryError`]: the higher-level vocabulary for arenas, block pools,
//!   and arc construction, derived with `thiserror` since its variants are a
//!   fixed, closed set.

use alloc::boxed::Box;
use core::fmt;

#[cfg(feature = "std")]
use std::backtrace::{Backtrace, BacktraceStatus};

use crate::allocator::{AllocFeatures, AllocRequest};

/// The kinds of failure a fallible allocator operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocErrorKind {
    /// The allocator cannot satisfy the request.
    Oom,
    /// The operation is not implemented by this allocator, or not for this
    /// shape of request.
    Unsupported,
    /// The caller violated a precondition (invalid request shape, zero
    /// size, mismatched flags).
    Usage,
    /// An in-place reallocation gate (`IN_PLACE_ORELSE_FAIL`) refused; the
    /// caller may retry without the flag.
    CouldntExpandInPlace,
    /// A page-size query or other OS primitive failed.
    PlatformFailure,
}

impl AllocErrorKind {
    /// Static description, used by `Display`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oom => "allocator out of memory",
            Self::Unsupported => "operation not supported by this allocator",
            Self::Usage => "invalid use of allocator contract",
            Self::CouldntExpandInPlace => "in-place reallocation refused",
            Self::PlatformFailure => "platform memory primitive failed",
        }
    }
}

impl fmt::Display for AllocErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Additional diagnostic context captured at the error site.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub message: Option<&'static str>,
    pub location: Option<&'static core::panic::Location<'static>>,
    #[cfg(feature = "std")]
    pub thread_id: Option<std::thread::ThreadId>,
}

impl ErrorContext {
    pub const fn new() -> Self {
        Self {
            message: None,
            location: None,
            #[cfg(feature = "std")]
            thread_id: None,
        }
    }

    #[track_caller]
    pub fn with_caller() -> Self {
        Self {
            message: None,
            location: Some(core::panic::Location::caller()),
            #[cfg(feature = "std")]
            thread_id: Some(std::thread::current().id()),
        }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The error type every [`crate::allocator::Allocator`] method returns.
#[derive(Debug, Clone)]
pub struct AllocError {
    kind: AllocErrorKind,
    request: Option<AllocRequest>,
    context: Option<Box<ErrorContext>>,
    #[cfg(feature = "std")]
    backtrace: Option<alloc::sync::Arc<Backtrace>>,
}

impl AllocError {
    #[inline]
    #[track_caller]
    pub fn new(kind: AllocErrorKind) -> Self {
        Self {
            kind,
            request: None,
            context: Some(Box::new(ErrorContext::with_caller())),
            #[cfg(feature = "std")]
            backtrace: capture_backtrace(),
        }
    }

    #[inline]
    #[track_caller]
    pub fn with_request(kind: AllocErrorKind, request: AllocRequest) -> Self {
        let mut err = Self::new(kind);
        err.request = Some(request);
        err
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        let context = self.context.take().map(|c| *c).unwrap_or_default();
        self.context = Some(Box::new(context.with_message(message)));
        self
    }

    #[inline]
    pub const fn kind(&self) -> AllocErrorKind {
        self.kind
    }

    #[inline]
    pub fn request(&self) -> Option<AllocRequest> {
        self.request
    }

    #[inline]
    pub fn context(&self) -> Option<&ErrorContext> {
        self.context.as_deref()
    }

    #[inline]
    pub const fn is_oom(&self) -> bool {
        matches!(self.kind, AllocErrorKind::Oom)
    }

    #[inline]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.kind, AllocErrorKind::Unsupported)
    }
}

#[cfg(feature = "std")]
fn capture_backtrace() -> Option<alloc::sync::Arc<Backtrace>> {
    let bt = Backtrace::capture();
    if bt.status() == BacktraceStatus::Captured {
        Some(alloc::sync::Arc::new(bt))
    } else {
        None
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request {
            Some(req) => write!(
                f,
                "{}: requested {} bytes, alignment {}",
                self.kind, req.num_bytes, req.alignment
            ),
            None => write!(f, "{}", self.kind),
        }?;
        if let Some(ctx) = &self.context {
            if let Some(msg) = ctx.message {
                write!(f, " ({msg})")?;
            }
            if let Some(loc) = ctx.location {
                write!(f, " at {loc}")?;
            }
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocError {}

/// Result type returned by every allocator operation.
pub type AllocResult<T> = Result<T, AllocError>;

/// Convenience constructors mirroring the error table in the allocator
/// contract (`SPEC_FULL.md` §4.1).
impl AllocError {
    #[track_caller]
    pub fn oom(request: AllocRequest) -> Self {
        Self::with_request(AllocErrorKind::Oom, request)
    }

    #[track_caller]
    pub fn unsupported() -> Self {
        Self::new(AllocErrorKind::Unsupported)
    }

    #[track_caller]
    pub fn usage(message: &'static str) -> Self {
        Self::new(AllocErrorKind::Usage).with_message(message)
    }

    #[track_caller]
    pub fn couldnt_expand_in_place() -> Self {
        Self::new(AllocErrorKind::CouldntExpandInPlace)
    }

    #[track_caller]
    pub fn platform_failure(message: &'static str) -> Self {
        Self::new(AllocErrorKind::PlatformFailure).with_message(message)
    }
}

/// Higher-level error vocabulary for the constructs built on top of the raw
/// allocator contract: arenas, block pools, and arc factories.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// An underlying allocator operation failed.
    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocError),

    /// A configuration value was out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// A linked blockpool or slab allocator ran out of size classes /
    /// couldn't grow a backing pool.
    #[error("pool exhausted: {0}")]
    PoolExhausted(&'static str),

    /// An arena scope was closed out of LIFO order, or a destructor
    /// registration invariant was violated.
    #[error("arena corruption: {0}")]
    ArenaCorruption(&'static str),

    /// Feature flags required by a wrapper or caller were not present on
    /// the wrapped allocator.
    #[error("required allocator feature missing: {missing:?} (have {actual:?})")]
    MissingFeature {
        missing: AllocFeatures,
        actual: AllocFeatures,
    },
}

pub type MemoryResult<T> = Result<T, MemoryError>;
