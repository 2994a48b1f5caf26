//! Typed views over raw memory: byte spans, undefined byte spans, and the
//! maybe-defined union that ties the two together.
//!
//! Allocation APIs that zero memory return a [`ByteSpan`] wrapped in
//! [`MaybeDefinedMemory::Defined`]; those that skip zeroing (because the
//! caller passed `AllocFlags::LEAVE_NONZEROED`) return an
//! [`UndefinedByteSpan`] wrapped in `Undefined`. The two are never collapsed
//! into one type, so a caller cannot read uninitialized bytes without an
//! explicit, named unsafe step.

use core::ptr::NonNull;

/// A contiguous range of bytes that are fully initialized for as long as the
/// holder retains this span.
///
/// # Safety contract
/// The holder of a `ByteSpan` promises that every byte in
/// `[data, data + len)` is readable and writable for the span's lifetime.
/// Constructing one is `unsafe` because the type itself cannot verify that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSpan {
    data: NonNull<u8>,
    len: usize,
}

impl ByteSpan {
    /// Builds a span over `[data, data+len)`.
    ///
    /// # Safety
    /// Every byte in the range must be valid for reads and writes for the
    /// lifetime the caller intends to use the span, and must already hold a
    /// defined value.
    #[inline]
    pub unsafe fn new(data: NonNull<u8>, len: usize) -> Self {
        Self { data, len }
    }

    #[inline]
    pub const fn data(&self) -> NonNull<u8> {
        self.data
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn addr(&self) -> usize {
        self.data.as_ptr() as usize
    }

    /// Borrows the span as a byte slice.
    ///
    /// # Safety
    /// No other holder may mutate this range for the duration of the
    /// returned borrow.
    #[inline]
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        unsafe { core::slice::from_raw_parts(self.data.as_ptr(), self.len) }
    }

    /// Borrows the span as a mutable byte slice.
    ///
    /// # Safety
    /// No other holder may access this range for the duration of the
    /// returned borrow.
    #[inline]
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.data.as_ptr(), self.len) }
    }

    /// Returns a sub-span `[offset, offset+len)`. Panics if out of bounds.
    ///
    /// # Safety
    /// The sub-span inherits this span's validity guarantees.
    #[inline]
    pub unsafe fn sub_span(&self, offset: usize, len: usize) -> Self {
        assert!(offset + len <= self.len, "sub_span out of bounds");
        unsafe { Self::new(NonNull::new_unchecked(self.data.as_ptr().add(offset)), len) }
    }

    /// Demotes this span to an undefined one (used when an allocator is
    /// about to hand memory back for reuse without clearing it).
    #[inline]
    pub const fn into_undefined(self) -> UndefinedByteSpan {
        UndefinedByteSpan { data: self.data, len: self.len }
    }
}

/// Same shape as [`ByteSpan`], but bytes are not required to hold a defined
/// value. Consuming the bytes requires the explicit, unsafe
/// [`assume_init`](Self::assume_init) step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndefinedByteSpan {
    data: NonNull<u8>,
    len: usize,
}

impl UndefinedByteSpan {
    /// Builds an undefined span over `[data, data+len)`.
    ///
    /// # Safety
    /// Every byte in the range must be valid for reads and writes (but need
    /// not hold a defined value) for the lifetime the caller intends to use
    /// the span.
    #[inline]
    pub unsafe fn new(data: NonNull<u8>, len: usize) -> Self {
        Self { data, len }
    }

    #[inline]
    pub const fn data(&self) -> NonNull<u8> {
        self.data
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub const fn addr(&self) -> usize {
        self.data.as_ptr() as usize
    }

    /// Asserts that the bytes have since been given a defined value,
    /// promoting this to a [`ByteSpan`].
    ///
    /// # Safety
    /// Every byte in the range must actually hold a defined value.
    #[inline]
    pub const unsafe fn assume_init(self) -> ByteSpan {
        ByteSpan { data: self.data, len: self.len }
    }

    /// Zero-fills the span and promotes it to a [`ByteSpan`].
    ///
    /// # Safety
    /// Same validity requirement as [`new`](Self::new).
    #[inline]
    pub unsafe fn zero_and_assume_init(self) -> ByteSpan {
        unsafe { core::ptr::write_bytes(self.data.as_ptr(), 0, self.len) };
        ByteSpan { data: self.data, len: self.len }
    }
}

/// A tagged union of [`ByteSpan`] and [`UndefinedByteSpan`], returned by
/// every allocate/reallocate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaybeDefinedMemory {
    Defined(ByteSpan),
    Undefined(UndefinedByteSpan),
}

impl MaybeDefinedMemory {
    #[inline]
    pub const fn is_defined(&self) -> bool {
        matches!(self, Self::Defined(_))
    }

    /// Returns the inner [`ByteSpan`], or `None` if this is undefined.
    #[inline]
    pub const fn as_bytes(&self) -> Option<ByteSpan> {
        match self {
            Self::Defined(span) => Some(*span),
            Self::Undefined(_) => None,
        }
    }

    /// Returns the inner [`UndefinedByteSpan`], or `None` if this is
    /// defined.
    #[inline]
    pub const fn as_undefined(&self) -> Option<UndefinedByteSpan> {
        match self {
            Self::Defined(_) => None,
            Self::Undefined(span) => Some(*span),
        }
    }

    /// Raw pointer and length, ignoring the definedness tag. Useful for
    /// bookkeeping (address ranges, sizes) that does not care whether the
    /// bytes are initialized.
    #[inline]
    pub const fn data_maybe_defined(&self) -> (NonNull<u8>, usize) {
        match self {
            Self::Defined(span) => (span.data, span.len),
            Self::Undefined(span) => (span.data, span.len),
        }
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.data_maybe_defined().1
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub const fn addr(&self) -> usize {
        self.data_maybe_defined().0.as_ptr() as usize
    }
}

impl From<ByteSpan> for MaybeDefinedMemory {
    #[inline]
    fn from(span: ByteSpan) -> Self {
        Self::Defined(span)
    }
}

impl From<UndefinedByteSpan> for MaybeDefinedMemory {
    #[inline]
    fn from(span: UndefinedByteSpan) -> Self {
        Self::Undefined(span)
    }
}
