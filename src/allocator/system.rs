//! The C allocator (C5): a thin wrapper over `libc::malloc`/`realloc`/`free`.
//!
//! Grounded on `original_source/include/okay/allocators/c_allocator.h`:
//! alignments above 16 bytes are refused since plain `malloc` makes no
//! alignment promise beyond `max_align_t`, and a pure back-grow with an
//! unchanged front goes straight to `realloc` rather than the
//! allocate/copy/free fallback every other reshape needs.

use core::ptr::NonNull;

use crate::descriptor::{ByteSpan, MaybeDefinedMemory, UndefinedByteSpan};
use crate::error::{AllocError, AllocResult};

use super::{
    AllocFeatures, AllocFlags, AllocRequest, Allocator, ReallocExtendedRequest,
    ReallocExtendedResult, ReallocRequest, ThreadSafeAllocator,
};

const MAX_SUPPORTED_ALIGN: usize = 16;

/// Delegates to the system's `malloc`/`realloc`/`free`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CAllocator;

impl CAllocator {
    #[inline]
    pub const fn new() -> Self {
        Self
    }
}

unsafe impl Allocator for CAllocator {
    unsafe fn allocate(&self, request: AllocRequest) -> AllocResult<MaybeDefinedMemory> {
        request.validate()?;
        if request.alignment > MAX_SUPPORTED_ALIGN {
            return Err(AllocError::unsupported());
        }
        if request.num_bytes == 0 {
            let dangling = NonNull::new(request.alignment as *mut u8).unwrap();
            let span = unsafe { UndefinedByteSpan::new(dangling, 0) };
            return Ok(zero_unless_flagged(span, &request.flags));
        }

        let raw = unsafe { libc::malloc(request.num_bytes) } as *mut u8;
        let ptr = NonNull::new(raw).ok_or_else(|| AllocError::oom(request))?;
        debug_assert_eq!(ptr.as_ptr() as usize % request.alignment, 0);

        let span = unsafe { UndefinedByteSpan::new(ptr, request.num_bytes) };
        Ok(zero_unless_flagged(span, &request.flags))
    }

    unsafe fn deallocate(&self, memory: ByteSpan) {
        if memory.len() == 0 {
            return;
        }
        unsafe { libc::free(memory.data().as_ptr() as *mut libc::c_void) };
    }

    unsafe fn reallocate(&self, request: ReallocRequest) -> AllocResult<MaybeDefinedMemory> {
        request.validate()?;
        let old_len = request.memory.len();

        let raw = unsafe {
            libc::realloc(request.memory.data().as_ptr() as *mut libc::c_void, request.new_size)
        } as *mut u8;
        let ptr = NonNull::new(raw)
            .ok_or_else(|| AllocError::oom(AllocRequest::new(request.new_size, 1)))?;

        if request.new_size <= old_len {
            return Ok(MaybeDefinedMemory::Defined(unsafe {
                ByteSpan::new(ptr, request.new_size)
            }));
        }

        let span = unsafe { UndefinedByteSpan::new(ptr, request.new_size) };
        if !request.leave_nonzeroed() {
            let grown_prefix = unsafe { span.data().as_ptr().add(old_len) };
            unsafe { core::ptr::write_bytes(grown_prefix, 0, request.new_size - old_len) };
            return Ok(MaybeDefinedMemory::Defined(unsafe { span.assume_init() }));
        }
        Ok(MaybeDefinedMemory::Undefined(span))
    }

    unsafe fn reallocate_extended(
        &self,
        request: ReallocExtendedRequest,
    ) -> AllocResult<ReallocExtendedResult> {
        request.validate()?;

        let expanding_front = request.flags.contains(AllocFlags::EXPAND_FRONT);
        let shrinking_front = request.flags.contains(AllocFlags::SHRINK_FRONT);
        let expanding_back = request.flags.contains(AllocFlags::EXPAND_BACK);
        let shrinking_back = request.flags.contains(AllocFlags::SHRINK_BACK);

        if !shrinking_front && !expanding_front {
            // Pure back reshape: defer to plain `reallocate`, which already
            // uses `realloc` for this shape.
            let new_size = if expanding_back {
                request.memory.len() + request.back.required
            } else if shrinking_back {
                request.memory.len() - request.back.required
            } else {
                request.memory.len()
            };
            let memory = unsafe {
                self.reallocate(
                    ReallocRequest::new(request.memory, new_size).with_flags(request.flags),
                )
            }?;
            return Ok(ReallocExtendedResult { memory, front_growth_offset: 0 });
        }

        let old_len = request.memory.len();
        let mut new_size = old_len;
        if expanding_back {
            new_size += request.back.required;
        } else if shrinking_back {
            new_size -= request.back.required;
        }
        if expanding_front {
            new_size += request.front.required;
        } else if shrinking_front {
            new_size -= request.front.required;
        }
        debug_assert!(new_size != 0);

        let raw = unsafe { libc::malloc(new_size) } as *mut u8;
        let new_ptr =
            NonNull::new(raw).ok_or_else(|| AllocError::oom(AllocRequest::new(new_size, 1)))?;

        let old_ptr = request.memory.data().as_ptr();
        let (copy_src_offset, copy_len, front_growth_offset) = if shrinking_front {
            let copy_len = if shrinking_back {
                new_size
            } else {
                new_size.saturating_sub(request.back.required)
            };
            (request.front.required, copy_len, 0)
        } else {
            // expanding_front
            (0, old_len, request.front.required)
        };

        unsafe {
            core::ptr::copy_nonoverlapping(
                old_ptr.add(copy_src_offset),
                new_ptr.as_ptr().add(front_growth_offset),
                copy_len.min(new_size.saturating_sub(front_growth_offset)),
            );
        }

        if !request.flags.contains(AllocFlags::LEAVE_NONZEROED) {
            if expanding_back {
                let tail_start = front_growth_offset + copy_len;
                if tail_start < new_size {
                    unsafe {
                        core::ptr::write_bytes(
                            new_ptr.as_ptr().add(tail_start),
                            0,
                            new_size - tail_start,
                        )
                    };
                }
            }
            if front_growth_offset > 0 {
                unsafe { core::ptr::write_bytes(new_ptr.as_ptr(), 0, front_growth_offset) };
            }
        }

        unsafe { libc::free(old_ptr as *mut libc::c_void) };

        let result_span = unsafe { ByteSpan::new(new_ptr, new_size) };
        Ok(ReallocExtendedResult {
            memory: MaybeDefinedMemory::Defined(result_span),
            front_growth_offset,
        })
    }

    fn clear(&self) -> AllocResult<()> {
        #[cfg(debug_assertions)]
        log::error!("CAllocator::clear() called; this allocator cannot reclaim in bulk");
        Err(AllocError::unsupported())
    }

    fn features(&self) -> AllocFeatures {
        AllocFeatures::IS_THREADSAFE
    }
}

unsafe impl ThreadSafeAllocator for CAllocator {}

fn zero_unless_flagged(span: UndefinedByteSpan, flags: &AllocFlags) -> MaybeDefinedMemory {
    if flags.contains(AllocFlags::LEAVE_NONZEROED) {
        MaybeDefinedMemory::Undefined(span)
    } else {
        MaybeDefinedMemory::Defined(unsafe { span.zero_and_assume_init() })
    }
}
