//! Property tests for the universal allocator invariants and arc laws
//! (§8 of the crate's design notes): randomized request shapes and
//! randomized concurrent interleavings checked against the stated laws
//! rather than fixed examples.

use std::alloc::{alloc, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use okcell_memory::allocator::{
    AllocFeatures, AllocFlags, AllocRequest, Allocator, BlockAllocator, CAllocator, ReallocRequest,
    SizeClass, SlabAllocator,
};
use okcell_memory::arc::UniqueArc;
use okcell_memory::descriptor::{ByteSpan, MaybeDefinedMemory};
use okcell_memory::error::AllocResult;
use proptest::prelude::*;

fn leak_buffer(len: usize) -> ByteSpan {
    let layout = Layout::from_size_align(len, 64).unwrap();
    let ptr = unsafe { alloc(layout) };
    unsafe { ByteSpan::new(NonNull::new(ptr).unwrap(), len) }
}

fn is_aligned(addr: usize, align: usize) -> bool {
    addr % align == 0
}

// ---------------------------------------------------------------------------
// Invariant 1: successful allocations satisfy size, alignment, zero-fill.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn block_allocator_allocations_satisfy_size_align_and_zero_fill(
        num_bytes in 1usize..=64,
        align_shift in 0u32..=6, // 1, 2, 4, ..., 64
    ) {
        let alignment = 1usize << align_shift;
        let block = BlockAllocator::new(leak_buffer(8 * 128), 128, 64).unwrap();

        let req = AllocRequest::new(num_bytes, alignment);
        if alignment > block.block_align() || num_bytes > block.block_size() {
            prop_assert!(unsafe { block.allocate(req) }.is_err());
            return Ok(());
        }

        let mem = unsafe { block.allocate(req) }.unwrap();
        let span = mem.as_bytes().expect("block allocator always zeroes by default");
        prop_assert!(span.len() >= num_bytes);
        prop_assert!(is_aligned(span.addr(), alignment));
        let bytes = unsafe { span.as_slice() };
        prop_assert!(bytes.iter().all(|&b| b == 0));
        unsafe { block.deallocate(span) };
    }

    #[test]
    fn c_allocator_allocations_satisfy_size_align_and_zero_fill(
        num_bytes in 1usize..=4096,
        align_shift in 0u32..=4, // CAllocator refuses alignment above 16
    ) {
        let alignment = 1usize << align_shift;
        let allocator = CAllocator::new();
        let mem = unsafe { allocator.allocate(AllocRequest::new(num_bytes, alignment)) }.unwrap();
        let span = mem.as_bytes().expect("c allocator always zeroes by default");
        prop_assert!(span.len() >= num_bytes);
        prop_assert!(is_aligned(span.addr(), alignment));
        let bytes = unsafe { span.as_slice() };
        prop_assert!(bytes.iter().all(|&b| b == 0));
        unsafe { allocator.deallocate(span) };
    }
}

// ---------------------------------------------------------------------------
// Invariant 2: clear() after a balanced alloc/dealloc sequence resets the
// allocator to an observationally fresh state.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn slab_allocator_clear_after_balanced_sequence_allows_full_reallocation(
        num_allocations in 1usize..=8,
    ) {
        let classes = [SizeClass::new(16, 8, 8)];
        let slab = SlabAllocator::new(&classes, vec![leak_buffer(8 * 64)]).unwrap();
        prop_assert!(slab.features().contains(AllocFeatures::CAN_CLEAR));

        let mut spans = Vec::new();
        for _ in 0..num_allocations {
            let mem = unsafe { slab.allocate(AllocRequest::new(16, 8)) }.unwrap();
            spans.push(mem.as_bytes().unwrap());
        }
        for span in spans {
            unsafe { slab.deallocate(span) };
        }

        slab.clear().unwrap();

        // A freshly constructed allocator over the same buffer can satisfy
        // 8 allocations; so must the cleared one.
        let mut reallocated = Vec::new();
        for _ in 0..8 {
            let mem = unsafe { slab.allocate(AllocRequest::new(16, 8)) };
            prop_assert!(mem.is_ok());
            reallocated.push(mem.unwrap().as_bytes().unwrap());
        }
        prop_assert!(unsafe { slab.allocate(AllocRequest::new(16, 8)) }.is_err());
    }
}

// ---------------------------------------------------------------------------
// Invariant 3: predictable in-place reallocation either succeeds at the same
// base address or fails with `couldnt_expand_in_place`, leaving the original
// span valid.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn block_allocator_in_place_realloc_keeps_base_address_or_fails_cleanly(
        initial_size in 1usize..=32,
        new_size in 1usize..=128,
    ) {
        let block = BlockAllocator::new(leak_buffer(64), 64, 16).unwrap();
        prop_assert!(block.features().contains(AllocFeatures::CAN_PREDICTABLY_REALLOC_IN_PLACE));

        let mem = unsafe { block.allocate(AllocRequest::new(initial_size, 8)) }.unwrap();
        let span = mem.as_bytes().unwrap();
        let base = span.addr();

        let req = ReallocRequest::new(span, new_size).with_flags(AllocFlags::IN_PLACE_ORELSE_FAIL);
        match unsafe { block.reallocate(req) } {
            Ok(grown) => {
                let grown_span = grown.as_bytes().unwrap();
                prop_assert_eq!(grown_span.addr(), base);
                unsafe { block.deallocate(grown_span) };
            }
            Err(e) => {
                prop_assert_eq!(e.kind(), okcell_memory::error::AllocErrorKind::CouldntExpandInPlace);
                unsafe { block.deallocate(span) };
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant 4: invalid reallocate requests return `usage` without side
// effects on the original allocation.
// ---------------------------------------------------------------------------

#[test]
fn realloc_with_zero_new_size_is_a_usage_error_without_side_effects() {
    let block = BlockAllocator::new(leak_buffer(64), 64, 16).unwrap();
    let mem = unsafe { block.allocate(AllocRequest::new(16, 8)) }.unwrap();
    let span = mem.as_bytes().unwrap();

    let req = ReallocRequest::new(span, 0);
    let err = unsafe { block.reallocate(req) }.unwrap_err();
    assert_eq!(err.kind(), okcell_memory::error::AllocErrorKind::Usage);

    // original span is untouched: still readable and freeable normally.
    unsafe { block.deallocate(span) };
    let reused = unsafe { block.allocate(AllocRequest::new(16, 8)) }.unwrap();
    assert_eq!(reused.addr(), span.addr());
}

// ---------------------------------------------------------------------------
// Arc laws.
// ---------------------------------------------------------------------------

struct CountingAllocator {
    inner: CAllocator,
    live: AtomicUsize,
}

impl CountingAllocator {
    fn new() -> Self {
        Self { inner: CAllocator::new(), live: AtomicUsize::new(0) }
    }
    fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

unsafe impl Allocator for CountingAllocator {
    unsafe fn allocate(&self, request: AllocRequest) -> AllocResult<MaybeDefinedMemory> {
        let mem = unsafe { self.inner.allocate(request) }?;
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(mem)
    }
    unsafe fn deallocate(&self, memory: ByteSpan) {
        unsafe { self.inner.deallocate(memory) };
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
    unsafe fn reallocate(&self, request: ReallocRequest) -> AllocResult<MaybeDefinedMemory> {
        unsafe { self.inner.reallocate(request) }
    }
    unsafe fn reallocate_extended(
        &self,
        request: okcell_memory::allocator::ReallocExtendedRequest,
    ) -> AllocResult<okcell_memory::allocator::ReallocExtendedResult> {
        unsafe { self.inner.reallocate_extended(request) }
    }
    fn clear(&self) -> AllocResult<()> {
        self.inner.clear()
    }
    fn features(&self) -> AllocFeatures {
        self.inner.features()
    }
}

struct Counter {
    destructs: std::sync::Arc<AtomicUsize>,
}
impl Drop for Counter {
    fn drop(&mut self) {
        self.destructs.fetch_add(1, Ordering::SeqCst);
    }
}

// Law 5: unique_rw construction then destruction releases exactly one
// allocation equal in size to the payload.
#[test]
fn unique_rw_construct_then_destroy_releases_exactly_one_allocation() {
    let allocator = CountingAllocator::new();
    let unique = unsafe { UniqueArc::new_in(123u64, &allocator).unwrap() };
    assert_eq!(allocator.live_count(), 1);
    drop(unique);
    assert_eq!(allocator.live_count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // Law 6: for any interleaving of readonly-handle duplicate/drop across
    // threads, the object's destructor runs exactly once.
    #[test]
    fn readonly_duplicate_and_drop_interleavings_destruct_exactly_once(
        num_handles in 1usize..=6,
    ) {
        let allocator = CountingAllocator::new();
        let destructs = std::sync::Arc::new(AtomicUsize::new(0));
        let unique = unsafe {
            UniqueArc::new_in(Counter { destructs: destructs.clone() }, &allocator).unwrap()
        };
        let shared = unique.demote_to_readonly();

        let handles: Vec<_> = (0..num_handles)
            .map(|_| shared.clone())
            .map(|h| thread::spawn(move || drop(h)))
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        drop(shared);

        prop_assert_eq!(destructs.load(Ordering::SeqCst), 1);
        prop_assert_eq!(allocator.live_count(), 0);
    }

    // Law 7: `weak.try_spawn_readonly()` succeeds iff a strong reference is
    // still alive at the call.
    #[test]
    fn weak_promotion_succeeds_iff_strong_reference_still_alive(drop_strong_first in proptest::bool::ANY) {
        let allocator = CountingAllocator::new();
        let unique = unsafe { UniqueArc::new_in(1u32, &allocator).unwrap() };
        let weak = unique.spawn_weak();
        let shared = unique.demote_to_readonly();

        if drop_strong_first {
            drop(shared);
            let result = weak.try_spawn_readonly();
            prop_assert!(result.is_err());
            drop(result.unwrap_err());
        } else {
            let result = weak.try_spawn_readonly();
            prop_assert!(result.is_ok());
            drop(result.unwrap());
            drop(shared);
        }
    }

    // Law 8: `readonly.try_promote_to_unique()` succeeds iff this is the
    // sole strong reference.
    #[test]
    fn promote_to_unique_succeeds_iff_sole_strong_reference(extra_clones in 0usize..=4) {
        let allocator = CountingAllocator::new();
        let unique = unsafe { UniqueArc::new_in(7u32, &allocator).unwrap() };
        let shared = unique.demote_to_readonly();

        let extras: Vec<_> = (0..extra_clones).map(|_| shared.clone()).collect();
        let result = shared.try_promote_to_unique();

        if extra_clones == 0 {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(result.is_err());
            drop(result.unwrap_err());
        }
        drop(extras);
    }
}
