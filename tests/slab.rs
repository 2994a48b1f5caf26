//! Integration tests for the slab allocator: size-class dispatch, cross-class
//! isolation, OOM on a request no class fits, and `clear()`.

use okcell_memory::allocator::{AllocRequest, Allocator, ReallocRequest, SizeClass, SlabAllocator};
use okcell_memory::error::AllocErrorKind;
use okcell_memory::ByteSpan;
use std::alloc::{alloc, Layout};
use std::ptr::NonNull;

fn leak_buffer(len: usize) -> ByteSpan {
    let layout = Layout::from_size_align(len, 8).unwrap();
    let ptr = unsafe { alloc(layout) };
    unsafe { ByteSpan::new(NonNull::new(ptr).unwrap(), len) }
}

fn make_slab() -> SlabAllocator {
    let classes = [SizeClass::new(16, 8, 4), SizeClass::new(64, 8, 4), SizeClass::new(256, 8, 4)];
    let buffers = vec![leak_buffer(16 * 4), leak_buffer(64 * 4), leak_buffer(256 * 4)];
    SlabAllocator::new(&classes, buffers).unwrap()
}

#[test]
fn dispatches_requests_to_the_smallest_fitting_class() {
    let slab = make_slab();
    let small = unsafe { slab.allocate(AllocRequest::new(1, 8)).unwrap() };
    assert_eq!(small.len(), 16);
    let mid = unsafe { slab.allocate(AllocRequest::new(60, 8)).unwrap() };
    assert_eq!(mid.len(), 64);
    let large = unsafe { slab.allocate(AllocRequest::new(200, 8)).unwrap() };
    assert_eq!(large.len(), 256);
}

#[test]
fn request_past_every_class_is_oom() {
    let slab = make_slab();
    assert!(unsafe { slab.allocate(AllocRequest::new(1024, 8)) }.is_err());
}

#[test]
fn deallocate_returns_a_block_to_its_owning_class_only() {
    let slab = make_slab();
    let mem = unsafe { slab.allocate(AllocRequest::new(10, 8)).unwrap() };
    let span = mem.as_bytes().unwrap();
    unsafe { slab.deallocate(span) };
    let reused = unsafe { slab.allocate(AllocRequest::new(10, 8)).unwrap() };
    assert_eq!(reused.addr(), span.addr());
}

#[test]
fn one_class_exhausting_does_not_affect_another() {
    let slab = make_slab();
    for _ in 0..4 {
        assert!(unsafe { slab.allocate(AllocRequest::new(10, 8)) }.is_ok());
    }
    assert!(unsafe { slab.allocate(AllocRequest::new(10, 8)) }.is_err());
    assert!(unsafe { slab.allocate(AllocRequest::new(60, 8)) }.is_ok());
}

#[test]
fn reallocate_that_would_cross_a_size_class_boundary_is_unsupported() {
    let slab = make_slab();
    let mem = unsafe { slab.allocate(AllocRequest::new(10, 8)).unwrap() };
    let span = mem.as_bytes().unwrap();

    let req = ReallocRequest::new(span, 60);
    let err = unsafe { slab.reallocate(req) }.unwrap_err();
    assert_eq!(err.kind(), AllocErrorKind::Unsupported);
}

#[test]
fn clear_resets_every_size_class() {
    let slab = make_slab();
    for _ in 0..4 {
        let _ = unsafe { slab.allocate(AllocRequest::new(10, 8)).unwrap() };
    }
    assert!(unsafe { slab.allocate(AllocRequest::new(10, 8)) }.is_err());
    slab.clear().unwrap();
    for _ in 0..4 {
        assert!(unsafe { slab.allocate(AllocRequest::new(10, 8)) }.is_ok());
    }
}
