//! Integration tests for the fixed-block allocator and the
//! growable linked block pool built on top of it.

use okcell_memory::allocator::{
    AllocFeatures, AllocRequest, Allocator, BlockAllocator, CAllocator, LinkedBlockPool,
};
use okcell_memory::ByteSpan;
use std::alloc::{alloc, Layout};
use std::ptr::NonNull;

fn leak_buffer(len: usize) -> ByteSpan {
    let layout = Layout::from_size_align(len, 8).unwrap();
    let ptr = unsafe { alloc(layout) };
    unsafe { ByteSpan::new(NonNull::new(ptr).unwrap(), len) }
}

#[test]
fn block_allocator_hands_out_fixed_size_blocks() {
    let pool = BlockAllocator::new(leak_buffer(256), 32, 8).unwrap();
    let a = unsafe { pool.allocate(AllocRequest::new(16, 8)).unwrap() };
    let b = unsafe { pool.allocate(AllocRequest::new(32, 8)).unwrap() };
    assert_eq!(a.len(), 32);
    assert_eq!(b.len(), 32);
    assert_ne!(a.addr(), b.addr());
}

#[test]
fn block_allocator_recycles_freed_blocks_lifo() {
    let pool = BlockAllocator::new(leak_buffer(128), 16, 8).unwrap();
    let first = unsafe { pool.allocate(AllocRequest::new(8, 8)).unwrap() };
    let span = first.as_bytes().unwrap();
    unsafe { pool.deallocate(span) };
    let reused = unsafe { pool.allocate(AllocRequest::new(8, 8)).unwrap() };
    assert_eq!(span.addr(), reused.addr());
}

#[test]
fn block_allocator_rejects_requests_over_block_shape() {
    let pool = BlockAllocator::new(leak_buffer(64), 16, 8).unwrap();
    assert!(unsafe { pool.allocate(AllocRequest::new(64, 8)) }.is_err());
}

#[test]
fn block_allocator_exhausts_then_fails() {
    let pool = BlockAllocator::new(leak_buffer(32), 16, 8).unwrap();
    assert!(unsafe { pool.allocate(AllocRequest::new(8, 8)) }.is_ok());
    assert!(unsafe { pool.allocate(AllocRequest::new(8, 8)) }.is_ok());
    assert!(unsafe { pool.allocate(AllocRequest::new(8, 8)) }.is_err());
}

#[test]
fn linked_block_pool_grows_past_its_first_pool() {
    let backing: Box<dyn Allocator> = Box::new(CAllocator::new());
    let pool = LinkedBlockPool::new(backing, 32, 8, 2).unwrap();
    let mut allocations = Vec::new();
    for _ in 0..20 {
        let mem = unsafe { pool.allocate(AllocRequest::new(16, 8)) };
        assert!(mem.is_ok(), "pool should grow instead of failing");
        allocations.push(mem.unwrap().as_bytes().unwrap());
    }
    for span in allocations {
        unsafe { pool.deallocate(span) };
    }
}

#[test]
fn linked_block_pool_advertises_expand_back_and_predictable_in_place() {
    let backing: Box<dyn Allocator> = Box::new(CAllocator::new());
    let pool = LinkedBlockPool::new(backing, 16, 8, 4).unwrap();
    let features = pool.features();
    assert!(features.contains(AllocFeatures::CAN_EXPAND_BACK));
    assert!(features.contains(AllocFeatures::CAN_PREDICTABLY_REALLOC_IN_PLACE));
}

#[test]
fn linked_block_pool_reallocate_within_block_is_in_place() {
    let backing: Box<dyn Allocator> = Box::new(CAllocator::new());
    let pool = LinkedBlockPool::new(backing, 64, 8, 4).unwrap();
    let mem = unsafe { pool.allocate(AllocRequest::new(16, 8)).unwrap() };
    let span = mem.as_bytes().unwrap();
    let req = okcell_memory::allocator::ReallocRequest::new(span, 32);
    let grown = unsafe { pool.reallocate(req).unwrap() };
    assert_eq!(grown.addr(), span.addr());
}
