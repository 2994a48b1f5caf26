//! Arena bump allocator benchmarks: single allocation cost, batch
//! allocation, and scoped rewind versus a plain `clear()`.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use okcell_memory::allocator::{AllocRequest, Allocator, Arena, CAllocator};
use okcell_memory::ByteSpan;
use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

fn leak_buffer(len: usize) -> (ByteSpan, Layout) {
    let layout = Layout::from_size_align(len, 8).unwrap();
    let ptr = unsafe { alloc(layout) };
    (unsafe { ByteSpan::new(NonNull::new(ptr).unwrap(), len) }, layout)
}

fn bench_single_allocation(c: &mut Criterion) {
    let (buf, layout) = leak_buffer(16 * 1024 * 1024);
    let arena = Arena::new(buf);
    let req = AllocRequest::new(64, 8);

    c.bench_function("arena_alloc_64b", |b| {
        b.iter(|| {
            let mem = unsafe { arena.allocate(req) }.unwrap();
            black_box(mem);
        })
    });

    unsafe { dealloc(buf.data().as_ptr(), layout) };
}

fn bench_batch_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_batch_allocations");
    group.throughput(Throughput::Elements(256));

    group.bench_function("arena_256x64b_then_clear", |b| {
        let (buf, _layout) = leak_buffer(16 * 1024 * 1024);
        let arena = Arena::new(buf);
        let req = AllocRequest::new(64, 8);

        b.iter(|| {
            for _ in 0..256 {
                black_box(unsafe { arena.allocate(req) }.unwrap());
            }
            arena.clear().unwrap();
        });
    });

    group.finish();
}

fn bench_scoped_rewind(c: &mut Criterion) {
    let (buf, _layout) = leak_buffer(16 * 1024 * 1024);
    let arena = Arena::new(buf);
    let req = AllocRequest::new(64, 8);

    c.bench_function("arena_scope_64_allocations", |b| {
        b.iter(|| {
            let scope = arena.scope();
            for _ in 0..64 {
                black_box(unsafe { arena.allocate(req) }.unwrap());
            }
            scope.close();
        })
    });
}

fn bench_growth_through_backing_allocator(c: &mut Criterion) {
    c.bench_function("arena_grows_past_first_chunk", |b| {
        b.iter(|| {
            let (buf, _layout) = leak_buffer(64);
            let arena = Arena::with_parent(Box::new(CAllocator::new()), buf);
            for _ in 0..64 {
                black_box(unsafe { arena.allocate(AllocRequest::new(32, 8)) }.unwrap());
            }
        })
    });
}

criterion_group!(
    benches,
    bench_single_allocation,
    bench_batch_allocations,
    bench_scoped_rewind,
    bench_growth_through_backing_allocator
);
criterion_main!(benches);
