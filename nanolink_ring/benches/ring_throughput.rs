//! Write/read round-trip benchmarks for graded payload sizes.

use std::hint::black_box;
use std::ptr::NonNull;

use criterion::{criterion_group, criterion_main, Criterion};
use nanolink_ring::{Region, RingConsumer, RingProducer, HEADER_BYTES};

const CAPACITY: u32 = 1 << 16;

#[repr(C, align(64))]
struct AlignedBuf([u8; HEADER_BYTES + CAPACITY as usize]);

fn ring_pair(buf: &mut Box<AlignedBuf>) -> (RingProducer, RingConsumer) {
    let base = NonNull::new(buf.0.as_mut_ptr()).unwrap();
    let region = unsafe { Region::new(base, buf.0.len(), CAPACITY, true) }.unwrap();
    (RingProducer::new(region), RingConsumer::new(region))
}

fn bench_roundtrip(c: &mut Criterion) {
    let mut buf = Box::new(AlignedBuf([0u8; HEADER_BYTES + CAPACITY as usize]));
    let (mut producer, mut consumer) = ring_pair(&mut buf);
    let mut dest = vec![0u8; 8192];

    let payload_64 = vec![0xAAu8; 64];
    let payload_1k = vec![0xAAu8; 1024];
    let payload_4k = vec![0xAAu8; 4096];

    let mut seq = 0u32;
    c.bench_function("roundtrip_64_bytes", |b| {
        b.iter(|| {
            black_box(producer.try_write(&payload_64, 1, 0, seq));
            seq = seq.wrapping_add(1);
            black_box(consumer.try_read(&mut dest));
        });
    });

    c.bench_function("roundtrip_1k_bytes", |b| {
        b.iter(|| {
            black_box(producer.try_write(&payload_1k, 1, 0, seq));
            seq = seq.wrapping_add(1);
            black_box(consumer.try_read(&mut dest));
        });
    });

    c.bench_function("roundtrip_4k_bytes", |b| {
        b.iter(|| {
            black_box(producer.try_write(&payload_4k, 1, 0, seq));
            seq = seq.wrapping_add(1);
            black_box(consumer.try_read(&mut dest));
        });
    });
}

fn bench_counter_snapshot(c: &mut Criterion) {
    let mut buf = Box::new(AlignedBuf([0u8; HEADER_BYTES + CAPACITY as usize]));
    let (producer, _consumer) = ring_pair(&mut buf);

    c.bench_function("stats_snapshot", |b| {
        b.iter(|| {
            black_box(producer.stats());
        });
    });
}

criterion_group!(benches, bench_roundtrip, bench_counter_snapshot);
criterion_main!(benches);
