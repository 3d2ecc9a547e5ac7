//! Benchmarks for the latest-wins ingest path
//!
//! Measures what the event loop pays per inbound message:
//! - Classifying a binary message into a sequenced RawFrame
//! - Offering frames into an occupied slot (replace-and-release)
//! - A burst of frames collapsing into a single pending frame
//!
//! Platform: Cross-platform (synthetic payloads, CI-safe)

use camfeed::connection::WireMessage;
use camfeed::ingest::{FrameIngestQueue, FrameSlot};
use camfeed::types::RawFrame;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tokio::time::Instant;

const PAYLOAD_SIZES: [usize; 3] = [16 * 1024, 128 * 1024, 1024 * 1024];

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_classify");

    for size in PAYLOAD_SIZES {
        let payload = vec![0xAB; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            let mut queue = FrameIngestQueue::new();
            let now = Instant::now();
            b.iter(|| {
                let inbound = queue.classify(WireMessage::Binary(payload.clone()), now);
                black_box(inbound)
            })
        });
    }

    group.finish();
}

fn bench_replace(c: &mut Criterion) {
    let now = Instant::now();
    let frame = RawFrame::new(vec![0xCD; 128 * 1024], 1, now);

    c.bench_function("slot_replace_occupied", |b| {
        let mut slot = FrameSlot::new();
        slot.replace(frame.clone());
        b.iter(|| black_box(slot.replace(black_box(frame.clone()))))
    });

    c.bench_function("slot_take_then_replace", |b| {
        let mut slot = FrameSlot::new();
        b.iter(|| {
            slot.replace(frame.clone());
            black_box(slot.take())
        })
    });
}

fn bench_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_burst");

    for burst in [5u64, 60, 600] {
        group.throughput(Throughput::Elements(burst));
        group.bench_with_input(BenchmarkId::from_parameter(burst), &burst, |b, &burst| {
            let now = Instant::now();
            b.iter(|| {
                let mut queue = FrameIngestQueue::new();
                for i in 0..burst {
                    let frame = RawFrame::new(vec![i as u8; 1024], i + 1, now);
                    queue.offer(frame);
                }
                black_box(queue.take())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_replace, bench_burst);
criterion_main!(benches);
