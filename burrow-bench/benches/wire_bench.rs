//! Wire codec benchmarks.

use burrow_protocol::command::Command;
use burrow_protocol::wire;
use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_value_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_encode");

    for size in [16, 256, 4096] {
        let value = vec![0x61u8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            b.iter(|| {
                let mut buf = BytesMut::with_capacity(value.len() + 5);
                wire::put_bytes(&mut buf, Some(value));
                black_box(buf)
            });
        });
    }

    group.finish();
}

fn bench_value_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_decode");

    for size in [16, 256, 4096] {
        let mut encoded = BytesMut::new();
        wire::put_bytes(&mut encoded, Some(&vec![0x61u8; size]));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = encoded.clone();
                black_box(wire::decode_bytes(&mut buf).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_command_roundtrip(c: &mut Criterion) {
    let command = Command::Get {
        bucket: 2,
        key: Bytes::from_static(b"benchmark-key"),
    };

    c.bench_function("command_roundtrip", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(64);
            command.encode(&mut buf);
            black_box(Command::decode(&mut buf).unwrap())
        });
    });
}

criterion_group!(
    benches,
    bench_value_encode,
    bench_value_decode,
    bench_command_roundtrip
);
criterion_main!(benches);
