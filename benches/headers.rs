//! Benchmarks for header decoding throughput.
//!
//! Run with: `cargo bench`
//! Compare with baseline: `cargo bench -- --save-baseline main`
//! Compare against baseline: `cargo bench -- --baseline main`

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rar_headers::{ChecksumAccumulator, ChecksumKind, HeaderDecoder, HeaderResult, Signature};

fn rar4_header(header_type: u8, flags: u16, body: &[u8]) -> Vec<u8> {
    let size = (7 + body.len()) as u16;
    let mut out = vec![0, 0, header_type];
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(body);
    let crc = ChecksumAccumulator::of_header(ChecksumKind::Legacy16, &out) as u16;
    out[..2].copy_from_slice(&crc.to_le_bytes());
    out
}

/// RAR 4.x archive with `count` stored files of `size` bytes each.
fn rar4_archive(count: usize, size: u32) -> Vec<u8> {
    let mut out = Signature::RAR15.to_vec();
    out.extend_from_slice(&rar4_header(0x73, 0, &[0; 6]));
    for i in 0..count {
        let name = format!("dir/file{i:05}.bin");
        let mut body = Vec::new();
        body.extend_from_slice(&size.to_le_bytes());
        body.extend_from_slice(&size.to_le_bytes());
        body.push(2);
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&0x5321_0000u32.to_le_bytes());
        body.extend_from_slice(&[29, 0x30]);
        body.extend_from_slice(&(name.len() as u16).to_le_bytes());
        body.extend_from_slice(&0x20u32.to_le_bytes());
        body.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&rar4_header(0x74, 0x8000, &body));
        out.resize(out.len() + size as usize, 0);
    }
    out.extend_from_slice(&rar4_header(0x7b, 0x4000, &[]));
    out
}

fn vint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn rar5_header(header_type: u64, data_size: Option<u64>, body: &[u8]) -> Vec<u8> {
    let mut rest = Vec::new();
    vint(header_type, &mut rest);
    vint(if data_size.is_some() { 0x2 } else { 0 }, &mut rest);
    if let Some(size) = data_size {
        vint(size, &mut rest);
    }
    rest.extend_from_slice(body);

    let mut out = vec![0; 4];
    vint(rest.len() as u64, &mut out);
    out.extend_from_slice(&rest);
    let crc = ChecksumAccumulator::of_header(ChecksumKind::Crc32, &out);
    out[..4].copy_from_slice(&crc.to_le_bytes());
    out
}

/// RAR5 archive with `count` stored files of `size` bytes each.
fn rar5_archive(count: usize, size: u64) -> Vec<u8> {
    let mut out = Signature::RAR50.to_vec();
    out.extend_from_slice(&rar5_header(1, None, &[0]));
    for i in 0..count {
        let name = format!("dir/file{i:05}.bin");
        let mut body = Vec::new();
        vint(0, &mut body);
        vint(size, &mut body);
        vint(0x20, &mut body);
        vint(0, &mut body);
        vint(1, &mut body);
        vint(name.len() as u64, &mut body);
        body.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&rar5_header(2, Some(size), &body));
        out.resize(out.len() + size as usize, 0);
    }
    out.extend_from_slice(&rar5_header(5, None, &[0]));
    out
}

fn walk(bytes: &[u8]) -> usize {
    let mut decoder = HeaderDecoder::new(Cursor::new(bytes)).expect("cursor");
    let mut records = 0;
    while let Ok(HeaderResult::Record(record)) = decoder.read_next() {
        black_box(&record);
        records += 1;
    }
    records
}

/// Benchmark walking 1000 file headers of each generation.
fn bench_walk(c: &mut Criterion) {
    let rar4 = rar4_archive(1000, 64);
    let rar5 = rar5_archive(1000, 64);

    let mut group = c.benchmark_group("walk");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("rar4_1000_files", |b| {
        b.iter(|| walk(black_box(&rar4)));
    });
    group.bench_function("rar5_1000_files", |b| {
        b.iter(|| walk(black_box(&rar5)));
    });
    group.finish();
}

/// Benchmark resynchronizing through a damaged region.
fn bench_resync(c: &mut Criterion) {
    let mut damaged = Signature::RAR50.to_vec();
    damaged.extend_from_slice(&[0xFF; 16 * 1024]);

    c.bench_function("resync_16k_garbage", |b| {
        b.iter(|| {
            let mut decoder =
                HeaderDecoder::new(Cursor::new(black_box(&damaged[..]))).expect("cursor");
            black_box(decoder.read_next())
        });
    });
}

criterion_group!(benches, bench_walk, bench_resync);
criterion_main!(benches);
