use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fibre_memo::hash::{Column, Frame, NdArray};
use fibre_memo::{hash_value, HashOverrides};
use std::collections::BTreeMap;

// --- Scalars and small containers ---

fn bench_small_values(c: &mut Criterion) {
  let overrides = HashOverrides::new();
  let mut group = c.benchmark_group("hash/small");

  group.bench_function("int", |b| b.iter(|| hash_value(black_box(&123_456_789i64), &overrides)));
  group.bench_function("str", |b| b.iter(|| hash_value(black_box("the quick brown fox"), &overrides)));

  let tuple = (1u32, "two", 3.5f64, Some(true));
  group.bench_function("tuple", |b| b.iter(|| hash_value(black_box(&tuple), &overrides)));

  let map: BTreeMap<String, Vec<i32>> = (0..16).map(|i| (format!("key{i}"), vec![i; 8])).collect();
  group.bench_function("map_16x8", |b| b.iter(|| hash_value(black_box(&map), &overrides)));

  group.finish();
}

// --- Arrays on both sides of the sampling threshold ---

fn bench_arrays(c: &mut Criterion) {
  let overrides = HashOverrides::new();
  let mut group = c.benchmark_group("hash/ndarray");
  group.sample_size(20);

  for len in [10_000usize, 999_999, 1_000_000, 4_000_000] {
    let array = NdArray::from_vec((0..len).map(|i| i as f64).collect());
    group.throughput(Throughput::Elements(len as u64));
    group.bench_with_input(BenchmarkId::from_parameter(len), &array, |b, array| {
      b.iter(|| hash_value(black_box(array), &overrides))
    });
  }
  group.finish();
}

fn bench_frames(c: &mut Criterion) {
  let overrides = HashOverrides::new();
  let mut group = c.benchmark_group("hash/frame");
  group.sample_size(10);

  for rows in [10_000i64, 100_000, 400_000] {
    let frame = Frame::new()
      .with_column("id", Column::Int((0..rows).collect()))
      .unwrap()
      .with_column("value", Column::Float((0..rows).map(|i| i as f64 * 0.5).collect()))
      .unwrap();
    group.throughput(Throughput::Elements(rows as u64));
    group.bench_with_input(BenchmarkId::from_parameter(rows), &frame, |b, frame| {
      b.iter(|| hash_value(black_box(frame), &overrides))
    });
  }
  group.finish();
}

criterion_group!(benches, bench_small_values, bench_arrays, bench_frames);
criterion_main!(benches);
