use std::convert::Infallible;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use reclaim_cache::{Cache, CacheBuilder, Cached, LoadFn, MissBehavior, RetainAll, load_fn};

#[derive(Clone, Debug, PartialEq)]
struct BenchValue {
	data: Vec<u8>,
}

type BenchLoader = LoadFn<fn(&u64) -> Result<BenchValue, Infallible>>;
type BenchCache = Cache<u64, BenchValue, BenchLoader, RetainAll>;

fn load(_key: &u64) -> Result<BenchValue, Infallible> {
	Ok(BenchValue {
		data: vec![0u8; 64],
	})
}

fn started(behavior: MissBehavior) -> BenchCache {
	let cache: BenchCache =
		CacheBuilder::new(load_fn(load as fn(&u64) -> Result<BenchValue, Infallible>), RetainAll)
			.cleanup_interval(None)
			.miss_behavior(behavior)
			.build()
			.expect("config is valid");
	cache.start().expect("cache should start");
	cache
}

/// Populate `count` keys and return the strong handles keeping them cached.
fn populate(cache: &BenchCache, count: u64) -> Vec<Cached<BenchValue>> {
	(0..count).map(|i| cache.refresh(&i).expect("refresh")).collect()
}

fn bench_get_hit(c: &mut Criterion) {
	let cache = started(MissBehavior::DoNothing);
	let _held = populate(&cache, 1000);

	c.bench_function("get_hit", |b| {
		b.iter(|| {
			for i in 0..1000 {
				let _ = cache.get(&black_box(i));
			}
		});
	});
}

fn bench_get_miss_load(c: &mut Criterion) {
	let cache = started(MissBehavior::LoadWhenUnavailableBefore);

	// Every returned value is dropped at once, so each get is a fresh miss or a drained key.
	c.bench_function("get_miss_load", |b| {
		let mut key = 0u64;
		b.iter(|| {
			key = key.wrapping_add(1);
			black_box(cache.get(&key).expect("get"));
		});
	});
}

fn bench_refresh(c: &mut Criterion) {
	let mut group = c.benchmark_group("refresh");

	for size in [100u64, 1000, 10000] {
		group.throughput(Throughput::Elements(size));
		group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
			let cache = started(MissBehavior::DoNothing);
			let _held = populate(&cache, size);
			b.iter(|| {
				for i in 0..size {
					black_box(cache.refresh(&i).expect("refresh"));
				}
			});
		});
	}

	group.finish();
}

fn bench_sweep(c: &mut Criterion) {
	let mut group = c.benchmark_group("cleanup");

	for size in [100u64, 1000, 10000] {
		group.throughput(Throughput::Elements(size));
		group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
			let cache = started(MissBehavior::DoNothing);
			let _held = populate(&cache, size);
			b.iter(|| black_box(cache.cleanup().expect("cleanup")));
		});
	}

	group.finish();
}

criterion_group!(benches, bench_get_hit, bench_get_miss_load, bench_refresh, bench_sweep);
criterion_main!(benches);
