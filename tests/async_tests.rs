use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use reclaim_cache::{Cache, CacheBuilder, LoadFn, MissBehavior, RetainAll, load_fn};

#[derive(Clone, Debug, PartialEq)]
struct AsyncValue {
	data: String,
}

type AsyncLoader = LoadFn<fn(&u64) -> Result<AsyncValue, Infallible>>;
type AsyncCache = Cache<u64, AsyncValue, AsyncLoader, RetainAll>;

fn load(key: &u64) -> Result<AsyncValue, Infallible> {
	Ok(AsyncValue {
		data: format!("value-{key}"),
	})
}

fn started() -> Arc<AsyncCache> {
	let cache: AsyncCache = CacheBuilder::new(
		load_fn(load as fn(&u64) -> Result<AsyncValue, Infallible>),
		RetainAll,
	)
	.cleanup_interval(Some(Duration::from_millis(20)))
	.miss_behavior(MissBehavior::LoadWhenUnavailable)
	.build()
	.expect("config is valid");
	cache.start().expect("cache should start");
	Arc::new(cache)
}

#[tokio::test]
async fn test_cached_held_across_await() {
	let cache = started();

	// Cached holds no lock, so it can live across an await point.
	let value = cache.get(&1).expect("get").expect("loaded");
	tokio::time::sleep(tokio::time::Duration::from_millis(30)).await;

	assert_eq!(value.data, "value-1");
	let again = cache.get(&1).expect("get").expect("still cached");
	assert_eq!(value.id(), again.id());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_spawn_blocking_loads() {
	let cache = started();

	let tasks: Vec<_> = (0..20u64)
		.map(|i| {
			let cache = cache.clone();
			tokio::task::spawn_blocking(move || cache.get(&(i % 5)).expect("get").expect("loaded"))
		})
		.collect();

	let mut held = Vec::new();
	for task in tasks {
		held.push(task.await.expect("task should not panic"));
	}

	assert!(held.iter().all(|value| value.data.starts_with("value-")));
	assert_eq!(cache.size().expect("size"), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_async_tasks() {
	let cache = started();

	let mut handles = vec![];
	for task_id in 0..10u64 {
		let cache = cache.clone();
		handles.push(tokio::spawn(async move {
			for i in 0..20 {
				let key = (task_id + i) % 8;
				let value = cache.refresh(&key).expect("refresh");
				tokio::time::sleep(tokio::time::Duration::from_micros(50)).await;
				assert_eq!(value.data, format!("value-{key}"));
			}
		}));
	}

	for handle in handles {
		handle.await.expect("task should not panic");
	}

	// Every refreshed value has been dropped, so the drain thread empties the cache.
	let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(2);
	while cache.approximate_size().expect("running") > 0 && tokio::time::Instant::now() < deadline {
		tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
	}
	assert_eq!(cache.approximate_size().expect("running"), 0);
}

#[tokio::test]
async fn test_stop_from_async_context() {
	let cache = started();
	let held = cache.refresh(&3).expect("refresh");

	cache.stop().expect("cache should stop");
	assert!(!cache.is_running());

	// Outstanding handles keep working after the cache stops.
	tokio::time::sleep(tokio::time::Duration::from_millis(1)).await;
	assert_eq!(held.data, "value-3");
}
