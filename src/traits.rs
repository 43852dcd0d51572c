use std::fmt;

use crate::entry::{AccessStats, Entry};

/// Produces the value for a key on a cache miss or refresh.
///
/// Loads may block on arbitrary I/O. The cache never retries a failed load and hands the error
/// back to the caller unchanged.
///
/// # Example
///
/// ```
/// use reclaim_cache::Loader;
///
/// struct Squares;
///
/// impl Loader<u64, u64> for Squares {
///     type Error = std::convert::Infallible;
///
///     fn load(&self, key: &u64) -> Result<u64, Self::Error> {
///         Ok(key * key)
///     }
/// }
/// ```
pub trait Loader<K, V>: Send + Sync + 'static {
	/// Error returned when the value cannot be produced.
	type Error: std::error::Error + Send + Sync + 'static;

	/// Load the value for `key`.
	fn load(&self, key: &K) -> Result<V, Self::Error>;
}

/// Decides whether an entry stays in the cache.
///
/// Called once per live entry on every sweep and once per `get` hit, while the cache lock is held.
/// Keep it cheap: sweep latency grows linearly with cache size times the cost of this call.
pub trait Maintainer<V, M = AccessStats>: Send + Sync + 'static {
	/// Return `false` to evict the entry.
	fn is_maintained(&self, entity: &V, entry: &Entry<V, M>, cache: &dyn CacheMetadata) -> bool;
}

/// Read-only view of the cache handed to a [`Maintainer`].
pub trait CacheMetadata {
	/// Number of entries in the table being evaluated, including ones a sweep in progress has
	/// not reached yet.
	fn size(&self) -> usize;
}

/// Maintainer that keeps every reachable entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetainAll;

impl<V, M> Maintainer<V, M> for RetainAll {
	fn is_maintained(&self, _entity: &V, _entry: &Entry<V, M>, _cache: &dyn CacheMetadata) -> bool {
		true
	}
}

/// [`Loader`] backed by a closure. Built with [`load_fn`].
#[derive(Clone)]
pub struct LoadFn<F>(F);

/// Wrap a closure as a [`Loader`].
///
/// ```
/// use reclaim_cache::load_fn;
///
/// let loader = load_fn(|key: &u32| Ok::<_, std::io::Error>(key.to_string()));
/// # let _ = loader;
/// ```
pub fn load_fn<K, V, E, F>(f: F) -> LoadFn<F>
where
	F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
	E: std::error::Error + Send + Sync + 'static,
{
	LoadFn(f)
}

impl<K, V, E, F> Loader<K, V> for LoadFn<F>
where
	F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
	E: std::error::Error + Send + Sync + 'static,
{
	type Error = E;

	fn load(&self, key: &K) -> Result<V, E> {
		(self.0)(key)
	}
}

impl<F> fmt::Debug for LoadFn<F> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("LoadFn")
	}
}

/// [`Maintainer`] backed by a closure. Built with [`maintain_fn`].
#[derive(Clone)]
pub struct MaintainFn<F>(F);

/// Wrap a closure as a [`Maintainer`].
///
/// ```
/// use std::time::Duration;
///
/// use reclaim_cache::{AccessStats, Entry, maintain_fn};
///
/// // Drop entries idle for more than a minute.
/// let maintainer = maintain_fn(|_value: &String, entry: &Entry<String, AccessStats>, _cache| {
///     entry.metadata().idle() < Duration::from_secs(60)
/// });
/// # let _ = maintainer;
/// ```
pub fn maintain_fn<V, M, F>(f: F) -> MaintainFn<F>
where
	F: Fn(&V, &Entry<V, M>, &dyn CacheMetadata) -> bool + Send + Sync + 'static,
{
	MaintainFn(f)
}

impl<V, M, F> Maintainer<V, M> for MaintainFn<F>
where
	F: Fn(&V, &Entry<V, M>, &dyn CacheMetadata) -> bool + Send + Sync + 'static,
{
	fn is_maintained(&self, entity: &V, entry: &Entry<V, M>, cache: &dyn CacheMetadata) -> bool {
		(self.0)(entity, entry, cache)
	}
}

impl<F> fmt::Debug for MaintainFn<F> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("MaintainFn")
	}
}
