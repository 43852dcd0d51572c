use std::hash::Hash;
use std::time::Duration;

use crate::cache::Cache;
use crate::config::{CacheConfig, MissBehavior};
use crate::entry::{DefaultEntryFactory, EntryFactory};
use crate::error::Result;
use crate::traits::{Loader, Maintainer};

/// Builder for configuring a Cache.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use reclaim_cache::{CacheBuilder, MissBehavior, RetainAll, load_fn};
///
/// let cache = CacheBuilder::new(load_fn(|key: &u32| Ok::<_, std::io::Error>(key * 10)), RetainAll)
///     .cleanup_interval(Some(Duration::from_secs(5)))
///     .miss_behavior(MissBehavior::LoadWhenUnavailable)
///     .build()?;
///
/// assert!(!cache.is_running());
/// assert_eq!(cache.cleanup_interval(), Some(Duration::from_secs(5)));
/// # Ok::<(), reclaim_cache::CacheError>(())
/// ```
pub struct CacheBuilder<L, P, F = DefaultEntryFactory> {
	loader: L,
	maintainer: P,
	factory: F,
	config: CacheConfig,
}

impl<L, P> CacheBuilder<L, P> {
	/// Create a new builder with the default configuration.
	pub fn new(loader: L, maintainer: P) -> Self {
		Self {
			loader,
			maintainer,
			factory: DefaultEntryFactory,
			config: CacheConfig::default(),
		}
	}
}

impl<L, P, F> CacheBuilder<L, P, F> {
	/// Use a custom factory for new entries, typically to attach different metadata.
	pub fn entry_factory<G>(self, factory: G) -> CacheBuilder<L, P, G> {
		CacheBuilder {
			loader: self.loader,
			maintainer: self.maintainer,
			factory,
			config: self.config,
		}
	}

	/// Set the pause between periodic sweeps. `None` disables the sweeper thread.
	///
	/// Default: 30 seconds
	pub fn cleanup_interval(mut self, interval: Option<Duration>) -> Self {
		self.config.cleanup_interval = interval;
		self
	}

	/// Set what `get` does on a miss.
	///
	/// Default: [`MissBehavior::LoadWhenUnavailableBefore`]
	pub fn miss_behavior(mut self, behavior: MissBehavior) -> Self {
		self.config.miss_behavior = behavior;
		self
	}

	/// Replace the whole configuration.
	pub fn config(mut self, config: CacheConfig) -> Self {
		self.config = config;
		self
	}

	/// Build the cache with the configured settings. The cache starts out stopped.
	pub fn build<K, V>(self) -> Result<Cache<K, V, L, P, F>>
	where
		K: Hash + Eq + Clone + Send + Sync + 'static,
		V: Send + Sync + 'static,
		L: Loader<K, V>,
		P: Maintainer<V, F::Metadata>,
		F: EntryFactory<V>,
	{
		Cache::with_config(self.config, self.loader, self.maintainer, self.factory)
	}
}
