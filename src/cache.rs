use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::config::{CacheConfig, MissBehavior, validate_interval};
use crate::entry::{DefaultEntryFactory, EntryFactory};
use crate::error::{CacheError, LoadError, Result};
use crate::lock::TriModalLock;
use crate::scheduler::{self, CancelToken, Cancellation, Maintenance};
use crate::store::EntryStore;
use crate::traits::{CacheMetadata, Loader, Maintainer};
use crate::tracker::{Cached, HandleId, ReclaimTracker};

/// Thread-safe loading cache that never owns its entities.
///
/// Values come from the [`Loader`] and are handed out as [`Cached`] strong handles. The cache
/// itself keeps only weak handles, so an entity stays cached exactly as long as someone outside
/// the cache holds it. On top of that, a [`Maintainer`] decides on every sweep (and on every `get`
/// hit) whether an entry should be kept.
///
/// # Lifecycle
///
/// A cache is created stopped. [`start`](Self::start) spawns the background threads:
///
/// - a sweeper that calls [`cleanup`](Self::cleanup) every `cleanup_interval`, if one is set;
/// - a drain thread that removes an entry as soon as its entity is dropped.
///
/// [`stop`](Self::stop) cancels them and empties the cache. Data operations fail with
/// [`CacheError::NotRunning`] while stopped; configuration setters fail with
/// [`CacheError::AlreadyRunning`] while running.
///
/// # Locking
///
/// All state lives behind one [`TriModalLock`]. `get` takes update mode and, when it must load,
/// keeps it across the load and then promotes to write, so two concurrent misses on `get` never
/// race to insert. `refresh` loads with no lock held, so concurrent refreshes of one key all load
/// and the last to finish wins.
///
/// The loader and the maintainer run under the lock on the `get` path and must not call back into
/// the same cache.
///
/// # Example
///
/// ```
/// use reclaim_cache::{Cache, RetainAll, load_fn};
///
/// let cache = Cache::new(
///     load_fn(|id: &u32| Ok::<_, std::io::Error>(format!("user-{id}"))),
///     RetainAll,
/// );
/// cache.start()?;
///
/// let user = cache.get(&7)?.expect("loaded on first miss");
/// assert_eq!(*user, "user-7");
///
/// // Still cached while `user` is alive.
/// assert_eq!(cache.size()?, 1);
///
/// cache.stop()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Cache<K, V, L, P, F = DefaultEntryFactory>
where
	F: EntryFactory<V>,
{
	shared: Arc<Shared<K, V, L, P, F>>,
}

/// State shared between the cache handle and its background threads.
struct Shared<K, V, L, P, F>
where
	F: EntryFactory<V>,
{
	state: TriModalLock<State<K, V, F::Metadata>>,
	tracker: ReclaimTracker<V>,
	loader: L,
	maintainer: P,
	factory: F,
}

struct State<K, V, M> {
	config: CacheConfig,
	/// `Some` while running.
	run: Option<Cancellation>,
	store: EntryStore<K, V, M>,
}

impl<K, V, M> State<K, V, M> {
	fn ensure_running(&self) -> Result<()> {
		match self.run {
			Some(_) => Ok(()),
			None => Err(CacheError::NotRunning),
		}
	}

	fn ensure_stopped(&self) -> Result<()> {
		match self.run {
			Some(_) => Err(CacheError::AlreadyRunning),
			None => Ok(()),
		}
	}
}

impl<K, V, L, P> Cache<K, V, L, P>
where
	K: Hash + Eq + Clone + Send + Sync + 'static,
	V: Send + Sync + 'static,
	L: Loader<K, V>,
	P: Maintainer<V>,
{
	/// Create a stopped cache with the default configuration and entry factory.
	pub fn new(loader: L, maintainer: P) -> Self {
		Self::from_parts(CacheConfig::default(), loader, maintainer, DefaultEntryFactory)
	}
}

impl<K, V, L, P, F> Cache<K, V, L, P, F>
where
	K: Hash + Eq + Clone + Send + Sync + 'static,
	V: Send + Sync + 'static,
	L: Loader<K, V>,
	P: Maintainer<V, F::Metadata>,
	F: EntryFactory<V>,
{
	/// Create a stopped cache from explicit parts.
	///
	/// Fails with [`CacheError::InvalidConfig`] if `config` is rejected.
	pub fn with_config(config: CacheConfig, loader: L, maintainer: P, factory: F) -> Result<Self> {
		config.validate()?;
		Ok(Self::from_parts(config, loader, maintainer, factory))
	}

	fn from_parts(config: CacheConfig, loader: L, maintainer: P, factory: F) -> Self {
		let state = State {
			config,
			run: None,
			store: EntryStore::new(),
		};
		Self {
			shared: Arc::new(Shared {
				state: TriModalLock::new(state),
				tracker: ReclaimTracker::new(),
				loader,
				maintainer,
				factory,
			}),
		}
	}

	/// Start the cache and its background threads.
	pub fn start(&self) -> Result<()> {
		let mut state = self.shared.state.write();
		state.ensure_stopped()?;

		// Notices from values dropped while stopped refer to entries that no longer exist.
		let stale = self.shared.tracker.discard_pending();
		let interval = state.config.cleanup_interval;
		state.run = Some(scheduler::spawn(&self.shared, interval)?);

		debug!(?interval, stale, "cache started");
		Ok(())
	}

	/// Stop the cache, cancel its background threads and drop every entry.
	///
	/// Does not wait for the threads to exit, but they perform no further work once this returns.
	pub fn stop(&self) -> Result<()> {
		let mut state = self.shared.state.write();
		let run = state.run.take().ok_or(CacheError::NotRunning)?;
		run.cancel();

		let dropped = state.store.len();
		state.store.clear();
		debug!(dropped, "cache stopped");
		Ok(())
	}

	/// Whether the cache is running.
	pub fn is_running(&self) -> bool {
		self.shared.state.read().run.is_some()
	}

	/// Look up `key`, loading it according to the configured [`MissBehavior`].
	///
	/// Returns `Ok(None)` when no entity is available and the miss behavior does not allow a
	/// load, or when the [`Maintainer`] rejects the cached entity. A rejected entry stays until
	/// the next sweep.
	pub fn get(&self, key: &K) -> Result<Option<Cached<V>>, LoadError<L::Error>> {
		let state = self.shared.state.update();
		state.ensure_running()?;

		let behavior = state.config.miss_behavior;
		let load = match state.store.lookup(key) {
			Some(entry) => match entry.resolve(true) {
				Some(entity) => {
					if self.shared.maintainer.is_maintained(&entity, entry, &state.store) {
						return Ok(Some(entity));
					}
					false
				}
				None => behavior.loads_reclaimed(),
			},
			None => behavior.loads_absent(),
		};
		if !load {
			return Ok(None);
		}

		trace!(?behavior, "loading on miss");
		let value = self.shared.loader.load(key).map_err(LoadError::Loader)?;
		let mut state = state.promote();
		Ok(Some(self.shared.install(&mut state, key, value)))
	}

	/// Load `key` and install the result, replacing any cached entity.
	///
	/// The loader runs without holding the cache lock. If it fails, the cache is left untouched
	/// and its error is returned as [`LoadError::Loader`].
	pub fn refresh(&self, key: &K) -> Result<Cached<V>, LoadError<L::Error>> {
		self.shared.state.read().ensure_running()?;

		let value = self.shared.loader.load(key).map_err(LoadError::Loader)?;

		let mut state = self.shared.state.write();
		state.ensure_running()?;
		Ok(self.shared.install(&mut state, key, value))
	}

	/// Sweep the cache once, returning how many entries were removed.
	pub fn cleanup(&self) -> Result<usize> {
		let mut state = self.shared.state.write();
		state.ensure_running()?;
		Ok(state.store.sweep(&self.shared.maintainer))
	}

	/// Number of entries after sweeping out every stale one.
	///
	/// This runs a full sweep. Use [`approximate_size`](Self::approximate_size) for a cheap count.
	pub fn size(&self) -> Result<usize> {
		let mut state = self.shared.state.write();
		state.ensure_running()?;
		state.store.sweep(&self.shared.maintainer);
		Ok(state.store.len())
	}

	/// Number of entries without sweeping. May include reclaimed or rejected entries.
	pub fn approximate_size(&self) -> Result<usize> {
		let state = self.shared.state.read();
		state.ensure_running()?;
		Ok(state.store.len())
	}

	/// Current configuration.
	pub fn config(&self) -> CacheConfig {
		self.shared.state.read().config.clone()
	}

	/// Pause between periodic sweeps, if enabled.
	pub fn cleanup_interval(&self) -> Option<Duration> {
		self.shared.state.read().config.cleanup_interval
	}

	/// Set the pause between periodic sweeps. `None` disables the sweeper.
	///
	/// Fails while running, or with a zero interval.
	pub fn set_cleanup_interval(&self, interval: Option<Duration>) -> Result<()> {
		let mut state = self.shared.state.write();
		state.ensure_stopped()?;
		validate_interval(interval)?;
		state.config.cleanup_interval = interval;
		Ok(())
	}

	/// Behavior of [`get`](Self::get) on a miss.
	pub fn miss_behavior(&self) -> MissBehavior {
		self.shared.state.read().config.miss_behavior
	}

	/// Set the behavior of [`get`](Self::get) on a miss. Fails while running.
	pub fn set_miss_behavior(&self, behavior: MissBehavior) -> Result<()> {
		let mut state = self.shared.state.write();
		state.ensure_stopped()?;
		state.config.miss_behavior = behavior;
		Ok(())
	}
}

impl<K, V, L, P, F> Shared<K, V, L, P, F>
where
	K: Hash + Eq + Clone,
	F: EntryFactory<V>,
{
	/// Wrap `value` and store it under `key`. Requires write mode.
	fn install(&self, state: &mut State<K, V, F::Metadata>, key: &K, value: V) -> Cached<V> {
		let (handle, entity) = self.tracker.wrap(value);
		match state.store.replace_handle(key, handle) {
			Ok(()) => trace!(id = %entity.id(), "replaced entity"),
			Err(handle) => {
				let entry = self.factory.new_entry(handle);
				state.store.insert(key.clone(), entry);
				trace!(id = %entity.id(), "inserted entity");
			}
		}
		entity
	}
}

impl<K, V, L, P, F> Maintenance for Shared<K, V, L, P, F>
where
	K: Hash + Eq + Clone + Send + Sync + 'static,
	V: Send + Sync + 'static,
	L: Loader<K, V>,
	P: Maintainer<V, F::Metadata>,
	F: EntryFactory<V>,
{
	fn sweep(&self, cancel: &CancelToken) -> bool {
		let mut state = self.state.write();
		if cancel.is_cancelled() {
			return false;
		}
		state.store.sweep(&self.maintainer);
		true
	}

	fn next_reclaimed(&self, cancel: &CancelToken) -> Option<HandleId> {
		self.tracker.drain_blocking(cancel)
	}

	fn reclaim(&self, id: HandleId, cancel: &CancelToken) -> bool {
		let mut state = self.state.write();
		if cancel.is_cancelled() {
			return false;
		}
		if state.store.remove_by_handle(id).is_some() {
			trace!(%id, "removed reclaimed entry");
		}
		true
	}
}

impl<K, V, L, P, F> Drop for Cache<K, V, L, P, F>
where
	F: EntryFactory<V>,
{
	fn drop(&mut self) {
		// Threads hold the shared state; cancelling lets them exit and release it.
		if let Some(run) = self.shared.state.write().run.take() {
			run.cancel();
		}
	}
}

impl<K, V, L, P, F> fmt::Debug for Cache<K, V, L, P, F>
where
	F: EntryFactory<V>,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.shared.state.read();
		f.debug_struct("Cache")
			.field("running", &state.run.is_some())
			.field("config", &state.config)
			.field("entries", &state.store.size())
			.finish_non_exhaustive()
	}
}
