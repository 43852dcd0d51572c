//! Cache entries and the metadata they carry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::tracker::{Cached, HandleId, WeakHandle};

/// Per-entry metadata maintained alongside the weak handle.
///
/// Hooks take `&self` because accesses happen while other readers may hold the same entry; use
/// atomics or other interior mutability for counters and timestamps.
pub trait EntryMetadata: Send + Sync + 'static {
	/// Called before the entity is handed out by `get`.
	fn on_access(&self) {}

	/// Called whenever a new value is installed, including the first one.
	fn on_update(&self) {}
}

impl EntryMetadata for () {}

/// Record kept by the cache for each key.
///
/// An entry never owns its entity; it only holds a [`WeakHandle`] to it.
pub struct Entry<V, M = AccessStats> {
	inserted_at: Instant,
	handle: WeakHandle<V>,
	metadata: M,
}

impl<V, M: EntryMetadata> Entry<V, M> {
	/// Create an entry for `handle` carrying `metadata`.
	pub fn new(handle: WeakHandle<V>, metadata: M) -> Self {
		metadata.on_update();
		Self {
			inserted_at: Instant::now(),
			handle,
			metadata,
		}
	}

	/// When this entry was first inserted. Not reset by refreshes.
	pub fn inserted_at(&self) -> Instant {
		self.inserted_at
	}

	/// Time since insertion.
	pub fn age(&self) -> Duration {
		self.inserted_at.elapsed()
	}

	/// Maintainer-defined metadata.
	pub fn metadata(&self) -> &M {
		&self.metadata
	}

	/// Identity of the current handle.
	pub fn handle_id(&self) -> HandleId {
		self.handle.id()
	}

	/// Whether the current entity has been reclaimed.
	pub fn is_reclaimed(&self) -> bool {
		self.handle.is_reclaimed()
	}

	/// Resolve the entity. With `access`, the metadata access hook fires first.
	pub(crate) fn resolve(&self, access: bool) -> Option<Cached<V>> {
		if access {
			self.metadata.on_access();
		}
		self.handle.upgrade()
	}

	/// Install a new handle, keeping the metadata. Returns the previous handle.
	pub(crate) fn replace_handle(&mut self, handle: WeakHandle<V>) -> WeakHandle<V> {
		let previous = std::mem::replace(&mut self.handle, handle);
		self.metadata.on_update();
		previous
	}
}

impl<V, M: std::fmt::Debug> std::fmt::Debug for Entry<V, M> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Entry")
			.field("inserted_at", &self.inserted_at)
			.field("handle", &self.handle)
			.field("metadata", &self.metadata)
			.finish()
	}
}

/// Default metadata: access count plus last access and last update times.
#[derive(Debug)]
pub struct AccessStats {
	/// Reference point for the stored offsets.
	origin: Instant,
	accesses: AtomicU64,
	/// Nanoseconds after `origin`, plus one. Zero means never.
	last_access: AtomicU64,
	last_update: AtomicU64,
}

impl AccessStats {
	/// Fresh statistics with no access or update recorded.
	pub fn new() -> Self {
		Self {
			origin: Instant::now(),
			accesses: AtomicU64::new(0),
			last_access: AtomicU64::new(0),
			last_update: AtomicU64::new(0),
		}
	}

	/// Number of times the entity was handed out by `get`.
	pub fn accesses(&self) -> u64 {
		self.accesses.load(Ordering::Relaxed)
	}

	/// When the entity was last handed out, if ever.
	pub fn last_access(&self) -> Option<Instant> {
		self.decode(self.last_access.load(Ordering::Relaxed))
	}

	/// When the entity was last loaded.
	pub fn last_update(&self) -> Option<Instant> {
		self.decode(self.last_update.load(Ordering::Relaxed))
	}

	/// Time since the last access, or since the last update if never accessed.
	pub fn idle(&self) -> Duration {
		self.last_access()
			.or_else(|| self.last_update())
			.map_or(Duration::ZERO, |at| at.elapsed())
	}

	fn now_offset(&self) -> u64 {
		let nanos = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX - 1);
		nanos.saturating_add(1)
	}

	fn decode(&self, stamp: u64) -> Option<Instant> {
		let nanos = stamp.checked_sub(1)?;
		self.origin.checked_add(Duration::from_nanos(nanos))
	}
}

impl Default for AccessStats {
	fn default() -> Self {
		Self::new()
	}
}

impl EntryMetadata for AccessStats {
	fn on_access(&self) {
		// fetch_max keeps the stamp monotonic under concurrent readers
		self.last_access.fetch_max(self.now_offset(), Ordering::Relaxed);
		self.accesses.fetch_add(1, Ordering::Relaxed);
	}

	fn on_update(&self) {
		self.last_update.fetch_max(self.now_offset(), Ordering::Relaxed);
	}
}

/// Builds the entry for a key seen for the first time.
pub trait EntryFactory<V>: Send + Sync + 'static {
	/// Metadata type carried by the produced entries.
	type Metadata: EntryMetadata;

	/// Create an entry around the handle of a freshly loaded entity.
	fn new_entry(&self, handle: WeakHandle<V>) -> Entry<V, Self::Metadata>;
}

/// Factory producing entries with [`AccessStats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEntryFactory;

impl<V> EntryFactory<V> for DefaultEntryFactory {
	type Metadata = AccessStats;

	fn new_entry(&self, handle: WeakHandle<V>) -> Entry<V, AccessStats> {
		Entry::new(handle, AccessStats::new())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tracker::ReclaimTracker;

	#[test]
	fn test_default_factory_records_update() {
		let tracker = ReclaimTracker::new();
		let (handle, _strong) = tracker.wrap(42u32);
		let entry = DefaultEntryFactory.new_entry(handle);

		assert!(entry.metadata().last_update().is_some());
		assert!(entry.metadata().last_access().is_none());
		assert_eq!(entry.metadata().accesses(), 0);
	}

	#[test]
	fn test_resolve_with_access_counts() {
		let tracker = ReclaimTracker::new();
		let (handle, _strong) = tracker.wrap("v");
		let entry = DefaultEntryFactory.new_entry(handle);

		assert_eq!(entry.resolve(false).as_deref(), Some(&"v"));
		assert_eq!(entry.metadata().accesses(), 0);

		entry.resolve(true);
		entry.resolve(true);
		assert_eq!(entry.metadata().accesses(), 2);
		let last = entry.metadata().last_access().expect("access recorded");
		assert!(last >= entry.inserted_at());
	}

	#[test]
	fn test_access_counted_even_when_reclaimed() {
		let tracker = ReclaimTracker::new();
		let (handle, strong) = tracker.wrap(1u8);
		let entry = DefaultEntryFactory.new_entry(handle);
		drop(strong);

		assert!(entry.is_reclaimed());
		assert!(entry.resolve(true).is_none());
		assert_eq!(entry.metadata().accesses(), 1);
	}

	#[test]
	fn test_replace_handle_keeps_metadata() {
		let tracker = ReclaimTracker::new();
		let (first, _a) = tracker.wrap(1u8);
		let (second, b) = tracker.wrap(2u8);
		let mut entry = DefaultEntryFactory.new_entry(first.clone());
		let inserted_at = entry.inserted_at();
		entry.resolve(true);
		let first_update = entry.metadata().last_update().expect("update recorded");

		let previous = entry.replace_handle(second);

		assert_eq!(previous.id(), first.id());
		assert_eq!(entry.handle_id(), b.id());
		assert_eq!(entry.inserted_at(), inserted_at);
		assert_eq!(entry.metadata().accesses(), 1);
		assert!(entry.metadata().last_update().expect("update recorded") >= first_update);
	}

	#[test]
	fn test_idle_grows_without_access() {
		let stats = AccessStats::new();
		stats.on_update();
		std::thread::sleep(Duration::from_millis(10));
		assert!(stats.idle() >= Duration::from_millis(10));

		stats.on_access();
		assert!(stats.idle() < Duration::from_millis(10));
	}

	#[test]
	fn test_unit_metadata_has_no_hooks() {
		let tracker = ReclaimTracker::new();
		let (handle, _strong) = tracker.wrap(0i64);
		let entry = Entry::new(handle, ());
		assert!(entry.resolve(true).is_some());
	}
}
