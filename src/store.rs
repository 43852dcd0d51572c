//! Key/entry table with a reverse index from handle identity to key.
//!
//! The store is not thread-safe on its own; the cache keeps it behind its
//! [`TriModalLock`](crate::lock::TriModalLock) and only mutates it in write mode.

use std::hash::Hash;

use ahash::RandomState;
use hashbrown::HashMap;
use tracing::trace;

use crate::entry::{Entry, EntryMetadata};
use crate::traits::{CacheMetadata, Maintainer};
use crate::tracker::{HandleId, WeakHandle};

pub(crate) struct EntryStore<K, V, M> {
	entries: HashMap<K, Entry<V, M>, RandomState>,
	/// Current handle of every entry. Old handles are detached as soon as they are replaced.
	keys_by_handle: HashMap<HandleId, K, RandomState>,
}

impl<K, V, M> EntryStore<K, V, M>
where
	K: Hash + Eq + Clone,
	M: EntryMetadata,
{
	pub(crate) fn new() -> Self {
		Self {
			entries: HashMap::with_hasher(RandomState::new()),
			keys_by_handle: HashMap::with_hasher(RandomState::new()),
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.len()
	}

	pub(crate) fn lookup(&self, key: &K) -> Option<&Entry<V, M>> {
		self.entries.get(key)
	}

	pub(crate) fn iter(&self) -> impl Iterator<Item = (&K, &Entry<V, M>)> {
		self.entries.iter()
	}

	/// Insert a new entry, replacing any entry already stored under `key`.
	pub(crate) fn insert(&mut self, key: K, entry: Entry<V, M>) -> Option<Entry<V, M>> {
		self.keys_by_handle.insert(entry.handle_id(), key.clone());
		let previous = self.entries.insert(key, entry);
		if let Some(previous) = &previous {
			self.keys_by_handle.remove(&previous.handle_id());
		}
		previous
	}

	/// Point an existing entry at a new handle.
	///
	/// Hands `handle` back if `key` has no entry.
	pub(crate) fn replace_handle(
		&mut self,
		key: &K,
		handle: WeakHandle<V>,
	) -> Result<(), WeakHandle<V>> {
		let Some(entry) = self.entries.get_mut(key) else {
			return Err(handle);
		};
		let id = handle.id();
		let previous = entry.replace_handle(handle);
		self.keys_by_handle.remove(&previous.id());
		self.keys_by_handle.insert(id, key.clone());
		Ok(())
	}

	pub(crate) fn remove(&mut self, key: &K) -> Option<Entry<V, M>> {
		let entry = self.entries.remove(key)?;
		self.keys_by_handle.remove(&entry.handle_id());
		Some(entry)
	}

	/// Remove the entry whose current handle is `id`.
	///
	/// Ids of handles that were already replaced or removed resolve to nothing.
	pub(crate) fn remove_by_handle(&mut self, id: HandleId) -> Option<K> {
		let key = self.keys_by_handle.remove(&id)?;
		self.entries.remove(&key);
		Some(key)
	}

	pub(crate) fn clear(&mut self) {
		self.entries.clear();
		self.keys_by_handle.clear();
	}

	/// Remove every entry whose entity is gone or that `maintainer` no longer wants.
	///
	/// The maintainer is consulted once per live entry. Returns the number of removed entries.
	pub(crate) fn sweep<P>(&mut self, maintainer: &P) -> usize
	where
		P: Maintainer<V, M> + ?Sized,
	{
		let doomed: Vec<K> = self
			.iter()
			.filter(|(_, entry)| match entry.resolve(false) {
				Some(entity) => !maintainer.is_maintained(&entity, entry, self),
				None => true,
			})
			.map(|(key, _)| key.clone())
			.collect();

		for key in &doomed {
			self.remove(key);
		}
		trace!(removed = doomed.len(), remaining = self.len(), "sweep finished");
		doomed.len()
	}

	#[cfg(test)]
	pub(crate) fn reverse_len(&self) -> usize {
		self.keys_by_handle.len()
	}
}

impl<K, V, M> CacheMetadata for EntryStore<K, V, M> {
	fn size(&self) -> usize {
		self.entries.len()
	}
}
