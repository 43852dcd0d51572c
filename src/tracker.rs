//! Weak ownership tracking for cached entities.
//!
//! Every loaded value is wrapped exactly once by [`ReclaimTracker::wrap`], which yields a pair:
//!
//! - a [`Cached`] strong handle, handed to callers and cloned freely, and
//! - a [`WeakHandle`], the only reference the cache keeps.
//!
//! When the last `Cached` clone for a value is dropped, the value is destroyed and the handle's
//! [`HandleId`] is pushed onto the tracker's channel. The drain thread receives those ids and
//! removes the matching entries. Reclamation therefore happens exactly when the last outside owner
//! lets go, never earlier and never because of memory pressure.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender, select};

use crate::scheduler::CancelToken;

/// Identity of a wrapped value. Unique for the lifetime of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
	/// The raw identity value.
	pub fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for HandleId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Shared allocation behind both handle kinds. Reports its id when destroyed.
struct Tracked<V> {
	id: HandleId,
	value: V,
	reclaimed: Sender<HandleId>,
}

impl<V> Drop for Tracked<V> {
	fn drop(&mut self) {
		// The receiver is gone once the owning cache has been dropped.
		let _ = self.reclaimed.send(self.id);
	}
}

/// Strong handle to a cached entity.
///
/// Cloning is cheap (reference count increment). While at least one clone is alive the cache can
/// still return the entity; once all are dropped, the entity is reclaimed.
pub struct Cached<V>(Arc<Tracked<V>>);

impl<V> Cached<V> {
	/// Identity shared by every clone of this handle and by the cache's weak handle.
	pub fn id(&self) -> HandleId {
		self.0.id
	}

	/// Returns `true` if both handles point at the same loaded value.
	pub fn ptr_eq(this: &Self, other: &Self) -> bool {
		Arc::ptr_eq(&this.0, &other.0)
	}

	/// Create a weak handle that does not keep the value alive.
	pub fn downgrade(this: &Self) -> WeakHandle<V> {
		WeakHandle {
			id: this.0.id,
			inner: Arc::downgrade(&this.0),
		}
	}
}

impl<V> Clone for Cached<V> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<V> Deref for Cached<V> {
	type Target = V;

	fn deref(&self) -> &V {
		&self.0.value
	}
}

impl<V> AsRef<V> for Cached<V> {
	fn as_ref(&self) -> &V {
		&self.0.value
	}
}

impl<V: fmt::Debug> fmt::Debug for Cached<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		(**self).fmt(f)
	}
}

impl<V: fmt::Display> fmt::Display for Cached<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		(**self).fmt(f)
	}
}

impl<V: PartialEq> PartialEq for Cached<V> {
	fn eq(&self, other: &Self) -> bool {
		**self == **other
	}
}

impl<V: Eq> Eq for Cached<V> {}

/// Weak handle held by the cache. Resolves to a [`Cached`] while the value is alive.
pub struct WeakHandle<V> {
	id: HandleId,
	inner: Weak<Tracked<V>>,
}

impl<V> WeakHandle<V> {
	/// Identity of the value this handle refers to.
	pub fn id(&self) -> HandleId {
		self.id
	}

	/// Resolve to a strong handle, or `None` if the value has been reclaimed.
	pub fn upgrade(&self) -> Option<Cached<V>> {
		self.inner.upgrade().map(Cached)
	}

	/// Returns `true` once no strong handle remains.
	pub fn is_reclaimed(&self) -> bool {
		self.inner.strong_count() == 0
	}
}

impl<V> Clone for WeakHandle<V> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			inner: self.inner.clone(),
		}
	}
}

impl<V> fmt::Debug for WeakHandle<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WeakHandle")
			.field("id", &self.id)
			.field("reclaimed", &self.is_reclaimed())
			.finish()
	}
}

/// Wraps values into tracked handles and collects reclamation notices.
pub struct ReclaimTracker<V> {
	next_id: AtomicU64,
	sender: Sender<HandleId>,
	receiver: Receiver<HandleId>,
	_marker: std::marker::PhantomData<fn(V)>,
}

impl<V> ReclaimTracker<V> {
	/// Create a tracker with an empty notice queue.
	pub fn new() -> Self {
		let (sender, receiver) = crossbeam_channel::unbounded();
		Self {
			next_id: AtomicU64::new(0),
			sender,
			receiver,
			_marker: std::marker::PhantomData,
		}
	}

	/// Wrap a freshly loaded value.
	///
	/// The returned [`Cached`] is the only strong owner; the [`WeakHandle`] is what the cache keeps.
	pub fn wrap(&self, value: V) -> (WeakHandle<V>, Cached<V>) {
		let id = HandleId(self.next_id.fetch_add(1, Ordering::Relaxed));
		let cached = Cached(Arc::new(Tracked {
			id,
			value,
			reclaimed: self.sender.clone(),
		}));
		(Cached::downgrade(&cached), cached)
	}

	/// Block until a value is reclaimed or `cancel` fires.
	///
	/// Returns `None` once cancelled.
	pub(crate) fn drain_blocking(&self, cancel: &CancelToken) -> Option<HandleId> {
		if cancel.is_cancelled() {
			return None;
		}
		select! {
			recv(self.receiver) -> id => id.ok(),
			recv(cancel.signal()) -> _ => None,
		}
	}

	/// Take a pending notice without blocking.
	pub fn try_drain(&self) -> Option<HandleId> {
		self.receiver.try_recv().ok()
	}

	/// Drop every queued notice. Returns how many were discarded.
	pub fn discard_pending(&self) -> usize {
		self.receiver.try_iter().count()
	}

	/// Number of notices waiting to be drained.
	pub fn pending(&self) -> usize {
		self.receiver.len()
	}
}

impl<V> Default for ReclaimTracker<V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<V> fmt::Debug for ReclaimTracker<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReclaimTracker")
			.field("wrapped", &self.next_id.load(Ordering::Relaxed))
			.field("pending", &self.pending())
			.finish()
	}
}
