//! Three-mode reader/updater/writer lock.
//!
//! [`TriModalLock`] protects a value with three acquisition modes:
//!
//! | held \ requested | read | update | write |
//! |------------------|------|--------|-------|
//! | read             | yes  | yes    | no    |
//! | update           | yes  | no     | no    |
//! | write            | no   | no     | no    |
//!
//! An update holder can [`promote`](UpdateGuard::promote) itself to write mode without giving up
//! its claim, so no other updater or writer can run between the moment it inspected the value and
//! the moment it mutates it. Acquisition always blocks; there are no timeouts.
//!
//! The lock is built on `parking_lot`'s upgradable reader-writer lock, which already provides the
//! exact compatibility matrix above.

use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard};

/// A reader/updater/writer lock.
pub struct TriModalLock<T> {
	inner: RwLock<T>,
}

impl<T> TriModalLock<T> {
	/// Create a new lock protecting `value`.
	pub const fn new(value: T) -> Self {
		Self {
			inner: RwLock::new(value),
		}
	}

	/// Acquire shared read access. Blocks while a writer holds the lock.
	pub fn read(&self) -> ReadGuard<'_, T> {
		ReadGuard(self.inner.read())
	}

	/// Acquire update access. Blocks while another updater or a writer holds the lock.
	pub fn update(&self) -> UpdateGuard<'_, T> {
		UpdateGuard(self.inner.upgradable_read())
	}

	/// Acquire exclusive write access.
	pub fn write(&self) -> WriteGuard<'_, T> {
		WriteGuard(self.inner.write())
	}

	/// Try to acquire read access without blocking.
	pub fn try_read(&self) -> Option<ReadGuard<'_, T>> {
		self.inner.try_read().map(ReadGuard)
	}

	/// Try to acquire update access without blocking.
	pub fn try_update(&self) -> Option<UpdateGuard<'_, T>> {
		self.inner.try_upgradable_read().map(UpdateGuard)
	}

	/// Try to acquire write access without blocking.
	pub fn try_write(&self) -> Option<WriteGuard<'_, T>> {
		self.inner.try_write().map(WriteGuard)
	}

	/// Consume the lock and return the protected value.
	pub fn into_inner(self) -> T {
		self.inner.into_inner()
	}
}

impl<T: Default> Default for TriModalLock<T> {
	fn default() -> Self {
		Self::new(T::default())
	}
}

impl<T> fmt::Debug for TriModalLock<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TriModalLock").finish_non_exhaustive()
	}
}

/// Shared read access to a [`TriModalLock`].
pub struct ReadGuard<'a, T>(RwLockReadGuard<'a, T>);

impl<T> Deref for ReadGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &T {
		&self.0
	}
}

/// Update access to a [`TriModalLock`]: shared with readers, exclusive against other updaters and
/// writers.
pub struct UpdateGuard<'a, T>(RwLockUpgradableReadGuard<'a, T>);

impl<'a, T> UpdateGuard<'a, T> {
	/// Atomically promote to write mode.
	///
	/// Waits for current readers to leave. No updater or writer can acquire the lock in between,
	/// because this guard keeps its claim for the whole transition.
	pub fn promote(self) -> WriteGuard<'a, T> {
		WriteGuard(RwLockUpgradableReadGuard::upgrade(self.0))
	}
}

impl<T> Deref for UpdateGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &T {
		&self.0
	}
}

/// Exclusive write access to a [`TriModalLock`].
pub struct WriteGuard<'a, T>(RwLockWriteGuard<'a, T>);

impl<T> Deref for WriteGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &T {
		&self.0
	}
}

impl<T> DerefMut for WriteGuard<'_, T> {
	fn deref_mut(&mut self) -> &mut T {
		&mut self.0
	}
}
