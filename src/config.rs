//! Cache configuration.

use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default pause between periodic sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// What `get` does when it cannot return a live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MissBehavior {
	/// Load whenever no live entity is available, including when the cached one was reclaimed.
	LoadWhenUnavailable,
	/// Load only when the key has no entry at all. A reclaimed entity yields `None`.
	#[default]
	LoadWhenUnavailableBefore,
	/// Never load from `get`; only `refresh` populates the cache.
	DoNothing,
}

impl MissBehavior {
	/// Whether `get` loads when the key has no entry.
	pub fn loads_absent(self) -> bool {
		matches!(self, Self::LoadWhenUnavailable | Self::LoadWhenUnavailableBefore)
	}

	/// Whether `get` loads when the key's entity was reclaimed.
	pub fn loads_reclaimed(self) -> bool {
		matches!(self, Self::LoadWhenUnavailable)
	}
}

/// Runtime settings of a cache. Only changeable while the cache is stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
	/// Pause between periodic sweeps. `None` disables the sweeper thread.
	pub cleanup_interval: Option<Duration>,
	/// Behavior of `get` on a miss.
	pub miss_behavior: MissBehavior,
}

impl CacheConfig {
	/// Check the settings, rejecting a zero cleanup interval.
	pub fn validate(&self) -> Result<()> {
		validate_interval(self.cleanup_interval)
	}
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			cleanup_interval: Some(DEFAULT_CLEANUP_INTERVAL),
			miss_behavior: MissBehavior::default(),
		}
	}
}

pub(crate) fn validate_interval(interval: Option<Duration>) -> Result<()> {
	match interval {
		Some(interval) if interval.is_zero() => {
			Err(CacheError::InvalidConfig("cleanup interval must be greater than zero"))
		}
		_ => Ok(()),
	}
}
