//! Error types.

use std::io;

use thiserror::Error;

/// Errors raised by the cache itself.
#[derive(Debug, Error)]
pub enum CacheError {
	/// A data operation was called before `start` or after `stop`.
	#[error("cache is not running")]
	NotRunning,
	/// `start` or a configuration setter was called while running.
	#[error("cache is already running")]
	AlreadyRunning,
	/// A configuration value was rejected.
	#[error("invalid cache configuration: {0}")]
	InvalidConfig(&'static str),
	/// A background thread could not be created.
	#[error("failed to spawn {0} thread")]
	Spawn(&'static str, #[source] io::Error),
}

impl CacheError {
	/// The operation was called in the wrong lifecycle state.
	pub fn is_state_error(&self) -> bool {
		matches!(self, Self::NotRunning | Self::AlreadyRunning)
	}

	/// A configuration value was rejected.
	pub fn is_config_error(&self) -> bool {
		matches!(self, Self::InvalidConfig(_))
	}
}

/// Errors from operations that may invoke the [`Loader`](crate::Loader).
#[derive(Debug, Error)]
pub enum LoadError<E> {
	/// The cache rejected the operation.
	#[error(transparent)]
	Cache(#[from] CacheError),
	/// The loader failed. Its error is passed through untouched.
	#[error(transparent)]
	Loader(E),
}

impl<E> LoadError<E> {
	/// The loader's own error, if that is what failed.
	pub fn into_loader_error(self) -> Option<E> {
		match self {
			Self::Loader(err) => Some(err),
			Self::Cache(_) => None,
		}
	}

	/// The cache's error, if the cache rejected the call.
	pub fn as_cache_error(&self) -> Option<&CacheError> {
		match self {
			Self::Cache(err) => Some(err),
			Self::Loader(_) => None,
		}
	}
}

/// Result of cache operations that never call the loader.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;
