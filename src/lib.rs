//! # Reclaim Cache
//!
//! A thread-safe, self-populating cache that never keeps its entities alive:
//! - **Loader-backed**: misses and refreshes call a user-supplied [`Loader`]
//! - **Weakly held**: the cache keeps only weak handles, so an entity is evicted as soon as the
//!   last [`Cached`] handle outside the cache is dropped
//! - **Policy-driven retention**: a [`Maintainer`] can veto any entry on every sweep
//! - **Three-mode locking** via [`TriModalLock`], so lookups run alongside readers and a miss
//!   promotes to write without letting another writer in between
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//!
//! use reclaim_cache::{
//!     AccessStats, Cache, CacheBuilder, Entry, MissBehavior, load_fn, maintain_fn,
//! };
//!
//! #[derive(Debug)]
//! struct Profile {
//!     name: String,
//! }
//!
//! let loader = load_fn(|id: &u64| Ok::<_, std::io::Error>(Profile { name: format!("user-{id}") }));
//!
//! // Drop anything nobody has looked at for five minutes.
//! let maintainer = maintain_fn(|_: &Profile, entry: &Entry<Profile, AccessStats>, _cache| {
//!     entry.metadata().idle() < Duration::from_secs(300)
//! });
//!
//! let cache: Cache<u64, Profile, _, _> = CacheBuilder::new(loader, maintainer)
//!     .cleanup_interval(Some(Duration::from_secs(10)))
//!     .miss_behavior(MissBehavior::LoadWhenUnavailable)
//!     .build()?;
//! cache.start()?;
//!
//! // Loaded on the first miss and returned as a strong handle.
//! let profile = cache.get(&1)?.expect("loaded on miss");
//! assert_eq!(profile.name, "user-1");
//!
//! // Same entity while anybody holds it.
//! let again = cache.get(&1)?.expect("cached");
//! assert_eq!(profile.id(), again.id());
//!
//! cache.stop()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Reclamation
//!
//! There is no garbage collector to lean on. Instead each loaded value lives in a reference-counted
//! allocation whose destructor reports its [`HandleId`] on a channel. The cache's drain thread
//! listens on that channel and removes the matching entry. Holding a [`Cached`] is what keeps an
//! entity cached; dropping every clone of it evicts it.
//!
//! ## Async Usage
//!
//! [`Cached`] is `Send + Sync` and holds no lock, so it can be kept across `.await` points.
//! `get` and `refresh` may block on the loader; from async code call them through
//! `spawn_blocking` or an equivalent.

mod builder;
mod cache;
mod config;
mod entry;
mod error;
pub mod lock;
mod scheduler;
mod store;
mod tracker;
mod traits;

pub use builder::CacheBuilder;
pub use cache::Cache;
pub use config::{CacheConfig, DEFAULT_CLEANUP_INTERVAL, MissBehavior};
pub use entry::{AccessStats, DefaultEntryFactory, Entry, EntryFactory, EntryMetadata};
pub use error::{CacheError, LoadError, Result};
pub use lock::TriModalLock;
pub use scheduler::{DRAIN_THREAD, SWEEPER_THREAD};
pub use tracker::{Cached, HandleId, ReclaimTracker, WeakHandle};
pub use traits::{
	CacheMetadata, LoadFn, Loader, MaintainFn, Maintainer, RetainAll, load_fn, maintain_fn,
};
