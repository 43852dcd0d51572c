//! Background maintenance threads and their cancellation.
//!
//! A running cache owns two threads:
//!
//! - the **sweeper**, present only when a cleanup interval is configured, which runs a full sweep
//!   and then sleeps for the interval;
//! - the **drain** thread, which blocks on the reclamation channel and removes entries whose values
//!   were dropped.
//!
//! Both are cooperative. A [`Cancellation`] flips a flag and disconnects a channel every
//! [`CancelToken`] listens on, which wakes a sleeping sweeper or a blocked drain thread. Threads also
//! check the flag right after acquiring the cache lock, so once `stop` has released the lock no
//! thread mutates the cache again.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::error::CacheError;
use crate::tracker::HandleId;

/// Thread name of the periodic sweeper.
pub const SWEEPER_THREAD: &str = "reclaim-cache-sweeper";
/// Thread name of the reclamation drain.
pub const DRAIN_THREAD: &str = "reclaim-cache-drain";

/// Owner side of a cancellation signal. Cancels on drop.
pub(crate) struct Cancellation {
	cancelled: Arc<AtomicBool>,
	// Never sent on; dropping it disconnects every token's receiver.
	_signal: Sender<()>,
}

impl Cancellation {
	pub(crate) fn new() -> (Self, CancelToken) {
		let cancelled = Arc::new(AtomicBool::new(false));
		let (signal, listener) = crossbeam_channel::bounded(0);
		let token = CancelToken {
			cancelled: cancelled.clone(),
			signal: listener,
		};
		(
			Self {
				cancelled,
				_signal: signal,
			},
			token,
		)
	}

	/// Signal every token and wake any thread blocked on one.
	pub(crate) fn cancel(self) {
		drop(self);
	}
}

impl Drop for Cancellation {
	fn drop(&mut self) {
		// Flag first; the sender field is dropped after this, waking receivers.
		self.cancelled.store(true, Ordering::Release);
	}
}

/// Listener side of a cancellation signal.
#[derive(Clone)]
pub(crate) struct CancelToken {
	cancelled: Arc<AtomicBool>,
	signal: Receiver<()>,
}

impl CancelToken {
	pub(crate) fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::Acquire)
	}

	/// Receiver that becomes ready (disconnected) on cancellation.
	pub(crate) fn signal(&self) -> &Receiver<()> {
		&self.signal
	}

	/// Sleep for `duration` or until cancelled. Returns `true` if cancelled.
	pub(crate) fn sleep(&self, duration: Duration) -> bool {
		match self.signal.recv_timeout(duration) {
			Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
			_ => true,
		}
	}
}

/// The work the background threads perform on a cache.
///
/// Each method takes write mode itself and must return `false` (or `None`) without mutating
/// anything once `cancel` has fired.
pub(crate) trait Maintenance: Send + Sync + 'static {
	/// Run one sweep. Returns `false` if cancelled.
	fn sweep(&self, cancel: &CancelToken) -> bool;

	/// Block until some value is reclaimed. Returns `None` if cancelled.
	fn next_reclaimed(&self, cancel: &CancelToken) -> Option<HandleId>;

	/// Remove the entry whose handle was reclaimed. Returns `false` if cancelled.
	fn reclaim(&self, id: HandleId, cancel: &CancelToken) -> bool;
}

/// Spawn the maintenance threads for one run of the cache.
///
/// On failure every thread already spawned is cancelled before returning.
pub(crate) fn spawn<T: Maintenance>(
	target: &Arc<T>,
	cleanup_interval: Option<Duration>,
) -> Result<Cancellation, CacheError> {
	let (cancellation, token) = Cancellation::new();

	if let Some(interval) = cleanup_interval {
		spawn_sweeper(target.clone(), interval, token.clone())
			.map_err(|source| CacheError::Spawn(SWEEPER_THREAD, source))?;
	}
	spawn_drain(target.clone(), token).map_err(|source| CacheError::Spawn(DRAIN_THREAD, source))?;

	Ok(cancellation)
}

fn spawn_sweeper<T: Maintenance>(
	target: Arc<T>,
	interval: Duration,
	cancel: CancelToken,
) -> io::Result<thread::JoinHandle<()>> {
	thread::Builder::new().name(SWEEPER_THREAD.into()).spawn(move || {
		trace!(?interval, "sweeper started");
		while target.sweep(&cancel) {
			if cancel.sleep(interval) {
				break;
			}
		}
		debug!("sweeper stopped");
	})
}

fn spawn_drain<T: Maintenance>(
	target: Arc<T>,
	cancel: CancelToken,
) -> io::Result<thread::JoinHandle<()>> {
	thread::Builder::new().name(DRAIN_THREAD.into()).spawn(move || {
		trace!("drain started");
		while let Some(id) = target.next_reclaimed(&cancel) {
			if !target.reclaim(id, &cancel) {
				break;
			}
		}
		debug!("drain stopped");
	})
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;
	use std::sync::atomic::AtomicUsize;
	use std::time::Instant;

	use super::*;

	#[derive(Default)]
	struct Recorder {
		sweeps: AtomicUsize,
		reclaimed: Mutex<Vec<HandleId>>,
		pending: Mutex<Vec<HandleId>>,
	}

	impl Maintenance for Recorder {
		fn sweep(&self, cancel: &CancelToken) -> bool {
			if cancel.is_cancelled() {
				return false;
			}
			self.sweeps.fetch_add(1, Ordering::SeqCst);
			true
		}

		fn next_reclaimed(&self, cancel: &CancelToken) -> Option<HandleId> {
			loop {
				if let Some(id) = self.pending.lock().expect("pending lock").pop() {
					return Some(id);
				}
				if cancel.sleep(Duration::from_millis(5)) {
					return None;
				}
			}
		}

		fn reclaim(&self, id: HandleId, cancel: &CancelToken) -> bool {
			if cancel.is_cancelled() {
				return false;
			}
			self.reclaimed.lock().expect("reclaimed lock").push(id);
			true
		}
	}

	fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
		let start = Instant::now();
		while start.elapsed() < deadline {
			if condition() {
				return true;
			}
			thread::sleep(Duration::from_millis(5));
		}
		condition()
	}

	#[test]
	fn test_cancel_token_sleep_times_out() {
		let (cancellation, token) = Cancellation::new();
		assert!(!token.sleep(Duration::from_millis(5)));
		assert!(!token.is_cancelled());
		drop(cancellation);
	}

	#[test]
	fn test_cancel_interrupts_sleep() {
		let (cancellation, token) = Cancellation::new();
		let handle = thread::spawn(move || {
			let start = Instant::now();
			let cancelled = token.sleep(Duration::from_secs(30));
			(cancelled, start.elapsed())
		});

		thread::sleep(Duration::from_millis(20));
		cancellation.cancel();

		let (cancelled, elapsed) = handle.join().expect("sleeper should not panic");
		assert!(cancelled);
		assert!(elapsed < Duration::from_secs(5));
	}

	#[test]
	fn test_sweeper_runs_periodically_until_cancelled() {
		let recorder = Arc::new(Recorder::default());
		let cancellation =
			spawn(&recorder, Some(Duration::from_millis(10))).expect("threads should spawn");

		assert!(wait_until(Duration::from_secs(2), || {
			recorder.sweeps.load(Ordering::SeqCst) >= 3
		}));

		cancellation.cancel();
		// Let any in-flight iteration finish, then the count must stay put.
		thread::sleep(Duration::from_millis(30));
		let settled = recorder.sweeps.load(Ordering::SeqCst);
		thread::sleep(Duration::from_millis(50));
		assert_eq!(recorder.sweeps.load(Ordering::SeqCst), settled);
	}

	#[test]
	fn test_no_sweeper_without_interval() {
		let recorder = Arc::new(Recorder::default());
		let cancellation = spawn(&recorder, None).expect("threads should spawn");

		thread::sleep(Duration::from_millis(30));
		assert_eq!(recorder.sweeps.load(Ordering::SeqCst), 0);
		cancellation.cancel();
	}

	#[test]
	fn test_drain_forwards_reclaimed_ids() {
		let recorder = Arc::new(Recorder::default());
		let tracker = crate::tracker::ReclaimTracker::new();
		let (_weak, strong) = tracker.wrap(());
		let id = strong.id();
		recorder.pending.lock().expect("pending lock").push(id);

		let cancellation = spawn(&recorder, None).expect("threads should spawn");
		assert!(wait_until(Duration::from_secs(2), || {
			recorder.reclaimed.lock().expect("reclaimed lock").contains(&id)
		}));
		cancellation.cancel();
	}
}
