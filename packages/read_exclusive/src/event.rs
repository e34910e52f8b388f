//! Shutdown-aware notification primitive.
//!
//! An [`Event`] carries no payload. It only tells blocked threads that "something changed" and
//! they should re-evaluate whatever condition they are waiting for. Every notification wakes
//! every waiter; each waiter must independently re-verify its own condition.

use std::any::type_name;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::ShutdownError;

/// Blocks threads until the next notification or until shutdown.
///
/// The event tracks a nonce that is incremented by every [`notify()`][Self::notify]. A waiter
/// captures the nonce, then blocks until it observes a different value. This makes waiting immune
/// to spurious wakeups and to notifications that race with the start of the wait: as long as the
/// nonce was captured before the notification happened, the wait returns.
///
/// Once [`shutdown()`][Self::shutdown] has been called, every current and future wait fails with
/// [`ShutdownError`]. Shutdown is permanent.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::thread;
///
/// use read_exclusive::Event;
///
/// let event = Event::new();
/// let ready = AtomicBool::new(false);
///
/// thread::scope(|s| {
///     s.spawn(|| {
///         ready.store(true, Ordering::Release);
///         event.notify();
///     });
///
///     event
///         .try_or_wait(|| ready.load(Ordering::Acquire))
///         .unwrap();
/// });
/// ```
pub struct Event {
    // Incremented on every notification. Only ever accessed while holding this lock.
    nonce: Mutex<u64>,

    // Only written while holding the `nonce` lock, so waiters that check it under the lock cannot
    // miss the transition. Read without the lock on fast paths.
    shutdown: AtomicBool,

    wakeup: Condvar,
}

impl Event {
    /// Creates a new event that has not been shut down.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nonce: Mutex::new(0),
            shutdown: AtomicBool::new(false),
            wakeup: Condvar::new(),
        }
    }

    /// Whether [`shutdown()`][Self::shutdown] has been called on this event.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Blocks the current thread until the next call to [`notify()`][Self::notify].
    ///
    /// Prefer [`try_or_wait()`][Self::try_or_wait] whenever you are waiting for some condition to
    /// become true. A bare `while !condition() { event.wait() }` loop misses notifications that
    /// arrive between the condition check and the start of the wait.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] if the event was already shut down or is shut down while waiting.
    pub fn wait(&self) -> Result<(), ShutdownError> {
        self.prepare_wait()?.wait()
    }

    /// Captures the current notification state, to block on it later.
    ///
    /// Any notification that happens after this call returns will make [`WaitToken::wait()`]
    /// return, even if it happens before the token starts waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] if the event has been shut down.
    pub fn prepare_wait(&self) -> Result<WaitToken<'_>, ShutdownError> {
        let nonce = self.nonce.lock();
        self.ensure_running()?;

        Ok(WaitToken {
            event: self,
            nonce: *nonce,
        })
    }

    /// Calls `attempt` until it returns `true`, waiting for a notification between failed calls.
    ///
    /// `attempt` is typically a single atomic state check or compare-and-swap. It is never called
    /// while the event's internal lock is held, so the uncontended path is lock-free.
    ///
    /// The notification state is captured before each retry of `attempt`, so a notification that
    /// races with a failed attempt always causes another attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] if the event was already shut down when called, or is shut down
    /// while waiting. `attempt` is not called if the event was already shut down.
    pub fn try_or_wait<F>(&self, mut attempt: F) -> Result<(), ShutdownError>
    where
        F: FnMut() -> bool,
    {
        self.ensure_running()?;

        if attempt() {
            return Ok(());
        }

        loop {
            let token = self.prepare_wait()?;

            if attempt() {
                return Ok(());
            }

            token.wait()?;
        }
    }

    /// Wakes up every thread currently waiting on this event.
    ///
    /// Calling this when nobody is waiting is harmless.
    pub fn notify(&self) {
        {
            let mut nonce = self.nonce.lock();
            *nonce = nonce.wrapping_add(1);
        }

        self.wakeup.notify_all();
    }

    /// Permanently shuts down the event, failing all current and future waits.
    ///
    /// This is idempotent and may be called concurrently with any other operation.
    pub fn shutdown(&self) {
        {
            let _nonce = self.nonce.lock();

            if self.shutdown.swap(true, Ordering::AcqRel) {
                return;
            }
        }

        debug!("event shut down; waking all waiters");
        self.wakeup.notify_all();
    }

    fn ensure_running(&self) -> Result<(), ShutdownError> {
        if self.is_shutdown() {
            Err(ShutdownError)
        } else {
            Ok(())
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Event {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nonce = *self.nonce.lock();

        f.debug_struct(type_name::<Self>())
            .field("nonce", &nonce)
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

/// The notification state of an [`Event`] as captured by [`Event::prepare_wait()`].
#[derive(Debug)]
#[must_use = "a wait token does nothing unless you call wait() on it"]
pub struct WaitToken<'a> {
    event: &'a Event,
    nonce: u64,
}

impl WaitToken<'_> {
    /// Blocks until the event has been notified at least once since the token was created.
    ///
    /// Returns immediately if that has already happened.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] if the event is shut down, before or during the wait.
    pub fn wait(self) -> Result<(), ShutdownError> {
        let mut nonce = self.event.nonce.lock();

        loop {
            // Shutdown takes precedence over any notification we may also have received.
            self.event.ensure_running()?;

            if *nonce != self.nonce {
                return Ok(());
            }

            self.event.wakeup.wait(&mut nonce);
        }
    }
}
