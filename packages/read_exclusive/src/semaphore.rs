use std::any::type_name;
use std::fmt;

use nm::Event as MetricEvent;
use scopeguard::ScopeGuard;
use tracing::{debug, trace};

use crate::metrics::{
    EXCLUSIVE_CONTENDED, EXCLUSIVE_REJECTED, READ_CONTENDED, READ_SATURATED, SHUTDOWN_ABORTED,
};
use crate::word::{ReaderAttempt, StateWord};
use crate::{
    AcquisitionError, Event, ExclusiveGuard, Fairness, ReadGuard, SemaphoreBuilder, ShutdownError,
};

/// A reader/writer semaphore that admits many concurrent readers or one exclusive writer.
///
/// All state transitions happen through compare-and-swap operations on a single packed atomic
/// word, so uncontended acquisition and release never take a lock. Contended callers block on
/// one of two [`Event`]s:
///
/// * `writer_done` - readers waiting for a writer to leave, and writers waiting to claim the
///   writer flag from another writer.
/// * `reader_done` - writers waiting for readers to drain, and readers waiting for a free reader
///   slot when the reader count is at capacity.
///
/// Access is represented by guards that release the semaphore when dropped, including during a
/// panic unwind:
///
/// * [`read_acquire()`][Self::read_acquire] - shared access, blocks while a writer is active.
/// * [`exclusive_acquire_blocking()`][Self::exclusive_acquire_blocking] - exclusive access,
///   blocks until available. Whether a waiting writer takes precedence over newly arriving
///   readers is decided by the configured [`Fairness`].
/// * [`exclusive_acquire_nonblocking()`][Self::exclusive_acquire_nonblocking] - exclusive access
///   only if the semaphore is entirely idle right now, otherwise fails immediately.
///
/// No ordering is guaranteed among waiters. Every release wakes all relevant waiters, which then
/// race to re-evaluate the state.
///
/// # Shutdown
///
/// Calling [`shutdown()`][Self::shutdown] makes every blocked and future blocking acquisition
/// fail with [`ShutdownError`]. This is how threads are unblocked when the protected resource is
/// being torn down. Guards that are already live keep working and release normally.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::thread;
///
/// use read_exclusive::ReadExclusiveSemaphore;
///
/// let semaphore = ReadExclusiveSemaphore::new();
/// let value = AtomicU64::new(0);
///
/// thread::scope(|s| {
///     s.spawn(|| {
///         let _exclusive = semaphore.exclusive_acquire_blocking().unwrap();
///         value.store(value.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
///     });
///
///     s.spawn(|| {
///         let _shared = semaphore.read_acquire().unwrap();
///         let observed = value.load(Ordering::Relaxed);
///         assert!(observed == 0 || observed == 1);
///     });
/// });
///
/// // Nobody else is using it now, so this cannot fail.
/// let _exclusive = semaphore.exclusive_acquire_nonblocking().unwrap();
/// assert_eq!(value.load(Ordering::Relaxed), 1);
/// ```
pub struct ReadExclusiveSemaphore {
    word: StateWord,

    writer_done: Event,
    reader_done: Event,

    max_readers: usize,
    fairness: Fairness,
}

impl ReadExclusiveSemaphore {
    /// Creates a semaphore with writer priority and the maximum reader capacity.
    ///
    /// Use [`builder()`][Self::builder] to configure it differently.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder to configure a new semaphore.
    #[cfg_attr(test, mutants::skip)] // Gets replaced with itself by different name, bad mutation.
    pub fn builder() -> SemaphoreBuilder {
        SemaphoreBuilder::new()
    }

    pub(crate) fn from_config(max_readers: usize, fairness: Fairness) -> Self {
        Self {
            word: StateWord::new(),
            writer_done: Event::new(),
            reader_done: Event::new(),
            max_readers,
            fairness,
        }
    }

    /// Acquires shared access, blocking while a writer holds or has claimed the semaphore.
    ///
    /// If the reader count is at its configured maximum, this also blocks until another reader
    /// releases. Capacity is never reported as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] if the semaphore was shut down before the call, even if a read
    /// slot is free, or is shut down while the caller waits.
    pub fn read_acquire(&self) -> Result<ReadGuard<'_>, ShutdownError> {
        self.acquire_read()
            .inspect_err(|_| Self::record_abort("read"))?;

        Ok(ReadGuard::new(self))
    }

    /// Acquires exclusive access, blocking until no reader or other writer holds the semaphore.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] if the semaphore was shut down before the call, even if it is
    /// idle, or is shut down while the caller waits. Any partial claim made by the caller is given
    /// back before the error is returned.
    pub fn exclusive_acquire_blocking(&self) -> Result<ExclusiveGuard<'_>, ShutdownError> {
        self.acquire_exclusive()
            .inspect_err(|_| Self::record_abort("exclusive"))?;

        Ok(ExclusiveGuard::new(self))
    }

    /// Acquires exclusive access only if the semaphore is idle, without ever blocking.
    ///
    /// A single attempt is made.
    ///
    /// # Errors
    ///
    /// Returns [`AcquisitionError`] if any reader or writer is active or pending.
    pub fn exclusive_acquire_nonblocking(&self) -> Result<ExclusiveGuard<'_>, AcquisitionError> {
        if self.word.try_claim_idle() {
            Ok(ExclusiveGuard::new(self))
        } else {
            EXCLUSIVE_REJECTED.with(MetricEvent::observe_once);
            Err(AcquisitionError)
        }
    }

    /// Permanently shuts down the semaphore, failing all blocked and future blocking acquisitions.
    ///
    /// This is idempotent. Live guards are unaffected and still release when dropped.
    pub fn shutdown(&self) {
        debug!(
            readers = self.word.reader_count(),
            writer_active = self.word.is_writer_active(),
            "semaphore shutting down"
        );

        self.writer_done.shutdown();
        self.reader_done.shutdown();
    }

    /// Whether [`shutdown()`][Self::shutdown] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.writer_done.is_shutdown() || self.reader_done.is_shutdown()
    }

    /// The number of readers that currently hold the semaphore or are draining out of it.
    ///
    /// This is a snapshot that may be outdated as soon as it is returned.
    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.word.reader_count()
    }

    /// Whether a writer currently holds or has claimed the semaphore.
    ///
    /// This is a snapshot that may be outdated as soon as it is returned.
    #[must_use]
    pub fn is_writer_active(&self) -> bool {
        self.word.is_writer_active()
    }

    /// The maximum number of concurrent readers.
    #[must_use]
    pub fn max_readers(&self) -> usize {
        self.max_readers
    }

    /// The policy for blocking writers competing with readers.
    #[must_use]
    pub fn fairness(&self) -> Fairness {
        self.fairness
    }

    fn acquire_read(&self) -> Result<(), ShutdownError> {
        self.ensure_running()?;

        loop {
            match self.word.try_add_reader(self.max_readers) {
                ReaderAttempt::Acquired => return Ok(()),
                ReaderAttempt::BehindWriter => {
                    trace!("reader waiting for writer to release");
                    READ_CONTENDED.with(MetricEvent::observe_once);

                    self.writer_done
                        .try_or_wait(|| !self.word.is_writer_active())?;
                }
                ReaderAttempt::BehindReaderSlot => {
                    trace!(
                        max_readers = self.max_readers,
                        "reader count saturated; waiting for a free slot"
                    );
                    READ_SATURATED.with(MetricEvent::observe_once);

                    // A writer may claim the flag while we wait. That also ends this wait, so we
                    // go back to queueing behind the writer instead of sleeping on the wrong event.
                    self.reader_done
                        .try_or_wait(|| self.word.reader_slot_or_writer(self.max_readers))?;
                }
            }
        }
    }

    fn acquire_exclusive(&self) -> Result<(), ShutdownError> {
        self.ensure_running()?;

        if self.word.try_claim_idle() {
            return Ok(());
        }

        EXCLUSIVE_CONTENDED.with(MetricEvent::observe_once);

        match self.fairness {
            Fairness::WriterPriority => self.acquire_exclusive_writer_priority(),
            Fairness::ReaderPriority => self.acquire_exclusive_reader_priority(),
        }
    }

    fn acquire_exclusive_writer_priority(&self) -> Result<(), ShutdownError> {
        trace!("writer waiting to claim the writer flag");
        self.writer_done.try_or_wait(|| self.word.try_claim_flag())?;

        // From here on, no new reader can enter. If we bail out before the readers have drained,
        // the flag must be given back or everyone else would wait on it forever.
        let claim = scopeguard::guard(self, |semaphore| {
            debug!("exclusive acquisition abandoned while readers drained; releasing writer flag");
            semaphore.release_exclusive();
        });

        trace!(
            readers = self.word.reader_count(),
            "writer flag claimed; waiting for readers to drain"
        );
        self.reader_done.try_or_wait(|| self.word.readers_drained())?;

        ScopeGuard::into_inner(claim);
        Ok(())
    }

    fn acquire_exclusive_reader_priority(&self) -> Result<(), ShutdownError> {
        trace!(
            readers = self.word.reader_count(),
            "writer waiting for the semaphore to become idle"
        );

        self.reader_done.try_or_wait(|| self.word.try_claim_idle())
    }

    pub(crate) fn release_read(&self) {
        self.word.remove_reader();

        // Always notify: this wakes readers waiting for a slot as well as a writer waiting for
        // the count to reach zero.
        self.reader_done.notify();
    }

    pub(crate) fn release_exclusive(&self) {
        self.word.release_writer();
        self.writer_done.notify();

        // Reader-priority writers wait for idleness on the reader event.
        if self.fairness == Fairness::ReaderPriority {
            self.reader_done.notify();
        }
    }

    // Guards must not be handed out for a resource that is being torn down, even when the word
    // would admit the caller without waiting.
    fn ensure_running(&self) -> Result<(), ShutdownError> {
        if self.is_shutdown() {
            Err(ShutdownError)
        } else {
            Ok(())
        }
    }

    fn record_abort(kind: &'static str) {
        debug!(kind, "blocking acquisition aborted by shutdown");
        SHUTDOWN_ABORTED.with(MetricEvent::observe_once);
    }
}

impl Default for ReadExclusiveSemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReadExclusiveSemaphore {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("readers", &self.word.reader_count())
            .field("writer_active", &self.word.is_writer_active())
            .field("max_readers", &self.max_readers)
            .field("fairness", &self.fairness)
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}
