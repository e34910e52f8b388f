//! Contention metrics for the semaphore.
//!
//! Each event counts entries into a slow path. The fast paths record nothing.

use nm::Event;

thread_local! {
    /// A reader found a writer holding or claiming the semaphore and had to wait.
    pub(crate) static READ_CONTENDED: Event = Event::builder()
        .name("read_exclusive_read_contended")
        .build();

    /// A reader found the reader count at capacity and had to wait for a free slot.
    pub(crate) static READ_SATURATED: Event = Event::builder()
        .name("read_exclusive_read_saturated")
        .build();

    /// A blocking writer could not go straight from idle to exclusive.
    pub(crate) static EXCLUSIVE_CONTENDED: Event = Event::builder()
        .name("read_exclusive_exclusive_contended")
        .build();

    /// A non-blocking exclusive acquisition was rejected.
    pub(crate) static EXCLUSIVE_REJECTED: Event = Event::builder()
        .name("read_exclusive_exclusive_rejected")
        .build();

    /// A blocking acquisition gave up because the semaphore was shut down.
    pub(crate) static SHUTDOWN_ABORTED: Event = Event::builder()
        .name("read_exclusive_shutdown_aborted")
        .build();
}
