#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Blocking synchronization building blocks for threads:
//!
//! * [`Event`] - a notification primitive that is immune to spurious wakeups and can be shut down
//!   to fail every current and future wait with [`ShutdownError`].
//! * [`ReadExclusiveSemaphore`] - a reader/writer semaphore that admits many concurrent readers or
//!   one exclusive writer. Its state lives in a single packed atomic word, so the uncontended
//!   paths are lock-free. Contended callers block on [`Event`]s.
//!
//! # Acquiring the semaphore
//!
//! Every acquisition returns a guard that releases the semaphore when dropped, on every exit path
//! including panics:
//!
//! ```
//! use read_exclusive::{AcquisitionError, ReadExclusiveSemaphore};
//!
//! let semaphore = ReadExclusiveSemaphore::new();
//!
//! {
//!     let _a = semaphore.read_acquire().unwrap();
//!     let _b = semaphore.read_acquire().unwrap();
//!
//!     // Readers are active, so the fail-fast exclusive path refuses.
//!     assert!(matches!(
//!         semaphore.exclusive_acquire_nonblocking(),
//!         Err(AcquisitionError)
//!     ));
//! }
//!
//! let _exclusive = semaphore.exclusive_acquire_blocking().unwrap();
//! ```
//!
//! # Waiting for a condition
//!
//! [`Event::try_or_wait()`] is the building block for "wait until this becomes true":
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::thread;
//!
//! use read_exclusive::Event;
//!
//! let event = Event::new();
//! let items = AtomicUsize::new(0);
//!
//! thread::scope(|s| {
//!     s.spawn(|| {
//!         for _ in 0..3 {
//!             items.fetch_add(1, Ordering::Release);
//!             event.notify();
//!         }
//!     });
//!
//!     event
//!         .try_or_wait(|| items.load(Ordering::Acquire) == 3)
//!         .unwrap();
//! });
//! ```
//!
//! # Tearing down
//!
//! Shutting down an [`Event`] or a [`ReadExclusiveSemaphore`] fails every blocked caller with
//! [`ShutdownError`] instead of leaving it hanging. There are no timeouts; callers that need a
//! deadline can shut down from a timer thread.

mod builder;
mod error;
mod event;
mod guards;
mod metrics;
mod semaphore;
mod word;

pub use builder::*;
pub use error::*;
pub use event::*;
pub use guards::*;
pub use semaphore::*;
