use thiserror::Error;

/// An [`Event`][crate::Event] that a blocking operation depended on has been shut down.
///
/// Returned by every blocking operation in this crate once the relevant event has observed
/// shutdown, whether the shutdown happened before the call or while the caller was waiting.
/// The library never retries or suppresses this error.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("failed to acquire: the event has been shut down")]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct ShutdownError;

/// A non-blocking exclusive acquisition found the semaphore in use.
///
/// Returned only by
/// [`ReadExclusiveSemaphore::exclusive_acquire_nonblocking()`][crate::ReadExclusiveSemaphore::exclusive_acquire_nonblocking],
/// after a single failed attempt. No retry is performed.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("failed to obtain exclusive access: the semaphore is held by readers or a writer")]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct AcquisitionError;
