use std::any::type_name;
use std::fmt;

use crate::ReadExclusiveSemaphore;

/// Shared access to a [`ReadExclusiveSemaphore`], released when dropped.
///
/// Obtained from [`ReadExclusiveSemaphore::read_acquire()`].
#[must_use = "the semaphore is released as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    semaphore: &'a ReadExclusiveSemaphore,
}

impl<'a> ReadGuard<'a> {
    /// The caller must have registered a reader in the semaphore's state word.
    pub(crate) const fn new(semaphore: &'a ReadExclusiveSemaphore) -> Self {
        Self { semaphore }
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.semaphore.release_read();
    }
}

impl fmt::Debug for ReadGuard<'_> {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("semaphore", self.semaphore)
            .finish()
    }
}

/// Exclusive access to a [`ReadExclusiveSemaphore`], released when dropped.
///
/// Obtained from [`ReadExclusiveSemaphore::exclusive_acquire_blocking()`] or
/// [`ReadExclusiveSemaphore::exclusive_acquire_nonblocking()`].
#[must_use = "the semaphore is released as soon as the guard is dropped"]
pub struct ExclusiveGuard<'a> {
    semaphore: &'a ReadExclusiveSemaphore,
}

impl<'a> ExclusiveGuard<'a> {
    /// The caller must hold the writer flag with all readers drained.
    pub(crate) const fn new(semaphore: &'a ReadExclusiveSemaphore) -> Self {
        Self { semaphore }
    }
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        self.semaphore.release_exclusive();
    }
}

impl fmt::Debug for ExclusiveGuard<'_> {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("semaphore", self.semaphore)
            .finish()
    }
}
