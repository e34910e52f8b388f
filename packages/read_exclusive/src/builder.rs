use std::num::NonZero;

use crate::ReadExclusiveSemaphore;
use crate::word::MAX_READERS;

/// Decides who wins when a blocking writer competes with readers.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Fairness {
    /// A blocking writer claims the writer flag as soon as no other writer holds it, even while
    /// readers are active. New readers then wait behind the writer, while readers that were
    /// already in flight drain normally.
    ///
    /// Once a writer has claimed the flag it cannot be held off by new readers. Writers racing
    /// each other for the flag are not ordered.
    #[default]
    WriterPriority,

    /// A blocking writer only enters when there are no readers at all, in a single step from
    /// idle to exclusive.
    ///
    /// New readers keep entering while a writer waits, so a steady stream of readers can starve
    /// writers indefinitely. Use with caution.
    ReaderPriority,
}

/// Creates instances of [`ReadExclusiveSemaphore`].
///
/// Use [`ReadExclusiveSemaphore::builder()`] to create a new instance of this builder.
///
/// # Example
///
/// ```
/// use std::num::NonZero;
///
/// use read_exclusive::{Fairness, ReadExclusiveSemaphore};
///
/// let semaphore = ReadExclusiveSemaphore::builder()
///     .max_readers(NonZero::new(4).unwrap())
///     .fairness(Fairness::ReaderPriority)
///     .build();
///
/// assert_eq!(semaphore.max_readers(), 4);
/// ```
#[derive(Clone, Copy, Debug)]
#[must_use]
pub struct SemaphoreBuilder {
    max_readers: usize,
    fairness: Fairness,
}

impl SemaphoreBuilder {
    pub(crate) const fn new() -> Self {
        Self {
            max_readers: MAX_READERS,
            fairness: Fairness::WriterPriority,
        }
    }

    /// Sets the maximum number of readers that may hold the semaphore at the same time.
    ///
    /// Further readers wait until a slot frees up. The default is the largest count that can be
    /// represented, which is `usize::MAX >> 1`.
    ///
    /// # Panics
    ///
    /// Panics if `max_readers` is larger than `usize::MAX >> 1`.
    pub fn max_readers(self, max_readers: NonZero<usize>) -> Self {
        assert!(
            max_readers.get() <= MAX_READERS,
            "max_readers must not exceed {MAX_READERS}"
        );

        Self {
            max_readers: max_readers.get(),
            ..self
        }
    }

    /// Sets the policy for blocking writers competing with readers.
    ///
    /// The default is [`Fairness::WriterPriority`].
    pub fn fairness(self, fairness: Fairness) -> Self {
        Self { fairness, ..self }
    }

    /// Creates the semaphore.
    #[must_use]
    pub fn build(self) -> ReadExclusiveSemaphore {
        ReadExclusiveSemaphore::from_config(self.max_readers, self.fairness)
    }
}

impl Default for SemaphoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
