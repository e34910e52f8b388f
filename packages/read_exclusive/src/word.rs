//! The packed state word of a [`ReadExclusiveSemaphore`][crate::ReadExclusiveSemaphore].
//!
//! The word is a single `usize`. The top bit is the writer-active flag, all other bits hold the
//! number of readers currently holding (or draining from) the semaphore.
//!
//! The following logical states exist:
//!
//! * idle - flag clear, zero readers.
//! * reading - flag clear, one or more readers.
//! * writer pending - flag set, one or more readers still draining. No new reader may enter.
//! * writer held - flag set, zero readers.
//!
//! The word is only ever modified by atomic read-modify-write operations, never under a lock.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Set while a writer holds or is claiming exclusive access.
pub(crate) const WRITER_FLAG: usize = 1 << (usize::BITS - 1);

/// The bits of the word that hold the reader count.
pub(crate) const READER_MASK: usize = !WRITER_FLAG;

/// The largest reader count the word can represent.
pub(crate) const MAX_READERS: usize = READER_MASK;

/// Outcome of a single attempt to register a reader.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ReaderAttempt {
    /// The reader count was incremented.
    Acquired,

    /// A writer has claimed the flag; wait for it to release.
    BehindWriter,

    /// The reader count is at capacity; wait for a reader to release.
    BehindReaderSlot,
}

#[derive(Debug)]
pub(crate) struct StateWord {
    value: AtomicUsize,
}

impl StateWord {
    pub(crate) const fn new() -> Self {
        Self {
            value: AtomicUsize::new(0),
        }
    }

    /// Attempts to add one reader, retrying only while other readers race us.
    pub(crate) fn try_add_reader(&self, max_readers: usize) -> ReaderAttempt {
        let mut current = self.value.load(Ordering::Relaxed);

        loop {
            if current & WRITER_FLAG != 0 {
                return ReaderAttempt::BehindWriter;
            }

            // With the flag clear, the whole word is the reader count.
            if current >= max_readers {
                return ReaderAttempt::BehindReaderSlot;
            }

            // Acquire on success pairs with the Release in writer release, so the reader sees
            // everything the previous writer did.
            match self.value.compare_exchange_weak(
                current,
                current.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return ReaderAttempt::Acquired,
                Err(actual) => current = actual,
            }
        }
    }

    /// Removes one reader.
    pub(crate) fn remove_reader(&self) {
        let previous = self.value.fetch_sub(1, Ordering::Release);

        debug_assert!(
            previous & READER_MASK != 0,
            "released a read guard that was never acquired"
        );
    }

    /// Whether a reader could be admitted now, or a writer has shown up and the caller must go
    /// back to waiting on the writer instead.
    pub(crate) fn reader_slot_or_writer(&self, max_readers: usize) -> bool {
        let current = self.value.load(Ordering::Relaxed);

        current & WRITER_FLAG != 0 || current & READER_MASK < max_readers
    }

    /// Single attempt to go from idle straight to writer held.
    pub(crate) fn try_claim_idle(&self) -> bool {
        self.value
            .compare_exchange(0, WRITER_FLAG, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Sets the writer flag if no other writer has it, regardless of the reader count.
    pub(crate) fn try_claim_flag(&self) -> bool {
        self.value
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |current| {
                (current & WRITER_FLAG == 0).then_some(current | WRITER_FLAG)
            })
            .is_ok()
    }

    /// Whether all readers have drained.
    pub(crate) fn readers_drained(&self) -> bool {
        // Acquire pairs with the Release in `remove_reader()`, so the writer sees everything the
        // departing readers did.
        self.value.load(Ordering::Acquire) & READER_MASK == 0
    }

    /// Clears the writer flag.
    ///
    /// Readers may still be present if the writer is abandoning a claim before they drained,
    /// so only the flag bit is touched.
    pub(crate) fn release_writer(&self) {
        let previous = self.value.fetch_and(READER_MASK, Ordering::Release);

        debug_assert!(
            previous & WRITER_FLAG != 0,
            "released an exclusive guard that was never acquired"
        );
    }

    pub(crate) fn reader_count(&self) -> usize {
        self.value.load(Ordering::Relaxed) & READER_MASK
    }

    pub(crate) fn is_writer_active(&self) -> bool {
        self.value.load(Ordering::Relaxed) & WRITER_FLAG != 0
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn layout_partitions_the_word() {
        assert_eq!(WRITER_FLAG & READER_MASK, 0);
        assert_eq!(WRITER_FLAG | READER_MASK, usize::MAX);
        assert_eq!(WRITER_FLAG.count_ones(), 1);
        assert_eq!(MAX_READERS, usize::MAX >> 1);
    }

    #[test]
    fn readers_come_and_go() {
        let word = StateWord::new();

        assert_eq!(word.try_add_reader(MAX_READERS), ReaderAttempt::Acquired);
        assert_eq!(word.try_add_reader(MAX_READERS), ReaderAttempt::Acquired);
        assert_eq!(word.reader_count(), 2);

        word.remove_reader();
        assert_eq!(word.reader_count(), 1);

        word.remove_reader();
        assert_eq!(word.reader_count(), 0);
    }

    #[test]
    fn saturated_count_is_reported_not_exceeded() {
        let word = StateWord::new();

        assert_eq!(word.try_add_reader(2), ReaderAttempt::Acquired);
        assert_eq!(word.try_add_reader(2), ReaderAttempt::Acquired);
        assert_eq!(word.try_add_reader(2), ReaderAttempt::BehindReaderSlot);
        assert_eq!(word.reader_count(), 2);
        assert!(!word.reader_slot_or_writer(2));

        word.remove_reader();
        assert!(word.reader_slot_or_writer(2));
    }

    #[test]
    fn flag_blocks_new_readers() {
        let word = StateWord::new();

        assert!(word.try_claim_flag());
        assert_eq!(word.try_add_reader(MAX_READERS), ReaderAttempt::BehindWriter);
        assert_eq!(word.reader_count(), 0);
    }

    #[test]
    fn flag_can_be_claimed_while_readers_drain() {
        let word = StateWord::new();
        word.try_add_reader(MAX_READERS);

        assert!(!word.try_claim_idle());
        assert!(word.try_claim_flag());
        assert!(!word.try_claim_flag());
        assert!(!word.readers_drained());
        assert!(word.is_writer_active());

        word.remove_reader();
        assert!(word.readers_drained());
    }

    #[test]
    fn idle_claim_is_exclusive() {
        let word = StateWord::new();

        assert!(word.try_claim_idle());
        assert!(!word.try_claim_idle());
        assert!(!word.try_claim_flag());

        word.release_writer();
        assert!(!word.is_writer_active());
        assert!(word.try_claim_idle());
    }

    #[test]
    fn abandoned_claim_keeps_draining_readers() {
        let word = StateWord::new();
        word.try_add_reader(MAX_READERS);
        word.try_claim_flag();

        word.release_writer();

        assert!(!word.is_writer_active());
        assert_eq!(word.reader_count(), 1);
    }

    #[test]
    fn writer_flag_satisfies_slot_wait() {
        let word = StateWord::new();
        word.try_add_reader(1);
        word.try_claim_flag();

        assert!(word.reader_slot_or_writer(1));
    }
}
