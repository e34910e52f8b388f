//! Multithreaded tests of the reader-exclusive semaphore protocols.
//!
//! These tests spawn many threads, so they are ignored under Miri.

#![allow(
    clippy::arithmetic_side_effects,
    reason = "counters in tests are far from overflowing"
)]

use std::num::NonZero;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;

use new_zealand::nz;
use read_exclusive::{AcquisitionError, Fairness, ReadExclusiveSemaphore, ShutdownError};
use testing::{spawn_gated, wait_until, with_watchdog};

const ITERATIONS: usize = 200;

/// Tracks who is inside the protected section and fails loudly if exclusion is ever violated.
#[derive(Debug, Default)]
struct Occupancy {
    readers: AtomicUsize,
    writers: AtomicUsize,
    value: AtomicU64,
}

impl Occupancy {
    fn write(&self) {
        let writers_before = self.writers.fetch_add(1, Ordering::SeqCst);
        assert_eq!(writers_before, 0, "two writers inside at once");
        assert_eq!(
            self.readers.load(Ordering::SeqCst),
            0,
            "writer inside with readers"
        );

        // Deliberately a non-atomic read-modify-write: any overlap loses an update.
        let current = self.value.load(Ordering::Relaxed);
        thread::yield_now();
        self.value.store(current + 1, Ordering::Relaxed);

        self.writers.fetch_sub(1, Ordering::SeqCst);
    }

    fn read(&self) {
        self.readers.fetch_add(1, Ordering::SeqCst);
        assert_eq!(
            self.writers.load(Ordering::SeqCst),
            0,
            "reader inside with a writer"
        );

        let before = self.value.load(Ordering::Relaxed);
        thread::yield_now();
        let after = self.value.load(Ordering::Relaxed);
        assert_eq!(before, after, "value changed under a read guard");

        self.readers.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_mixed_workload(semaphore: ReadExclusiveSemaphore, readers: usize, writers: usize) {
    with_watchdog(move || {
        let occupancy = Occupancy::default();

        spawn_gated(readers + writers, |index| {
            for _ in 0..ITERATIONS {
                if index < writers {
                    let _exclusive = semaphore.exclusive_acquire_blocking().unwrap();
                    occupancy.write();
                } else {
                    let _shared = semaphore.read_acquire().unwrap();
                    occupancy.read();
                }
            }
        });

        assert_eq!(
            occupancy.value.load(Ordering::Relaxed),
            u64::try_from(writers * ITERATIONS).unwrap()
        );
        assert_eq!(semaphore.reader_count(), 0);
        assert!(!semaphore.is_writer_active());
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn readers_and_writers_never_overlap() {
    run_mixed_workload(ReadExclusiveSemaphore::new(), 6, 3);
}

#[cfg_attr(miri, ignore)]
#[test]
fn readers_and_writers_never_overlap_with_reader_priority() {
    let semaphore = ReadExclusiveSemaphore::builder()
        .fairness(Fairness::ReaderPriority)
        .build();

    // Few readers so that writers are not starved for the duration of the test.
    run_mixed_workload(semaphore, 2, 3);
}

#[cfg_attr(miri, ignore)]
#[test]
fn writers_only_are_serialized() {
    run_mixed_workload(ReadExclusiveSemaphore::new(), 0, 8);
}

#[cfg_attr(miri, ignore)]
#[test]
fn readers_and_writers_never_overlap_at_small_capacity() {
    let semaphore = ReadExclusiveSemaphore::builder()
        .max_readers(nz!(2))
        .build();

    run_mixed_workload(semaphore, 8, 2);
}

#[cfg_attr(miri, ignore)]
#[test]
fn reader_count_never_exceeds_capacity() {
    with_watchdog(|| {
        const CAPACITY: usize = 3;
        const THREADS: usize = 12;

        let semaphore = ReadExclusiveSemaphore::builder()
            .max_readers(NonZero::new(CAPACITY).unwrap())
            .build();
        let inside = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        spawn_gated(THREADS, |_| {
            for _ in 0..ITERATIONS {
                let _shared = semaphore.read_acquire().unwrap();

                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                assert!(semaphore.reader_count() <= CAPACITY);
                thread::yield_now();
                inside.fetch_sub(1, Ordering::SeqCst);
            }
        });

        assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
        assert_eq!(semaphore.reader_count(), 0);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn exactly_one_nonblocking_winner() {
    with_watchdog(|| {
        const THREADS: usize = 16;

        let semaphore = ReadExclusiveSemaphore::new();

        // Every result, including the winning guard, lives until all threads have tried.
        let results = spawn_gated(THREADS, |_| semaphore.exclusive_acquire_nonblocking());

        let winners = results.iter().filter(|result| result.is_ok()).count();
        let losers = results
            .iter()
            .filter(|result| matches!(result, Err(AcquisitionError)))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(losers, THREADS - 1);

        drop(results);
        assert!(!semaphore.is_writer_active());
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn blocked_reader_sees_completed_write() {
    with_watchdog(|| {
        let semaphore = ReadExclusiveSemaphore::new();
        let counter = AtomicU64::new(0);
        let reader_started = AtomicBool::new(false);

        // Held by "thread A" before the reader starts.
        let exclusive = semaphore.exclusive_acquire_blocking().unwrap();

        thread::scope(|s| {
            let reader = s.spawn(|| {
                reader_started.store(true, Ordering::Release);
                let _shared = semaphore.read_acquire().unwrap();
                counter.load(Ordering::Relaxed)
            });

            wait_until(|| reader_started.load(Ordering::Acquire));

            counter.store(counter.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
            thread::yield_now();
            drop(exclusive);

            assert_eq!(reader.join().unwrap(), 1);
        });
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn shutdown_releases_every_blocked_acquirer() {
    with_watchdog(|| {
        const READERS: usize = 4;
        const WRITERS: usize = 4;

        let semaphore = ReadExclusiveSemaphore::new();
        let exclusive = semaphore.exclusive_acquire_blocking().unwrap();
        let started = AtomicUsize::new(0);

        thread::scope(|s| {
            let mut handles = Vec::with_capacity(READERS + WRITERS);

            for _ in 0..READERS {
                handles.push(s.spawn(|| {
                    started.fetch_add(1, Ordering::SeqCst);
                    semaphore.read_acquire().map(drop)
                }));
            }

            for _ in 0..WRITERS {
                handles.push(s.spawn(|| {
                    started.fetch_add(1, Ordering::SeqCst);
                    semaphore.exclusive_acquire_blocking().map(drop)
                }));
            }

            wait_until(|| started.load(Ordering::SeqCst) == READERS + WRITERS);
            semaphore.shutdown();

            for handle in handles {
                assert_eq!(handle.join().unwrap(), Err(ShutdownError));
            }
        });

        // The guard that was live before shutdown still releases cleanly.
        drop(exclusive);
        assert!(!semaphore.is_writer_active());
        assert_eq!(semaphore.reader_count(), 0);
    });
}

#[test]
fn shut_down_semaphore_hands_out_no_blocking_guards() {
    let semaphore = ReadExclusiveSemaphore::new();
    semaphore.shutdown();

    assert_eq!(semaphore.read_acquire().map(drop), Err(ShutdownError));
    assert_eq!(
        semaphore.exclusive_acquire_blocking().map(drop),
        Err(ShutdownError)
    );

    assert_eq!(semaphore.reader_count(), 0);
    assert!(!semaphore.is_writer_active());
}

#[cfg_attr(miri, ignore)]
#[test]
fn saturated_readers_yield_to_pending_writer() {
    with_watchdog(|| {
        let semaphore = ReadExclusiveSemaphore::builder()
            .max_readers(nz!(1))
            .build();
        let first = semaphore.read_acquire().unwrap();
        let write_done = AtomicBool::new(false);
        let second_started = AtomicBool::new(false);

        thread::scope(|s| {
            // Waits for a free reader slot.
            let second = s.spawn(|| {
                second_started.store(true, Ordering::Release);
                let _shared = semaphore.read_acquire().unwrap();
                write_done.load(Ordering::Relaxed)
            });

            wait_until(|| second_started.load(Ordering::Acquire));

            // Claims the flag while the first reader is still inside.
            s.spawn(|| {
                let _exclusive = semaphore.exclusive_acquire_blocking().unwrap();
                write_done.store(true, Ordering::Relaxed);
            });

            wait_until(|| semaphore.is_writer_active());
            drop(first);

            // The freed slot went to the writer first.
            assert!(second.join().unwrap());
        });

        assert_eq!(semaphore.reader_count(), 0);
    });
}
