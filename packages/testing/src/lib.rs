#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing multithreaded code in the `read_exclusive` workspace.

use std::panic;
use std::sync::{Barrier, mpsc};
use std::thread;
use std::time::{Duration, Instant};

/// Runs a test with a timeout to prevent infinite hangs.
///
/// Synchronization bugs tend to show up as deadlocks, so every multithreaded test should run
/// under this. If the test takes longer than the timeout to complete, the test fails instead of
/// hanging the build.
///
/// The timeout is 10 seconds under normal conditions and 60 seconds under
/// Miri, where thread synchronization primitives are significantly slower.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog
/// is disabled and the test function is executed directly. This allows mutation
/// testing to properly detect hanging mutations.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode).
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// with_watchdog(|| {
///     // Your test code here
///     assert_eq!(2 + 2, 4);
/// });
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // If this fails, the receiver has already timed out.
        drop(tx.send(result));
    });

    let timeout = watchdog_timeout();

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            if let Err(payload) = test_handle.join() {
                panic::resume_unwind(payload);
            }

            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded {timeout:?} timeout; probable deadlock");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("test thread disconnected unexpectedly"),
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

/// Runs `f` on `threads` new threads that all start at the same moment.
///
/// Each thread receives its index in `0..threads`. Returns the results in index order once every
/// thread has finished. A panic on any thread is propagated to the caller.
///
/// # Example
///
/// ```rust
/// use testing::spawn_gated;
///
/// let squares = spawn_gated(4, |index| index * index);
/// assert_eq!(squares, vec![0, 1, 4, 9]);
/// ```
pub fn spawn_gated<F, R>(threads: usize, f: F) -> Vec<R>
where
    F: Fn(usize) -> R + Sync,
    R: Send,
{
    let start = Barrier::new(threads);

    thread::scope(|s| {
        let mut handles = Vec::with_capacity(threads);

        for index in 0..threads {
            let start = &start;
            let f = &f;

            handles.push(s.spawn(move || {
                start.wait();
                f(index)
            }));
        }

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| panic::resume_unwind(payload))
            })
            .collect()
    })
}

/// Polls `condition` until it returns `true`.
///
/// Used to wait for another thread to reach a point that is only observable through shared
/// state, such as a waiter having claimed a flag before it blocks.
///
/// # Panics
///
/// Panics if the condition does not become true within the watchdog timeout.
pub fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now()
        .checked_add(watchdog_timeout())
        .expect("deadline is a few seconds from now and cannot overflow");

    while !condition() {
        assert!(
            Instant::now() < deadline,
            "condition did not become true before the deadline"
        );

        thread::sleep(Duration::from_millis(1));
    }
}

fn watchdog_timeout() -> Duration {
    // Miri is dramatically slower for thread synchronization, so we use a
    // longer timeout to avoid false positives while still catching real hangs.
    if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    }
}
