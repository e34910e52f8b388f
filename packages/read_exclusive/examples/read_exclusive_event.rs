//! Uses an event to wait for a condition that another thread makes true.
//!
//! Run with: `cargo run --example read_exclusive_event`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use read_exclusive::Event;

const JOBS: usize = 8;

fn main() {
    let finished = AtomicUsize::new(0);
    let changed = Event::new();

    thread::scope(|s| {
        for job in 0..JOBS {
            let finished = &finished;
            let changed = &changed;

            s.spawn(move || {
                println!("job {job} done");
                finished.fetch_add(1, Ordering::Release);
                changed.notify();
            });
        }

        changed
            .try_or_wait(|| finished.load(Ordering::Acquire) == JOBS)
            .unwrap();

        println!("all {JOBS} jobs done");
    });
}
