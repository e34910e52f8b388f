//! Protects a shared configuration snapshot with a reader-exclusive semaphore.
//!
//! Several reader threads repeatedly look at the snapshot while one writer thread updates it.
//! At the end, the semaphore is shut down to release a reader that is still waiting.
//!
//! Run with: `cargo run --example read_exclusive_basic`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use read_exclusive::{ReadExclusiveSemaphore, ShutdownError};

fn main() {
    let semaphore = ReadExclusiveSemaphore::new();
    let generation = AtomicU64::new(0);

    thread::scope(|s| {
        for reader in 0..3 {
            let semaphore = &semaphore;
            let generation = &generation;

            s.spawn(move || {
                for _ in 0..5 {
                    let _shared = semaphore.read_acquire().unwrap();
                    println!(
                        "reader {reader} sees generation {}",
                        generation.load(Ordering::Relaxed)
                    );
                    thread::sleep(Duration::from_millis(2));
                }
            });
        }

        s.spawn(|| {
            for _ in 0..3 {
                let _exclusive = semaphore.exclusive_acquire_blocking().unwrap();
                let next = generation.load(Ordering::Relaxed).wrapping_add(1);
                generation.store(next, Ordering::Relaxed);
                println!("writer published generation {next}");
                thread::sleep(Duration::from_millis(5));
            }
        });
    });

    // Teardown: a reader blocked behind a writer is released with an error instead of hanging.
    let exclusive = semaphore.exclusive_acquire_nonblocking().unwrap();

    thread::scope(|s| {
        let blocked = s.spawn(|| semaphore.read_acquire().map(drop));

        thread::sleep(Duration::from_millis(10));
        semaphore.shutdown();

        match blocked.join().unwrap() {
            Err(ShutdownError) => println!("blocked reader released by shutdown"),
            Ok(()) => unreachable!("the writer was still holding the semaphore"),
        }
    });

    drop(exclusive);
}
