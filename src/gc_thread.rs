//! The group-commit background thread.
//!
//! Grounded on `rdms::thread::Thread`'s gen-server discipline: own a
//! `JoinHandle`, and make dropping the owner join it. A `ready` flag
//! (spec §5: "the single cancellation mechanism for background threads")
//! is the only way to stop the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::error;

/// Owns a background thread that calls `tick` every `interval` until
/// dropped. Dropping clears `ready` and joins the thread, so the loop is
/// guaranteed to stop on every exit path, including panics in the owner.
pub struct GcThread {
    ready: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl GcThread {
    pub fn spawn<F>(interval: Duration, mut tick: F) -> GcThread
    where
        F: FnMut() + Send + 'static,
    {
        let ready = Arc::new(AtomicBool::new(true));
        let loop_ready = Arc::clone(&ready);
        let handle = thread::spawn(move || {
            while loop_ready.load(Ordering::Relaxed) {
                tick();
                thread::sleep(interval);
            }
        });
        GcThread {
            ready,
            handle: Some(handle),
        }
    }
}

impl Drop for GcThread {
    fn drop(&mut self) {
        self.ready.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("gc thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn ticks_until_dropped() {
        let count = Arc::new(AtomicUsize::new(0));
        let tick_count = Arc::clone(&count);
        let gc = GcThread::spawn(Duration::from_millis(5), move || {
            tick_count.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(50));
        drop(gc);
        let observed = count.load(Ordering::SeqCst);
        assert!(observed >= 2, "expected several ticks, saw {}", observed);
    }
}
