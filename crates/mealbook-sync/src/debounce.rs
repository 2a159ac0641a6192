//! Single-slot debounce task
//!
//! One pending action owned by the coordinator: scheduling replaces any
//! previously scheduled run (trailing debounce), so a burst of mutations
//! produces exactly one push after the quiet interval.
//!
//! Replacement and cancel only reach a run still waiting out its interval.
//! Once the interval elapses the task body is detached and runs to
//! completion; it must never be aborted mid-flight, or state it owns
//! (like an in-flight-write flag) would be left dangling.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Debounced task slot
pub struct Debouncer {
    delay: Duration,
    slot: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Mutex::new(None),
        }
    }

    /// Schedule `task` to run after the quiet interval, replacing any run
    /// still waiting out its own interval
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detach the body: the slot only ever aborts the sleep above,
            // never a task that has started running
            tokio::spawn(task);
        });
        self.replace(Some(handle));
    }

    /// Drop any run still waiting out its interval
    pub fn cancel(&self) {
        self.replace(None);
    }

    fn replace(&self, new: Option<JoinHandle<()>>) {
        let mut slot = self.slot.lock().unwrap();
        if let Some(old) = slot.take() {
            old.abort();
        }
        *slot = new;
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_pending_run() {
        let debouncer = Debouncer::new(Duration::from_millis(600));
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let fired = fired.clone();
            debouncer.schedule(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_run() {
        let debouncer = Debouncer::new(Duration::from_millis(600));
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        debouncer.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_never_aborts_a_run_already_started() {
        let debouncer = Debouncer::new(Duration::from_millis(600));
        let fired = Arc::new(AtomicUsize::new(0));

        // A slow body: starts at 600, finishes at 1100
        let counter = fired.clone();
        debouncer.schedule(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Reschedule at 700, while the first body is mid-flight
        tokio::time::sleep(Duration::from_millis(700)).await;
        let counter = fired.clone();
        debouncer.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
