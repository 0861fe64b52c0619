/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A single-shot, resettable timer backed by one auxiliary thread.
//!
//! The scheduler arms the timer with [set_timeout_in](Timer::set_timeout_in);
//! when the deadline passes, the timer thread runs the callback once and goes
//! back to sleep. Re-arming replaces any pending deadline. [stop](Timer::stop)
//! cancels any pending wake-up and joins the thread.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

struct TimerState {
    deadline: Option<Instant>,
    stopped: bool,
}

struct Shared {
    state: Mutex<TimerState>,
    cond: Condvar,
}

pub struct Timer {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    /// Spawns the timer thread. `callback` runs on that thread each time an
    /// armed deadline passes.
    pub fn new(callback: Box<dyn Fn() + Send>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(TimerState {
                deadline: None,
                stopped: false,
            }),
            cond: Condvar::new(),
        });

        let thread_shared = shared.clone();
        let handle = std::thread::spawn(move || loop {
            let mut state = thread_shared.state.lock();
            if state.stopped {
                return;
            }
            match state.deadline {
                None => {
                    thread_shared.cond.wait(&mut state);
                }
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        state.deadline = None;
                        drop(state);
                        callback();
                    } else {
                        let _ = thread_shared.cond.wait_until(&mut state, deadline);
                    }
                }
            }
        });

        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Arms the timer to fire once, `duration` from now. Replaces any pending
    /// deadline.
    pub fn set_timeout_in(&self, duration: Duration) {
        let mut state = self.shared.state.lock();
        state.deadline = Instant::now().checked_add(duration);
        self.shared.cond.notify_one();
    }

    /// Disarms any pending deadline without stopping the thread.
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        state.deadline = None;
        self.shared.cond.notify_one();
    }

    /// Cancels any pending wake-up and joins the timer thread. Must not be
    /// called while holding a lock the callback acquires.
    pub fn stop(mut self) {
        {
            let mut state = self.shared.state.lock();
            state.stopped = true;
            self.shared.cond.notify_one();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fires_once_after_the_deadline() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let timer = Timer::new(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        timer.set_timeout_in(Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        timer.stop();
    }

    #[test]
    fn cancel_prevents_the_callback() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let timer = Timer::new(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        timer.set_timeout_in(Duration::from_millis(50));
        timer.cancel();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        timer.stop();
    }

    #[test]
    fn stop_joins_cleanly_with_a_pending_deadline() {
        let timer = Timer::new(Box::new(|| {}));
        timer.set_timeout_in(Duration::from_secs(3600));
        timer.stop();
    }
}
