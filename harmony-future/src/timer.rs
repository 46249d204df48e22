//! Shared delay timer.
//!
//! One background thread serves every delayed future and observable in the
//! process. Jobs run on the timer thread, so they should only hand work off
//! (the delay combinators submit to an executor).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::{lock, Job};

struct Entry {
    deadline: Instant,
    seq: u64,
    job: Job,
}

// Reversed so the BinaryHeap pops the earliest deadline first; `seq` keeps
// equal deadlines in scheduling order.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Entry {}

#[derive(Default)]
struct Queue {
    entries: BinaryHeap<Entry>,
    next_seq: u64,
}

struct Timer {
    queue: Arc<(Mutex<Queue>, Condvar)>,
    running: bool,
}

static TIMER: Lazy<Timer> = Lazy::new(Timer::start);

impl Timer {
    fn start() -> Self {
        let queue = Arc::new((Mutex::new(Queue::default()), Condvar::new()));
        let worker_queue = Arc::clone(&queue);
        let running = thread::Builder::new()
            .name("harmony.timer".to_string())
            .spawn(move || run(&worker_queue))
            .map_err(|e| tracing::error!(error = %e, "failed to start the delay timer thread"))
            .is_ok();
        Self { queue, running }
    }
}

fn run(queue: &(Mutex<Queue>, Condvar)) {
    let (entries, wakeup) = queue;
    let mut guard = lock(entries);
    loop {
        let next_deadline = guard.entries.peek().map(|entry| entry.deadline);
        match next_deadline {
            None => {
                guard = wakeup.wait(guard).unwrap_or_else(PoisonError::into_inner);
            }
            Some(deadline) => {
                let now = Instant::now();
                if deadline > now {
                    guard = wakeup
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                    continue;
                }
                if let Some(entry) = guard.entries.pop() {
                    drop(guard);
                    if panic::catch_unwind(AssertUnwindSafe(entry.job)).is_err() {
                        tracing::error!("delayed job panicked");
                    }
                    guard = lock(entries);
                }
            }
        }
    }
}

/// Run `job` on the timer thread once `delay` has elapsed.
///
/// If the timer thread could not be started, the job runs immediately on the
/// calling thread.
pub(crate) fn schedule(delay: Duration, job: Job) {
    let timer = &*TIMER;
    if !timer.running {
        tracing::warn!(?delay, "delay timer unavailable, running job without delay");
        job();
        return;
    }

    let (entries, wakeup) = &*timer.queue;
    {
        let mut queue = lock(entries);
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.entries.push(Entry {
            deadline: Instant::now() + delay,
            seq,
            job,
        });
    }
    wakeup.notify_one();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_jobs_fire_in_deadline_order() {
        let (tx, rx) = mpsc::channel();
        for (label, delay_ms) in [("late", 150u64), ("early", 10), ("middle", 70)] {
            let tx = tx.clone();
            schedule(
                Duration::from_millis(delay_ms),
                Box::new(move || {
                    let _ = tx.send(label);
                }),
            );
        }
        let order: Vec<_> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(order, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_zero_delay_fires() {
        let (tx, rx) = mpsc::channel();
        schedule(
            Duration::ZERO,
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
