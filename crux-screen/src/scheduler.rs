//! Deferred execution of screen callbacks.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::time::Duration;

pub type Task = Box<dyn FnOnce()>;

pub trait Scheduler {
    /// Run `task` once `delay` has elapsed. A zero delay defers the task until
    /// the currently running code has returned.
    fn schedule(&self, delay: Duration, task: Task);
}

struct Pending {
    due: Duration,
    seq: u64,
    task: Task,
}

/// Scheduler driven by a virtual clock, advanced explicitly.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    next_seq: Cell<u64>,
    queue: RefCell<Vec<Pending>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now.get()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Move the clock forward by `by`, running every task that falls due,
    /// including tasks scheduled by those tasks. Returns the number run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now.get() + by;
        let mut ran = 0;
        while let Some(pending) = self.pop_due(Some(target)) {
            self.now.set(pending.due.max(self.now.get()));
            (pending.task)();
            ran += 1;
        }
        self.now.set(target);
        ran
    }

    /// Run tasks in due order until none is left. Returns the number run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(pending) = self.pop_due(None) {
            self.now.set(pending.due.max(self.now.get()));
            (pending.task)();
            ran += 1;
        }
        ran
    }

    /// Removes the earliest task, if it is due by `limit`. The queue is not
    /// borrowed while the task runs.
    fn pop_due(&self, limit: Option<Duration>) -> Option<Pending> {
        let mut queue = self.queue.borrow_mut();
        let index = queue
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)?;
        if limit.is_some_and(|limit| queue[index].due > limit) {
            return None;
        }
        Some(queue.remove(index))
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.queue.borrow_mut().push(Pending {
            due: self.now.get() + delay,
            seq,
            task,
        });
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now.get())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Runs tasks on the current tokio `LocalSet`.
///
/// Scheduling outside a `LocalSet` panics, as `tokio::task::spawn_local` does.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTaskScheduler;

impl LocalTaskScheduler {
    pub fn new() -> Self {
        LocalTaskScheduler
    }
}

impl Scheduler for LocalTaskScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        tokio::task::spawn_local(async move {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
            task();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_tasks_run_in_due_order() {
        let scheduler = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for (delay, name) in [(5, "late"), (1, "early"), (1, "early-second")] {
            let log = Rc::clone(&log);
            scheduler.schedule(
                Duration::from_millis(delay),
                Box::new(move || log.borrow_mut().push(name)),
            );
        }

        assert_eq!(scheduler.advance(Duration::from_millis(1)), 2);
        assert_eq!(*log.borrow(), vec!["early", "early-second"]);
        assert_eq!(scheduler.run_until_idle(), 1);
        assert_eq!(*log.borrow(), vec!["early", "early-second", "late"]);
    }

    #[test]
    fn test_nested_scheduling() {
        let scheduler = Rc::new(ManualScheduler::new());
        let hit = Rc::new(Cell::new(false));

        let inner_scheduler = Rc::clone(&scheduler);
        let inner_hit = Rc::clone(&hit);
        scheduler.schedule(
            Duration::from_millis(1),
            Box::new(move || {
                inner_scheduler.schedule(Duration::ZERO, Box::new(move || inner_hit.set(true)));
            }),
        );

        assert_eq!(scheduler.advance(Duration::ZERO), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(1)), 2);
        assert!(hit.get());
        assert_eq!(scheduler.pending(), 0);
    }
}
