use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Task run by a repeating timer.
pub type TaskCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Timer surface of the host event loop.
///
/// The elapsed tick, chunk requests and the render loop all run through
/// this, so every suspension point is explicit and cancellable.
pub trait Scheduler: Send + Sync {
    fn schedule_repeating(&self, interval: Duration, task: TaskCallback) -> TimerId;

    /// Cancel a timer. Cancelling an unknown or already cancelled timer is a no-op.
    fn cancel(&self, id: TimerId);
}

struct Timer {
    interval: Duration,
    next_due: Duration,
    task: TaskCallback,
}

struct SchedulerInner {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<TimerId, Timer>,
}

/// Deterministic scheduler driven by the host event loop.
///
/// Time only moves when `advance` is called. Tasks run on the calling thread
/// with no internal lock held, so a task may schedule or cancel timers.
pub struct ManualScheduler {
    inner: Mutex<SchedulerInner>,
}

impl ManualScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(SchedulerInner {
                now: Duration::ZERO,
                next_id: 1,
                timers: BTreeMap::new(),
            }),
        })
    }

    /// Move the clock forward by `by`, firing every timer that comes due in
    /// order. Returns the number of task invocations.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.inner.lock().now + by;
        let mut fired = 0;

        loop {
            let task = {
                let mut inner = self.inner.lock();
                let due = inner
                    .timers
                    .iter()
                    .filter(|(_, timer)| timer.next_due <= target)
                    .min_by_key(|(id, timer)| (timer.next_due, **id))
                    .map(|(id, _)| *id);

                let Some(id) = due else {
                    inner.now = target;
                    break;
                };

                let Some(timer) = inner.timers.get_mut(&id) else {
                    break;
                };
                let fire_at = timer.next_due;
                timer.next_due += timer.interval;
                let task = Arc::clone(&timer.task);
                inner.now = fire_at;
                task
            };

            task();
            fired += 1;
        }

        fired
    }

    /// Time elapsed since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }

    pub fn active_timers(&self) -> usize {
        self.inner.lock().timers.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, interval: Duration, task: TaskCallback) -> TimerId {
        let interval = interval.max(Duration::from_millis(1));
        let mut inner = self.inner.lock();
        let id = TimerId(inner.next_id);
        inner.next_id += 1;
        let next_due = inner.now + interval;
        inner.timers.insert(
            id,
            Timer {
                interval,
                next_due,
                task,
            },
        );
        id
    }

    fn cancel(&self, id: TimerId) {
        self.inner.lock().timers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, TaskCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn fires_once_per_interval() {
        let scheduler = ManualScheduler::new();
        let (count, task) = counter();
        scheduler.schedule_repeating(Duration::from_secs(1), task);

        scheduler.advance(Duration::from_millis(999));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        scheduler.advance(Duration::from_millis(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.advance(Duration::from_secs(3));
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let scheduler = ManualScheduler::new();
        let (count, task) = counter();
        let id = scheduler.schedule_repeating(Duration::from_secs(1), task);

        scheduler.advance(Duration::from_secs(2));
        scheduler.cancel(id);
        scheduler.advance(Duration::from_secs(5));

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.active_timers(), 0);
    }

    #[test]
    fn task_can_cancel_itself() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<TimerId>>> = Arc::new(Mutex::new(None));

        let sched = Arc::clone(&scheduler);
        let c = Arc::clone(&count);
        let s = Arc::clone(&slot);
        let id = scheduler.schedule_repeating(
            Duration::from_millis(10),
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *s.lock() {
                    sched.cancel(id);
                }
            }),
        );
        *slot.lock() = Some(id);

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timers_fire_in_due_order() {
        let scheduler = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (label, ms) in [("slow", 30u64), ("fast", 10)] {
            let o = Arc::clone(&order);
            scheduler.schedule_repeating(
                Duration::from_millis(ms),
                Arc::new(move || o.lock().push(label)),
            );
        }

        scheduler.advance(Duration::from_millis(30));
        assert_eq!(*order.lock(), vec!["fast", "fast", "slow", "fast"]);
        assert_eq!(scheduler.now(), Duration::from_millis(30));
    }
}
