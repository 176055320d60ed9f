use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

// Intervals that fell behind fire at most this many times per poll.
const MAX_CATCH_UP: usize = 64;
const MIN_PERIOD: Duration = Duration::from_millis(1);

pub trait Clock {
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug, Clone, Copy)]
enum Trigger {
    NextTick,
    At(Duration),
    Every { next: Duration, period: Duration },
}

#[derive(Debug)]
struct Entry<T> {
    id: TaskId,
    trigger: Trigger,
    task: T,
}

#[derive(Debug)]
pub struct Scheduler<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
    ready: VecDeque<(TaskId, T)>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
            ready: VecDeque::new(),
        }
    }
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_tick(&mut self, task: T) -> TaskId {
        self.insert(Trigger::NextTick, task)
    }

    pub fn set_timeout(&mut self, now: Duration, delay: Duration, task: T) -> TaskId {
        self.insert(Trigger::At(now + delay), task)
    }

    pub fn set_interval(&mut self, now: Duration, period: Duration, task: T) -> TaskId {
        let period = period.max(MIN_PERIOD);
        self.insert(
            Trigger::Every {
                next: now + period,
                period,
            },
            task,
        )
    }

    // Also removes a task already staged by `poll`.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.entries.len() + self.ready.len();
        self.entries.retain(|e| e.id != id);
        self.ready.retain(|(rid, _)| *rid != id);
        before != self.entries.len() + self.ready.len()
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.entries.iter().any(|e| e.id == id) || self.ready.iter().any(|(rid, _)| *rid == id)
    }

    pub fn pending(&self) -> usize {
        self.entries.len() + self.ready.len()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &T> {
        self.ready
            .iter()
            .map(|(_, t)| t)
            .chain(self.entries.iter().map(|e| &e.task))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.ready.clear();
    }

    pub fn poll(&mut self, now: Duration) {
        let mut timers: Vec<(Duration, TaskId, T)> = Vec::new();
        let mut ticks: Vec<(TaskId, T)> = Vec::new();

        let mut kept = Vec::with_capacity(self.entries.len());
        for mut e in self.entries.drain(..) {
            match e.trigger {
                Trigger::NextTick => ticks.push((e.id, e.task)),
                Trigger::At(at) if at <= now => timers.push((at, e.id, e.task)),
                Trigger::At(_) => kept.push(e),
                Trigger::Every { mut next, period } => {
                    let mut fired = 0;
                    while next <= now && fired < MAX_CATCH_UP {
                        timers.push((next, e.id, e.task.clone()));
                        next += period;
                        fired += 1;
                    }
                    if next <= now {
                        next = now + period;
                    }
                    e.trigger = Trigger::Every { next, period };
                    kept.push(e);
                }
            }
        }
        self.entries = kept;

        timers.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        self.ready
            .extend(timers.into_iter().map(|(_, id, task)| (id, task)));
        self.ready.extend(ticks);
    }

    pub fn next_ready(&mut self) -> Option<T> {
        self.ready.pop_front().map(|(_, task)| task)
    }

    fn insert(&mut self, trigger: Trigger, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, trigger, task });
        id
    }
}
