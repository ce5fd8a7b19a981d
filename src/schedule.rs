use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock(Rc<Cell<DateTime<Utc>>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Rc::new(Cell::new(start)))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.0.set(at);
    }

    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    SubmitReminder,
    PollClose,
}

/// Pending local callbacks. At most one task per kind is live; scheduling a
/// kind again supersedes the earlier entry, which is skipped when popped.
///
/// Firing a task never changes phase state by itself: the owner decides what
/// a due task means.
#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<(DateTime<Utc>, u64)>>,
    live: HashMap<TaskKind, (u64, DateTime<Utc>)>,
    tasks: HashMap<u64, TaskKind>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, kind: TaskKind, at: DateTime<Utc>) {
        self.next_id += 1;
        let id = self.next_id;
        if let Some((old, _)) = self.live.insert(kind, (id, at)) {
            self.tasks.remove(&old);
        }
        self.tasks.insert(id, kind);
        self.heap.push(Reverse((at, id)));
        tracing::trace!(?kind, %at, "scheduled task");
    }

    pub fn cancel(&mut self, kind: TaskKind) -> bool {
        match self.live.remove(&kind) {
            Some((id, _)) => {
                self.tasks.remove(&id);
                tracing::trace!(?kind, "cancelled task");
                true
            }
            None => false,
        }
    }

    /// Pops every task due at `now`, earliest first.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<TaskKind> {
        let mut fired = Vec::new();
        while let Some(Reverse((at, id))) = self.heap.peek().copied() {
            if at > now {
                break;
            }
            self.heap.pop();
            if let Some(kind) = self.tasks.remove(&id) {
                self.live.remove(&kind);
                fired.push(kind);
            }
        }
        fired
    }

    pub fn pending(&self, kind: TaskKind) -> Option<DateTime<Utc>> {
        self.live.get(&kind).map(|(_, at)| *at)
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
