//! Deferred single-shot tasks.
//!
//! Work that must not run inside the current transition is queued here and
//! run by [`Manager::run_pending`](crate::Manager::run_pending) once the
//! caller returns to the loop.

use std::collections::VecDeque;
use std::fmt;

use crate::api::manager::Manager;

pub type Task = Box<dyn FnOnce(&mut Manager)>;

#[derive(Default)]
pub struct Scheduler {
    queue: VecDeque<Task>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.queue.len())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn pop(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }
}
