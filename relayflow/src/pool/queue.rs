//! Pre-loaded task queue.

use super::Task;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// FIFO queue loaded with a whole batch up front and closed on creation.
///
/// There is no way to push after construction, so an empty queue always
/// means the batch is drained and a worker never waits for more input.
#[derive(Debug)]
pub(crate) struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    pub(crate) fn load(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks.into()),
        }
    }

    /// Takes the next task, or `None` once drained.
    pub(crate) fn pop(&self) -> Option<Task> {
        self.tasks.lock().pop_front()
    }

    /// Tasks never handed to a worker.
    pub(crate) fn remaining(&self) -> usize {
        self.tasks.lock().len()
    }
}
