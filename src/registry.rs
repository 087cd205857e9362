//! Bookkeeping of in-flight dispatch tasks.
//!
//! Every dispatched exchange is registered under a fresh [`TaskId`] and
//! removed exactly once: by its own completion or by cancellation, whichever
//! comes first. The registry also publishes its size so a UI can drive a
//! network activity indicator from it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

/// Opaque identifier of a dispatched request.
///
/// Rendered as a random UUID-formatted string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    fn random() -> Self {
        let bits: u128 = rand::random();
        let hex = format!("{bits:032X}");
        Self(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

pub(crate) struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, AbortHandle>>,
    activity: watch::Sender<usize>,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        let (activity, _) = watch::channel(0);
        Self {
            tasks: Mutex::new(HashMap::new()),
            activity,
        }
    }

    /// Spawns a task through `spawn` and registers it under a fresh id.
    ///
    /// The lock is held across `spawn`, so the task cannot observe the
    /// registry (and call [`release`](Self::release)) before its entry exists.
    pub(crate) fn register<F>(&self, spawn: F) -> TaskId
    where
        F: FnOnce(TaskId) -> JoinHandle<()>,
    {
        let mut tasks = self.tasks.lock();
        let mut id = TaskId::random();
        while tasks.contains_key(&id) {
            id = TaskId::random();
        }

        let handle = spawn(id.clone());
        tasks.insert(id.clone(), handle.abort_handle());
        self.activity.send_replace(tasks.len());
        id
    }

    /// Removes the entry for a completing task.
    ///
    /// Returns `false` when the entry is already gone, i.e. the task was
    /// cancelled and its outcome must be discarded.
    pub(crate) fn release(&self, id: &TaskId) -> bool {
        let mut tasks = self.tasks.lock();
        let removed = tasks.remove(id).is_some();
        if removed {
            self.activity.send_replace(tasks.len());
        }
        removed
    }

    /// Aborts and removes one task. Unknown ids are ignored.
    pub(crate) fn cancel(&self, id: &TaskId) -> bool {
        let mut tasks = self.tasks.lock();
        match tasks.remove(id) {
            Some(handle) => {
                handle.abort();
                self.activity.send_replace(tasks.len());
                true
            }
            None => false,
        }
    }

    /// Aborts and removes every task, returning how many there were.
    pub(crate) fn cancel_all(&self) -> usize {
        let mut tasks = self.tasks.lock();
        let count = tasks.len();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
        self.activity.send_replace(0);
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub(crate) fn contains(&self, id: &TaskId) -> bool {
        self.tasks.lock().contains_key(id)
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<usize> {
        self.activity.subscribe()
    }
}
