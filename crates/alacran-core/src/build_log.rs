use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Bounded, insertion-ordered build output of one application.
///
/// Once `capacity` lines are held, each append evicts the oldest line.
#[derive(Debug)]
pub struct BuildLog {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl BuildLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn append(&self, line: impl Into<String>) {
        let mut lines = self.lock();
        lines.push_back(line.into());
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    /// Copy of the current lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the deque half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide registry of build logs, one per application name.
///
/// Logs are created on first access and live until [`BuildLogStore::remove`]
/// or until the store is dropped.
#[derive(Debug)]
pub struct BuildLogStore {
    capacity: usize,
    logs: Mutex<HashMap<String, Arc<BuildLog>>>,
}

impl BuildLogStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            logs: Mutex::new(HashMap::new()),
        }
    }

    /// The build log of `app_name`, created empty on first access.
    pub fn get(&self, app_name: &str) -> Arc<BuildLog> {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            logs.entry(app_name.to_owned())
                .or_insert_with(|| Arc::new(BuildLog::new(self.capacity))),
        )
    }

    /// Forget the log of a removed application.
    pub fn remove(&self, app_name: &str) -> bool {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        logs.remove(app_name).is_some()
    }
}
