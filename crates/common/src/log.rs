use std::sync::{Arc, Mutex};

/// Append-only collector for build log lines.
///
/// Clones share the same buffer, so the streaming reader and the HTTP
/// response writer can both hold a handle. Appends from concurrent tasks
/// are serialized by the inner mutex and snapshots observe every line
/// appended before the snapshot was taken.
#[derive(Debug, Clone, Default)]
pub struct BuildLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.push(line.into());
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the collected lines out in append order.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
