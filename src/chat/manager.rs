//! Registry of live chat sessions keyed by title.
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::core::Futago;

/// Owns every live session. Each session sits behind its own async
/// mutex, so two surfaces driving the same title serialize their sends
/// while different titles proceed independently.
#[derive(Default)]
pub struct SessionManager {
    sessions: HashMap<String, Arc<Mutex<Futago>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session under a title, replacing any previous
    /// session with the same title, and returns the shared handle.
    pub fn insert(&mut self, title: &str, session: Futago) -> Arc<Mutex<Futago>> {
        let session = Arc::new(Mutex::new(session));
        self.sessions.insert(title.to_string(), session.clone());
        session
    }

    pub fn get(&self, title: &str) -> Option<Arc<Mutex<Futago>>> {
        self.sessions.get(title).cloned()
    }

    /// Drops the registry's handle. A drive already holding the Arc
    /// finishes its in-flight send before the session is torn down.
    pub fn remove(&mut self, title: &str) -> Option<Arc<Mutex<Futago>>> {
        self.sessions.remove(title)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
