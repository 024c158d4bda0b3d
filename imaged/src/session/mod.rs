//! Per-user session state
//!
//! A session holds an immutable id, the ordered history of successful
//! generations, and a busy flag guarding against re-submission while a
//! request is in flight. Sessions live in a [`SessionStore`] until they are
//! ended explicitly or swept for being idle.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

/// One successful prompt-to-image result
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub prompt: String,
    pub image_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl Generation {
    pub fn new(prompt: impl Into<String>, image_path: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            image_path: image_path.into(),
            created_at: Utc::now(),
        }
    }

    /// File name of the stored image, used to build its URL
    pub fn file_name(&self) -> String {
        self.image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One user's interactive session
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    history: RwLock<Vec<Generation>>,
    busy: AtomicBool,
    last_seen: Mutex<Instant>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            history: RwLock::new(Vec::new()),
            busy: AtomicBool::new(false),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Mark a generation as in flight.
    ///
    /// Returns `None` if one is already outstanding. The returned token ends
    /// the generation when dropped, whichever way the caller exits.
    pub fn begin_generation(&self) -> Option<InFlight<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight { session: self })
    }

    /// Clear the busy flag unconditionally
    pub fn end_generation(&self) {
        self.busy.store(false, Ordering::Release);
    }

    /// Add a generation to the end of the history
    pub fn append(&self, generation: Generation) {
        self.history.write().push(generation);
    }

    /// Snapshot of the history, oldest first
    pub fn history(&self) -> Vec<Generation> {
        self.history.read().clone()
    }

    /// Index the next generation's file will carry
    pub fn next_index(&self) -> usize {
        self.history.read().len()
    }

    /// Record activity on the session
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Request-in-flight token handed out by [`Session::begin_generation`]
#[derive(Debug)]
pub struct InFlight<'a> {
    session: &'a Session,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.session.end_generation();
    }
}

/// All live sessions, keyed by id
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh session
    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        self.sessions.write().insert(session.id(), session.clone());
        info!("Session started: {}", session.id());
        session
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Resolve the caller's session, creating one if the id is unknown.
    ///
    /// The flag is true when a new session was created.
    pub fn get_or_create(&self, id: Option<Uuid>) -> (Arc<Session>, bool) {
        if let Some(session) = id.and_then(|id| self.get(&id)) {
            session.touch();
            return (session, false);
        }
        (self.create(), true)
    }

    /// End a session. Its image files stay on disk.
    pub fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            info!("Session ended: {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Drop sessions idle for at least `max_idle`. Busy sessions are kept.
    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.is_busy() || s.idle_for() < max_idle);
        let purged = before - sessions.len();
        if purged > 0 {
            debug!("Purged {} idle sessions", purged);
        }
        purged
    }
}
