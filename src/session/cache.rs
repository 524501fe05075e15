use log::{debug, info};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::session::Session;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Opaque handle for a cached session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SessionId)
    }
}

struct CacheEntry {
    session: Arc<Session>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Completed sessions keyed by a generated id, each evicted once its own
/// TTL has elapsed.
///
/// Expired entries are never returned. They are dropped on the lookup that
/// finds them, by `sweep`, or by the background task from `spawn_sweeper`.
pub struct SessionCache {
    entries: RwLock<HashMap<SessionId, CacheEntry>>,
    ttl: Duration,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, CacheEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, CacheEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a finished session under a fresh id.
    pub fn register(&self, session: impl Into<Arc<Session>>) -> SessionId {
        let id = SessionId::generate();
        let entry = CacheEntry {
            session: session.into(),
            expires_at: Instant::now() + self.ttl,
        };
        self.write().insert(id, entry);
        info!("Registered session {} (ttl {:?})", id, self.ttl);
        id
    }

    /// The session for `id`, or `None` if it is unknown or has expired.
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        let now = Instant::now();
        {
            let entries = self.read();
            match entries.get(id) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(Arc::clone(&entry.session)),
                Some(_) => {}
            }
        }

        let mut entries = self.write();
        if entries.get(id).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(id);
            debug!("Evicted expired session {} on lookup", id);
        }
        None
    }

    /// Drop a session. Removing an absent id is a no-op.
    pub fn remove(&self, id: &SessionId) -> bool {
        self.write().remove(id).is_some()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!("Swept {} expired sessions", evicted);
        }
        evicted
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep periodically until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache: Weak<SessionCache> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.sweep();
                    }
                    None => break,
                }
            }
            debug!("Session sweeper stopped");
        })
    }
}
