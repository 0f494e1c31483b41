//! Session registry.
//!
//! Active terminal sessions keyed by opaque IDs. The HTTP layer hands the
//! ID to the browser in a cookie; everything below the cookie goes through
//! [`SessionRegistry::get`], which also refreshes the session's last-access
//! time so idle eviction sees live sessions as live.
//!
//! # Locking
//!
//! The registry map sits under a reader/writer lock; each session guards
//! its own mutable state (last access, preferences, chaos handle) with a
//! mutex. The session mutex is never held across a driver command — driver
//! calls serialize on the driver's own lock.

// Rust guideline compliant 2026-01

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::chaos::ChaosEngine;
use crate::driver::TerminalDriver;

/// Per-session display preferences, round-tripped by the web layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPrefs {
    /// Named color scheme override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<String>,
    /// Named font override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
}

/// Mutable per-session state, guarded by the session mutex.
#[derive(Default)]
struct SessionState {
    last_access: Option<DateTime<Utc>>,
    prefs: SessionPrefs,
    chaos: Option<Arc<ChaosEngine>>,
}

/// One live terminal session: an ID, the driver it exclusively owns, and
/// its mutable bookkeeping.
pub struct Session {
    /// Opaque 32-hex-character identifier.
    pub id: String,
    /// Target host name.
    pub host: String,
    /// Target port.
    pub port: u16,
    driver: Arc<dyn TerminalDriver>,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl Session {
    /// The driver this session owns.
    #[must_use]
    pub fn driver(&self) -> Arc<dyn TerminalDriver> {
        Arc::clone(&self.driver)
    }

    /// When the session was last fetched from the registry.
    #[must_use]
    pub fn last_access(&self) -> Option<DateTime<Utc>> {
        self.state.lock().expect("session lock poisoned").last_access
    }

    /// Current display preferences.
    #[must_use]
    pub fn prefs(&self) -> SessionPrefs {
        self.state
            .lock()
            .expect("session lock poisoned")
            .prefs
            .clone()
    }

    /// Replace the display preferences.
    pub fn set_prefs(&self, prefs: SessionPrefs) {
        self.state.lock().expect("session lock poisoned").prefs = prefs;
    }

    /// The chaos engine attached to this session, when one exists.
    #[must_use]
    pub fn chaos(&self) -> Option<Arc<ChaosEngine>> {
        self.state
            .lock()
            .expect("session lock poisoned")
            .chaos
            .clone()
    }

    /// Attach or detach the session's chaos engine.
    pub fn set_chaos(&self, engine: Option<Arc<ChaosEngine>>) {
        self.state.lock().expect("session lock poisoned").chaos = engine;
    }

    fn touch(&self) {
        self.state.lock().expect("session lock poisoned").last_access = Some(Utc::now());
    }
}

/// 16 CSPRNG bytes as lowercase hex: the cookie-facing session ID.
fn generate_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// ID-keyed table of live sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("session_count", &self.len())
            .finish()
    }
}

impl SessionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for a freshly connected driver, assigning it an
    /// ID. The returned session is already touched.
    pub fn create(
        &self,
        driver: Arc<dyn TerminalDriver>,
        host: impl Into<String>,
        port: u16,
    ) -> Arc<Session> {
        let session = Arc::new(Session {
            id: generate_session_id(),
            host: host.into(),
            port,
            driver,
            state: Mutex::new(SessionState::default()),
        });
        session.touch();
        self.sessions
            .write()
            .expect("registry lock poisoned")
            .insert(session.id.clone(), Arc::clone(&session));
        log::info!("[session] created {} for {}:{}", session.id, session.host, session.port);
        session
    }

    /// Fetch a session by ID, refreshing its last-access time.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let session = self
            .sessions
            .read()
            .expect("registry lock poisoned")
            .get(id)
            .cloned()?;
        session.touch();
        Some(session)
    }

    /// Stop a session's driver and drop it from the registry. Returns
    /// whether the ID was present.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .expect("registry lock poisoned")
            .remove(id);
        match removed {
            Some(session) => {
                if let Some(chaos) = session.chaos() {
                    chaos.stop();
                }
                session.driver.stop();
                log::info!("[session] removed {id}");
                true
            }
            None => false,
        }
    }

    /// Remove every session idle longer than `max_age`. Returns how many
    /// were evicted.
    pub fn evict_idle(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::zero());
        let stale: Vec<String> = self
            .sessions
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|s| s.last_access().is_none_or(|t| t < cutoff))
            .map(|s| s.id.clone())
            .collect();
        let mut evicted = 0;
        for id in stale {
            if self.remove(&id) {
                evicted += 1;
            }
        }
        if evicted > 0 {
            log::info!("[session] evicted {evicted} idle session(s)");
        }
        evicted
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().expect("registry lock poisoned").len()
    }

    /// True when no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;

    fn registry_with_session() -> (SessionRegistry, Arc<Session>) {
        let registry = SessionRegistry::new();
        let driver = Arc::new(MockDriver::blank());
        driver.start().expect("start");
        let session = registry.create(driver, "mainframe.example.com", 23);
        (registry, session)
    }

    #[test]
    fn test_session_id_shape() {
        let id = generate_session_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        // Two draws from a CSPRNG never collide in practice.
        assert_ne!(generate_session_id(), generate_session_id());
    }

    #[test]
    fn test_create_and_get() {
        let (registry, session) = registry_with_session();
        assert_eq!(registry.len(), 1);

        let fetched = registry.get(&session.id).expect("present");
        assert_eq!(fetched.id, session.id);
        assert_eq!(fetched.host, "mainframe.example.com");
        assert!(registry.get("0000000000000000").is_none());
    }

    #[test]
    fn test_get_refreshes_last_access() {
        let (registry, session) = registry_with_session();
        let first = session.last_access().expect("touched on create");
        let _ = registry.get(&session.id).expect("present");
        let second = session.last_access().expect("touched on get");
        assert!(second >= first);
    }

    #[test]
    fn test_remove_stops_driver() {
        let registry = SessionRegistry::new();
        let driver = Arc::new(MockDriver::blank());
        driver.start().expect("start");
        let session = registry.create(Arc::clone(&driver) as Arc<dyn TerminalDriver>, "h", 23);

        assert!(registry.remove(&session.id));
        assert!(!driver.is_connected());
        assert!(registry.is_empty());
        assert!(!registry.remove(&session.id));
    }

    #[test]
    fn test_evict_idle_only_removes_stale_sessions() {
        let (registry, session) = registry_with_session();

        // Fresh session survives a generous cutoff.
        assert_eq!(registry.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(registry.len(), 1);

        // Zero cutoff evicts everything not touched this very instant.
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(registry.evict_idle(Duration::ZERO), 1);
        assert!(registry.get(&session.id).is_none());
    }

    #[test]
    fn test_prefs_round_trip() {
        let (_registry, session) = registry_with_session();
        assert_eq!(session.prefs(), SessionPrefs::default());

        let prefs = SessionPrefs {
            color_scheme: Some("amber".to_string()),
            font: None,
        };
        session.set_prefs(prefs.clone());
        assert_eq!(session.prefs(), prefs);
    }
}
