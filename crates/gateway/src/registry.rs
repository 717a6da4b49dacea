//! Session registry: the authoritative map from session id to live session.
//!
//! The map is sharded (dashmap) so lookups for unrelated sessions never
//! contend, and removal can run from synchronous teardown paths.

use std::sync::Arc;

use {
    dashmap::{DashMap, mapref::entry::Entry},
    thiserror::Error,
    uuid::Uuid,
};

use crate::{channel::SseChannel, services::BridgeHandle};

// ── Id generation ────────────────────────────────────────────────────────────

/// Source of candidate session identifiers.
///
/// Uniqueness among live sessions is enforced by the registry, not assumed
/// from the generator; tests inject deterministic sources.
pub trait IdSource: Send + Sync {
    fn generate(&self) -> String;
}

/// Default source: random UUIDv4.
pub struct UuidIdSource;

impl IdSource for UuidIdSource {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

/// One live client connection: its stream channel and attached bridge.
pub struct Session {
    pub id: String,
    pub channel: Arc<SseChannel>,
    pub bridge: Arc<dyn BridgeHandle>,
}

impl Session {
    pub fn new(id: String, channel: Arc<SseChannel>, bridge: Arc<dyn BridgeHandle>) -> Arc<Self> {
        Arc::new(Self { id, channel, bridge })
    }
}

/// Two live sessions may never share an identifier; hitting this means the
/// id source produced a collision faster than `allocate` could observe it.
#[derive(Debug, Error)]
#[error("session id already registered: {0}")]
pub struct IdCollision(pub String);

// ── Registry ─────────────────────────────────────────────────────────────────

pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    ids: Arc<dyn IdSource>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_id_source(Arc::new(UuidIdSource))
    }

    pub fn with_id_source(ids: Arc<dyn IdSource>) -> Self {
        Self {
            sessions: DashMap::new(),
            ids,
        }
    }

    /// Allocate an identifier that is unique among live sessions, drawing
    /// again on collision.
    pub fn allocate(&self) -> String {
        loop {
            let id = self.ids.generate();
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    /// Register a fully built session. Fails without touching the existing
    /// entry if the id is already live.
    pub fn insert(&self, session: Arc<Session>) -> Result<(), IdCollision> {
        match self.sessions.entry(session.id.clone()) {
            Entry::Occupied(_) => Err(IdCollision(session.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            },
        }
    }

    /// Pure lookup, no side effects.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a session. Idempotent: an absent id is a no-op returning None.
    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
