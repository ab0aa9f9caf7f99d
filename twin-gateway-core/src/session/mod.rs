//! Sessions: identity, TTL, and subscription ownership.

pub mod hub;

pub use hub::{EventCallback, ListenerCallbacks, NotificationHub, Subscription};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use twin_gateway_error::session::SessionError;
use twin_gateway_models::{GatewayMetrics, Settings};
use uuid::Uuid;

pub type SessionId = Uuid;
pub type SubscriptionId = Uuid;

/// A client session: unique id, owning token, TTL, and its subscriptions.
///
/// Expiry is lazy: nothing fires when the TTL elapses; the first access that
/// notices marks the session expired, and that transition is idempotent.
pub struct Session {
    id: SessionId,
    token: String,
    expires_at: Mutex<DateTime<Utc>>,
    expired: AtomicBool,
    subscriptions: Mutex<HashMap<SubscriptionId, Subscription>>,
}

impl Session {
    fn new(token: &str, ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            token: token.to_string(),
            expires_at: Mutex::new(Utc::now() + ttl),
            expired: AtomicBool::new(false),
            subscriptions: Mutex::new(HashMap::new()),
        })
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        *self.expires_at.lock().unwrap()
    }

    /// Whether the TTL has elapsed. Marks the session expired on first
    /// observation; an expired session never becomes live again.
    pub fn is_expired(&self) -> bool {
        if self.expired.load(Ordering::Acquire) {
            return true;
        }
        if Utc::now() > *self.expires_at.lock().unwrap() {
            self.expired.store(true, Ordering::Release);
            return true;
        }
        false
    }

    /// Push the expiry forward by `duration`. Fails on a non-positive
    /// duration or an already-expired session.
    pub fn extend(&self, duration: Duration) -> Result<DateTime<Utc>, SessionError> {
        if duration <= Duration::zero() {
            return Err(SessionError::InvalidExtension(duration.num_milliseconds()));
        }
        if self.is_expired() {
            return Err(SessionError::Expired(self.id.to_string()));
        }
        let mut expires_at = self.expires_at.lock().unwrap();
        *expires_at += duration;
        Ok(*expires_at)
    }

    /// Cut the session off immediately. Used when a racing default-session
    /// candidate loses and must never be handed out.
    pub(crate) fn force_expire(&self) {
        self.expired.store(true, Ordering::Release);
    }

    pub(crate) fn insert_subscription(&self, sub: Subscription) {
        self.subscriptions.lock().unwrap().insert(sub.id, sub);
    }

    pub(crate) fn remove_subscription(&self, id: SubscriptionId) -> Option<Subscription> {
        self.subscriptions.lock().unwrap().remove(&id)
    }

    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.lock().unwrap().keys().copied().collect()
    }
}

/// Concurrent registry of live sessions plus the per-token default session.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    /// Winner of the per-token default-session race.
    default_by_token: DashMap<String, SessionId>,
    default_ttl: Duration,
    metrics: Arc<GatewayMetrics>,
}

impl SessionRegistry {
    pub fn new(settings: &Settings, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            sessions: DashMap::new(),
            default_by_token: DashMap::new(),
            default_ttl: Duration::milliseconds(settings.session.default_ttl_ms as i64),
            metrics,
        }
    }

    /// Create a standalone (non-default) session for `token`.
    pub fn create_session(&self, token: &str) -> Arc<Session> {
        let session = Session::new(token, self.default_ttl);
        info!(session_id = %session.id(), token, "🔑 Session created");
        self.sessions.insert(session.id(), Arc::clone(&session));
        GatewayMetrics::incr(&self.metrics.sessions_created);
        session
    }

    /// Look up a live session. An expired session is evicted on this access
    /// and reported as `Expired`; an unknown id as `NotFound`.
    pub fn get(&self, id: SessionId) -> Result<Arc<Session>, SessionError> {
        let session = self.sessions.get(&id).map(|e| Arc::clone(e.value()));
        match session {
            Some(s) if s.is_expired() => {
                self.evict(&s);
                Err(SessionError::Expired(id.to_string()))
            }
            Some(s) => Ok(s),
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    /// Get the default session for `token`, creating it if absent or expired.
    ///
    /// Concurrent callers race on the token slot; exactly one candidate wins
    /// and every caller gets the winning session. Losing candidates are
    /// force-expired so they can never leak out.
    pub fn get_or_create_default(&self, token: &str) -> Arc<Session> {
        loop {
            if let Some(id) = self.default_by_token.get(token).map(|e| *e.value()) {
                match self.get(id) {
                    Ok(session) => return session,
                    Err(_) => {
                        // Stale winner; clear the slot only if it still holds
                        // that id, then retry the race.
                        self.default_by_token
                            .remove_if(token, |_, current| *current == id);
                    }
                }
            }
            let candidate = Session::new(token, self.default_ttl);
            match self.default_by_token.entry(token.to_string()) {
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(candidate.id());
                    info!(session_id = %candidate.id(), token, "🔑 Default session created");
                    self.sessions.insert(candidate.id(), Arc::clone(&candidate));
                    GatewayMetrics::incr(&self.metrics.sessions_created);
                    return candidate;
                }
                dashmap::mapref::entry::Entry::Occupied(slot) => {
                    let winner_id = *slot.get();
                    drop(slot);
                    candidate.force_expire();
                    debug!(token, "Lost default-session race, adopting winner");
                    if let Ok(winner) = self.get(winner_id) {
                        return winner;
                    }
                    // Winner expired between insert and lookup; go around.
                }
            }
        }
    }

    fn evict(&self, session: &Arc<Session>) {
        if self.sessions.remove(&session.id()).is_some() {
            GatewayMetrics::incr(&self.metrics.sessions_expired);
            debug!(session_id = %session.id(), "Session expired and evicted");
        }
        self.default_by_token
            .remove_if(session.token(), |_, current| *current == session.id());
    }
}
