//! Topic-indexed notification fan-out.
//!
//! Subscriptions register exact topics and trailing-wildcard prefixes; the
//! hub matches each event against both indexes and invokes the per-kind
//! callback of every live matching subscription, synchronously, on the
//! engine worker.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::{Arc, RwLock};
use tracing::debug;
use twin_gateway_error::session::SessionError;
use twin_gateway_models::{EventKind, GatewayMetrics, TopicPattern, TwinEvent};

use super::{Session, SessionId, SessionRegistry, SubscriptionId};

pub type EventCallback = Arc<dyn Fn(&TwinEvent) + Send + Sync>;

/// Per-kind callbacks for one subscription. Kinds without a callback are
/// silently skipped even when the topic matches.
#[derive(Clone, Default)]
pub struct ListenerCallbacks {
    pub on_data: Option<EventCallback>,
    pub on_metadata: Option<EventCallback>,
    pub on_lifecycle: Option<EventCallback>,
    pub on_action: Option<EventCallback>,
}

impl ListenerCallbacks {
    /// Callbacks reacting to data events only.
    pub fn data(cb: impl Fn(&TwinEvent) + Send + Sync + 'static) -> Self {
        Self::default().with_data(cb)
    }

    pub fn with_data(mut self, cb: impl Fn(&TwinEvent) + Send + Sync + 'static) -> Self {
        self.on_data = Some(Arc::new(cb));
        self
    }

    pub fn with_metadata(mut self, cb: impl Fn(&TwinEvent) + Send + Sync + 'static) -> Self {
        self.on_metadata = Some(Arc::new(cb));
        self
    }

    pub fn with_lifecycle(mut self, cb: impl Fn(&TwinEvent) + Send + Sync + 'static) -> Self {
        self.on_lifecycle = Some(Arc::new(cb));
        self
    }

    pub fn with_action(mut self, cb: impl Fn(&TwinEvent) + Send + Sync + 'static) -> Self {
        self.on_action = Some(Arc::new(cb));
        self
    }

    #[inline]
    fn for_kind(&self, kind: EventKind) -> Option<&EventCallback> {
        match kind {
            EventKind::Data => self.on_data.as_ref(),
            EventKind::Metadata => self.on_metadata.as_ref(),
            EventKind::Lifecycle => self.on_lifecycle.as_ref(),
            EventKind::Action => self.on_action.as_ref(),
        }
    }
}

/// A registered listener, owned by its session.
#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub patterns: Vec<TopicPattern>,
    pub(crate) callbacks: Arc<ListenerCallbacks>,
}

#[derive(Clone)]
struct SubscriberRef {
    session_id: SessionId,
    subscription_id: SubscriptionId,
    callbacks: Arc<ListenerCallbacks>,
}

#[derive(Default)]
struct TopicIndex {
    exact: HashMap<String, Vec<SubscriberRef>>,
    /// Prefix patterns keyed by their literal prefix, ordered for range scans.
    wildcard: BTreeMap<String, Vec<SubscriberRef>>,
}

/// The fan-out hub. One per gateway, shared with the engine worker.
pub struct NotificationHub {
    index: RwLock<TopicIndex>,
    sessions: Arc<SessionRegistry>,
    metrics: Arc<GatewayMetrics>,
}

impl NotificationHub {
    pub fn new(sessions: Arc<SessionRegistry>, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            index: RwLock::new(TopicIndex::default()),
            sessions,
            metrics,
        }
    }

    #[inline]
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Register a listener on `session` for the given patterns.
    pub fn add_listener(
        &self,
        session: &Arc<Session>,
        patterns: Vec<TopicPattern>,
        callbacks: ListenerCallbacks,
    ) -> Result<SubscriptionId, SessionError> {
        if session.is_expired() {
            return Err(SessionError::Expired(session.id().to_string()));
        }
        let id = SubscriptionId::new_v4();
        let callbacks = Arc::new(callbacks);
        session.insert_subscription(Subscription {
            id,
            patterns: patterns.clone(),
            callbacks: Arc::clone(&callbacks),
        });

        let subscriber = SubscriberRef {
            session_id: session.id(),
            subscription_id: id,
            callbacks,
        };
        let mut index = self.index.write().unwrap();
        for pattern in &patterns {
            match pattern {
                TopicPattern::Exact(topic) => index
                    .exact
                    .entry(topic.clone())
                    .or_default()
                    .push(subscriber.clone()),
                TopicPattern::Prefix(prefix) => index
                    .wildcard
                    .entry(prefix.clone())
                    .or_default()
                    .push(subscriber.clone()),
            }
        }
        debug!(subscription_id = %id, session_id = %session.id(), "Listener registered");
        Ok(id)
    }

    /// Remove a listener owned by `session`.
    pub fn remove_listener(
        &self,
        session: &Arc<Session>,
        id: SubscriptionId,
    ) -> Result<(), SessionError> {
        let sub = session
            .remove_subscription(id)
            .ok_or_else(|| SessionError::SubscriptionNotFound(id.to_string()))?;
        let mut index = self.index.write().unwrap();
        for pattern in &sub.patterns {
            match pattern {
                TopicPattern::Exact(topic) => {
                    prune_entry(&mut index.exact, topic, id);
                }
                TopicPattern::Prefix(prefix) => {
                    if let Some(subs) = index.wildcard.get_mut(prefix) {
                        subs.retain(|s| s.subscription_id != id);
                        if subs.is_empty() {
                            index.wildcard.remove(prefix);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Deliver `event` to every live matching subscription.
    pub fn notify(&self, event: &TwinEvent) {
        let mut matched: Vec<SubscriberRef> = Vec::new();
        let mut seen: HashSet<SubscriptionId> = HashSet::new();
        {
            let index = self.index.read().unwrap();
            if let Some(subs) = index.exact.get(&event.topic) {
                for sub in subs {
                    if seen.insert(sub.subscription_id) {
                        matched.push(sub.clone());
                    }
                }
            }
            // Descending scan over every prefix <= topic. No early break on a
            // mismatch: with prefixes "DATA/p1/" and "DATA/p1/a" registered,
            // topic "DATA/p1/svc" reaches the non-matching "DATA/p1/a" before
            // the matching "DATA/p1/".
            let upper = Bound::Included(event.topic.as_str());
            for (prefix, subs) in index
                .wildcard
                .range::<str, _>((Bound::Unbounded, upper))
                .rev()
            {
                if event.topic.starts_with(prefix.as_str()) {
                    for sub in subs {
                        if seen.insert(sub.subscription_id) {
                            matched.push(sub.clone());
                        }
                    }
                }
            }
        }

        let mut stale: Vec<SubscriptionId> = Vec::new();
        for sub in matched {
            if self.sessions.get(sub.session_id).is_err() {
                stale.push(sub.subscription_id);
                continue;
            }
            if let Some(cb) = sub.callbacks.for_kind(event.kind) {
                cb(event);
                GatewayMetrics::incr(&self.metrics.events_delivered);
            }
        }
        if !stale.is_empty() {
            self.prune_stale(&stale);
        }
    }

    /// Drop index entries left behind by expired sessions.
    fn prune_stale(&self, ids: &[SubscriptionId]) {
        let mut index = self.index.write().unwrap();
        index.exact.retain(|_, subs| {
            subs.retain(|s| !ids.contains(&s.subscription_id));
            !subs.is_empty()
        });
        index.wildcard.retain(|_, subs| {
            subs.retain(|s| !ids.contains(&s.subscription_id));
            !subs.is_empty()
        });
        debug!(pruned = ids.len(), "Stale subscriptions pruned from topic index");
    }
}

fn prune_entry(map: &mut HashMap<String, Vec<SubscriberRef>>, key: &str, id: SubscriptionId) {
    if let Some(subs) = map.get_mut(key) {
        subs.retain(|s| s.subscription_id != id);
        if subs.is_empty() {
            map.remove(key);
        }
    }
}
