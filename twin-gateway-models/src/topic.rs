use crate::timed::TimedValue;
use crate::value::TwinValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four event streams a subscription can register for.
///
/// Topics are namespaced by kind prefix: `DATA/<provider>/<service>/<resource>`,
/// `METADATA/...`, `LIFECYCLE/...`, `ACTION/...`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Data,
    Metadata,
    Lifecycle,
    Action,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Data,
        EventKind::Metadata,
        EventKind::Lifecycle,
        EventKind::Action,
    ];

    #[inline]
    pub fn prefix(&self) -> &'static str {
        match self {
            EventKind::Data => "DATA",
            EventKind::Metadata => "METADATA",
            EventKind::Lifecycle => "LIFECYCLE",
            EventKind::Action => "ACTION",
        }
    }

    /// Classify a topic by its leading kind segment.
    pub fn of_topic(topic: &str) -> Option<EventKind> {
        let head = topic.split('/').next()?;
        match head {
            "DATA" => Some(EventKind::Data),
            "METADATA" => Some(EventKind::Metadata),
            "LIFECYCLE" => Some(EventKind::Lifecycle),
            "ACTION" => Some(EventKind::Action),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Build the canonical topic string for a resource path under a kind.
#[inline]
pub fn resource_topic(kind: EventKind, provider: &str, service: &str, resource: &str) -> String {
    format!("{}/{provider}/{service}/{resource}", kind.prefix())
}

/// Build the canonical topic string for a provider-level lifecycle event.
#[inline]
pub fn provider_topic(kind: EventKind, provider: &str) -> String {
    format!("{}/{provider}", kind.prefix())
}

/// A registered topic pattern: either an exact topic or a literal prefix
/// (trailing `*` in the source string) matching the prefix and anything after.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TopicPattern {
    Exact(String),
    Prefix(String),
}

impl TopicPattern {
    /// Parse a pattern string; a trailing `*` marks a prefix pattern.
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => TopicPattern::Prefix(prefix.to_string()),
            None => TopicPattern::Exact(pattern.to_string()),
        }
    }

    #[inline]
    pub fn matches(&self, topic: &str) -> bool {
        match self {
            TopicPattern::Exact(t) => t == topic,
            TopicPattern::Prefix(p) => topic.starts_with(p.as_str()),
        }
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicPattern::Exact(t) => f.write_str(t),
            TopicPattern::Prefix(p) => write!(f, "{p}*"),
        }
    }
}

/// Lifecycle transitions announced on `LIFECYCLE/...` topics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleChange {
    ProviderCreated,
    ProviderDeleted,
    ServiceCreated,
    ResourceCreated,
}

/// A twin-change event fanned out to matching subscriptions.
#[derive(Clone, Debug)]
pub struct TwinEvent {
    pub kind: EventKind,
    /// Full topic string this event is published under.
    pub topic: String,
    pub provider: String,
    pub service: Option<String>,
    pub resource: Option<String>,
    /// New timed value for data events.
    pub value: Option<TimedValue>,
    /// Changed metadata entry for metadata events.
    pub metadata: Option<(String, TwinValue)>,
    /// Transition for lifecycle events.
    pub lifecycle: Option<LifecycleChange>,
    /// Invocation parameters for action events.
    pub action_params: Option<Vec<TwinValue>>,
}

impl TwinEvent {
    pub fn data(provider: &str, service: &str, resource: &str, value: TimedValue) -> Self {
        Self {
            kind: EventKind::Data,
            topic: resource_topic(EventKind::Data, provider, service, resource),
            provider: provider.to_string(),
            service: Some(service.to_string()),
            resource: Some(resource.to_string()),
            value: Some(value),
            metadata: None,
            lifecycle: None,
            action_params: None,
        }
    }

    pub fn metadata(
        provider: &str,
        service: &str,
        resource: &str,
        key: String,
        value: TwinValue,
    ) -> Self {
        Self {
            kind: EventKind::Metadata,
            topic: resource_topic(EventKind::Metadata, provider, service, resource),
            provider: provider.to_string(),
            service: Some(service.to_string()),
            resource: Some(resource.to_string()),
            value: None,
            metadata: Some((key, value)),
            lifecycle: None,
            action_params: None,
        }
    }

    pub fn lifecycle(
        provider: &str,
        service: Option<&str>,
        resource: Option<&str>,
        change: LifecycleChange,
    ) -> Self {
        let topic = match (service, resource) {
            (Some(s), Some(r)) => resource_topic(EventKind::Lifecycle, provider, s, r),
            (Some(s), None) => format!("{}/{provider}/{s}", EventKind::Lifecycle.prefix()),
            _ => provider_topic(EventKind::Lifecycle, provider),
        };
        Self {
            kind: EventKind::Lifecycle,
            topic,
            provider: provider.to_string(),
            service: service.map(str::to_string),
            resource: resource.map(str::to_string),
            value: None,
            metadata: None,
            lifecycle: Some(change),
            action_params: None,
        }
    }

    pub fn action(provider: &str, service: &str, resource: &str, params: Vec<TwinValue>) -> Self {
        Self {
            kind: EventKind::Action,
            topic: resource_topic(EventKind::Action, provider, service, resource),
            provider: provider.to_string(),
            service: Some(service.to_string()),
            resource: Some(resource.to_string()),
            value: None,
            metadata: None,
            lifecycle: None,
            action_params: Some(params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_read_from_the_topic_head() {
        assert_eq!(EventKind::of_topic("DATA/p/s/r"), Some(EventKind::Data));
        assert_eq!(
            EventKind::of_topic("LIFECYCLE/p"),
            Some(EventKind::Lifecycle)
        );
        assert_eq!(EventKind::of_topic("BOGUS/p"), None);
    }

    #[test]
    fn trailing_star_parses_as_prefix() {
        let p = TopicPattern::parse("DATA/provider1/*");
        assert!(p.matches("DATA/provider1/svc/res"));
        assert!(p.matches("DATA/provider1/anything"));
        assert!(!p.matches("DATA/provider2/svc/res"));
    }

    #[test]
    fn exact_pattern_does_not_match_siblings() {
        let p = TopicPattern::parse("DATA/provider1/svc/res");
        assert!(p.matches("DATA/provider1/svc/res"));
        assert!(!p.matches("DATA/provider1/svc/other"));
    }
}
