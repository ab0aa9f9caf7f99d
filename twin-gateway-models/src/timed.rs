use crate::value::TwinValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable (value, timestamp) pair held by a data resource.
///
/// Either side may independently be absent: a timestamp without a value means
/// "explicitly cleared at that instant", a value without a timestamp is legal
/// for producers that do not track time, and both absent means "no data yet".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimedValue {
    pub value: Option<TwinValue>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TimedValue {
    /// The "no data yet" state.
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn new(value: Option<TwinValue>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self { value, timestamp }
    }

    /// Value present and timestamped now.
    #[inline]
    pub fn now(value: TwinValue) -> Self {
        Self {
            value: Some(value),
            timestamp: Some(Utc::now()),
        }
    }

    #[inline]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.timestamp.is_none()
    }
}
