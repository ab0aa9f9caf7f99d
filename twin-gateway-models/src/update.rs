use crate::value::{DataType, TwinValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use thiserror::Error;
use twin_gateway_error::{update::UpdateFailureKind, TGError};

/// Per-request rule governing whether a null incoming value is applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Always apply, including storing a null value with the request's
    /// timestamp overwriting the resource's timestamp.
    #[default]
    Update,
    /// Drop the update entirely; current value and timestamp stay untouched.
    Ignore,
    /// Apply the null only if the resource currently holds a non-null value;
    /// otherwise drop the update entirely.
    UpdateIfPresent,
}

/// A timestamp supplied either as an instant or as text to be parsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampInput {
    Instant(DateTime<Utc>),
    Text(String),
}

impl TimestampInput {
    /// Resolve to an instant. Text is parsed as RFC3339.
    pub fn resolve(&self) -> Result<DateTime<Utc>, ()> {
        match self {
            TimestampInput::Instant(dt) => Ok(*dt),
            TimestampInput::Text(s) => chrono::DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| ()),
        }
    }
}

impl From<DateTime<Utc>> for TimestampInput {
    fn from(dt: DateTime<Utc>) -> Self {
        TimestampInput::Instant(dt)
    }
}

/// An inbound update request, consumed by the update pipeline and discarded
/// (or retained only as the "original" reference inside a failure record).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Model name the provider belongs to.
    #[serde(default = "UpdateRequest::default_model")]
    pub model: String,
    pub provider: String,
    pub service: String,
    pub resource: String,
    /// Incoming value; `None` triggers the null-value policy.
    pub value: Option<TwinValue>,
    /// Declared value type; when absent the model registry or the value's own
    /// type decides.
    pub declared_type: Option<DataType>,
    pub timestamp: Option<TimestampInput>,
    #[serde(default)]
    pub null_policy: NullPolicy,
}

impl UpdateRequest {
    fn default_model() -> String {
        "default".to_string()
    }

    /// Convenience constructor for the common data-update case.
    pub fn new(
        provider: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
        value: impl Into<TwinValue>,
    ) -> Self {
        Self {
            model: Self::default_model(),
            provider: provider.into(),
            service: service.into(),
            resource: resource.into(),
            value: Some(value.into()),
            declared_type: None,
            timestamp: Some(TimestampInput::Instant(Utc::now())),
            null_policy: NullPolicy::default(),
        }
    }

    /// A null-valued request carrying the given policy.
    pub fn null(
        provider: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
        policy: NullPolicy,
    ) -> Self {
        Self {
            model: Self::default_model(),
            provider: provider.into(),
            service: service.into(),
            resource: resource.into(),
            value: None,
            declared_type: None,
            timestamp: Some(TimestampInput::Instant(Utc::now())),
            null_policy: policy,
        }
    }

    pub fn with_declared_type(mut self, dt: DataType) -> Self {
        self.declared_type = Some(dt);
        self
    }

    pub fn with_timestamp(mut self, ts: impl Into<TimestampInput>) -> Self {
        self.timestamp = Some(ts.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// One rejected update item: the failure kind, the original request by
/// reference, and whichever path segments were determined before the
/// validation step that failed.
#[derive(Clone, Debug)]
pub struct UpdateFailure {
    pub kind: UpdateFailureKind,
    /// The original request object, shared by identity.
    pub request: Arc<UpdateRequest>,
    pub provider: Option<String>,
    pub service: Option<String>,
    pub resource: Option<String>,
}

impl UpdateFailure {
    pub fn new(kind: UpdateFailureKind, request: Arc<UpdateRequest>) -> Self {
        // Each segment is reported when it could be determined, independent of
        // which validation step failed: a missing-provider failure still
        // carries service and resource.
        let provider = non_empty(&request.provider);
        let service = non_empty(&request.service);
        let resource = non_empty(&request.resource);
        Self {
            kind,
            request,
            provider,
            service,
            resource,
        }
    }
}

#[inline]
fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

impl fmt::Display for UpdateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{}/{})",
            self.kind,
            self.provider.as_deref().unwrap_or("?"),
            self.service.as_deref().unwrap_or("?"),
            self.resource.as_deref().unwrap_or("?"),
        )
    }
}

/// Ordered aggregate of all failure records from one push, in original batch
/// order. Items that succeeded have already taken effect on the twin.
#[derive(Debug, Default)]
pub struct UpdateErrors {
    pub failures: Vec<UpdateFailure>,
}

impl UpdateErrors {
    pub fn new(failures: Vec<UpdateFailure>) -> Self {
        Self { failures }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpdateFailure> {
        self.failures.iter()
    }
}

impl fmt::Display for UpdateErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} update item(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for UpdateErrors {}

/// Failure surface of `push_update`/`push_updates`.
///
/// `Rejected` carries the per-item records; `Gateway` covers infrastructure
/// failures such as the engine shutting down mid-push.
#[derive(Error, Debug)]
pub enum UpdatePushError {
    #[error(transparent)]
    Rejected(#[from] UpdateErrors),
    #[error(transparent)]
    Gateway(#[from] TGError),
}

impl UpdatePushError {
    /// The failure records, when this is a validation rejection.
    pub fn failures(&self) -> Option<&[UpdateFailure]> {
        match self {
            UpdatePushError::Rejected(e) => Some(&e.failures),
            UpdatePushError::Gateway(_) => None,
        }
    }
}
