//! Update ingestion pipeline: validation, null-value policy, and batch
//! aggregation.
//!
//! Validation runs before anything is enqueued; only requests that pass are
//! turned into engine commands. A batch keeps going past failed items, and
//! the aggregate error reports every failure in original batch order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future;
use tracing::warn;
use twin_gateway_error::update::UpdateFailureKind;
use twin_gateway_error::TGError;
use twin_gateway_models::{
    DataType, GatewayMetrics, LifecycleChange, NullPolicy, ResourceKind, TimedValue, TwinEvent,
    TwinValue, UpdateErrors, UpdateFailure, UpdatePushError, UpdateRequest,
};

use crate::engine::{CommandEngine, ModelTxn};
use crate::twin::ResourcePath;

/// What became of a validated update once the engine ran it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Applied,
    /// Dropped by the null policy or by targeting an action resource; the
    /// twin was left untouched.
    Dropped,
}

/// A request that survived validation, with segments trimmed, the value
/// coerced, and the timestamp resolved.
#[derive(Debug)]
struct ValidatedUpdate {
    path: ResourcePath,
    value: Option<TwinValue>,
    declared_type: Option<DataType>,
    timestamp: Option<DateTime<Utc>>,
    policy: NullPolicy,
}

enum Slot {
    Rejected(UpdateFailure),
    Pending,
}

pub struct UpdatePipeline {
    engine: Arc<CommandEngine>,
    metrics: Arc<GatewayMetrics>,
}

impl UpdatePipeline {
    pub fn new(engine: Arc<CommandEngine>, metrics: Arc<GatewayMetrics>) -> Self {
        Self { engine, metrics }
    }

    /// Push a single update. Equivalent to a one-item batch.
    pub async fn push_update(&self, request: UpdateRequest) -> Result<(), UpdatePushError> {
        self.push_updates(vec![request]).await
    }

    /// Push a batch of updates.
    ///
    /// Valid items are applied in batch order even when other items fail, so
    /// the last valid write to a resource wins. Returns `Rejected` with one
    /// failure record per invalid item, or `Gateway` when the engine is gone.
    pub async fn push_updates(&self, batch: Vec<UpdateRequest>) -> Result<(), UpdatePushError> {
        let mut slots = Vec::with_capacity(batch.len());
        let mut pending = Vec::new();
        for request in batch {
            let request = Arc::new(request);
            match validate(&request) {
                Err(failure) => {
                    warn!(%failure, "Update item rejected");
                    slots.push(Slot::Rejected(failure));
                }
                Ok(update) => {
                    let fut = self
                        .engine
                        .submit_model_aware(move |txn| Ok(apply(txn, update)))
                        .await;
                    slots.push(Slot::Pending);
                    pending.push(fut);
                }
            }
        }

        let mut results = future::join_all(pending).await.into_iter();
        let mut failures = Vec::new();
        for slot in slots {
            match slot {
                Slot::Rejected(failure) => {
                    GatewayMetrics::incr(&self.metrics.updates_failed);
                    failures.push(failure);
                }
                Slot::Pending => match results.next() {
                    Some(Ok(Outcome::Applied)) => {
                        GatewayMetrics::incr(&self.metrics.updates_applied);
                    }
                    Some(Ok(Outcome::Dropped)) => {
                        GatewayMetrics::incr(&self.metrics.updates_dropped);
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(TGError::EngineClosed.into()),
                },
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(UpdateErrors::new(failures).into())
        }
    }
}

/// Validate one request. Checks run in a fixed order: provider, service,
/// resource, type conversion, timestamp; the first miss decides the failure
/// kind.
fn validate(request: &Arc<UpdateRequest>) -> Result<ValidatedUpdate, UpdateFailure> {
    let reject = |kind| UpdateFailure::new(kind, Arc::clone(request));

    let provider = request.provider.trim();
    if provider.is_empty() {
        return Err(reject(UpdateFailureKind::MissingProvider));
    }
    let service = request.service.trim();
    if service.is_empty() {
        return Err(reject(UpdateFailureKind::MissingService));
    }
    let resource = request.resource.trim();
    if resource.is_empty() {
        return Err(reject(UpdateFailureKind::MissingResource));
    }

    let value = match (&request.value, request.declared_type) {
        (Some(v), Some(dt)) => Some(
            v.coerce_to(dt)
                .map_err(|_| reject(UpdateFailureKind::TypeConversionFailure))?,
        ),
        (Some(v), None) => Some(v.clone()),
        (None, _) => None,
    };

    let timestamp = match &request.timestamp {
        Some(ts) => Some(
            ts.resolve()
                .map_err(|_| reject(UpdateFailureKind::TimestampParseFailure))?,
        ),
        None => None,
    };

    let model = request.model.trim();
    let model = if model.is_empty() { "default" } else { model };
    Ok(ValidatedUpdate {
        path: ResourcePath::new(model, provider, service, resource),
        value,
        declared_type: request.declared_type,
        timestamp,
        policy: request.null_policy,
    })
}

/// Apply one validated update inside the engine. Creates missing path
/// segments, enforces the null policy against the current value, and emits
/// lifecycle events for creations plus a data event for the applied write.
fn apply(txn: &mut ModelTxn<'_>, update: ValidatedUpdate) -> Outcome {
    let path = &update.path;

    // Every drop check runs before the twin is touched, so a dropped update
    // creates no path segments.
    let declared_as_action = txn
        .models
        .declared(&path.model, &path.service, &path.resource)
        .is_some_and(|d| d.kind == ResourceKind::Action);
    if declared_as_action
        || txn
            .twin
            .resource(path)
            .is_some_and(|r| r.kind == ResourceKind::Action)
    {
        warn!(provider = %path.provider, service = %path.service, resource = %path.resource,
            "Update targets an action resource, dropping");
        return Outcome::Dropped;
    }

    let value = match update.value {
        Some(v) => Some(v),
        None => match update.policy {
            NullPolicy::Update => None,
            NullPolicy::Ignore => return Outcome::Dropped,
            NullPolicy::UpdateIfPresent => match txn.twin.resource(path) {
                Some(r) if r.value.has_value() => None,
                _ => return Outcome::Dropped,
            },
        },
    };

    let declared_type = update.declared_type.or_else(|| {
        txn.models
            .declared(&path.model, &path.service, &path.resource)
            .and_then(|d| d.declared_type)
    });
    let (resource, created) = txn.twin.ensure_path(path, ResourceKind::Data, declared_type);

    let value = match value {
        Some(v) => match resource.declared_type {
            // The request carried no declared type but the resource has one;
            // coerce when possible, store as-is otherwise.
            Some(dt) if v.data_type() != dt => match v.coerce_to(dt) {
                Ok(coerced) => Some(coerced),
                Err(e) => {
                    warn!(%e, resource = %path.resource, "Value kept untyped");
                    Some(v)
                }
            },
            _ => Some(v),
        },
        None => None,
    };

    let timestamp = update.timestamp.unwrap_or_else(Utc::now);
    resource.value = TimedValue::new(value, Some(timestamp));
    let written = resource.value.clone();

    if created.provider {
        txn.events.push(TwinEvent::lifecycle(
            &path.provider,
            None,
            None,
            LifecycleChange::ProviderCreated,
        ));
    }
    if created.service {
        txn.events.push(TwinEvent::lifecycle(
            &path.provider,
            Some(&path.service),
            None,
            LifecycleChange::ServiceCreated,
        ));
    }
    if created.resource {
        txn.events.push(TwinEvent::lifecycle(
            &path.provider,
            Some(&path.service),
            Some(&path.resource),
            LifecycleChange::ResourceCreated,
        ));
    }
    txn.events.push(TwinEvent::data(
        &path.provider,
        &path.service,
        &path.resource,
        written,
    ));
    Outcome::Applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_gateway_models::TimestampInput;

    #[test]
    fn segment_checks_run_provider_first() {
        let req = Arc::new(UpdateRequest {
            provider: "".into(),
            service: "".into(),
            resource: "".into(),
            ..Default::default()
        });
        let failure = validate(&req).unwrap_err();
        assert_eq!(failure.kind, UpdateFailureKind::MissingProvider);
    }

    #[test]
    fn unconvertible_value_is_a_type_conversion_failure() {
        let req = Arc::new(
            UpdateRequest::new("p", "s", "r", "not-a-number").with_declared_type(DataType::Int32),
        );
        let failure = validate(&req).unwrap_err();
        assert_eq!(failure.kind, UpdateFailureKind::TypeConversionFailure);
    }

    #[test]
    fn bad_timestamp_text_is_a_timestamp_parse_failure() {
        let mut req = UpdateRequest::new("p", "s", "r", 1i64);
        req.timestamp = Some(TimestampInput::Text("last tuesday".to_string()));
        let failure = validate(&Arc::new(req)).unwrap_err();
        assert_eq!(failure.kind, UpdateFailureKind::TimestampParseFailure);
    }

    #[test]
    fn valid_request_trims_segments_and_coerces() {
        let req = Arc::new(
            UpdateRequest::new(" p1 ", "svc", "temp", "42").with_declared_type(DataType::Int32),
        );
        let update = validate(&req).unwrap();
        assert_eq!(update.path.provider, "p1");
        assert_eq!(update.value, Some(TwinValue::Int32(42)));
    }

    #[test]
    fn empty_model_falls_back_to_default() {
        let req = Arc::new(UpdateRequest {
            provider: "p".into(),
            service: "s".into(),
            resource: "r".into(),
            value: Some(TwinValue::Boolean(true)),
            ..Default::default()
        });
        let update = validate(&req).unwrap();
        assert_eq!(update.path.model, "default");
    }
}
