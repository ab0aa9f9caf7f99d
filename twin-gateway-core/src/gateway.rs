//! The gateway facade: one object wiring the engine, pipeline, sessions, and
//! notification hub together.

use std::sync::Arc;

use tracing::info;
use twin_gateway_error::{TGError, TGResult};
use twin_gateway_models::{
    GatewayMetrics, LifecycleChange, MetricsSnapshot, ProviderDescriptor, ResourceDescriptor,
    ResourceKind, ServiceDescriptor, Settings, SnapshotFilter, TimedValue, TopicPattern,
    TwinEvent, TwinValue, UpdatePushError, UpdateRequest,
};

use crate::engine::CommandEngine;
use crate::session::{
    ListenerCallbacks, NotificationHub, Session, SessionId, SessionRegistry, SubscriptionId,
};
use crate::twin::model::ActionHandler;
use crate::twin::ResourcePath;
use crate::update::UpdatePipeline;

/// The running gateway. Cheap to share behind an `Arc`.
///
/// Must be started from within a Tokio runtime: [`TwinGateway::start`] spawns
/// the engine worker task.
pub struct TwinGateway {
    settings: Settings,
    engine: Arc<CommandEngine>,
    pipeline: UpdatePipeline,
    sessions: Arc<SessionRegistry>,
    hub: Arc<NotificationHub>,
    metrics: Arc<GatewayMetrics>,
}

impl TwinGateway {
    pub fn start(settings: Settings) -> Self {
        let metrics = Arc::new(GatewayMetrics::default());
        let sessions = Arc::new(SessionRegistry::new(&settings, Arc::clone(&metrics)));
        let hub = Arc::new(NotificationHub::new(
            Arc::clone(&sessions),
            Arc::clone(&metrics),
        ));
        let engine = CommandEngine::start(&settings, Arc::clone(&hub), Arc::clone(&metrics));
        let pipeline = UpdatePipeline::new(Arc::clone(&engine), Arc::clone(&metrics));
        info!("🚀 Twin gateway started");
        Self {
            settings,
            engine,
            pipeline,
            sessions,
            hub,
            metrics,
        }
    }

    /// Stop accepting commands, drain what is queued, and join the worker.
    pub async fn stop(&self) -> TGResult<()> {
        self.engine.stop().await?;
        info!("🛑 Twin gateway stopped");
        Ok(())
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    pub fn engine(&self) -> &Arc<CommandEngine> {
        &self.engine
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ---- updates ----------------------------------------------------------

    pub async fn push_update(&self, request: UpdateRequest) -> Result<(), UpdatePushError> {
        self.pipeline.push_update(request).await
    }

    pub async fn push_updates(&self, batch: Vec<UpdateRequest>) -> Result<(), UpdatePushError> {
        self.pipeline.push_updates(batch).await
    }

    // ---- queries ----------------------------------------------------------

    pub async fn describe_provider(
        &self,
        model: &str,
        provider: &str,
    ) -> TGResult<ProviderDescriptor> {
        let model = model.to_string();
        let provider = provider.to_string();
        self.engine
            .submit(move |txn| {
                txn.twin
                    .provider(&model, &provider)
                    .map(|p| p.describe())
                    .ok_or_else(|| TGError::ProviderNotFound(format!("{model}/{provider}")))
            })
            .await
            .await
    }

    pub async fn describe_service(
        &self,
        model: &str,
        provider: &str,
        service: &str,
    ) -> TGResult<ServiceDescriptor> {
        let model = model.to_string();
        let provider = provider.to_string();
        let service = service.to_string();
        self.engine
            .submit(move |txn| {
                let p = txn
                    .twin
                    .provider(&model, &provider)
                    .ok_or_else(|| TGError::ProviderNotFound(format!("{model}/{provider}")))?;
                p.services
                    .get(&service)
                    .map(|s| s.describe())
                    .ok_or(TGError::ServiceNotFound { provider, service })
            })
            .await
            .await
    }

    pub async fn describe_resource(&self, path: ResourcePath) -> TGResult<ResourceDescriptor> {
        let not_found = Self::resource_not_found(&path);
        self.engine
            .submit_resource(path, |res| Ok(res.describe()))
            .await
            .await?
            .ok_or(not_found)
    }

    /// Current (value, timestamp) pair of a data resource.
    pub async fn get_resource_value(&self, path: ResourcePath) -> TGResult<TimedValue> {
        let not_found = Self::resource_not_found(&path);
        self.engine
            .submit_resource(path, |res| Ok(res.value.clone()))
            .await
            .await?
            .ok_or(not_found)
    }

    pub async fn list_providers(&self) -> TGResult<Vec<(String, String)>> {
        self.engine
            .submit(|txn| Ok(txn.twin.list_providers()))
            .await
            .await
    }

    pub async fn filtered_snapshot(
        &self,
        filter: SnapshotFilter,
    ) -> TGResult<Vec<ProviderDescriptor>> {
        self.engine
            .submit(move |txn| Ok(txn.twin.snapshot(&filter)))
            .await
            .await
    }

    // ---- administration ---------------------------------------------------

    /// Create a provider explicitly. Returns whether it was created.
    pub async fn create_provider(&self, model: &str, provider: &str) -> TGResult<bool> {
        let model = model.to_string();
        let provider = provider.to_string();
        self.engine
            .submit(move |txn| {
                let created = txn.twin.ensure_provider(&model, &provider);
                if created {
                    txn.emit(TwinEvent::lifecycle(
                        &provider,
                        None,
                        None,
                        LifecycleChange::ProviderCreated,
                    ));
                }
                Ok(created)
            })
            .await
            .await
    }

    /// Delete a provider and everything it owns. Returns whether it existed.
    pub async fn delete_provider(&self, model: &str, provider: &str) -> TGResult<bool> {
        let model = model.to_string();
        let provider = provider.to_string();
        self.engine
            .submit(move |txn| {
                let deleted = txn.twin.delete_provider(&model, &provider);
                if deleted {
                    txn.emit(TwinEvent::lifecycle(
                        &provider,
                        None,
                        None,
                        LifecycleChange::ProviderDeleted,
                    ));
                }
                Ok(deleted)
            })
            .await
            .await
    }

    /// Set one metadata entry on an existing resource.
    pub async fn set_resource_metadata(
        &self,
        path: ResourcePath,
        key: &str,
        value: TwinValue,
    ) -> TGResult<()> {
        let key = key.to_string();
        self.engine
            .submit(move |txn| {
                let Some(resource) = txn.twin.resource_mut(&path) else {
                    return Err(Self::resource_not_found(&path));
                };
                resource.metadata.insert(key.clone(), value.clone());
                txn.events.push(TwinEvent::metadata(
                    &path.provider,
                    &path.service,
                    &path.resource,
                    key,
                    value,
                ));
                Ok(())
            })
            .await
            .await
    }

    // ---- actions ----------------------------------------------------------

    /// Bind `handler` to an action resource declared on `model`.
    pub async fn register_action(
        &self,
        model: &str,
        service: &str,
        resource: &str,
        handler: ActionHandler,
    ) -> TGResult<()> {
        let model = model.to_string();
        let service = service.to_string();
        let resource = resource.to_string();
        self.engine
            .submit_model_aware(move |txn| {
                txn.models.bind_action(&model, &service, &resource, handler);
                Ok(())
            })
            .await
            .await
    }

    /// Invoke an action on an existing provider. The handler runs on the
    /// engine worker; an `ACTION` event is published after it returns.
    pub async fn invoke_action(
        &self,
        path: ResourcePath,
        params: Vec<TwinValue>,
    ) -> TGResult<TwinValue> {
        self.engine
            .submit_model_aware(move |txn| {
                let Some(handler) =
                    txn.models.action(&path.model, &path.service, &path.resource)
                else {
                    return Err(TGError::ActionNotBound(format!(
                        "{}/{}/{}",
                        path.model, path.service, path.resource
                    )));
                };
                if txn.twin.provider(&path.model, &path.provider).is_none() {
                    return Err(TGError::ProviderNotFound(format!(
                        "{}/{}",
                        path.model, path.provider
                    )));
                }
                // Materialize the action resource under this provider lazily.
                txn.twin.ensure_path(&path, ResourceKind::Action, None);
                let result = handler(&params)?;
                txn.events.push(TwinEvent::action(
                    &path.provider,
                    &path.service,
                    &path.resource,
                    params,
                ));
                Ok(result)
            })
            .await
            .await
    }

    // ---- sessions and notifications ---------------------------------------

    /// The per-token default session, created (or replaced, if expired) on
    /// first use. Concurrent callers for the same token all get one session.
    pub fn default_session(&self, token: &str) -> Arc<Session> {
        self.sessions.get_or_create_default(token)
    }

    /// A fresh standalone session for `token`.
    pub fn create_session(&self, token: &str) -> Arc<Session> {
        self.sessions.create_session(token)
    }

    pub fn session(&self, id: SessionId) -> TGResult<Arc<Session>> {
        Ok(self.sessions.get(id)?)
    }

    /// Register a listener; patterns use a trailing `*` for prefix matching.
    pub fn add_listener(
        &self,
        session: &Arc<Session>,
        patterns: &[&str],
        callbacks: ListenerCallbacks,
    ) -> TGResult<SubscriptionId> {
        let patterns = patterns.iter().map(|p| TopicPattern::parse(p)).collect();
        Ok(self.hub.add_listener(session, patterns, callbacks)?)
    }

    pub fn remove_listener(
        &self,
        session: &Arc<Session>,
        id: SubscriptionId,
    ) -> TGResult<()> {
        Ok(self.hub.remove_listener(session, id)?)
    }

    #[inline]
    fn resource_not_found(path: &ResourcePath) -> TGError {
        TGError::ResourceNotFound {
            provider: path.provider.clone(),
            service: path.service.clone(),
            resource: path.resource.clone(),
        }
    }
}
