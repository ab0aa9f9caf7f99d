//! In-memory digital twin store.
//!
//! Plain single-writer data structures: all access goes through commands run
//! by the [`crate::engine::CommandEngine`] worker, which is the only
//! concurrency control this module relies on.

pub mod model;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use twin_gateway_models::{
    DataType, ProviderDescriptor, ResourceDescriptor, ResourceKind, ServiceDescriptor,
    SnapshotFilter, TimedValue, TwinValue,
};

/// Fully-qualified resource address inside the twin.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    pub model: String,
    pub provider: String,
    pub service: String,
    pub resource: String,
}

impl ResourcePath {
    pub fn new(
        model: impl Into<String>,
        provider: impl Into<String>,
        service: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            provider: provider.into(),
            service: service.into(),
            resource: resource.into(),
        }
    }
}

/// Which path segments were created while ensuring a resource exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathCreated {
    pub provider: bool,
    pub service: bool,
    pub resource: bool,
}

/// A named, typed, timestamped value (or action) under a service.
#[derive(Clone, Debug)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    pub declared_type: Option<DataType>,
    pub value: TimedValue,
    /// Persists independently of value updates unless explicitly overwritten.
    pub metadata: BTreeMap<String, TwinValue>,
}

impl Resource {
    fn new(name: &str, kind: ResourceKind, declared_type: Option<DataType>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            declared_type,
            value: TimedValue::empty(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn describe(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            name: self.name.clone(),
            kind: self.kind,
            declared_type: self.declared_type,
            value: self.value.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Named grouping of resources, owned exclusively by its provider.
#[derive(Clone, Debug)]
pub struct Service {
    pub name: String,
    /// Creation-ordered.
    pub resources: IndexMap<String, Resource>,
}

impl Service {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            resources: IndexMap::new(),
        }
    }

    pub fn describe(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            name: self.name.clone(),
            resources: self.resources.values().map(Resource::describe).collect(),
        }
    }
}

/// A modeled device/entity, unique within the twin by `(model, id)`.
#[derive(Clone, Debug)]
pub struct Provider {
    pub model: String,
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Creation-ordered.
    pub services: IndexMap<String, Service>,
}

impl Provider {
    fn new(model: &str, id: &str) -> Self {
        Self {
            model: model.to_string(),
            id: id.to_string(),
            created_at: Utc::now(),
            services: IndexMap::new(),
        }
    }

    pub fn describe(&self) -> ProviderDescriptor {
        ProviderDescriptor {
            model: self.model.clone(),
            id: self.id.clone(),
            created_at: self.created_at,
            services: self.services.values().map(Service::describe).collect(),
        }
    }
}

type ProviderKey = (String, String);

/// The twin itself: providers keyed by `(model, id)`, creation-ordered.
#[derive(Debug, Default)]
pub struct TwinStore {
    providers: IndexMap<ProviderKey, Provider>,
}

impl TwinStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn key(model: &str, id: &str) -> ProviderKey {
        (model.to_string(), id.to_string())
    }

    /// Create the provider if absent; returns whether it was created.
    pub fn ensure_provider(&mut self, model: &str, id: &str) -> bool {
        let key = Self::key(model, id);
        if self.providers.contains_key(&key) {
            return false;
        }
        self.providers.insert(key, Provider::new(model, id));
        true
    }

    /// Ensure provider, service, and resource exist along `path`, creating
    /// missing segments lazily. Newly-created resources take the given kind
    /// and declared type; existing resources keep theirs.
    pub fn ensure_path(
        &mut self,
        path: &ResourcePath,
        kind: ResourceKind,
        declared_type: Option<DataType>,
    ) -> (&mut Resource, PathCreated) {
        let mut created = PathCreated::default();
        let key = Self::key(&path.model, &path.provider);
        let provider = match self.providers.entry(key) {
            indexmap::map::Entry::Occupied(o) => o.into_mut(),
            indexmap::map::Entry::Vacant(v) => {
                created.provider = true;
                v.insert(Provider::new(&path.model, &path.provider))
            }
        };
        let service = match provider.services.entry(path.service.clone()) {
            indexmap::map::Entry::Occupied(o) => o.into_mut(),
            indexmap::map::Entry::Vacant(v) => {
                created.service = true;
                v.insert(Service::new(&path.service))
            }
        };
        let resource = match service.resources.entry(path.resource.clone()) {
            indexmap::map::Entry::Occupied(o) => o.into_mut(),
            indexmap::map::Entry::Vacant(v) => {
                created.resource = true;
                v.insert(Resource::new(&path.resource, kind, declared_type))
            }
        };
        (resource, created)
    }

    pub fn provider(&self, model: &str, id: &str) -> Option<&Provider> {
        self.providers.get(&Self::key(model, id))
    }

    pub fn resource(&self, path: &ResourcePath) -> Option<&Resource> {
        self.providers
            .get(&Self::key(&path.model, &path.provider))?
            .services
            .get(&path.service)?
            .resources
            .get(&path.resource)
    }

    pub fn resource_mut(&mut self, path: &ResourcePath) -> Option<&mut Resource> {
        self.providers
            .get_mut(&Self::key(&path.model, &path.provider))?
            .services
            .get_mut(&path.service)?
            .resources
            .get_mut(&path.resource)
    }

    /// Delete a provider and everything it owns. Returns whether it existed.
    pub fn delete_provider(&mut self, model: &str, id: &str) -> bool {
        // shift_remove keeps the remaining providers in creation order.
        self.providers
            .shift_remove(&Self::key(model, id))
            .is_some()
    }

    pub fn list_providers(&self) -> Vec<(String, String)> {
        self.providers.keys().cloned().collect()
    }

    pub fn snapshot(&self, filter: &SnapshotFilter) -> Vec<ProviderDescriptor> {
        self.providers
            .values()
            .filter(|p| filter.accepts(&p.model, &p.id))
            .map(Provider::describe)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_path_creates_missing_segments_once() {
        let mut twin = TwinStore::new();
        let path = ResourcePath::new("m", "p1", "svc", "temp");
        let (_, created) = twin.ensure_path(&path, ResourceKind::Data, Some(DataType::Float64));
        assert!(created.provider && created.service && created.resource);

        let (res, created) = twin.ensure_path(&path, ResourceKind::Data, None);
        assert_eq!(created, PathCreated::default());
        // Existing resource keeps its declared type.
        assert_eq!(res.declared_type, Some(DataType::Float64));
    }

    #[test]
    fn delete_provider_removes_owned_tree() {
        let mut twin = TwinStore::new();
        let path = ResourcePath::new("m", "p1", "svc", "temp");
        twin.ensure_path(&path, ResourceKind::Data, None);
        assert!(twin.delete_provider("m", "p1"));
        assert!(twin.resource(&path).is_none());
        assert!(!twin.delete_provider("m", "p1"));
    }

    #[test]
    fn providers_keep_creation_order() {
        let mut twin = TwinStore::new();
        twin.ensure_provider("m", "b");
        twin.ensure_provider("m", "a");
        let ids: Vec<_> = twin.list_providers().into_iter().map(|(_, id)| id).collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn metadata_survives_value_updates() {
        let mut twin = TwinStore::new();
        let path = ResourcePath::new("m", "p", "s", "r");
        let (res, _) = twin.ensure_path(&path, ResourceKind::Data, None);
        res.metadata
            .insert("unit".into(), TwinValue::string("celsius"));
        res.value = TimedValue::now(TwinValue::Float64(21.5));

        let res = twin.resource(&path).unwrap();
        assert_eq!(
            res.metadata.get("unit"),
            Some(&TwinValue::string("celsius"))
        );
    }
}
