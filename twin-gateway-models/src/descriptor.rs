use crate::{
    timed::TimedValue,
    value::{DataType, TwinValue},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Data resource vs. action resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    Data,
    /// Takes parameters and returns a result synchronously; never stores a value.
    Action,
}

/// Read-only view of a resource, returned by query commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub kind: ResourceKind,
    pub declared_type: Option<DataType>,
    pub value: TimedValue,
    pub metadata: BTreeMap<String, TwinValue>,
}

/// Read-only view of a service and its resources (creation order preserved).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub resources: Vec<ResourceDescriptor>,
}

/// Read-only view of a provider and everything it owns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub model: String,
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub services: Vec<ServiceDescriptor>,
}

/// Criterion for `filtered_snapshot`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFilter {
    /// Every provider in the twin.
    All,
    /// Providers belonging to the given model.
    Model(String),
    /// Providers whose id starts with the given prefix.
    ProviderPrefix(String),
}

impl SnapshotFilter {
    #[inline]
    pub fn accepts(&self, model: &str, provider_id: &str) -> bool {
        match self {
            SnapshotFilter::All => true,
            SnapshotFilter::Model(m) => m == model,
            SnapshotFilter::ProviderPrefix(p) => provider_id.starts_with(p.as_str()),
        }
    }
}
