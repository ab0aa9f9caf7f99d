pub mod descriptor;
pub mod metrics;
pub mod settings;
pub mod timed;
pub mod topic;
pub mod update;
pub mod value;

// Re-export commonly used types
pub use descriptor::{
    ProviderDescriptor, ResourceDescriptor, ResourceKind, ServiceDescriptor, SnapshotFilter,
};
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use settings::Settings;
pub use timed::TimedValue;
pub use topic::{EventKind, LifecycleChange, TopicPattern, TwinEvent};
pub use update::{
    NullPolicy, TimestampInput, UpdateErrors, UpdateFailure, UpdatePushError, UpdateRequest,
};
pub use value::{DataType, TwinValue, ValueCastError};
