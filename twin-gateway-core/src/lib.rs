//! Core runtime of the twin gateway.
//!
//! - [`engine`]: the single-worker command executor every twin access runs on
//! - [`twin`]: the in-memory provider/service/resource store and model registry
//! - [`update`]: the update validation/application pipeline
//! - [`session`]: sessions, subscriptions, and the notification hub
//! - [`gateway`]: the facade wiring everything together

pub mod engine;
pub mod gateway;
pub mod session;
pub mod twin;
pub mod update;

pub use engine::{CommandEngine, CommandFuture, ModelTxn, TwinTxn};
pub use gateway::TwinGateway;
pub use session::{
    EventCallback, ListenerCallbacks, NotificationHub, Session, SessionId, SessionRegistry,
    SubscriptionId,
};
pub use twin::model::{ActionHandler, ModelRegistry, ResourceDecl};
pub use twin::{ResourcePath, TwinStore};
pub use update::UpdatePipeline;
