pub mod session;
pub mod update;

use anyhow::Error as AnyhowError;
use config::ConfigError;
use serde_json::Error as SerdeJsonError;
use session::SessionError;
use std::{error::Error as StdError, io::Error as IoError};
use thiserror::Error;
use tokio::task::JoinError;
use update::UpdateFailureKind;

pub type TGResult<T, E = TGError> = anyhow::Result<T, E>;

#[derive(Error, Debug, Default)]
pub enum TGError {
    #[error("service unavailable")]
    #[default]
    ServiceUnavailable,
    /// The command engine's queue is closed (gateway stopping or stopped).
    #[error("command engine closed")]
    EngineClosed,
    /// A resource-scoped query targeted a path with no such resource.
    ///
    /// Distinct from [`UpdateFailureKind::MissingResource`], which is about an
    /// update *request* lacking an identifier.
    #[error("resource not found: {provider}/{service}/{resource}")]
    ResourceNotFound {
        provider: String,
        service: String,
        resource: String,
    },
    #[error("provider not found: {0}")]
    ProviderNotFound(String),
    #[error("service not found: {provider}/{service}")]
    ServiceNotFound { provider: String, service: String },
    #[error("no action handler registered for {0}")]
    ActionNotBound(String),
    #[error("{0}")]
    SessionError(#[from] SessionError),
    #[error("{0}")]
    JoinError(#[from] JoinError),
    #[error("{0}")]
    StdError(#[from] Box<dyn StdError + Send + Sync>),
    #[error("{0}")]
    Error(String),
    #[error("{0}")]
    IoError(#[from] IoError),
    #[error("{0}")]
    Msg(String),
    #[error("{0}")]
    Anyhow(#[from] AnyhowError),
    #[error("{0}")]
    Json(#[from] SerdeJsonError),
    #[error("{0}")]
    ConfigError(#[from] ConfigError),
    #[error("Initialization error: {0}")]
    InitializationError(String),
    #[error("Shutdown error: {0}")]
    ShutdownError(String),
    #[error("Invalid state error: {0}")]
    InvalidStateError(String),
}

impl From<String> for TGError {
    #[inline]
    fn from(e: String) -> Self {
        TGError::Msg(e)
    }
}

impl From<&str> for TGError {
    #[inline]
    fn from(e: &str) -> Self {
        TGError::Msg(e.to_string())
    }
}
