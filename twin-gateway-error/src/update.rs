use thiserror::Error;

/// Classification of a single rejected update item.
///
/// Produced by the update pipeline's per-item validation. The full failure
/// record (kind + original request + resolved path segments) lives next to
/// `UpdateRequest` in `twin-gateway-models`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFailureKind {
    /// Provider identifier absent or empty on the request.
    #[error("missing provider identifier")]
    MissingProvider,
    /// Service identifier absent or empty on the request.
    #[error("missing service identifier")]
    MissingService,
    /// Resource identifier absent or empty on the request.
    #[error("missing resource identifier")]
    MissingResource,
    /// Supplied value cannot be coerced to the declared resource type.
    #[error("value not convertible to declared type")]
    TypeConversionFailure,
    /// Supplied textual timestamp is not parseable.
    #[error("timestamp not parseable")]
    TimestampParseFailure,
}
