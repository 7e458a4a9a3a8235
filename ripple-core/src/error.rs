//! Error types.

use thiserror::Error;

/// Errors surfaced by the renderer and its host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The host does not provide a capability the renderer needed.
    #[error("host capability `{0}` is not provided")]
    MissingCapability(&'static str),

    /// A render description or host node was expected to be attached.
    #[error("node is not attached to a host tree")]
    Detached,

    /// The reactive runtime backing a renderer has been dropped.
    #[error("reactive runtime has been dropped")]
    RuntimeDropped,
}

pub type Result<T> = std::result::Result<T, Error>;
