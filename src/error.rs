/// Error taxonomy for the session layer.
///
/// Only lifecycle problems surface as errors. Hardware transience — a pad
/// unplugged mid-read, an unsupported feature, a rejected command — is
/// absorbed into the disconnected snapshot or a `false` command result so
/// the per-frame polling path never needs error handling.

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A polling or command call arrived before `start()`.
    #[error("session is not started")]
    NotStarted,

    /// `start()` was called while the session is already active. Not a
    /// silent reset — the caller must stop first.
    #[error("session is already started")]
    AlreadyStarted,

    /// The native backend failed to initialize. Fatal: the session cannot
    /// proceed.
    #[error("input backend failed to initialize: {0}")]
    BackendInit(String),

    /// The mapping database was rejected. Surfaced only from the explicit
    /// `load_mappings` call — the load attempted during `start()` is
    /// best-effort and falls back to builtin mappings.
    #[error("failed to load controller mappings: {0}")]
    MappingLoad(String),
}
