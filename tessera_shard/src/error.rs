use thiserror::Error;

/// Rejected shard configuration. Raised before any connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one shard config is required")]
    NoShards,
    #[error("validation: invalid shard id {0}")]
    InvalidId(String),
    #[error("validation: invalid address for shard {0}")]
    InvalidAddress(String),
    #[error("duplicate shard id {0}")]
    DuplicateId(String),
    #[error("duplicate shard address {0}")]
    DuplicateAddress(String),
    #[error("connect func is required")]
    MissingConnector,
}

/// Failure of [`ClusterBuilder::connect`](crate::ClusterBuilder::connect).
#[derive(Debug, Error)]
pub enum ConnectError<E> {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// First error returned by the connect function, verbatim.
    #[error(transparent)]
    Connect(E),
}

impl<E> ConnectError<E> {
    pub fn is_config(&self) -> bool {
        matches!(self, ConnectError::Config(_))
    }
}
