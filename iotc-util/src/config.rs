use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::store::{Store, StoreError};

/// A configuration document persisted in a [`Store`]
pub trait StoredConfig
where
    Self: Serialize,
    Self: DeserializeOwned,
{
    fn kind() -> &'static str;

    /// This config's preferred file name excluding the extension.
    fn default_name() -> &'static str {
        Self::kind()
    }
}

#[derive(Debug, Error)]
#[error("failed to read {kind} config: {source}")]
pub struct GetConfigError {
    kind: &'static str,
    source: StoreError,
}

#[derive(Debug, Error)]
#[error("failed to store {kind} config: {source}")]
pub struct StoreConfigError {
    kind: &'static str,
    source: StoreError,
}

/// Load the config `C` from its default location, `None` if it was never
/// stored
pub async fn load<C: StoredConfig>(store: &Store) -> Result<Option<C>, GetConfigError> {
    debug!("reading {} config", C::kind());
    store
        .read(C::default_name())
        .await
        .map_err(|source| GetConfigError {
            kind: C::kind(),
            source,
        })
}

/// Store the config `C` in its default location
pub async fn save<C: StoredConfig>(store: &Store, config: &C) -> Result<(), StoreConfigError> {
    debug!("storing {} config", C::kind());
    store
        .write(C::default_name(), config)
        .await
        .map_err(|source| StoreConfigError {
            kind: C::kind(),
            source,
        })
}
