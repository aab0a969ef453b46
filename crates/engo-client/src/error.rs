use std::time::Duration;

use thiserror::Error;

use engo_shared::DecodeError;
use engo_store::{StoreError, StorePath};

/// Why a text validator could not give a verdict.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Validator timed out after {0:?}")]
    Timeout(Duration),

    #[error("Validator request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Validator answered with HTTP {0}")]
    Status(u16),

    #[error("Malformed validator reply: {0}")]
    Malformed(String),

    #[error("Validator not configured: {0}")]
    NotConfigured(&'static str),
}

/// A store write that did not land.
#[derive(Error, Debug)]
#[error("Write to {path} failed: {source}")]
pub struct WriteError {
    pub path: StorePath,
    #[source]
    pub source: StoreError,
}

/// A live view that could not start or stopped on its own.
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Invalid conversation path: {0}")]
    InvalidPath(StoreError),

    #[error("Subscription to {path} failed: {source}")]
    Store {
        path: StorePath,
        #[source]
        source: StoreError,
    },

    #[error("Subscription to {0} was closed by the store")]
    Closed(StorePath),
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Unreadable profile: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("Could not open store: {0}")]
    Store(#[from] StoreError),

    #[error("Could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
