//! # engo-client
//!
//! The chat-delivery core: sending with an optional grammar check, live
//! conversation and roster views, profiles, and the compose box state.
//!
//! Everything talks to the outside world through two seams,
//! [`engo_store::MessageStore`] and [`TextValidator`], so tests and other
//! frontends can plug in their own.

pub mod channel;
pub mod client;
pub mod compose;
pub mod config;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod profiles;
pub mod roster;
pub mod subscription;
pub mod validator;

use tracing_subscriber::{fmt, EnvFilter};

pub use channel::ConversationChannel;
pub use client::ChatClient;
pub use compose::ComposeState;
pub use config::ClientConfig;
pub use error::{ConfigError, ProfileError, SubscriptionError, ValidationError, WriteError};
pub use pipeline::{RejectReason, SendOutcome, SendPipeline, SendPolicy};
pub use profiles::ProfileDirectory;
pub use roster::PresenceRoster;
pub use subscription::{Subscription, SurfaceScope};
pub use validator::{GeminiValidator, TextValidator, Verdict};

/// Install the fmt subscriber, filtered by `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("engo_client=debug,engo_store=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}
