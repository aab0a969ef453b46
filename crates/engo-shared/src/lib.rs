//! # engo-shared
//!
//! Domain types and wire records shared by the Engo store and client crates.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::DecodeError;
pub use protocol::{MessageRecord, ProfileRecord};
pub use types::{Message, Participant, ParticipantId};
