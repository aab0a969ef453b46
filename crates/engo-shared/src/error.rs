use thiserror::Error;

/// Failure to turn a stored JSON record into a domain value.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}
