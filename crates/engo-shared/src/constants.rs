/// Top-level collection holding every conversation copy
pub const MESSAGES_ROOT: &str = "messages";

/// Top-level collection holding participant profiles
pub const USERS_ROOT: &str = "users";

/// Label shown for participants without a display name
pub const DEFAULT_FALLBACK_NAME: &str = "User";

/// Messages with this many whitespace-delimited tokens or fewer skip validation
pub const DEFAULT_AUTO_APPROVE_MAX_TOKENS: usize = 2;

/// Client-side bound on a single validator call
pub const DEFAULT_VALIDATOR_TIMEOUT_MS: u64 = 10_000;

/// Client-side bound on a single store write
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 10_000;

/// Suggestion surfaced when the validator could not give an answer
pub const VERIFY_FAILED_SUGGESTION: &str = "Couldn't verify your message. Please try again.";

/// Generative-language model used for grammar checks
pub const DEFAULT_VALIDATOR_MODEL: &str = "gemini-1.5-flash";

/// Generative-language API base URL
pub const DEFAULT_VALIDATOR_BASE_URL: &str = "https://generativelanguage.googleapis.com";
