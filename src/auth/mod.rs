// Authentication module
// Manages token lifecycle: validation, login fallback and application to the docs UI

mod types;
mod decode;
mod client;
mod store;
mod manager;

pub use client::{AuthApi, HttpAuthApi};
pub use decode::{classify_locally, decode_claims, remaining_minutes};
pub use manager::{Action, ApplyOutcome, ApplyStage, TokenLifecycleManager};
pub use store::{MemoryTokenStore, SqliteTokenStore, TokenStore, TOKEN_KEY};
pub use types::{
    DevTokenResponse, DevTokenTerm, DevTokenUser, LegacyCredentials, LoginOutcome,
    LoginResponse, LoginRoute, TokenClaims, TokenStatus, ValidateResponse,
    EXPIRING_SOON_MINUTES, UNKNOWN_USER,
};

#[cfg(any(test, feature = "test-utils"))]
pub use decode::encode_unsigned;
