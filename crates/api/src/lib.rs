use std::sync::Arc;

use store::{CredentialCipher, Store};

pub mod auth;
pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::{ApiError, Result};
pub use router::create_router;
pub use server::run_server;

/// Shared application state: the SQLite store and the credential cipher.
pub struct AppState {
    pub store: Store,
    pub cipher: CredentialCipher,
}

pub type SharedState = Arc<AppState>;
