//! Application layer: HTTP handlers and shared server state.

pub mod handlers;

use std::sync::Arc;

use crate::auth::TokenAuthority;
use crate::persistence::DbPool;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub tokens: Arc<TokenAuthority>,
}

impl AppState {
    pub fn new(pool: DbPool, tokens: TokenAuthority) -> Self {
        Self {
            pool,
            tokens: Arc::new(tokens),
        }
    }
}
