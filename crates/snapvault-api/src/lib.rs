//! HTTP layer: thin axum handlers over the snapvault-core operation
//! surface. Holds no business rules — it extracts, calls core, and maps
//! typed errors to statuses.

pub mod auth;
pub mod error;
pub mod groups;
pub mod middleware;
pub mod photos;
pub mod users;

use std::sync::Arc;

use snapvault_core::storage::Storage;
use snapvault_db::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub storage: Storage,
    pub jwt_secret: String,
}
