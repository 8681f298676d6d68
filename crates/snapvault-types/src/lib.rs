pub mod api;
pub mod error;
pub mod models;

pub use error::Error;
pub use models::Role;
