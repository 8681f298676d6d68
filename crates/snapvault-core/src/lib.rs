//! Core operation surface: membership/role authority, upload validation,
//! and storage routing. Everything here is HTTP-agnostic — handlers in
//! snapvault-api call these functions and map the typed errors to statuses.

mod convert;

pub mod groups;
pub mod photos;
pub mod policy;
pub mod storage;
pub mod users;
pub mod validate;
