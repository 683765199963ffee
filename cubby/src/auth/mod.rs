//! Session authentication: token verification against the user pool's
//! published signing keys, and the request extractor that gates routes on it.

pub mod current_user;
pub mod token;
