//! Thin wrappers around the AWS service clients the portal talks to.
//!
//! Each wrapper owns its SDK client plus the configuration slice it needs, so
//! handlers never touch raw SDK builders. All of them are cheap to clone (the
//! SDK clients are internally reference counted).

pub mod cognito;
pub mod dynamodb;
pub mod s3;
pub mod secrets;
