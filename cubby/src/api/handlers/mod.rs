//! HTTP request handlers for all portal routes.
//!
//! This module contains Axum route handlers organized by concern:
//!
//! - [`pages`]: public server-rendered pages (home and the three forms)
//! - [`auth`]: registration, confirmation, login/logout, and the JSON token endpoint
//! - [`profile`]: the protected profile page and the demo message box
//! - [`files`]: upload into and download out of the object store
//! - [`static_assets`]: embedded stylesheet serving
//!
//! # Redirects
//!
//! Browser form flows answer with `302 Found` so the redirected POST is
//! re-issued as a GET of the target page. The "not logged in" bounces to
//! `/login` keep `307 Temporary Redirect`.
//!
//! # Error Handling
//!
//! Identity-provider rejections on the register/confirm/login forms re-render
//! the submitting form with a friendly message. Everything else returns
//! [`crate::errors::Error`], which converts to a rendered error page.

use axum::http::{StatusCode, header::LOCATION};
use axum::response::{IntoResponse, Response};

use crate::errors::Error;

pub mod auth;
pub mod files;
pub mod pages;
pub mod profile;
pub mod static_assets;

/// A plain `302 Found` redirect.
pub(crate) fn redirect_found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// Location of a user's profile page, username carried in the query string.
pub(crate) fn profile_location(username: &str) -> String {
    format!("/profile?user={}", urlencoding::encode(username))
}

/// Map a multipart decoding failure to a client error.
pub(crate) fn bad_multipart(e: axum::extract::multipart::MultipartError) -> Error {
    Error::BadRequest {
        message: format!("Invalid multipart body: {e}"),
    }
}
