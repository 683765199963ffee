//! API request/response models for users and their pages.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::token::AccessClaims;

/// The authenticated caller, as established by the session extractor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    pub sub: String,
    pub username: Option<String>,
}

impl From<AccessClaims> for CurrentUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            username: claims.username().map(str::to_string),
            sub: claims.sub,
        }
    }
}

/// Query parameters for pages that key off a username.
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct UserQuery {
    /// Username whose data to show
    pub user: Option<String>,
}

/// Form body for the profile page message box.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MessageForm {
    pub user: Option<String>,
    pub message: Option<String>,
}
