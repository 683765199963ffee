//! OpenAPI documentation for the portal routes, served through Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Security scheme for the session cookie set by the login form.
struct SessionSecurityAddon;

impl Modify for SessionSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "cognito_token".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "cognito_token",
                    "Access token issued by the user pool, set as a cookie by `/login`. \
                     A `Bearer` token in the `Authorization` header is accepted as well.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SessionSecurityAddon),
    paths(
        api::handlers::pages::home_page,
        api::handlers::pages::register_page,
        api::handlers::pages::login_page,
        api::handlers::pages::confirm_page,
        api::handlers::auth::register,
        api::handlers::auth::confirm,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::cognito_login,
        api::handlers::profile::profile_page,
        api::handlers::profile::send_message,
        api::handlers::files::upload_file,
        api::handlers::files::download_file,
        api::handlers::static_assets::serve_static_asset,
    ),
    components(
        schemas(
            api::models::auth::LoginForm,
            api::models::auth::ConfirmForm,
            api::models::auth::TokenResponse,
            api::models::auth::AuthErrorResponse,
            api::models::users::CurrentUser,
            api::models::users::MessageForm,
        )
    ),
    tags(
        (name = "pages", description = "Server-rendered pages."),
        (name = "authentication", description = "Registration, confirmation and login against the user pool."),
        (name = "profile", description = "The protected profile page and its message box."),
        (name = "files", description = "Per-user file upload and download."),
    ),
    info(
        title = "Cubby",
        version = "0.1.0",
        description = "Self-service user portal: accounts live in a Cognito user pool, \
                       files in S3, and profile details in DynamoDB.",
    )
)]
pub struct ApiDoc;
