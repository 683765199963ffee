use axum::{
    Form, Json,
    extract::{Multipart, State},
    http::{
        StatusCode,
        header::{LOCATION, SET_COOKIE},
    },
    response::{Html, IntoResponse, Response},
};
use bytes::Bytes;
use minijinja::context;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::auth::{AuthErrorResponse, ConfirmForm, LoginForm, TokenResponse},
    aws::dynamodb::UserProfile,
    errors::Error,
    templates,
};

use super::{bad_multipart, profile_location, redirect_found};

/// Register a new account
///
/// Signs the user up with the identity provider, stores the optional profile
/// photo in the object store, and writes the profile record.
#[utoipa::path(
    post,
    path = "/register",
    tag = "authentication",
    responses(
        (status = 302, description = "Registered; redirects to the confirmation page"),
        (status = 200, description = "Registration rejected; form re-rendered with the reason", content_type = "text/html"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, Error> {
    let mut username = String::new();
    let mut email = String::new();
    let mut password = String::new();
    let mut address = String::new();
    let mut phone_number = String::new();
    let mut photo: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("username") => username = field.text().await.map_err(bad_multipart)?,
            Some("email") => email = field.text().await.map_err(bad_multipart)?,
            Some("password") => password = field.text().await.map_err(bad_multipart)?,
            Some("address") => address = field.text().await.map_err(bad_multipart)?,
            Some("phone_number") => phone_number = field.text().await.map_err(bad_multipart)?,
            Some("profile_photo") => {
                // Browsers send an empty part when no file was picked.
                let filename = field.file_name().map(str::to_string).filter(|name| !name.is_empty());
                let data = field.bytes().await.map_err(bad_multipart)?;
                if let Some(filename) = filename {
                    if !data.is_empty() {
                        photo = Some((filename, data));
                    }
                }
            }
            _ => {}
        }
    }

    if let Err(e) = state
        .cognito
        .sign_up(&username, &password, &email, &address, &phone_number)
        .await
    {
        info!("Registration rejected for {username}: {e}");
        return Ok(templates::render("register.html", context! { error => e.friendly_message() })?.into_response());
    }

    let photo_url = match photo {
        Some((filename, data)) => {
            let key = format!("profile_photos/{username}_{}_{filename}", Uuid::new_v4());
            state.storage.put_object(&key, data).await?;
            state.storage.public_url(&key)
        }
        None => String::new(),
    };

    state
        .profiles
        .put_profile(&UserProfile {
            user_id: username.clone(),
            email,
            address,
            phone_number,
            profile_photo: photo_url,
        })
        .await?;

    Ok(redirect_found("/confirm"))
}

/// Confirm a registration with the emailed or texted code
#[utoipa::path(
    post,
    path = "/confirm",
    tag = "authentication",
    request_body(content = ConfirmForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Confirmation form re-rendered with the outcome", content_type = "text/html"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn confirm(State(state): State<AppState>, Form(form): Form<ConfirmForm>) -> Result<Html<String>, Error> {
    match state.cognito.confirm_sign_up(&form.username, &form.code).await {
        Ok(()) => templates::render(
            "confirm.html",
            context! { success => "Your account has been confirmed! You can now log in." },
        ),
        Err(e) => {
            info!("Confirmation failed for {}: {e}", form.username);
            templates::render("confirm.html", context! { error => e.friendly_message() })
        }
    }
}

/// Log in and start a browser session
///
/// On success the access token is set as the session cookie and the browser
/// is sent to the profile page.
#[utoipa::path(
    post,
    path = "/login",
    tag = "authentication",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Authenticated; session cookie set, redirects to the profile page"),
        (status = 200, description = "Login rejected; form re-rendered with the reason", content_type = "text/html"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Result<Response, Error> {
    match state.cognito.initiate_auth(&form.username, &form.password).await {
        Ok(tokens) => {
            let cookie = create_session_cookie(&tokens.access_token, &state.config);
            Ok((
                StatusCode::FOUND,
                [(LOCATION, profile_location(&form.username)), (SET_COOKIE, cookie)],
            )
                .into_response())
        }
        Err(e) => {
            info!("Login rejected for {}: {e}", form.username);
            Ok(templates::render("login.html", context! { error => e.friendly_message() })?.into_response())
        }
    }
}

/// Log out by clearing the session cookie
#[utoipa::path(
    get,
    path = "/logout",
    tag = "authentication",
    responses(
        (status = 302, description = "Session cookie cleared; redirects to the home page"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = clear_session_cookie(&state.config);
    (StatusCode::FOUND, [(LOCATION, "/".to_string()), (SET_COOKIE, cookie)]).into_response()
}

/// Authenticate and return the issued tokens as JSON
///
/// API flavor of login for non-browser clients.
#[utoipa::path(
    post,
    path = "/cognito-login",
    tag = "authentication",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token triple", body = TokenResponse),
        (status = 401, description = "Authentication failed", body = AuthErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn cognito_login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    match state.cognito.initiate_auth(&form.username, &form.password).await {
        Ok(tokens) => Json(TokenResponse {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
        })
        .into_response(),
        Err(e) => {
            info!("Token login rejected for {}: {e}", form.username);
            (
                StatusCode::UNAUTHORIZED,
                Json(AuthErrorResponse {
                    error: e.friendly_message(),
                }),
            )
                .into_response()
        }
    }
}

/// Helper function to create the session cookie carrying the access token
fn create_session_cookie(token: &str, config: &crate::config::Config) -> String {
    let session = &config.session;
    let mut cookie = format!("{}={token}; Path=/; HttpOnly", session.cookie_name);
    if session.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_session_cookie(config: &crate::config::Config) -> String {
    format!("{}=; Path=/; HttpOnly; Max-Age=0", config.session.cookie_name)
}
