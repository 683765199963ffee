use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use minijinja::context;
use tracing::{debug, info, warn};

use crate::{
    AppState,
    api::models::users::{CurrentUser, MessageForm, UserQuery},
    errors::Error,
    templates,
};

use super::redirect_found;

/// Profile page with stored details and uploaded files
///
/// Loads the profile record and the user's file listing. A failed file
/// listing degrades to an empty list rather than failing the page.
#[utoipa::path(
    get,
    path = "/profile",
    tag = "profile",
    params(UserQuery),
    responses(
        (status = 200, description = "Profile page", content_type = "text/html"),
        (status = 307, description = "No user given or no stored profile; redirects to login"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("cognito_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn profile_page(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<UserQuery>,
) -> Result<Response, Error> {
    let Some(user) = query.user.filter(|user| !user.is_empty()) else {
        return Ok(Redirect::temporary("/login").into_response());
    };

    let Some(profile) = state.profiles.get_profile(&user).await? else {
        return Ok(Redirect::temporary("/login").into_response());
    };

    let files = match state.storage.list_user_files(&user).await {
        Ok(files) => files,
        Err(e) => {
            warn!("Listing files for {user} failed: {e}");
            Vec::new()
        }
    };

    Ok(templates::render(
        "profile.html",
        context! {
            username => user,
            user => profile,
            files => files,
        },
    )?
    .into_response())
}

/// Demo message box
///
/// Logs the message and returns to the profile page; nothing is stored.
#[utoipa::path(
    post,
    path = "/send_message",
    tag = "profile",
    responses(
        (status = 302, description = "Message logged; redirects to the profile page"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn send_message(Form(form): Form<MessageForm>) -> Response {
    if let Some(message) = form.message.as_deref().filter(|message| !message.is_empty()) {
        debug!("Demo message from {}: {message}", form.user.as_deref().unwrap_or("anonymous"));
    }
    info!("Message sent! (This is just a demo)");
    redirect_found("/profile")
}
