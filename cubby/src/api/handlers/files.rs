use axum::{
    extract::{Multipart, Path, Query, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{Html, IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use tracing::warn;

use crate::{
    AppState,
    api::models::users::{CurrentUser, UserQuery},
    errors::Error,
};

use super::{bad_multipart, profile_location, redirect_found};

/// Upload a file into the user's folder
#[utoipa::path(
    post,
    path = "/upload",
    tag = "files",
    responses(
        (status = 302, description = "Stored; redirects back to the profile page"),
        (status = 307, description = "No user given; redirects to login"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("cognito_token" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn upload_file(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Response, Error> {
    let mut user = String::new();
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("user") => user = field.text().await.map_err(bad_multipart)?,
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(bad_multipart)?;
                upload = Some((filename, data));
            }
            _ => {}
        }
    }

    if user.is_empty() {
        return Ok(Redirect::temporary("/login").into_response());
    }

    let (filename, data) = upload.ok_or_else(|| Error::BadRequest {
        message: "No file in upload".to_string(),
    })?;

    state.storage.put_object(&format!("{user}/{filename}"), data).await?;

    Ok(redirect_found(&profile_location(&user)))
}

/// Download one of the user's files
///
/// Unauthenticated, like the page links it serves: the file key is derived
/// from the query, and failures collapse into a 404 page.
#[utoipa::path(
    get,
    path = "/download/{filename}",
    tag = "files",
    params(
        ("filename" = String, Path, description = "Name of the file to download"),
        UserQuery,
    ),
    responses(
        (status = 200, description = "File contents as an attachment", content_type = "application/octet-stream"),
        (status = 307, description = "No user given; redirects to login"),
        (status = 404, description = "File missing or store error", content_type = "text/html"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<UserQuery>,
) -> Response {
    let Some(user) = query.user.filter(|user| !user.is_empty()) else {
        return Redirect::temporary("/login").into_response();
    };

    let key = format!("{user}/{filename}");
    match state.storage.get_object(&key).await {
        Ok(data) => (
            [
                (CONTENT_TYPE, "application/octet-stream".to_string()),
                (CONTENT_DISPOSITION, attachment_disposition(&filename)),
            ],
            data,
        )
            .into_response(),
        Err(e) => {
            warn!("Download of {key} failed: {e}");
            (StatusCode::NOT_FOUND, Html(format!("<h2>File not found or error: {e}</h2>"))).into_response()
        }
    }
}

/// `Content-Disposition` for a download. Non-ASCII names get an ASCII
/// fallback plus the RFC 5987 `filename*` parameter.
fn attachment_disposition(filename: &str) -> String {
    if filename.is_ascii() && !filename.contains(['"', '\\']) {
        return format!("attachment; filename=\"{filename}\"");
    }

    let mut fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    if !fallback.chars().any(|c| c.is_ascii_alphanumeric()) {
        fallback = "downloaded_file".to_string();
    }
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}
