//! Public server-rendered pages: home and the register/login/confirm forms.

use axum::response::Html;
use minijinja::context;

use crate::{errors::Error, templates};

/// Home page with links to registration and login
#[utoipa::path(
    get,
    path = "/",
    tag = "pages",
    responses(
        (status = 200, description = "Home page", content_type = "text/html"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn home_page() -> Result<Html<String>, Error> {
    templates::render("home.html", context! {})
}

/// Registration form
#[utoipa::path(
    get,
    path = "/register",
    tag = "pages",
    responses(
        (status = 200, description = "Registration form", content_type = "text/html"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register_page() -> Result<Html<String>, Error> {
    templates::render("register.html", context! {})
}

/// Login form
#[utoipa::path(
    get,
    path = "/login",
    tag = "pages",
    responses(
        (status = 200, description = "Login form", content_type = "text/html"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login_page() -> Result<Html<String>, Error> {
    templates::render("login.html", context! {})
}

/// Account confirmation form
#[utoipa::path(
    get,
    path = "/confirm",
    tag = "pages",
    responses(
        (status = 200, description = "Confirmation form", content_type = "text/html"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn confirm_page() -> Result<Html<String>, Error> {
    templates::render("confirm.html", context! {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, routing::get};
    use axum_test::TestServer;

    fn page_server() -> TestServer {
        let app = Router::new()
            .route("/", get(home_page))
            .route("/register", get(register_page))
            .route("/login", get(login_page))
            .route("/confirm", get(confirm_page));
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn test_home_page_links_to_auth_flows() {
        let server = page_server();
        let response = server.get("/").await;

        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("href=\"/register\""));
        assert!(body.contains("href=\"/login\""));
    }

    #[tokio::test]
    async fn test_register_page_has_multipart_form() {
        let server = page_server();
        let response = server.get("/register").await;

        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("enctype=\"multipart/form-data\""));
        assert!(body.contains("name=\"phone_number\""));
        assert!(!body.contains("class=\"error\""));
    }

    #[tokio::test]
    async fn test_login_page_renders_without_error_box() {
        let server = page_server();
        let response = server.get("/login").await;

        response.assert_status_ok();
        assert!(!response.text().contains("class=\"error\""));
    }

    #[tokio::test]
    async fn test_confirm_page_has_code_field() {
        let server = page_server();
        let response = server.get("/confirm").await;

        response.assert_status_ok();
        assert!(response.text().contains("name=\"code\""));
    }
}
