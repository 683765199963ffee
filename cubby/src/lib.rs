//! # cubby: Self-Service User Portal on AWS
//!
//! `cubby` is a server-rendered portal that gives every registered user a small
//! shelf of their own: a Cognito-backed account, per-user file storage in S3,
//! and a DynamoDB record for the profile details Cognito has no place for.
//!
//! ## Overview
//!
//! The portal wraps three AWS services behind plain HTML forms. Visitors
//! register with a username, password, contact details and an optional profile
//! photo. Cognito owns the password and the confirmation-code exchange, S3
//! stores the photo and any files uploaded later, and DynamoDB keeps the
//! supplementary profile attributes. Everything is rendered server-side from
//! embedded templates, so the only client-side asset is a stylesheet.
//!
//! ### Request Flow
//!
//! Form posts to `/register`, `/confirm` and `/login` talk to the user pool
//! through the AWS SDK. A successful login stores the pool's access token in an
//! `HttpOnly` cookie and redirects to the profile page. Protected pages extract
//! the token from that cookie (or from an `Authorization: Bearer` header),
//! verify its RS256 signature against the pool's published JWKS document, and
//! only then touch S3 or DynamoDB on the user's behalf. Rejections from the
//! user pool are rendered back into the originating form as friendly messages
//! rather than error pages.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) holds the route handlers and their form/query
//! models: the public pages, the registration and login flows, the protected
//! profile page, and per-user file upload and download. A JSON endpoint at
//! `/cognito-login` exposes the raw token grant for programmatic clients.
//!
//! The **authentication layer** ([`auth`]) verifies pool-issued JWTs. The JWKS
//! document is fetched lazily on first use and cached for the process lifetime.
//! The [`CurrentUser`](api::models::users::CurrentUser) extractor gates the
//! protected routes on a verified token.
//!
//! The **AWS layer** ([`aws`]) wraps each SDK client (Cognito, S3, DynamoDB,
//! Secrets Manager) in a thin service struct so handlers never assemble raw SDK
//! calls. The app client secret used for Cognito's `SECRET_HASH` parameter is
//! read from Secrets Manager at startup when it is not configured directly.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use cubby::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Parse CLI arguments and load configuration
//!     let args = cubby::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     // Initialize structured logging
//!     cubby::telemetry::init_telemetry()?;
//!
//!     // Create and start the application
//!     let app = Application::new(config).await?;
//!
//!     // Run with graceful shutdown on Ctrl+C
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod aws;
pub mod config;
pub mod errors;
mod openapi;
mod static_assets;
pub mod telemetry;
mod templates;

#[cfg(test)]
pub mod test_utils;

use crate::{
    auth::token::TokenVerifier,
    aws::cognito::CognitoService,
    aws::dynamodb::ProfileStore,
    aws::s3::StorageService,
    config::AwsConfig,
    errors::Error,
    openapi::ApiDoc,
};
use aws_config::{BehaviorVersion, Region};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, error, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// Every field is cheap to clone; axum clones the whole state per request.
#[derive(Clone, Builder)]
pub struct AppState {
    /// Application configuration loaded from file/environment
    pub config: Config,
    /// User pool client for sign-up, confirmation and login
    pub cognito: CognitoService,
    /// S3-backed per-user file storage
    pub storage: StorageService,
    /// DynamoDB profile records
    pub profiles: ProfileStore,
    /// Verifier for pool-issued access tokens
    pub verifier: TokenVerifier,
}

/// Build the shared state from loaded configuration and a resolved SDK
/// configuration. S3 gets its own client config so path-style addressing can
/// be toggled without affecting the other services.
pub(crate) fn build_state(config: Config, sdk_config: &aws_config::SdkConfig, client_secret: Option<String>) -> Result<AppState, Error> {
    let cognito = CognitoService::new(
        aws_sdk_cognitoidentityprovider::Client::new(sdk_config),
        &config.cognito,
        client_secret,
    );

    let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
        .force_path_style(config.storage.force_path_style)
        .build();
    let storage = StorageService::new(aws_sdk_s3::Client::from_conf(s3_config), config.storage.bucket.clone());

    let profiles = ProfileStore::new(aws_sdk_dynamodb::Client::new(sdk_config), &config.profiles);

    let verifier = TokenVerifier::new(&config)?;

    Ok(AppState::builder()
        .config(config)
        .cognito(cognito)
        .storage(storage)
        .profiles(profiles)
        .verifier(verifier)
        .build())
}

/// Assemble the portal router.
pub(crate) fn build_router(state: AppState) -> Router {
    // Multipart routes get the configured limit instead of axum's 2 MB default
    let max_upload = state.config.storage.max_upload_size as usize;
    let multipart_routes = Router::new()
        .route(
            "/register",
            post(api::handlers::auth::register).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route(
            "/upload",
            post(api::handlers::files::upload_file).layer(DefaultBodyLimit::max(max_upload)),
        );

    let router = Router::new()
        // Server-rendered pages
        .route("/", get(api::handlers::pages::home_page))
        .route("/register", get(api::handlers::pages::register_page))
        .route("/confirm", get(api::handlers::pages::confirm_page))
        .route("/login", get(api::handlers::pages::login_page))
        // Account flows
        .merge(multipart_routes)
        .route("/confirm", post(api::handlers::auth::confirm))
        .route("/login", post(api::handlers::auth::login))
        .route("/logout", get(api::handlers::auth::logout))
        .route("/cognito-login", post(api::handlers::auth::cognito_login))
        // Profile page and its demo message box
        .route("/profile", get(api::handlers::profile::profile_page))
        .route("/send_message", post(api::handlers::profile::send_message))
        // Per-user files
        .route("/download/{filename}", get(api::handlers::files::download_file))
        // Embedded assets and liveness
        .route("/static/{*path}", get(api::handlers::static_assets::serve_static_asset))
        .route("/healthz", get(|| async { "OK" }))
        .with_state(state)
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Add tracing layer
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// SDK configuration from the environment's credential chain, with the
/// configured region and optional endpoint override applied.
async fn load_sdk_config(aws: &AwsConfig) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(aws.region.clone()));
    if let Some(endpoint) = &aws.endpoint_url {
        loader = loader.endpoint_url(endpoint.to_string());
    }
    loader.load().await
}

/// Resolve the app client secret: configuration wins, then Secrets Manager.
///
/// A missing secret is not fatal. Secret-less app clients are valid, so the
/// failure is logged and logins proceed without a `SECRET_HASH` parameter.
async fn resolve_client_secret(config: &Config, sdk_config: &aws_config::SdkConfig) -> Option<String> {
    if config.cognito.client_secret.is_some() {
        return config.cognito.client_secret.clone();
    }

    match aws::secrets::fetch_client_secret(sdk_config, &config.cognito.secret_name).await {
        Ok(secret) => Some(secret),
        Err(e) => {
            error!("Could not resolve the app client secret ({e}); continuing without one");
            None
        }
    }
}

/// Main application struct that owns the router and server lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] loads the SDK configuration, resolves
///    the app client secret and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts
///    handling requests
/// 3. **Shutdown**: when the shutdown future resolves, in-flight requests are
///    drained before the server exits
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all AWS clients initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let sdk_config = load_sdk_config(&config.aws).await;
        Self::new_with_sdk_config(config, sdk_config).await
    }

    /// Like [`Application::new`], but with a caller-provided SDK configuration.
    /// Tests use this to point every AWS client at a mock endpoint.
    pub async fn new_with_sdk_config(config: Config, sdk_config: aws_config::SdkConfig) -> anyhow::Result<Self> {
        debug!("Starting portal with configuration: {:#?}", config);

        let client_secret = resolve_client_secret(&config, &sdk_config).await;

        let state = build_state(config.clone(), &sdk_config, client_secret)?;
        let router = build_router(state);

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Portal listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Run the server with graceful shutdown
        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Portal shut down cleanly");

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::models::auth::LoginForm;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_portal_config(server: &MockServer) -> Config {
        let mut config = create_test_config();
        config.aws.endpoint_url = Some(server.uri().parse().unwrap());
        config.cognito.jwks_url = Some(format!("{}{JWKS_PATH}", server.uri()).parse().unwrap());
        config
    }

    async fn test_application(server: &MockServer, config: Config) -> Application {
        let sdk_config = test_sdk_config(&server.uri()).await;
        Application::new_with_sdk_config(config, sdk_config)
            .await
            .expect("Failed to build application")
    }

    const EMPTY_LISTING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>cubby-files</Name>
  <Prefix>alice/</Prefix>
  <KeyCount>0</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
</ListBucketResult>"#;

    /// Integration test: log in through the form, then open the profile page
    /// with the session cookie the login handed back.
    #[test_log::test(tokio::test)]
    async fn test_login_then_profile_flow() {
        let server = MockServer::start().await;
        mount_jwks(&server).await;

        // The pool returns a real signed token so the profile page can verify it
        let token = mint_access_token("alice");
        Mock::given(method("POST"))
            .and(header("x-amz-target", "AWSCognitoIdentityProviderService.InitiateAuth"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/x-amz-json-1.1")
                    .set_body_json(serde_json::json!({
                        "AuthenticationResult": {
                            "AccessToken": token,
                            "IdToken": "id-abc",
                            "RefreshToken": "refresh-abc",
                            "ExpiresIn": 3600,
                            "TokenType": "Bearer",
                        }
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "DynamoDB_20120810.GetItem"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/x-amz-json-1.0")
                    .set_body_string(
                        r#"{"Item":{"user_id":{"S":"alice"},"email":{"S":"alice@example.com"},"address":{"S":"1 Main St"},"phone_number":{"S":"+972501234567"},"profile_photo":{"S":""}}}"#,
                    ),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cubby-files/"))
            .and(query_param("prefix", "alice/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_LISTING))
            .mount(&server)
            .await;

        let app = test_application(&server, mock_portal_config(&server)).await.into_test_server();

        let login = app
            .post("/login")
            .form(&LoginForm {
                username: "alice".to_string(),
                password: "hunter22!".to_string(),
            })
            .await;
        login.assert_status(StatusCode::FOUND);
        assert_eq!(login.headers().get("location").unwrap(), "/profile?user=alice");

        let cookie = login.headers().get("set-cookie").unwrap().to_str().unwrap();
        let session = cookie.split(';').next().unwrap().to_string();

        let profile = app
            .get("/profile")
            .add_query_param("user", "alice")
            .add_header("cookie", session)
            .await;
        profile.assert_status_ok();
        let body = profile.text();
        assert!(body.contains("Welcome, alice!"));
        assert!(body.contains("alice@example.com"));
    }

    /// The client secret comes from Secrets Manager when it is not configured,
    /// and logins then carry a SECRET_HASH computed from it.
    #[test_log::test(tokio::test)]
    async fn test_client_secret_fetched_when_not_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "secretsmanager.GetSecretValue"))
            .and(body_string_contains("cubby/cognito"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/x-amz-json-1.1")
                    .set_body_string(
                        r#"{"Name":"cubby/cognito","SecretString":"{\"COGNITO_APP_CLIENT_SECRET\":\"from-secrets-manager\"}"}"#,
                    ),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "AWSCognitoIdentityProviderService.InitiateAuth"))
            .and(body_string_contains("SECRET_HASH"))
            .respond_with(
                ResponseTemplate::new(400)
                    .insert_header("content-type", "application/x-amz-json-1.1")
                    .set_body_string(r#"{"__type":"NotAuthorizedException","message":"Incorrect username or password."}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut config = mock_portal_config(&server);
        config.cognito.client_secret = None;

        let app = test_application(&server, config).await.into_test_server();

        let response = app
            .post("/login")
            .form(&LoginForm {
                username: "alice".to_string(),
                password: "wrong".to_string(),
            })
            .await;

        response.assert_status_ok();
        assert!(response.text().contains("Incorrect username or password!"));
    }

    /// An unreachable secret store is logged and tolerated; the portal still
    /// starts and serves pages.
    #[test_log::test(tokio::test)]
    async fn test_missing_secret_is_tolerated() {
        let server = MockServer::start().await;

        let mut config = mock_portal_config(&server);
        config.cognito.client_secret = None;

        let app = test_application(&server, config).await.into_test_server();

        let response = app.get("/").await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_healthz() {
        let server = MockServer::start().await;
        let app = test_application(&server, mock_portal_config(&server)).await.into_test_server();

        let response = app.get("/healthz").await;

        response.assert_status_ok();
        assert_eq!(response.text(), "OK");
    }

    #[tokio::test]
    async fn test_docs_page_is_served() {
        let server = MockServer::start().await;
        let app = test_application(&server, mock_portal_config(&server)).await.into_test_server();

        let response = app.get("/docs").await;
        response.assert_status_ok();
        assert!(response.text().contains("Cubby"));

        let spec = app.get("/api-docs/openapi.json").await;
        spec.assert_status_ok();
        assert!(spec.text().contains("\"/profile\""));
    }
}
