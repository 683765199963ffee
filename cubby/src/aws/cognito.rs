//! Cognito user pool integration: sign-up, confirmation and password login.
//!
//! All three calls attach the `SECRET_HASH` parameter when the app client has
//! a secret configured; secret-less app clients simply omit it.

use aws_sdk_cognitoidentityprovider::Client;
use aws_sdk_cognitoidentityprovider::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error as ThisError;

use crate::config::CognitoConfig;

/// An error returned by the identity provider, reduced to the service error
/// code and message. Transport failures carry no code.
#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct IdentityError {
    pub code: Option<String>,
    pub message: String,
}

impl IdentityError {
    fn from_sdk<E>(err: SdkError<E>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        let code = err.code().map(str::to_string);
        let message = match err.message() {
            Some(message) => message.to_string(),
            None => DisplayErrorContext(&err).to_string(),
        };
        Self { code, message }
    }

    /// The message shown to users on the registration/login/confirmation forms.
    pub fn friendly_message(&self) -> String {
        match self.code.as_deref() {
            Some("NotAuthorizedException") => "Incorrect username or password!".to_string(),
            Some("UserNotFoundException") => "User does not exist!".to_string(),
            Some("UserNotConfirmedException") => {
                "User not confirmed. Please check your email or phone for the confirmation code.".to_string()
            }
            Some("UsernameExistsException") => "A user with this username already exists!".to_string(),
            Some("ExpiredCodeException") => "Confirmation code expired. Please request a new one.".to_string(),
            Some("CodeMismatchException") => "Invalid confirmation code.".to_string(),
            _ => format!("Error: {}", self.message),
        }
    }
}

/// Tokens issued by a successful password login.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct CognitoService {
    client: Client,
    client_id: String,
    client_secret: Option<String>,
}

impl CognitoService {
    pub fn new(client: Client, config: &CognitoConfig, client_secret: Option<String>) -> Self {
        Self {
            client,
            client_id: config.client_id.clone(),
            client_secret,
        }
    }

    /// Register a new user with the standard attribute set. The `name`
    /// attribute mirrors the username.
    pub async fn sign_up(
        &self,
        username: &str,
        password: &str,
        email: &str,
        address: &str,
        phone_number: &str,
    ) -> Result<(), IdentityError> {
        let attribute = |name: &str, value: &str| {
            AttributeType::builder()
                .name(name)
                .value(value)
                .build()
                .map_err(|e| IdentityError {
                    code: None,
                    message: format!("build user attribute {name}: {e}"),
                })
        };

        let mut request = self
            .client
            .sign_up()
            .client_id(&self.client_id)
            .username(username)
            .password(password)
            .user_attributes(attribute("email", email)?)
            .user_attributes(attribute("name", username)?)
            .user_attributes(attribute("address", address)?)
            .user_attributes(attribute("phone_number", phone_number)?);

        if let Some(hash) = self.secret_hash(username) {
            request = request.secret_hash(hash);
        }

        request.send().await.map_err(IdentityError::from_sdk)?;
        Ok(())
    }

    /// Confirm a freshly registered user with the emailed/texted code.
    pub async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), IdentityError> {
        let mut request = self
            .client
            .confirm_sign_up()
            .client_id(&self.client_id)
            .username(username)
            .confirmation_code(code);

        if let Some(hash) = self.secret_hash(username) {
            request = request.secret_hash(hash);
        }

        request.send().await.map_err(IdentityError::from_sdk)?;
        Ok(())
    }

    /// Verify a username/password pair via the `USER_PASSWORD_AUTH` flow and
    /// return the issued tokens.
    pub async fn initiate_auth(&self, username: &str, password: &str) -> Result<AuthTokens, IdentityError> {
        let mut request = self
            .client
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(&self.client_id)
            .auth_parameters("USERNAME", username)
            .auth_parameters("PASSWORD", password);

        if let Some(hash) = self.secret_hash(username) {
            request = request.auth_parameters("SECRET_HASH", hash);
        }

        let response = request.send().await.map_err(IdentityError::from_sdk)?;

        let result = response.authentication_result().ok_or_else(|| IdentityError {
            code: None,
            message: "authentication did not return tokens (unexpected challenge)".to_string(),
        })?;

        let access_token = result.access_token().ok_or_else(|| IdentityError {
            code: None,
            message: "authentication result carried no access token".to_string(),
        })?;

        Ok(AuthTokens {
            access_token: access_token.to_string(),
            id_token: result.id_token().unwrap_or_default().to_string(),
            refresh_token: result.refresh_token().unwrap_or_default().to_string(),
        })
    }

    fn secret_hash(&self, username: &str) -> Option<String> {
        self.client_secret
            .as_deref()
            .map(|secret| compute_secret_hash(secret, username, &self.client_id))
    }
}

/// `SECRET_HASH` as Cognito defines it: base64 of HMAC-SHA256 over
/// `username + client_id`, keyed with the app client secret.
fn compute_secret_hash(client_secret: &str, username: &str, client_id: &str) -> String {
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());

    STANDARD.encode(mac.finalize().into_bytes())
}
