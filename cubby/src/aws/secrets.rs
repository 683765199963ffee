//! Startup fetch of the Cognito app client secret from Secrets Manager.

use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::DisplayErrorContext;

use crate::errors::Error;

const CLIENT_SECRET_KEY: &str = "COGNITO_APP_CLIENT_SECRET";

/// Read the app client secret out of the named secret's JSON payload.
pub async fn fetch_client_secret(sdk_config: &aws_config::SdkConfig, secret_name: &str) -> Result<String, Error> {
    let client = Client::new(sdk_config);

    let response = client
        .get_secret_value()
        .secret_id(secret_name)
        .send()
        .await
        .map_err(|e| Error::Internal {
            operation: format!("fetch secret {secret_name}: {}", DisplayErrorContext(&e)),
        })?;

    let payload = response.secret_string().ok_or_else(|| Error::Internal {
        operation: format!("secret {secret_name} has no string payload"),
    })?;

    let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| Error::Internal {
        operation: format!("parse secret {secret_name}: {e}"),
    })?;

    let secret = value
        .get(CLIENT_SECRET_KEY)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Internal {
            operation: format!("secret {secret_name} is missing the {CLIENT_SECRET_KEY} key"),
        })?;

    Ok(secret.to_string())
}
