//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `CUBBY_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `CUBBY_` override YAML values
//! 3. **AWS_REGION** - Special case: overrides `aws.region` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `CUBBY_COGNITO__CLIENT_ID=abc123` sets the `cognito.client_id` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use cubby::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Parse CLI arguments
//! let args = Args::parse();
//!
//! // Load configuration from file and environment
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Structure
//!
//! The configuration file is structured in YAML format. See the repository's `config.yaml` for a
//! complete example with all available options. Key sections include:
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **AWS**: `aws.region`, `aws.endpoint_url` - SDK region and optional endpoint override
//! - **Cognito**: `cognito.user_pool_id`, `cognito.client_id` - Identity provider settings
//! - **Storage**: `storage.bucket` - S3 bucket for uploaded files
//! - **Profiles**: `profiles.table` - DynamoDB table holding user profile records
//! - **Session**: `session.cookie_name`, `session.cookie_secure` - Session cookie settings
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! CUBBY_PORT=8080
//!
//! # Set the SDK region (preferred method)
//! AWS_REGION="eu-west-1"
//!
//! # Or use CUBBY_AWS__REGION
//! CUBBY_AWS__REGION="eu-west-1"
//!
//! # Override nested values
//! CUBBY_COGNITO__USER_POOL_ID="eu-west-1_AbCdEfGh"
//! CUBBY_SESSION__COOKIE_SECURE=true
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CUBBY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation; the Cognito
/// pool/client, S3 bucket and DynamoDB table must be supplied for the app to start.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// AWS SDK configuration shared by all service clients
    pub aws: AwsConfig,
    /// Cognito user pool settings
    pub cognito: CognitoConfig,
    /// S3 file storage settings
    pub storage: StorageConfig,
    /// DynamoDB profile table settings
    pub profiles: ProfilesConfig,
    /// Session cookie settings
    pub session: SessionConfig,
}

/// AWS SDK settings shared by every service client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AwsConfig {
    /// Region the user pool, bucket and table live in
    pub region: String,
    /// Optional endpoint override, for localstack-style targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<Url>,
}

/// Cognito user pool and app client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CognitoConfig {
    /// User pool ID, e.g. "il-central-1_AbCdEfGh"
    pub user_pool_id: String,
    /// App client ID tokens must be issued for
    pub client_id: String,
    /// App client secret. When unset it is fetched from the secret store at
    /// startup; when that also fails the app runs without one and omits the
    /// SECRET_HASH parameter (valid for secret-less app clients).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Secrets Manager secret holding the app client secret under the
    /// `COGNITO_APP_CLIENT_SECRET` JSON key
    pub secret_name: String,
    /// Override for the JWKS document URL; defaults to the pool's well-known location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_url: Option<Url>,
}

/// S3 file storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Bucket holding per-user files and profile photos
    pub bucket: String,
    /// Maximum accepted upload body size in bytes
    pub max_upload_size: u64,
    /// Use path-style bucket addressing (required by localstack/minio targets)
    pub force_path_style: bool,
}

/// DynamoDB profile table settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfilesConfig {
    /// Table keyed by `user_id` holding supplementary profile attributes
    pub table: String,
}

/// Session cookie settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Name of the cookie carrying the access token
    pub cookie_name: String,
    /// Mark the cookie `Secure` (HTTPS-only deployments)
    pub cookie_secure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            aws: AwsConfig::default(),
            cognito: CognitoConfig::default(),
            storage: StorageConfig::default(),
            profiles: ProfilesConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "il-central-1".to_string(),
            endpoint_url: None,
        }
    }
}

impl Default for CognitoConfig {
    fn default() -> Self {
        Self {
            user_pool_id: String::new(),
            client_id: String::new(),
            client_secret: None,
            secret_name: "cubby/cognito".to_string(),
            jwks_url: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            max_upload_size: 25 * 1024 * 1024, // 25 MB
            force_path_style: false,
        }
    }
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self { table: String::new() }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "cognito_token".to_string(),
            cookie_secure: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.cognito.user_pool_id.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: cognito.user_pool_id is not configured. \
                     Please set CUBBY_COGNITO__USER_POOL_ID or add it to the config file."
                    .to_string(),
            });
        }

        if self.cognito.client_id.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: cognito.client_id is not configured. \
                     Please set CUBBY_COGNITO__CLIENT_ID or add it to the config file."
                    .to_string(),
            });
        }

        if self.storage.bucket.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: storage.bucket is not configured. \
                     Please set CUBBY_STORAGE__BUCKET or add it to the config file."
                    .to_string(),
            });
        }

        if self.storage.max_upload_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: storage.max_upload_size must be at least 1 byte".to_string(),
            });
        }

        if self.profiles.table.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: profiles.table is not configured. \
                     Please set CUBBY_PROFILES__TABLE or add it to the config file."
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("CUBBY_").split("__"))
            // Common AWS_REGION pattern shared with the SDK's own tooling
            .merge(Env::raw().only(&["AWS_REGION"]).map(|_| "aws.region".into()).split("."))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Issuer URL of the configured user pool.
    pub fn cognito_issuer(&self) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.aws.region, self.cognito.user_pool_id
        )
    }

    /// Location of the pool's JWKS document, honoring the configured override.
    pub fn jwks_url(&self) -> String {
        match &self.cognito.jwks_url {
            Some(url) => url.to_string(),
            None => format!("{}/.well-known/jwks.json", self.cognito_issuer()),
        }
    }
}
