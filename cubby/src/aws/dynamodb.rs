//! DynamoDB-backed user profile records.

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::Serialize;

use crate::config::ProfilesConfig;
use crate::errors::Error;

/// Supplementary profile attributes stored outside the identity provider,
/// keyed by `user_id` (the username).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub address: String,
    pub phone_number: String,
    /// Public URL of the profile photo; empty when none was uploaded.
    pub profile_photo: String,
}

#[derive(Clone)]
pub struct ProfileStore {
    client: Client,
    table: String,
}

impl ProfileStore {
    pub fn new(client: Client, config: &ProfilesConfig) -> Self {
        Self {
            client,
            table: config.table.clone(),
        }
    }

    /// Write (or overwrite) the profile record.
    pub async fn put_profile(&self, profile: &UserProfile) -> Result<(), Error> {
        self.client
            .put_item()
            .table_name(&self.table)
            .item("user_id", AttributeValue::S(profile.user_id.clone()))
            .item("email", AttributeValue::S(profile.email.clone()))
            .item("address", AttributeValue::S(profile.address.clone()))
            .item("phone_number", AttributeValue::S(profile.phone_number.clone()))
            .item("profile_photo", AttributeValue::S(profile.profile_photo.clone()))
            .send()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("store profile for {}: {}", profile.user_id, DisplayErrorContext(&e)),
            })?;

        Ok(())
    }

    /// Fetch a profile record, `None` when the user has no item.
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, Error> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .send()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("fetch profile for {user_id}: {}", DisplayErrorContext(&e)),
            })?;

        let Some(item) = response.item else {
            return Ok(None);
        };

        let text = |name: &str| {
            item.get(name)
                .and_then(|value| value.as_s().ok())
                .cloned()
                .unwrap_or_default()
        };

        Ok(Some(UserProfile {
            user_id: text("user_id"),
            email: text("email"),
            address: text("address"),
            phone_number: text("phone_number"),
            profile_photo: text("profile_photo"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_sdk_config;
    use wiremock::matchers::{body_string_contains, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_store(server: &MockServer) -> ProfileStore {
        let sdk_config = test_sdk_config(&server.uri()).await;
        ProfileStore {
            client: Client::new(&sdk_config),
            table: "cubby-profiles".to_string(),
        }
    }

    fn dynamo_response(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/x-amz-json-1.0")
            .set_body_string(body.to_string())
    }

    #[tokio::test]
    async fn test_put_profile_sends_all_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "DynamoDB_20120810.PutItem"))
            .and(body_string_contains("cubby-profiles"))
            .and(body_string_contains("phone_number"))
            .respond_with(dynamo_response("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let store = test_store(&server).await;
        store
            .put_profile(&UserProfile {
                user_id: "alice".to_string(),
                email: "alice@example.com".to_string(),
                address: "1 Main St".to_string(),
                phone_number: "+972501234567".to_string(),
                profile_photo: String::new(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_profile_roundtrips_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "DynamoDB_20120810.GetItem"))
            .respond_with(dynamo_response(
                r#"{"Item":{"user_id":{"S":"alice"},"email":{"S":"alice@example.com"},"address":{"S":"1 Main St"},"phone_number":{"S":"+972501234567"},"profile_photo":{"S":"https://cubby-files.s3.amazonaws.com/profile_photos/alice_1_me.png"}}}"#,
            ))
            .mount(&server)
            .await;

        let store = test_store(&server).await;
        let profile = store.get_profile("alice").await.unwrap().unwrap();

        assert_eq!(
            profile,
            UserProfile {
                user_id: "alice".to_string(),
                email: "alice@example.com".to_string(),
                address: "1 Main St".to_string(),
                phone_number: "+972501234567".to_string(),
                profile_photo: "https://cubby-files.s3.amazonaws.com/profile_photos/alice_1_me.png".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_get_profile_missing_item_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "DynamoDB_20120810.GetItem"))
            .respond_with(dynamo_response("{}"))
            .mount(&server)
            .await;

        let store = test_store(&server).await;
        assert!(store.get_profile("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_profile_table_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", "DynamoDB_20120810.GetItem"))
            .respond_with(
                ResponseTemplate::new(400)
                    .insert_header("content-type", "application/x-amz-json-1.0")
                    .set_body_string(
                        r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceNotFoundException","message":"Requested resource not found"}"#,
                    ),
            )
            .mount(&server)
            .await;

        let store = test_store(&server).await;
        let err = store.get_profile("alice").await.unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }
}
