//! S3-backed file storage: per-user uploads and profile photos.

use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

use crate::errors::Error;

#[derive(Clone)]
pub struct StorageService {
    client: Client,
    bucket: String,
}

impl StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Store an object under the given key.
    pub async fn put_object(&self, key: &str, data: Bytes) -> Result<(), Error> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("store {key} in {}: {}", self.bucket, DisplayErrorContext(&e)),
            })?;

        Ok(())
    }

    /// Names of the objects under `{username}/`, with the prefix stripped.
    pub async fn list_user_files(&self, username: &str) -> Result<Vec<String>, Error> {
        let prefix = format!("{username}/");

        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .send()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("list files under {prefix}: {}", DisplayErrorContext(&e)),
            })?;

        let files = response
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .map(|key| key.split_once('/').map(|(_, rest)| rest).unwrap_or(key).to_string())
            .filter(|name| !name.is_empty())
            .collect();

        Ok(files)
    }

    /// Fetch a whole object into memory.
    pub async fn get_object(&self, key: &str) -> Result<Bytes, Error> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("fetch {key} from {}: {}", self.bucket, DisplayErrorContext(&e)),
            })?;

        let body = response.body.collect().await.map_err(|e| Error::Internal {
            operation: format!("read body of {key}: {e}"),
        })?;

        Ok(body.into_bytes())
    }

    /// Public https URL of an object, virtual-hosted style.
    pub fn public_url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{key}", self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_sdk_config;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_service(server: &MockServer) -> StorageService {
        let sdk_config = test_sdk_config(&server.uri()).await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();
        StorageService {
            client: Client::from_conf(s3_config),
            bucket: "cubby-files".to_string(),
        }
    }

    #[test]
    fn test_public_url() {
        let service = StorageService {
            client: Client::from_conf(aws_sdk_s3::Config::builder().behavior_version_latest().build()),
            bucket: "cubby-files".to_string(),
        };
        assert_eq!(
            service.public_url("profile_photos/alice_1_me.png"),
            "https://cubby-files.s3.amazonaws.com/profile_photos/alice_1_me.png"
        );
    }

    #[tokio::test]
    async fn test_list_user_files_strips_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cubby-files/"))
            .and(query_param("list-type", "2"))
            .and(query_param("prefix", "alice/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>cubby-files</Name>
  <Prefix>alice/</Prefix>
  <KeyCount>3</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>alice/</Key>
    <LastModified>2024-01-01T00:00:00.000Z</LastModified>
    <ETag>&quot;d41d8cd98f00b204e9800998ecf8427e&quot;</ETag>
    <Size>0</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>alice/notes.txt</Key>
    <LastModified>2024-01-02T00:00:00.000Z</LastModified>
    <ETag>&quot;abc123&quot;</ETag>
    <Size>11</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>alice/report.pdf</Key>
    <LastModified>2024-01-03T00:00:00.000Z</LastModified>
    <ETag>&quot;def456&quot;</ETag>
    <Size>2048</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
</ListBucketResult>"#,
            ))
            .mount(&server)
            .await;

        let service = test_service(&server).await;
        let files = service.list_user_files("alice").await.unwrap();

        // The folder-marker key collapses to an empty name and is dropped
        assert_eq!(files, vec!["notes.txt".to_string(), "report.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_get_object_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cubby-files/alice/notes.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world".to_vec()))
            .mount(&server)
            .await;

        let service = test_service(&server).await;
        let data = service.get_object("alice/notes.txt").await.unwrap();

        assert_eq!(data.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_get_missing_object_is_internal_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cubby-files/alice/nope.txt"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>NoSuchKey</Code>
  <Message>The specified key does not exist.</Message>
  <Key>alice/nope.txt</Key>
  <RequestId>4442587FB7D0A2F9</RequestId>
</Error>"#,
            ))
            .mount(&server)
            .await;

        let service = test_service(&server).await;
        let err = service.get_object("alice/nope.txt").await.unwrap_err();

        assert!(matches!(err, Error::Internal { .. }));
    }

    #[tokio::test]
    async fn test_put_object() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/cubby-files/alice/hello.txt"))
            .respond_with(ResponseTemplate::new(200).insert_header("etag", "\"abc123\""))
            .expect(1)
            .mount(&server)
            .await;

        let service = test_service(&server).await;
        service
            .put_object("alice/hello.txt", Bytes::from_static(b"hi"))
            .await
            .unwrap();
    }
}
