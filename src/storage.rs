//! Object storage helpers over S3.

use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;
use tracing::debug;

/// Errors raised by the object storage helper.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StorageError {
    /// Raised at construction when no usable credentials are available.
    #[error("failed to resolve credentials: {message}")]
    Credentials {
        /// Message reported by the credential provider.
        message: String,
    },
    /// Wrapper for storage API failures.
    #[error("storage API error: {message}")]
    Api {
        /// Message reported by the control plane or transport.
        message: String,
    },
}

fn api_error(err: impl std::error::Error) -> StorageError {
    StorageError::Api {
        message: DisplayErrorContext(&err).to_string(),
    }
}

/// Thin S3 client for listing, fetching, and uploading objects.
#[derive(Clone, Debug)]
pub struct ObjectStorage {
    client: Client,
}

impl ObjectStorage {
    /// Connects to the given region, resolving credentials from the ambient
    /// execution context. An empty region falls back to `AWS_REGION` and
    /// then to the built-in default. Credential resolution happens eagerly
    /// so a misconfigured environment fails at construction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Credentials`] when no usable credentials are
    /// available.
    pub async fn connect(region: &str) -> Result<Self, StorageError> {
        let resolved = if region.is_empty() {
            crate::env::str_var("AWS_REGION", "eu-west-1")
        } else {
            region.to_owned()
        };
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(resolved))
            .load()
            .await;
        let provider = config
            .credentials_provider()
            .ok_or_else(|| StorageError::Credentials {
                message: String::from("no credentials provider configured"),
            })?;
        provider
            .provide_credentials()
            .await
            .map_err(|err| StorageError::Credentials {
                message: err.to_string(),
            })?;
        Ok(Self {
            client: Client::new(&config),
        })
    }

    /// Wraps an already-configured S3 client.
    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Lists the object keys in `bucket`, optionally restricted to a key
    /// prefix. To list `s3://mybucket/20111117/data`, pass bucket
    /// `mybucket` and prefix `20111117/data`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Api`] when the listing fails.
    pub async fn list_keys(
        &self,
        bucket: &str,
        prefix: Option<&str>,
    ) -> Result<Vec<String>, StorageError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(prefix.map(ToOwned::to_owned))
            .send()
            .await
            .map_err(api_error)?;
        Ok(output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(ToOwned::to_owned))
            .collect())
    }

    /// Downloads the object at `bucket`/`key` into memory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Api`] when the download fails.
    pub async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(api_error)?;
        let body = output.body.collect().await.map_err(api_error)?;
        debug!(bucket, key, "fetched object");
        Ok(body.into_bytes().to_vec())
    }

    /// Uploads `body` to `bucket`/`key` with the given content type.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Api`] when the upload fails.
    pub async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(api_error)?;
        debug!(bucket, key, "uploaded object");
        Ok(())
    }
}
