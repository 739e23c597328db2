use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::warn;

use crate::config::AppConfig;

/// Characters escaped when a storage key is embedded in a public URL.
/// Slashes are left alone so the key keeps its path shape.
const URL_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'\\');

/// Blob-storage half of the gateway: upload with overwrite control,
/// best-effort removal, and public-URL resolution.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    /// Stores an object. With `overwrite` false the call fails when the
    /// key already exists.
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        overwrite: bool,
    ) -> Result<()>;

    /// Removes the given objects, continuing past individual failures.
    async fn remove(&self, keys: &[String]) -> Result<()>;

    /// Resolves the public download URL for a key. Pure; does not check
    /// that the object exists.
    fn public_url(&self, key: &str) -> String;

    /// Inverse of `public_url` for URLs this storage issued. `None`
    /// when the URL belongs to a different bucket or host.
    fn object_key(&self, url: &str) -> Option<String>;
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl S3Storage {
    pub fn new(
        client: S3Client,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds the client from the app config. Path-style addressing is
    /// forced so bucket-in-path endpoints (and local stand-ins) work.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()));

        if let Some(endpoint) = &config.aws_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access_key), Some(secret_key)) = (
            config.aws_access_key_id.as_deref(),
            config.aws_secret_access_key.as_deref(),
        ) {
            loader = loader
                .credentials_provider(Credentials::new(access_key, secret_key, None, None, "static"));
        }

        let shared = loader.load().await;
        let s3_config = S3ConfigBuilder::from(&shared).force_path_style(true).build();

        Ok(Self::new(
            S3Client::from_conf(s3_config),
            config.storage_bucket.clone(),
            config.storage_public_url.clone(),
        ))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        overwrite: bool,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        if !overwrite {
            request = request.if_none_match("*");
        }

        request
            .send()
            .await
            .context("failed to upload object to storage")?;

        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        let mut first_error = None;
        for key in keys {
            if let Err(err) = self
                .client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                warn!(%key, error = %err, "failed to delete object");
                first_error.get_or_insert_with(|| anyhow::anyhow!("failed to delete {key}: {err}"));
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn public_url(&self, key: &str) -> String {
        let encoded = utf8_percent_encode(key.trim_start_matches('/'), URL_UNSAFE);
        format!("{}/{}", self.public_base_url, encoded)
    }

    fn object_key(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_base_url)
            .map(|rest| rest.trim_start_matches('/').to_string())
            .filter(|key| !key.is_empty())
    }
}
