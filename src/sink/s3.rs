use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;

use super::BlobUploader;
use crate::error::{ProbeError, Result};

const CONTENT_TYPE: &str = "application/octet-stream";

/// Puts record files into one S3 bucket, optionally under a key prefix.
pub struct S3Uploader {
    client: Client,
    bucket: String,
    key_prefix: String,
}

impl S3Uploader {
    pub fn new(client: Client, bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key_prefix: key_prefix.into(),
        }
    }

    /// Client configured from the standard AWS environment/profile chain.
    pub async fn from_env(bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&shared), bucket, key_prefix)
    }

    pub fn object_key(&self, name: &str) -> String {
        object_key(&self.key_prefix, name)
    }
}

fn object_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

#[async_trait]
impl BlobUploader for S3Uploader {
    async fn upload(&self, name: &str, path: &Path) -> Result<String> {
        let object_key = self.object_key(name);
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| ProbeError::upload(&self.bucket, &object_key, e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .content_type(CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                ProbeError::upload(&self.bucket, &object_key, DisplayErrorContext(&e).to_string())
            })?;
        Ok(object_key)
    }

    fn destination(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key_prefix.trim_matches('/'))
    }
}
