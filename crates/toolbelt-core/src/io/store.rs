//! Object storage for release artifacts.
//!
//! Two buckets are involved in a release: the artifact bucket launcher builds
//! are read from, and the release bucket everything is published to. Both are
//! reached through [`ObjectStore`].
//!
//! The S3 implementation publishes through a staging key: the file is put at
//! `{key}.partial`, copied to `{key}`, and the staging object removed. A run
//! aborted mid-upload therefore never leaves a truncated object at a key
//! clients download from.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to {op} s3://{bucket}/{key}: {message}")]
    Request {
        op: &'static str,
        bucket: String,
        key: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket (or equivalent namespace) this store addresses.
    fn bucket(&self) -> &str;

    /// Download `key` to `dest`, returning the number of bytes written.
    async fn download(&self, key: &str, dest: &Path) -> Result<u64, StoreError>;

    /// Upload the file at `src` to `key`, replacing any existing object.
    async fn upload(&self, src: &Path, key: &str) -> Result<(), StoreError>;

    /// Server-side copy of `src_key` to `dst_key` within this store.
    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError>;
}

/// Suffix of the temporary key an upload is staged under.
pub const STAGING_SUFFIX: &str = ".partial";

/// Content type served for `key`.
pub fn content_type(key: &str) -> &'static str {
    if key.ends_with(".json") {
        "application/json"
    } else if key.ends_with(".zip") {
        "application/zip"
    } else if key.ends_with(".tar.gz") {
        "application/gzip"
    } else {
        "application/octet-stream"
    }
}

#[cfg(feature = "s3")]
pub use s3_store::{S3Store, s3_client};

#[cfg(feature = "s3")]
mod s3_store {
    use std::path::Path;

    use async_trait::async_trait;
    use aws_sdk_s3 as s3;
    use aws_sdk_s3::error::DisplayErrorContext;
    use tokio::io::AsyncWriteExt;

    use super::{ObjectStore, STAGING_SUFFIX, StoreError, content_type};
    use crate::settings::Settings;

    /// Build an S3 client from the ambient AWS credential chain.
    ///
    /// `TOOLBELT_S3_ENDPOINT` switches to path-style addressing against an
    /// S3-compatible server.
    pub async fn s3_client(settings: &Settings) -> s3::Client {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(s3::config::Region::new(settings.s3_region.clone()))
            .load()
            .await;

        let mut builder = s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.s3_endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        s3::Client::from_conf(builder.build())
    }

    /// A single S3 bucket.
    #[derive(Debug, Clone)]
    pub struct S3Store {
        client: s3::Client,
        bucket: String,
    }

    impl S3Store {
        pub fn new(client: s3::Client, bucket: impl Into<String>) -> Self {
            Self {
                client,
                bucket: bucket.into(),
            }
        }

        fn request_error(
            &self,
            op: &'static str,
            key: &str,
            err: impl std::error::Error,
        ) -> StoreError {
            StoreError::Request {
                op,
                bucket: self.bucket.clone(),
                key: key.to_string(),
                message: DisplayErrorContext(err).to_string(),
            }
        }

        async fn put(&self, src: &Path, key: &str, content_type: &str) -> Result<(), StoreError> {
            let body = s3::primitives::ByteStream::from_path(src)
                .await
                .map_err(|e| self.request_error("read", key, e))?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .content_type(content_type)
                .send()
                .await
                .map_err(|e| self.request_error("upload", key, e))?;
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| self.request_error("delete", key, e))?;
            Ok(())
        }
    }

    #[async_trait]
    impl ObjectStore for S3Store {
        fn bucket(&self) -> &str {
            &self.bucket
        }

        async fn download(&self, key: &str, dest: &Path) -> Result<u64, StoreError> {
            let resp = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| self.request_error("download", key, e))?;

            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut file = tokio::fs::File::create(dest).await?;
            let mut body = resp.body;
            let mut written: u64 = 0;

            while let Some(chunk) = body
                .try_next()
                .await
                .map_err(|e| self.request_error("download", key, e))?
            {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }

            file.flush().await?;
            tracing::debug!(bucket = %self.bucket, key, bytes = written, "downloaded object");
            Ok(written)
        }

        async fn upload(&self, src: &Path, key: &str) -> Result<(), StoreError> {
            let staging = format!("{key}{STAGING_SUFFIX}");
            self.put(src, &staging, content_type(key)).await?;

            let copied = self.copy(&staging, key).await;
            // The staging object is garbage either way.
            let cleaned = self.delete(&staging).await;
            copied?;
            cleaned?;

            tracing::debug!(bucket = %self.bucket, key, "uploaded object");
            Ok(())
        }

        async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
            self.client
                .copy_object()
                .bucket(&self.bucket)
                .key(dst_key)
                .copy_source(format!("{}/{src_key}", self.bucket))
                .content_type(content_type(dst_key))
                .metadata_directive(s3::types::MetadataDirective::Replace)
                .send()
                .await
                .map_err(|e| self.request_error("copy", dst_key, e))?;
            Ok(())
        }
    }
}
