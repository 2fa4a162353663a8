//! Object storage for uploaded images.

use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};

use crate::prelude::*;

/// Build the storage key for an upload: `{folder}/{doc_type}_{timestamp}.png`.
///
/// The timestamp has one-second resolution, so two uploads to the same
/// folder and type within the same second will collide.
pub fn object_key(folder: &str, doc_type: &str, uploaded_at: DateTime<Utc>) -> String {
    format!(
        "{}/{}_{}.png",
        folder,
        doc_type,
        uploaded_at.format("%Y_%m_%d_%H_%M_%S")
    )
}

/// Somewhere we can put uploaded images.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Store `bytes` under `key`, returning the key.
    async fn put(&self, bytes: Vec<u8>, bucket: &str, key: &str) -> Result<String>;
}

/// An [`ObjectStore`] backed by S3.
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    /// Create a new S3 store.
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(level = "debug", skip(self, bytes), fields(len = bytes.len()))]
    async fn put(&self, bytes: Vec<u8>, bucket: &str, key: &str) -> Result<String> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("image/png")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .with_context(|| format!("failed to upload s3://{}/{}", bucket, key))?;
        debug!("Uploaded image");
        Ok(key.to_owned())
    }
}
