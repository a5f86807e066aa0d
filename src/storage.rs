use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;

use crate::config::StorageConfig;

/// Image keys are never reused, so served objects can be cached forever.
const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Bucket holding menu item photos, served from a public domain.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put_image(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn remove_image(&self, key: &str) -> anyhow::Result<()>;
    /// Address customers load the image from.
    fn public_url(&self, key: &str) -> String;
}

pub fn join_public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

#[derive(Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ImageStore {
    pub async fn connect(cfg: &StorageConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!cfg.bucket.trim().is_empty(), "S3_BUCKET is empty");
        let credentials = Credentials::new(&cfg.access_key, &cfg.secret_key, None, None, "bakehouse-env");
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        // Path-style addressing for S3-compatible hosts.
        let s3 = S3ConfigBuilder::from(&shared).force_path_style(true).build();

        Ok(Self {
            client: Client::from_conf(s3),
            bucket: cfg.bucket.clone(),
            public_base_url: cfg.public_base_url.clone(),
        })
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn put_image(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .cache_control(IMAGE_CACHE_CONTROL)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("upload image {key} ({size} bytes) to {}", self.bucket))?;
        Ok(())
    }

    async fn remove_image(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("remove image {key} from {}", self.bucket))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_public_url(&self.public_base_url, key)
    }
}
