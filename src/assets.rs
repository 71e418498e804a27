use crate::config::{AudioEncodingSpec, StorageConfig};
use crate::consts::GOOGLE_CLOUD_PLATFORM_SCOPE;
use crate::error::PublishError;
use crate::google_types::StorageObject;
use crate::utils::GoogleAuth;

use async_trait::async_trait;
use http::StatusCode;
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error};

/// Deterministic storage key for the audio rendering of `reply`: the same text always maps to the
/// same key, in every process.
pub fn content_key(prefix: &str, reply: &str, format: &AudioEncodingSpec) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reply.as_bytes());
    let digest = hasher.finalize();
    let name = format!("response-{:x}.{}", digest, format.container.extension());
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{prefix}/{name}")
    }
}

/// Durable, publicly readable audio storage.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// The URL an asset stored under `key` is (or would be) served from.
    fn url_for(&self, key: &str) -> String;

    /// Whether an asset is already stored under `key`.
    async fn exists(&self, key: &str) -> Result<bool, PublishError>;

    /// Store `audio` under `key`, replacing anything already there, and return its URL.
    async fn publish(
        &self,
        key: &str,
        audio: Vec<u8>,
        content_type: &str,
    ) -> Result<String, PublishError>;
}

pub struct GcsPublisher {
    http_client: reqwest::Client,
    auth: Arc<GoogleAuth>,
    config: StorageConfig,
}

impl GcsPublisher {
    pub fn new(http_client: reqwest::Client, auth: Arc<GoogleAuth>, config: StorageConfig) -> Self {
        Self {
            http_client,
            auth,
            config,
        }
    }

    async fn token(&self) -> Result<String, PublishError> {
        self.auth
            .bearer_token(&[GOOGLE_CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| {
                error!(error=%e, "failed to get google token for storage");
                PublishError::Auth(e)
            })
    }
}

#[async_trait]
impl AssetStore for GcsPublisher {
    fn url_for(&self, key: &str) -> String {
        public_url(&self.config.public_base_url, &self.config.bucket, key)
    }

    /// Always asks the bucket: lifecycle rules may have removed the object since it was written.
    async fn exists(&self, key: &str) -> Result<bool, PublishError> {
        let url = object_metadata_url(&self.config.base_url, &self.config.bucket, key)?;
        let token = self.token().await?;
        let resp = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(PublishError::Rejected { status }),
        }
    }

    async fn publish(
        &self,
        key: &str,
        audio: Vec<u8>,
        content_type: &str,
    ) -> Result<String, PublishError> {
        let url = upload_url(&self.config.base_url, &self.config.bucket, key)?;
        let token = self.token().await?;
        let resp = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(audio)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, content_key=%key, "failed to send upload to storage");
                PublishError::Network(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(status=%status, body=%body, content_key=%key, "storage rejected upload");
            return Err(PublishError::Rejected { status });
        }
        match resp.json::<StorageObject>().await {
            Ok(object) => debug!(
                name=%object.name,
                bucket=%object.bucket,
                generation=?object.generation,
                size=?object.size,
                "stored object"
            ),
            Err(e) => debug!(error=%e, "upload succeeded with unreadable object resource"),
        }
        Ok(self.url_for(key))
    }
}

fn bucket_url(base_url: &str, segments: &[&str]) -> Result<Url, PublishError> {
    let mut url = Url::parse(base_url).map_err(|e| PublishError::Url(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| PublishError::Url(format!("{base_url} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Media upload endpoint.  The object name travels as a query parameter, so slashes in the key
/// survive as part of the name.
pub fn upload_url(base_url: &str, bucket: &str, key: &str) -> Result<Url, PublishError> {
    let mut url = bucket_url(base_url, &["upload", "storage", "v1", "b", bucket, "o"])?;
    url.query_pairs_mut()
        .append_pair("uploadType", "media")
        .append_pair("name", key);
    Ok(url)
}

/// Metadata endpoint; the whole key is one (percent-encoded) path segment.
pub fn object_metadata_url(base_url: &str, bucket: &str, key: &str) -> Result<Url, PublishError> {
    bucket_url(base_url, &["storage", "v1", "b", bucket, "o", key])
}

pub fn public_url(public_base_url: &str, bucket: &str, key: &str) -> String {
    format!("{}/{bucket}/{key}", public_base_url.trim_end_matches('/'))
}
