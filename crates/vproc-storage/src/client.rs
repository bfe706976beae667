//! S3 client implementation.

use std::path::{Path, PathBuf};

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Content type for uploaded archives.
const OCTET_STREAM: &str = "application/octet-stream";

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket holding uploaded input videos
    pub input_bucket: String,
    /// Bucket receiving produced archives
    pub output_bucket: String,
    /// Region (falls back to the SDK default chain)
    pub region: Option<String>,
    /// Custom endpoint, e.g. LocalStack or MinIO
    pub endpoint_url: Option<String>,
    /// Static credentials; when absent the SDK default chain is used
    pub credentials: Option<StaticCredentials>,
}

/// Explicit access keys.
#[derive(Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl S3Config {
    /// Create config from environment variables.
    ///
    /// `S3_BUCKET` names a single bucket for both directions; the
    /// `S3_INPUT_BUCKET` / `S3_OUTPUT_BUCKET` pair overrides it.
    pub fn from_env() -> StorageResult<Self> {
        let shared = std::env::var("S3_BUCKET").ok();
        let input_bucket = std::env::var("S3_INPUT_BUCKET")
            .ok()
            .or_else(|| shared.clone())
            .ok_or_else(|| StorageError::config_error("S3_INPUT_BUCKET or S3_BUCKET not set"))?;
        let output_bucket = std::env::var("S3_OUTPUT_BUCKET")
            .ok()
            .or(shared)
            .ok_or_else(|| StorageError::config_error("S3_OUTPUT_BUCKET or S3_BUCKET not set"))?;

        let credentials = match (
            std::env::var("AWS_ACCESS_KEY_ID"),
            std::env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Ok(access_key_id), Ok(secret_access_key)) => Some(StaticCredentials {
                access_key_id,
                secret_access_key,
                session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
            }),
            _ => None,
        };

        Ok(Self {
            input_bucket,
            output_bucket,
            region: std::env::var("AWS_REGION").ok(),
            endpoint_url: std::env::var("AWS_ENDPOINT_URL").ok(),
            credentials,
        })
    }
}

/// S3 artifact storage client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    input_bucket: String,
    output_bucket: String,
}

impl S3Client {
    /// Create a new S3 client from configuration.
    pub async fn new(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(creds) = &config.credentials {
            loader = loader.credentials_provider(Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token.clone(),
                None,
                "static",
            ));
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            input_bucket: config.input_bucket,
            output_bucket: config.output_bucket,
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Ok(Self::new(config).await)
    }

    /// Download an input object into `dir`, returning the local path.
    ///
    /// The local file is named after the last segment of the key.
    pub async fn download_to_dir(&self, key: &str, dir: &Path) -> StorageResult<PathBuf> {
        let path = dir.join(local_file_name(key));
        self.download_file(key, &path).await?;
        Ok(path)
    }

    /// Download an input object to a file.
    pub async fn download_file(&self, key: &str, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Downloading {} to {}", key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.input_bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::download_failed(format!("Failed to create directory: {}", e))
            })?;
        }

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(path).await?;
        tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| StorageError::download_failed(format!("Failed to write file: {}", e)))?;
        file.flush().await?;

        info!("Downloaded {} to {}", key, path.display());
        Ok(())
    }

    /// Upload a local file to the output bucket.
    pub async fn upload_file(&self, path: impl AsRef<Path>, key: &str) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.output_bucket)
            .key(key)
            .body(body)
            .content_type(OCTET_STREAM)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }
}

/// Local file name for a downloaded object key.
fn local_file_name(key: &str) -> &str {
    match key.rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name,
        _ => "input",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_file_name() {
        assert_eq!(local_file_name("upload/video.mp4"), "video.mp4");
        assert_eq!(local_file_name("video.mp4"), "video.mp4");
        assert_eq!(local_file_name("upload/"), "input");
        assert_eq!(local_file_name("upload/.."), "input");
        assert_eq!(local_file_name(""), "input");
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = StaticCredentials {
            access_key_id: "AKIA".into(),
            secret_access_key: "very-secret".into(),
            session_token: None,
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("AKIA"));
        assert!(!rendered.contains("very-secret"));
    }
}
