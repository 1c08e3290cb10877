/// S3 object storage for post images
use super::{public_url, ObjectStorage, StorageError, StorageResult, StoredObject};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

pub struct S3ObjectStorage {
    client: Client,
    bucket: String,
    base_url: String,
}

impl S3ObjectStorage {
    pub fn new(client: Client, bucket: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            base_url: base_url.into(),
        }
    }

    /// Build a client from the default credential chain. A custom endpoint
    /// points the client at S3-compatible storage such as MinIO.
    pub async fn from_config(cfg: &StorageConfig) -> Self {
        use aws_sdk_s3::config::Region;

        let mut builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()));
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        let client = Client::new(&builder.load().await);

        tracing::info!(bucket = %cfg.bucket, region = %cfg.region, "S3 object storage initialized");
        Self::new(client, cfg.bucket.clone(), cfg.public_base_url.clone())
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> StorageResult<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(public_url(&self.base_url, key))
    }

    async fn download(&self, key: &str) -> StorageResult<Option<StoredObject>> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if is_missing_key(&e) => return Ok(None),
            Err(e) => {
                return Err(StorageError::Download {
                    key: key.to_string(),
                    message: aws_sdk_s3::error::DisplayErrorContext(e).to_string(),
                });
            }
        };

        let content_type = response
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Download {
                key: key.to_string(),
                message: e.to_string(),
            })?
            .into_bytes();

        Ok(Some(StoredObject {
            content_type,
            bytes,
        }))
    }

    async fn ping(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

/// `NoSuchKey`, or a bare 404 from S3-compatible servers that omit the code.
fn is_missing_key(err: &SdkError<GetObjectError, HttpResponse>) -> bool {
    err.as_service_error()
        .map_or(false, GetObjectError::is_no_such_key)
        || err
            .raw_response()
            .map_or(false, |raw| raw.status().as_u16() == 404)
}
