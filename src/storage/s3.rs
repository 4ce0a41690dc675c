use super::{join_url, validate_key, ObjectStore};
use crate::config::StorageBackend;
use crate::error::RelayError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::http::HttpResponse;
use tracing::{debug, info};

/// Objects in an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: S3Client,
    bucket: String,
    region: String,
    public_base_url: Option<String>,
}

impl S3Store {
    pub fn new(
        client: S3Client,
        bucket: impl Into<String>,
        region: impl Into<String>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            region: region.into(),
            public_base_url,
        }
    }

    /// Build a client from the storage settings.
    ///
    /// Static keys, when configured, take precedence over the default AWS
    /// credential chain. A custom endpoint switches to path-style addressing,
    /// which MinIO and most S3-compatible stores expect.
    pub async fn connect(storage: &StorageBackend) -> Result<Self, RelayError> {
        let StorageBackend::S3 {
            bucket,
            region,
            endpoint_url,
            public_base_url,
            access_key_id,
            secret_access_key,
        } = storage
        else {
            return Err(RelayError::InvalidConfig(
                "S3Store needs S3 storage settings".into(),
            ));
        };

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.clone()));
        if let (Some(key), Some(secret)) = (access_key_id, secret_access_key) {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "slide-relay",
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = S3Client::from_conf(builder.build());

        info!("Using S3 bucket '{}' in {}", bucket, region);
        Ok(Self::new(client, bucket, region, public_base_url.clone()))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, RelayError> {
        validate_key(key)?;
        let len = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| s3_error(&self.bucket, "put_object", e))?;
        debug!("Stored s3://{}/{} ({} bytes)", self.bucket, key, len);
        Ok(self.public_url(key))
    }

    async fn exists(&self, key: &str) -> Result<bool, RelayError> {
        validate_key(key)?;
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|s| s.is_not_found()).unwrap_or(false) => Ok(false),
            // Without s3:ListBucket a missing key answers HEAD with a bare 403.
            Err(e) if e.code().is_none() && raw_status(&e) == Some(403) => {
                debug!("HEAD s3://{}/{} returned 403, treating as missing", self.bucket, key);
                Ok(false)
            }
            Err(e) => Err(s3_error(&self.bucket, "head_object", e)),
        }
    }

    fn public_url(&self, key: &str) -> String {
        s3_public_url(&self.bucket, &self.region, self.public_base_url.as_deref(), key)
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

/// Public URL of `key`: `https://{bucket}.s3.{region}.amazonaws.com/{key}`, or
/// `{base}/{key}` when a CDN or S3-compatible endpoint base is configured.
pub fn s3_public_url(bucket: &str, region: &str, public_base_url: Option<&str>, key: &str) -> String {
    match public_base_url {
        Some(base) => join_url(base, &[], key),
        None => join_url(&format!("https://{bucket}.s3.{region}.amazonaws.com"), &[], key),
    }
}

const CREDENTIAL_ERROR_CODES: &[&str] = &[
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidToken",
];

fn raw_status<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|r| r.status().as_u16())
}

fn s3_error<E, R>(bucket: &str, operation: &str, err: SdkError<E, R>) -> RelayError
where
    E: std::error::Error + ProvideErrorMetadata + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if err
        .code()
        .map(|c| CREDENTIAL_ERROR_CODES.contains(&c))
        .unwrap_or(false)
    {
        return RelayError::CredentialsUnavailable;
    }
    let detail = format!("{}", DisplayErrorContext(&err));
    if detail.to_ascii_lowercase().contains("credentials") {
        return RelayError::CredentialsUnavailable;
    }
    RelayError::Storage {
        backend: format!("s3://{bucket}"),
        detail: format!("{operation}: {detail}"),
    }
}
