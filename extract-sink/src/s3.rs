//! [`SinkStore`] adapter for an S3-compatible bucket. The spec's sink
//! contract — bucket-exists probe, put-object with an SSE directive and
//! content-type, atomic last-writer-wins — is S3's `HeadBucket`/`PutObject`
//! APIs verbatim.

use async_trait::async_trait;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use bytes::Bytes;

use extract_core::error::SinkError;

use crate::store::{PutOptions, SinkStore};

pub struct S3Sink {
    client: Client,
}

impl S3Sink {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SinkStore for S3Sink {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, SinkError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if is_not_found(&err) {
                    Ok(false)
                } else {
                    Err(classify_error(err))
                }
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        put: PutOptions,
    ) -> Result<(), SinkError> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(put.content_type)
            .body(body.into());

        if let Some(sse) = &put.server_side_encryption {
            let sse = ServerSideEncryption::from(sse.as_str());
            request = request.server_side_encryption(sse);
        }

        request.send().await.map_err(classify_error)?;
        Ok(())
    }
}

fn is_not_found<E, R>(err: &aws_sdk_s3::error::SdkError<E, R>) -> bool
where
    E: aws_sdk_s3::error::ProvideErrorMetadata,
{
    matches!(err.code(), Some("404") | Some("NoSuchBucket") | Some("NotFound"))
}

fn classify_error<E, R>(err: aws_sdk_s3::error::SdkError<E, R>) -> SinkError
where
    E: aws_sdk_s3::error::ProvideErrorMetadata,
{
    let code = err.code().map(str::to_string).unwrap_or_default();
    match code.as_str() {
        "SlowDown" | "RequestLimitExceeded" | "TooManyRequests" => SinkError::Throttled,
        "NoSuchBucket" => SinkError::BucketMissing(code),
        "InternalError" | "ServiceUnavailable" => SinkError::Transient(code),
        _ => SinkError::Fatal(err.to_string()),
    }
}
