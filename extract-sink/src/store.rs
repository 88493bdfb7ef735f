//! The sink store contract (`spec.md` §6): a bucket-oriented object store
//! that supports an existence probe and a put with server-side-encryption
//! and content-type directives.

use async_trait::async_trait;
use bytes::Bytes;

use extract_core::error::SinkError;

/// Upload directives a [`SinkStore::put_object`] call attaches to the
/// request, independent of the object body itself.
#[derive(Debug, Clone)]
pub struct PutOptions {
    // kept Clone so the Writer can reuse one PutOptions across retry attempts
    pub content_type: &'static str,
    pub server_side_encryption: Option<String>,
}

/// An object store the Writer can probe and upload to. Implemented by
/// [`crate::s3::S3Sink`] for production use and by an in-memory fake in
/// tests.
#[async_trait]
pub trait SinkStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, SinkError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        put: PutOptions,
    ) -> Result<(), SinkError>;
}
