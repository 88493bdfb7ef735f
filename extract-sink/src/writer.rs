//! The Sink Writer (C4): a pool of `W` uploaders draining a queue of
//! serialized chunks, capped by a semaphore so at most `W` uploads are ever
//! in flight at once (`spec.md` §5).
//!
//! Grounded on `ferrex-server::transcoding::queue`'s semaphore-gated worker
//! pool and `ferrex-server::stream::transcoding::worker`'s retry loop.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use extract_core::cancel::CancelToken;
use extract_core::model::{ClientOutcome, OutputFormat, Window};
use extract_core::partition::{EvictedChunk, FinalizedBuffer};
use extract_core::retry::{run_with_retry, BackoffPolicy};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::warn;

use crate::naming::{bucket_name, object_key};
use crate::store::{PutOptions, SinkStore};

/// One client chunk ready to upload, unified from [`EvictedChunk`] (early,
/// memory-pressure-driven) and [`FinalizedBuffer`] (end-of-run) so the
/// Writer doesn't need to know which path produced it.
#[derive(Debug, Clone)]
pub struct WriteJob {
    pub client_id: String,
    pub chunk_index: u32,
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

impl From<EvictedChunk> for WriteJob {
    fn from(chunk: EvictedChunk) -> Self {
        WriteJob {
            client_id: chunk.client_id,
            chunk_index: chunk.chunk_index,
            body: chunk.body,
            content_type: chunk.content_type,
        }
    }
}

impl From<FinalizedBuffer> for WriteJob {
    fn from(buffer: FinalizedBuffer) -> Self {
        WriteJob {
            client_id: buffer.client_id,
            chunk_index: buffer.chunk_index,
            body: buffer.body,
            content_type: buffer.content_type,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub bucket_prefix: String,
    pub server_side_encryption: Option<String>,
    pub max_concurrent_uploads: usize,
    pub backoff: BackoffPolicy,
}

#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub objects_written: u64,
    pub objects_failed: u64,
    pub bytes_written: u64,
    pub failures: Vec<ClientOutcome>,
}

struct WriterState<S> {
    store: Arc<S>,
    window: Window,
    format: OutputFormat,
    config: WriterConfig,
    cancel: CancelToken,
    /// Bucket existence is probed once per client per run and cached, since
    /// `spec.md` §4.4 only requires the check once, not per object.
    bucket_cache: Mutex<HashMap<String, bool>>,
}

/// Drains `jobs` with up to `config.max_concurrent_uploads` uploads in
/// flight concurrently. Returns once the channel is closed (the Partitioner
/// has finished emitting chunks) and every in-flight upload has completed.
pub async fn run_writer<S>(
    store: Arc<S>,
    window: Window,
    format: OutputFormat,
    mut jobs: mpsc::Receiver<WriteJob>,
    config: WriterConfig,
    cancel: CancelToken,
) -> WriteOutcome
where
    S: SinkStore + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_uploads.max(1)));
    let state = Arc::new(WriterState {
        store,
        window,
        format,
        config,
        cancel,
        bucket_cache: Mutex::new(HashMap::new()),
    });

    let mut handles = Vec::new();
    while let Some(job) = jobs.recv().await {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .expect("semaphore is never closed while the writer runs");
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            let _permit = permit;
            upload_one(state.as_ref(), job).await
        }));
    }

    let mut outcome = WriteOutcome::default();
    for handle in handles {
        match handle.await {
            Ok(ClientOutcome { error: None, bytes, .. }) => {
                outcome.objects_written += 1;
                outcome.bytes_written += bytes;
            }
            Ok(failed) => {
                outcome.objects_failed += 1;
                outcome.failures.push(failed);
            }
            Err(join_err) => {
                warn!(error = %join_err, "upload task panicked");
                outcome.objects_failed += 1;
            }
        }
    }
    outcome
}

async fn upload_one<S: SinkStore>(state: &WriterState<S>, job: WriteJob) -> ClientOutcome {
    let bucket = bucket_name(&state.config.bucket_prefix, &job.client_id);
    let key = object_key(&state.window, job.chunk_index, state.format);
    let bytes = job.body.len() as u64;

    if state.cancel.is_cancelled() {
        return ClientOutcome {
            client_id: job.client_id,
            bucket,
            key,
            bytes,
            error: Some("run deadline exceeded before this object was uploaded".to_string()),
        };
    }

    if let Err(reason) = ensure_bucket_exists(state, &bucket).await {
        return ClientOutcome {
            client_id: job.client_id,
            bucket,
            key,
            bytes,
            error: Some(reason),
        };
    }

    let put = PutOptions {
        content_type: job.content_type,
        server_side_encryption: state.config.server_side_encryption.clone(),
    };

    let result = run_with_retry(&state.config.backoff, |_attempt| {
        let body = Bytes::from(job.body.clone());
        let put = put.clone();
        async { state.store.put_object(&bucket, &key, body, put).await }
    })
    .await;

    match result {
        Ok(()) => ClientOutcome {
            client_id: job.client_id,
            bucket,
            key,
            bytes,
            error: None,
        },
        Err(err) => ClientOutcome {
            client_id: job.client_id,
            bucket,
            key,
            bytes,
            error: Some(err.to_string()),
        },
    }
}

async fn ensure_bucket_exists<S: SinkStore>(
    state: &WriterState<S>,
    bucket: &str,
) -> Result<(), String> {
    {
        let cache = state.bucket_cache.lock().await;
        if let Some(exists) = cache.get(bucket) {
            return if *exists {
                Ok(())
            } else {
                Err(format!("bucket '{bucket}' does not exist"))
            };
        }
    }

    let exists = state
        .store
        .bucket_exists(bucket)
        .await
        .map_err(|e| e.to_string())?;
    state
        .bucket_cache
        .lock()
        .await
        .insert(bucket.to_string(), exists);

    if exists {
        Ok(())
    } else {
        Err(format!("bucket '{bucket}' does not exist"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use extract_core::error::SinkError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FakeSink {
        existing_buckets: Vec<&'static str>,
        fail_times: AtomicU32,
        puts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SinkStore for FakeSink {
        async fn bucket_exists(&self, bucket: &str) -> Result<bool, SinkError> {
            Ok(self.existing_buckets.contains(&bucket))
        }

        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            _body: Bytes,
            _put: PutOptions,
        ) -> Result<(), SinkError> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(SinkError::Transient("throttled upstream".into()));
            }
            self.puts.lock().await.push((bucket.to_string(), key.to_string()));
            Ok(())
        }
    }

    fn window() -> Window {
        Window {
            start: "2024-06-01T10:00:00Z".parse().unwrap(),
            end: "2024-06-01T11:00:00Z".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn successful_uploads_are_counted_and_bytes_summed() {
        let store = Arc::new(FakeSink {
            existing_buckets: vec!["extract-acme"],
            fail_times: AtomicU32::new(0),
            puts: Mutex::new(Vec::new()),
        });
        let (tx, rx) = mpsc::channel(8);
        tx.send(WriteJob {
            client_id: "acme".into(),
            chunk_index: 0,
            body: b"hello".to_vec(),
            content_type: "application/json",
        })
        .await
        .unwrap();
        drop(tx);

        let config = WriterConfig {
            bucket_prefix: "extract".into(),
            server_side_encryption: None,
            max_concurrent_uploads: 4,
            backoff: BackoffPolicy::new(Duration::from_millis(1), 1),
        };
        let outcome = run_writer(
            store,
            window(),
            OutputFormat::Json,
            rx,
            config,
            CancelToken::new(),
        )
        .await;

        assert_eq!(outcome.objects_written, 1);
        assert_eq!(outcome.bytes_written, 5);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn missing_bucket_is_recorded_as_a_failure_without_retrying() {
        let store = Arc::new(FakeSink {
            existing_buckets: vec![],
            fail_times: AtomicU32::new(0),
            puts: Mutex::new(Vec::new()),
        });
        let (tx, rx) = mpsc::channel(8);
        tx.send(WriteJob {
            client_id: "acme".into(),
            chunk_index: 0,
            body: b"hello".to_vec(),
            content_type: "application/json",
        })
        .await
        .unwrap();
        drop(tx);

        let config = WriterConfig {
            bucket_prefix: "extract".into(),
            server_side_encryption: None,
            max_concurrent_uploads: 2,
            backoff: BackoffPolicy::default(),
        };
        let outcome = run_writer(
            store,
            window(),
            OutputFormat::Json,
            rx,
            config,
            CancelToken::new(),
        )
        .await;

        assert_eq!(outcome.objects_written, 0);
        assert_eq!(outcome.objects_failed, 1);
        assert!(outcome.failures[0].error.as_ref().unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn transient_failures_retry_then_succeed() {
        let store = Arc::new(FakeSink {
            existing_buckets: vec!["extract-acme"],
            fail_times: AtomicU32::new(2),
            puts: Mutex::new(Vec::new()),
        });
        let (tx, rx) = mpsc::channel(8);
        tx.send(WriteJob {
            client_id: "acme".into(),
            chunk_index: 0,
            body: b"hello".to_vec(),
            content_type: "application/json",
        })
        .await
        .unwrap();
        drop(tx);

        let config = WriterConfig {
            bucket_prefix: "extract".into(),
            server_side_encryption: None,
            max_concurrent_uploads: 2,
            backoff: BackoffPolicy::new(Duration::from_millis(1), 3),
        };
        let outcome = run_writer(
            store,
            window(),
            OutputFormat::Json,
            rx,
            config,
            CancelToken::new(),
        )
        .await;

        assert_eq!(outcome.objects_written, 1);
    }

    #[tokio::test]
    async fn cancellation_fails_pending_jobs_without_uploading() {
        let store = Arc::new(FakeSink {
            existing_buckets: vec!["extract-acme"],
            fail_times: AtomicU32::new(0),
            puts: Mutex::new(Vec::new()),
        });
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancelToken::new();
        cancel.cancel();
        tx.send(WriteJob {
            client_id: "acme".into(),
            chunk_index: 0,
            body: b"hello".to_vec(),
            content_type: "application/json",
        })
        .await
        .unwrap();
        drop(tx);

        let config = WriterConfig {
            bucket_prefix: "extract".into(),
            server_side_encryption: None,
            max_concurrent_uploads: 2,
            backoff: BackoffPolicy::default(),
        };
        let outcome = run_writer(store, window(), OutputFormat::Json, rx, config, cancel).await;

        assert_eq!(outcome.objects_written, 0);
        assert_eq!(outcome.objects_failed, 1);
    }
}
