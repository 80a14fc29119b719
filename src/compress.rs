//! Payload compression gateway
//!
//! Two constructions: a passthrough that stores values as-is, and a
//! worker-backed mode that offloads the deflate transform to a background
//! task over a request channel. Worker round trips are bounded by a
//! watchdog; when the worker cannot answer in time the transform runs
//! synchronously in the caller's task instead. Transform failures (a corrupt
//! stream, bad JSON) are real errors and propagate.

use std::io::{Read, Write};
use std::time::Duration;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::VersionError;
use crate::snapshot::StoredPayload;

/// Default watchdog for worker round trips
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(10);

const WORKER_QUEUE_DEPTH: usize = 16;

#[derive(Clone, Copy)]
enum WorkerOp {
    Compress,
    Decompress,
}

struct WorkerRequest {
    op: WorkerOp,
    bytes: Vec<u8>,
    reply: oneshot::Sender<Result<Vec<u8>, VersionError>>,
}

/// Turns payload values into stored payloads and back
pub struct CompressionGateway {
    enabled: bool,
    timeout: Duration,
    worker: Mutex<Option<mpsc::Sender<WorkerRequest>>>,
}

impl CompressionGateway {
    /// Passthrough gateway: payloads are stored uncompressed
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            timeout: DEFAULT_WORKER_TIMEOUT,
            worker: Mutex::new(None),
        }
    }

    /// Worker-backed gateway
    ///
    /// Spawns the background task immediately, so this must be called from
    /// within a tokio runtime.
    pub fn with_worker(timeout: Duration) -> Self {
        Self {
            enabled: true,
            timeout,
            worker: Mutex::new(Some(spawn_worker())),
        }
    }

    /// True when payloads are stored compressed
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stop the background worker; later calls transform synchronously
    pub fn shutdown(&self) {
        if self.worker.lock().take().is_some() {
            debug!("Compression worker channel closed");
        }
    }

    /// Turn a payload value into its stored form
    pub async fn compress(&self, payload: &Value) -> Result<StoredPayload, VersionError> {
        if !self.enabled {
            return Ok(StoredPayload::Plain {
                value: payload.clone(),
            });
        }
        let bytes = serde_json::to_vec(payload)?;
        let packed = self.transform(WorkerOp::Compress, bytes).await?;
        Ok(StoredPayload::Deflate { bytes: packed })
    }

    /// Recover the payload value from its stored form
    ///
    /// Decompression is driven by how the payload was stored, not by the
    /// gateway's own mode, so a store written with compression on stays
    /// readable after compression is turned off.
    pub async fn decompress(&self, stored: &StoredPayload) -> Result<Value, VersionError> {
        match stored {
            StoredPayload::Plain { value } => Ok(value.clone()),
            StoredPayload::Deflate { bytes } => {
                let raw = self.transform(WorkerOp::Decompress, bytes.clone()).await?;
                Ok(serde_json::from_slice(&raw)?)
            }
        }
    }

    async fn transform(&self, op: WorkerOp, bytes: Vec<u8>) -> Result<Vec<u8>, VersionError> {
        let sender = self.worker.lock().clone();
        if let Some(tx) = sender {
            let (reply_tx, reply_rx) = oneshot::channel();
            let request = WorkerRequest {
                op,
                bytes: bytes.clone(),
                reply: reply_tx,
            };
            if tx.send(request).await.is_ok() {
                match tokio::time::timeout(self.timeout, reply_rx).await {
                    Ok(Ok(result)) => return result,
                    Ok(Err(_)) => {
                        warn!("Compression worker dropped a request, falling back to sync")
                    }
                    Err(_) => warn!(
                        timeout = ?self.timeout,
                        "Compression worker timed out, falling back to sync"
                    ),
                }
            } else {
                warn!("Compression worker unavailable, falling back to sync");
            }
        }
        match op {
            WorkerOp::Compress => deflate_bytes(&bytes),
            WorkerOp::Decompress => inflate_bytes(&bytes),
        }
    }
}

fn spawn_worker() -> mpsc::Sender<WorkerRequest> {
    let (tx, mut rx) = mpsc::channel::<WorkerRequest>(WORKER_QUEUE_DEPTH);
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let result = match request.op {
                WorkerOp::Compress => deflate_bytes(&request.bytes),
                WorkerOp::Decompress => inflate_bytes(&request.bytes),
            };
            // The caller may have timed out and dropped the receiver
            let _ = request.reply.send(result);
        }
        debug!("Compression worker stopped");
    });
    tx
}

fn deflate_bytes(bytes: &[u8]) -> Result<Vec<u8>, VersionError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| VersionError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| VersionError::Compression(e.to_string()))
}

fn inflate_bytes(bytes: &[u8]) -> Result<Vec<u8>, VersionError> {
    let mut decoder = DeflateDecoder::new(bytes);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| VersionError::Compression(e.to_string()))?;
    Ok(raw)
}
