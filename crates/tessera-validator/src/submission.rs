use crate::SubmissionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tessera_types::{PeerIndex, ProbeCompletion, WorkItem};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Dense text embedding for crawled documents
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    fn encode(&self, text: &str) -> Vec<f32>;
}

/// Signed feature hashing of lowercased tokens, L2-normalized.
///
/// Each token is hashed with blake3; the first eight bytes pick the bucket
/// and the ninth the sign.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimensions: 256 }
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty());

        for token in tokens {
            let hash = blake3::hash(token.to_lowercase().as_bytes());
            let bytes = hash.as_bytes();
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&bytes[..8]);
            let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

/// One accepted probe completion, as shipped to the search index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSubmission {
    pub peer: PeerIndex,
    pub hotkey: String,
    pub url: WorkItem,
    pub title: String,
    pub full_text: String,
    pub query: String,
    /// Hex blake3 digest of `full_text`
    pub content_hash: String,
    pub embedding: Vec<f32>,
    pub submitted_at: DateTime<Utc>,
}

impl ProbeSubmission {
    pub fn new(
        peer: PeerIndex,
        hotkey: impl Into<String>,
        url: WorkItem,
        completion: &ProbeCompletion,
        embedder: &dyn Embedder,
    ) -> Self {
        Self {
            peer,
            hotkey: hotkey.into(),
            url,
            title: completion.title.clone(),
            full_text: completion.full_text.clone(),
            query: completion.query.clone(),
            content_hash: hex::encode(blake3::hash(completion.full_text.as_bytes()).as_bytes()),
            embedding: embedder.encode(&completion.full_text),
            submitted_at: Utc::now(),
        }
    }
}

/// Where accepted probe completions are published
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn submit(&self, submission: &ProbeSubmission) -> Result<(), SubmissionError>;
}

/// Discards every submission
#[derive(Debug, Clone, Default)]
pub struct NullSubmissionSink;

#[async_trait]
impl SubmissionSink for NullSubmissionSink {
    async fn submit(&self, _submission: &ProbeSubmission) -> Result<(), SubmissionError> {
        Ok(())
    }
}

/// Appends one JSON line per submission
pub struct JsonlSubmissionSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSubmissionSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SubmissionError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SubmissionSink for JsonlSubmissionSink {
    async fn submit(&self, submission: &ProbeSubmission) -> Result<(), SubmissionError> {
        let mut line = serde_json::to_vec(submission)?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
