use crate::{DispatchError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tessera_types::{Completion, PeerEndpoint, ProbeCompletion, SourceDocument, Task};
use tracing::trace;

/// Transport used to send a single task to a single peer.
///
/// Implementations report failures as errors; the dispatch engine enforces
/// the deadline and turns any failure into an absent completion.
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn call(
        &self,
        endpoint: &PeerEndpoint,
        task: &Task,
        timeout: Duration,
    ) -> Result<Completion>;
}

#[derive(Debug, Serialize)]
struct ProbeRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct AnswerRequest<'a> {
    question: &'a str,
    sources: &'a [SourceDocument],
}

#[derive(Debug, Deserialize)]
struct AnswerResponse {
    #[serde(default)]
    completion: String,
}

/// JSON-over-HTTP peer client
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tessera-validator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn url(endpoint: &PeerEndpoint, path: &str) -> String {
        let base = endpoint.as_str().trim_end_matches('/');
        if base.contains("://") {
            format!("{}/{}", base, path)
        } else {
            format!("http://{}/{}", base, path)
        }
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<R> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| DispatchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn call(
        &self,
        endpoint: &PeerEndpoint,
        task: &Task,
        timeout: Duration,
    ) -> Result<Completion> {
        match task {
            Task::Probe(probe) => {
                let url = Self::url(endpoint, "probe");
                trace!(%url, target = %probe.url, "Sending probe");
                let completion: ProbeCompletion = self
                    .post(&url, &ProbeRequest { url: &probe.url }, timeout)
                    .await?;
                Ok(Completion::Probe(completion))
            }
            Task::Scored(scored) => {
                let url = Self::url(endpoint, "answer");
                trace!(%url, "Sending scored task");
                let request = AnswerRequest {
                    question: &scored.question,
                    sources: &scored.sources,
                };
                let response: AnswerResponse = self.post(&url, &request, timeout).await?;
                Ok(Completion::Answer(response.completion))
            }
        }
    }
}
