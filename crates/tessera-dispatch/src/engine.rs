use crate::{DispatchError, PeerClient, Result};
use std::sync::Arc;
use std::time::Duration;
use tessera_types::{Completion, PeerEndpoint, PeerIndex, Task};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One entry per target: `None` when the peer timed out, failed, or panicked
pub type DispatchOutcome = (PeerIndex, Option<Completion>);

/// Fans tasks out to peers concurrently, all calls under one shared deadline.
///
/// A slow or broken peer only ever costs its own slot in the result; it never
/// delays or fails the others beyond the shared timeout window.
pub struct DispatchEngine {
    client: Arc<dyn PeerClient>,
    permits: Arc<Semaphore>,
    max_concurrency: usize,
    // Metrics
    pub calls_total: Option<Arc<prometheus::IntCounter>>,
    pub absent_total: Option<Arc<prometheus::IntCounter>>,
    pub call_duration: Option<Arc<prometheus::Histogram>>,
}

impl DispatchEngine {
    pub fn new(client: Arc<dyn PeerClient>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            client,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            calls_total: None,
            absent_total: None,
            call_duration: None,
        }
    }

    /// Set metrics for dispatch
    pub fn set_metrics(
        &mut self,
        calls_total: Arc<prometheus::IntCounter>,
        absent_total: Arc<prometheus::IntCounter>,
        call_duration: Arc<prometheus::Histogram>,
    ) {
        self.calls_total = Some(calls_total);
        self.absent_total = Some(absent_total);
        self.call_duration = Some(call_duration);
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Send the same task to every target. Results follow target order.
    pub async fn dispatch(
        &self,
        task: Arc<Task>,
        targets: &[(PeerIndex, PeerEndpoint)],
        timeout: Duration,
    ) -> Vec<DispatchOutcome> {
        let calls = targets
            .iter()
            .map(|(index, endpoint)| (*index, endpoint.clone(), task.clone()))
            .collect();
        self.run(calls, timeout).await
    }

    /// Send each assignment's own task to its peer. Results follow assignment order.
    pub async fn dispatch_each(
        &self,
        assignments: Vec<(PeerIndex, PeerEndpoint, Task)>,
        timeout: Duration,
    ) -> Vec<DispatchOutcome> {
        let calls = assignments
            .into_iter()
            .map(|(index, endpoint, task)| (index, endpoint, Arc::new(task)))
            .collect();
        self.run(calls, timeout).await
    }

    async fn run(
        &self,
        calls: Vec<(PeerIndex, PeerEndpoint, Arc<Task>)>,
        timeout: Duration,
    ) -> Vec<DispatchOutcome> {
        let start = Instant::now();
        // One window for the whole fan-out, permit waits included
        let deadline = start + timeout;
        let total = calls.len();
        let mut handles = Vec::with_capacity(total);

        for (index, endpoint, task) in calls {
            let client = self.client.clone();
            let permits = self.permits.clone();

            handles.push((
                index,
                tokio::spawn(async move {
                    let call = async {
                        let _permit = permits.acquire().await.ok()?;
                        let call_start = Instant::now();
                        let remaining = deadline.saturating_duration_since(call_start);
                        let result = client.call(&endpoint, &task, remaining).await;
                        Some((result, call_start.elapsed()))
                    };

                    match tokio::time::timeout_at(deadline, call).await {
                        Ok(Some((result, elapsed))) => {
                            match result.and_then(|completion| expect_kind(&task, completion)) {
                                Ok(completion) => (Some(completion), Some(elapsed)),
                                Err(e) => {
                                    debug!(
                                        peer = index,
                                        endpoint = %endpoint,
                                        task = task.kind().as_str(),
                                        error = %e,
                                        "Peer call failed"
                                    );
                                    (None, Some(elapsed))
                                }
                            }
                        }
                        // Semaphore closed
                        Ok(None) => (None, None),
                        Err(_) => {
                            debug!(
                                peer = index,
                                endpoint = %endpoint,
                                task = task.kind().as_str(),
                                timeout_ms = timeout.as_millis() as u64,
                                "⏰ Peer call timed out"
                            );
                            (None, Some(timeout))
                        }
                    }
                }),
            ));
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut absent = 0u64;
        for (index, handle) in handles {
            let completion = match handle.await {
                Ok((completion, elapsed)) => {
                    if let (Some(histogram), Some(elapsed)) = (&self.call_duration, elapsed) {
                        histogram.observe(elapsed.as_secs_f64());
                    }
                    completion
                }
                Err(e) => {
                    warn!(peer = index, error = %e, "⚠️ Peer call task aborted");
                    None
                }
            };
            if completion.is_none() {
                absent += 1;
            }
            outcomes.push((index, completion));
        }

        if let Some(ref counter) = self.calls_total {
            counter.inc_by(total as u64);
        }
        if let Some(ref counter) = self.absent_total {
            counter.inc_by(absent);
        }

        debug!(
            calls = total,
            responded = total as u64 - absent,
            absent,
            duration_ms = start.elapsed().as_millis() as u64,
            "📡 Dispatch finished"
        );

        outcomes
    }
}

/// A peer that answers a probe with an answer (or the reverse) has not answered
fn expect_kind(task: &Task, completion: Completion) -> Result<Completion> {
    if completion.kind() == task.kind() {
        Ok(completion)
    } else {
        Err(DispatchError::UnexpectedCompletion {
            expected: task.kind().as_str(),
            got: completion.kind().as_str(),
        })
    }
}
