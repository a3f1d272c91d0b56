use crate::{
    CycleError, Embedder, HashingEmbedder, ProbeSubmission, SubmissionSink, TaskSource,
    ValidatorConfig, ValidatorMetrics, ValidatorState,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tessera_dispatch::{DispatchEngine, PeerClient};
use tessera_frontier::CrawlFrontier;
use tessera_registry::{EligibilityPolicy, RegistryController, RegistrySnapshot};
use tessera_rewards::RewardAggregator;
use tessera_sampling::PeerSampler;
use tessera_scores::ScoreState;
use tessera_types::{
    Completion, PeerEndpoint, PeerIndex, ProbeCompletion, ProbeTask, SourceDocument, Task,
    WorkItem,
};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

/// Outcome of one completed forward cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Sampled peers, in the order rewards are reported
    pub sampled: Vec<PeerIndex>,
    pub rewards: Vec<f64>,
    pub probes_sent: usize,
    pub probes_accepted: usize,
    pub links_discovered: usize,
    pub answers_received: usize,
    pub score_version: u64,
    pub duration: Duration,
}

/// A probe completion that passed validation this cycle
struct AcceptedProbe {
    peer: PeerIndex,
    url: WorkItem,
    completion: ProbeCompletion,
}

/// Drives the forward cycle: sample peers, crawl through them, ask them a
/// scored question, and fold the rewards into the shared score vector.
///
/// Cycles never overlap: [`run_cycle`](Self::run_cycle) takes `&mut self`.
pub struct Validator {
    config: ValidatorConfig,
    registry: Arc<RegistryController>,
    sampler: PeerSampler,
    engine: DispatchEngine,
    aggregator: RewardAggregator,
    tasks: Box<dyn TaskSource>,
    frontier: CrawlFrontier,
    scores: Arc<RwLock<ScoreState>>,
    embedder: Arc<dyn Embedder>,
    sink: Option<Arc<dyn SubmissionSink>>,
    metrics: Option<Arc<ValidatorMetrics>>,
    state_path: Option<PathBuf>,
    rng: StdRng,
    cycles: u64,
}

impl Validator {
    pub fn new(
        config: ValidatorConfig,
        policy: EligibilityPolicy,
        registry: Arc<RegistryController>,
        client: Arc<dyn PeerClient>,
        aggregator: RewardAggregator,
        tasks: Box<dyn TaskSource>,
    ) -> Self {
        let frontier = CrawlFrontier::with_seeds(config.seed_urls.iter().cloned());
        let engine = DispatchEngine::new(client, config.max_concurrency);
        Self {
            config,
            registry,
            sampler: PeerSampler::new(policy),
            engine,
            aggregator,
            tasks,
            frontier,
            scores: Arc::new(RwLock::new(ScoreState::default())),
            embedder: Arc::new(HashingEmbedder::default()),
            sink: None,
            metrics: None,
            state_path: None,
            rng: StdRng::from_entropy(),
            cycles: 0,
        }
    }

    /// Resume from persisted scores and frontier. Configured seeds are
    /// merged into the restored frontier.
    pub fn with_state(mut self, state: ValidatorState) -> Self {
        let mut frontier = state.frontier;
        frontier.seed(self.config.seed_urls.iter().cloned());
        self.frontier = frontier;
        self.scores = Arc::new(RwLock::new(state.scores));
        self
    }

    /// Save scores and frontier to `path` after every completed cycle
    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    pub fn with_submission(
        mut self,
        embedder: Arc<dyn Embedder>,
        sink: Arc<dyn SubmissionSink>,
    ) -> Self {
        self.embedder = embedder;
        self.sink = Some(sink);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ValidatorMetrics>) -> Self {
        self.sampler.set_metrics(
            metrics.samples_total.clone(),
            metrics.backfilled_total.clone(),
            metrics.eligible_peers.clone(),
        );
        self.engine.set_metrics(
            metrics.dispatch_calls_total.clone(),
            metrics.dispatch_absent_total.clone(),
            metrics.dispatch_call_duration.clone(),
        );
        self.metrics = Some(metrics);
        self
    }

    /// Deterministic sampling, for tests and replays
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Shared score vector. Readers only ever see whole cycles.
    pub fn scores(&self) -> Arc<RwLock<ScoreState>> {
        self.scores.clone()
    }

    pub fn frontier(&self) -> &CrawlFrontier {
        &self.frontier
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles
    }

    pub fn metrics_text(&self) -> Option<String> {
        self.metrics.as_ref().map(|m| m.gather())
    }

    /// Run one forward cycle. On error neither the scores nor the frontier
    /// change.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        let start = Instant::now();
        let result = self.forward(start).await;

        match &result {
            Ok(report) => {
                if let Some(ref m) = self.metrics {
                    m.cycles_total.inc();
                    m.cycle_duration.observe(report.duration.as_secs_f64());
                }
                info!(
                    cycle = report.cycle,
                    sampled = report.sampled.len(),
                    probes_accepted = report.probes_accepted,
                    links_discovered = report.links_discovered,
                    answers = report.answers_received,
                    score_version = report.score_version,
                    duration_ms = report.duration.as_millis() as u64,
                    "✅ Forward cycle complete"
                );
            }
            Err(e) => {
                if let Some(ref m) = self.metrics {
                    m.cycles_aborted.with_label_values(&[e.reason()]).inc();
                }
                warn!(
                    error = %e,
                    reason = e.reason(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "⚠️ Forward cycle aborted"
                );
            }
        }

        result
    }

    async fn forward(&mut self, start: Instant) -> Result<CycleReport, CycleError> {
        let snapshot = self.registry.snapshot().await?;
        let sampled = self.sampler.sample(
            &snapshot,
            self.config.sample_size,
            &HashSet::new(),
            &mut self.rng,
        )?;

        // Frontier changes are staged and only installed with the scores
        let mut frontier = self.frontier.clone();
        let urls = frontier.take_batch(sampled.len());
        let assignments: Vec<(PeerIndex, PeerEndpoint, Task)> = urls
            .iter()
            .zip(&sampled)
            .filter_map(|(url, &peer)| {
                snapshot.endpoint(peer).map(|endpoint| {
                    (
                        peer,
                        endpoint.clone(),
                        Task::Probe(ProbeTask { url: url.clone() }),
                    )
                })
            })
            .collect();
        let probes_sent = assignments.len();
        let probe_urls: HashMap<PeerIndex, WorkItem> = assignments
            .iter()
            .filter_map(|(peer, _, task)| match task {
                Task::Probe(probe) => Some((*peer, probe.url.clone())),
                Task::Scored(_) => None,
            })
            .collect();

        let probe_outcomes = self
            .engine
            .dispatch_each(assignments, self.config.probe_timeout)
            .await;

        let mut accepted = Vec::new();
        let mut links_discovered = 0;
        for (peer, completion) in probe_outcomes {
            let probe = match completion.and_then(Completion::into_probe) {
                Some(probe) if probe.is_complete() => probe,
                _ => {
                    debug!(peer, "Probe completion missing or incomplete");
                    continue;
                }
            };
            links_discovered += frontier.ingest(probe.new_links.iter().cloned());
            if let Some(url) = probe_urls.get(&peer) {
                accepted.push(AcceptedProbe {
                    peer,
                    url: url.clone(),
                    completion: probe,
                });
            }
        }
        if let Some(ref m) = self.metrics {
            m.probes_sent.inc_by(probes_sent as u64);
            m.probes_accepted.inc_by(accepted.len() as u64);
            m.probes_absent.inc_by((probes_sent - accepted.len()) as u64);
        }

        let challenge = self.tasks.next_challenge()?;
        let sources: Vec<SourceDocument> = accepted
            .iter()
            .take(self.config.max_sources)
            .map(|a| SourceDocument {
                url: a.url.clone(),
                title: a.completion.title.clone(),
                content: a.completion.full_text.clone(),
            })
            .collect();
        let task = Arc::new(Task::Scored(challenge.to_scored_task(sources)));

        let targets: Vec<(PeerIndex, PeerEndpoint)> = sampled
            .iter()
            .filter_map(|&peer| snapshot.endpoint(peer).map(|e| (peer, e.clone())))
            .collect();
        let mut answers: HashMap<PeerIndex, String> = self
            .engine
            .dispatch(task, &targets, self.config.scored_timeout)
            .await
            .into_iter()
            .filter_map(|(peer, completion)| {
                completion
                    .and_then(Completion::into_answer)
                    .map(|answer| (peer, answer))
            })
            .collect();
        let answers_received = answers.len();
        if let Some(ref m) = self.metrics {
            m.scored_absent
                .inc_by((sampled.len() - answers_received) as u64);
        }

        // Absent answers are scored as empty strings
        let completions: Vec<String> = sampled
            .iter()
            .map(|peer| answers.remove(peer).unwrap_or_default())
            .collect();

        let rewards = self.aggregator.score(
            &challenge.question,
            &completions,
            &challenge.task,
            challenge.solution.as_deref(),
        )?;
        debug!(?sampled, ?rewards, "Cycle rewards");

        let score_version = self
            .install_scores(&snapshot, &sampled, &rewards)
            .await?;
        self.frontier = frontier;
        self.cycles += 1;

        if let Some(ref m) = self.metrics {
            m.frontier_queue_len.set(self.frontier.queue_len() as i64);
            m.frontier_seen.set(self.frontier.seen_len() as i64);
        }

        let probes_accepted = accepted.len();
        self.submit(&snapshot, accepted).await;
        self.persist().await;

        Ok(CycleReport {
            cycle: self.cycles,
            sampled,
            rewards,
            probes_sent,
            probes_accepted,
            links_discovered,
            answers_received,
            score_version,
            duration: start.elapsed(),
        })
    }

    /// Compute the next score vector off-lock and swap it in whole
    async fn install_scores(
        &self,
        snapshot: &RegistrySnapshot,
        sampled: &[PeerIndex],
        rewards: &[f64],
    ) -> Result<u64, CycleError> {
        let mut next = self.scores.read().await.clone();
        next.resize(snapshot.peer_count());
        next.update(sampled, rewards, self.config.alpha)?;
        let version = next.version();
        *self.scores.write().await = next;
        Ok(version)
    }

    async fn submit(&self, snapshot: &RegistrySnapshot, accepted: Vec<AcceptedProbe>) {
        let sink = match self.sink {
            Some(ref sink) => sink,
            None => return,
        };

        for probe in accepted {
            let hotkey = snapshot
                .peer(probe.peer)
                .map(|p| p.hotkey.clone())
                .unwrap_or_default();
            let submission = ProbeSubmission::new(
                probe.peer,
                hotkey,
                probe.url,
                &probe.completion,
                self.embedder.as_ref(),
            );
            match sink.submit(&submission).await {
                Ok(()) => {
                    if let Some(ref m) = self.metrics {
                        m.submissions_total.inc();
                    }
                    debug!(peer = probe.peer, url = %submission.url, "Submitted probe result");
                }
                Err(e) => {
                    if let Some(ref m) = self.metrics {
                        m.submission_failures.inc();
                    }
                    warn!(peer = probe.peer, error = %e, "⚠️ Probe submission failed");
                }
            }
        }
    }

    async fn persist(&self) {
        let path = match self.state_path {
            Some(ref path) => path.clone(),
            None => return,
        };
        let state = ValidatorState::new(self.scores.read().await.clone(), self.frontier.clone());
        let target = path.clone();
        match tokio::task::spawn_blocking(move || state.save(&target)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "⚠️ Could not save validator state");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "⚠️ State save task aborted");
            }
        }
    }

    /// Run cycles until `shutdown` flips to true, resting between cycles.
    /// Aborted cycles are logged and the loop carries on.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            sample_size = self.config.sample_size,
            rest_secs = self.config.cycle_rest.as_secs(),
            "🚀 Validator loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let _ = self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.cycle_rest) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(cycles = self.cycles, "🛑 Validator loop stopped");
    }
}
