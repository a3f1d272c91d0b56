use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tessera_dispatch::{DispatchError, PeerClient};
use tessera_registry::{
    EligibilityPolicy, RegistryController, RegistryControllerConfig, RegistrySnapshot,
    StaticRegistrySource,
};
use tessera_rewards::{
    NonEmptyMask, RewardAggregator, RewardError, RewardEvaluation, RewardFunction,
};
use tessera_scores::ScoreState;
use tessera_types::{
    Challenge, Completion, PeerEndpoint, PeerIndex, PeerInfo, ProbeCompletion, Task,
};
use tessera_validator::{
    CycleError, Dataset, DatasetPool, ProbeSubmission, SubmissionError, SubmissionSink,
    Validator, ValidatorConfig, ValidatorMetrics, ValidatorState,
};
use tokio::sync::{watch, Mutex};

/// Peers answer by endpoint: `silent-*` never answers, everyone else answers
/// probes with two new links and the scored task with a greeting.
struct FakePeers;

#[async_trait]
impl PeerClient for FakePeers {
    async fn call(
        &self,
        endpoint: &PeerEndpoint,
        task: &Task,
        _timeout: Duration,
    ) -> tessera_dispatch::Result<Completion> {
        let name = endpoint.as_str();
        if name.starts_with("silent") {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if name.starts_with("broken") {
            return Err(DispatchError::Transport("reset by peer".to_string()));
        }
        match task {
            Task::Probe(probe) => Ok(Completion::Probe(ProbeCompletion {
                title: format!("Title of {}", probe.url),
                full_text: format!("Text crawled by {}", name),
                query: "what is here".to_string(),
                new_links: vec![
                    format!("{}/next", probe.url),
                    format!("https://shared.example/{}", name.len()),
                ],
            })),
            Task::Scored(scored) => Ok(Completion::Answer(format!(
                "{} says hello to {}",
                name, scored.question
            ))),
        }
    }
}

#[derive(Default)]
struct CollectingSink {
    submissions: Mutex<Vec<ProbeSubmission>>,
}

#[async_trait]
impl SubmissionSink for CollectingSink {
    async fn submit(&self, submission: &ProbeSubmission) -> Result<(), SubmissionError> {
        self.submissions.lock().await.push(submission.clone());
        Ok(())
    }
}

struct FailingReward;

impl RewardFunction for FailingReward {
    fn name(&self) -> &str {
        "failing"
    }

    fn apply(
        &self,
        _question: &str,
        completions: &[String],
        _metadata: &str,
        _reference: Option<&str>,
    ) -> tessera_rewards::Result<RewardEvaluation> {
        Ok(RewardEvaluation::normalized(vec![f64::NAN; completions.len()]))
    }
}

fn registry_snapshot(endpoints: &[&str]) -> RegistrySnapshot {
    let peers = endpoints
        .iter()
        .enumerate()
        .map(|(i, endpoint)| PeerInfo {
            index: i,
            hotkey: format!("hk{}", i),
            coldkey: format!("ck{}", i),
            stake: 1.0,
            validator_permit: false,
            endpoint: Some(PeerEndpoint::new(*endpoint)),
        })
        .collect();
    RegistrySnapshot::new(7, peers).unwrap()
}

async fn synced_registry(endpoints: &[&str]) -> Arc<RegistryController> {
    let source = Arc::new(StaticRegistrySource::new(registry_snapshot(endpoints)));
    let controller = RegistryController::new(source, RegistryControllerConfig::default());
    controller.sync().await.unwrap();
    Arc::new(controller)
}

fn tasks() -> Box<DatasetPool> {
    let dataset = Dataset::new(
        "qa",
        vec![Challenge {
            question: "what is rust".to_string(),
            task: String::new(),
            solution: None,
        }],
    )
    .unwrap();
    Box::new(DatasetPool::with_seed(vec![dataset], 5).unwrap())
}

fn non_empty_aggregator() -> RewardAggregator {
    RewardAggregator::new()
        .with_reward(1.0, Box::new(NonEmptyMask))
        .unwrap()
}

fn config(sample_size: usize) -> ValidatorConfig {
    ValidatorConfig {
        sample_size,
        probe_timeout: Duration::from_secs(2),
        scored_timeout: Duration::from_secs(2),
        alpha: 0.5,
        max_concurrency: 8,
        cycle_rest: Duration::from_millis(10),
        max_sources: 2,
        seed_urls: vec![
            "https://seed.example/a".to_string(),
            "https://seed.example/b".to_string(),
            "https://seed.example/c".to_string(),
        ],
    }
}

async fn validator(
    endpoints: &[&str],
    sample_size: usize,
    aggregator: RewardAggregator,
) -> Validator {
    Validator::new(
        config(sample_size),
        EligibilityPolicy::default(),
        synced_registry(endpoints).await,
        Arc::new(FakePeers),
        aggregator,
        tasks(),
    )
    .with_rng_seed(11)
}

#[tokio::test(start_paused = true)]
async fn test_full_cycle_updates_scores_and_frontier() {
    let sink = Arc::new(CollectingSink::default());
    let metrics = Arc::new(ValidatorMetrics::new().unwrap());
    let mut validator = validator(&["peer-a", "silent-b", "peer-c"], 3, non_empty_aggregator())
        .await
        .with_submission(
            Arc::new(tessera_validator::HashingEmbedder::new(16)),
            sink.clone(),
        )
        .with_metrics(metrics.clone());

    let report = validator.run_cycle().await.unwrap();

    let sampled: HashSet<PeerIndex> = report.sampled.iter().copied().collect();
    assert_eq!(sampled, [0, 1, 2].into_iter().collect());
    assert_eq!(report.probes_sent, 3);
    // The silent peer neither crawls nor answers
    assert_eq!(report.probes_accepted, 2);
    assert_eq!(report.answers_received, 2);

    for (peer, reward) in report.sampled.iter().zip(&report.rewards) {
        let expected = if *peer == 1 { 0.0 } else { 1.0 };
        assert_eq!(*reward, expected, "peer {}", peer);
    }

    let scores = validator.scores();
    let scores = scores.read().await;
    assert_eq!(scores.scores(), &[0.5, 0.0, 0.5]);
    assert_eq!(scores.version(), report.score_version);

    // All three seeds were handed out; only the two answering peers added links
    let frontier = validator.frontier();
    assert!(frontier.is_seen("https://seed.example/a"));
    assert_eq!(frontier.queue_len(), report.links_discovered);
    assert!(report.links_discovered >= 2);

    let submissions = sink.submissions.lock().await;
    assert_eq!(submissions.len(), 2);
    assert!(submissions.iter().all(|s| s.peer != 1));
    assert!(submissions.iter().all(|s| s.embedding.len() == 16));

    let text = validator.metrics_text().unwrap();
    assert!(text.contains("tessera_cycles_total 1"));
    assert!(text.contains("tessera_probes_accepted_total 2"));
}

#[tokio::test]
async fn test_broken_peer_scores_zero_and_others_unaffected() {
    let mut validator =
        validator(&["peer-a", "broken-b"], 2, non_empty_aggregator()).await;

    let report = validator.run_cycle().await.unwrap();
    let scores = validator.scores();
    let scores = scores.read().await;
    assert_eq!(scores.scores(), &[0.5, 0.0]);
    assert_eq!(report.answers_received, 1);
}

#[tokio::test]
async fn test_insufficient_peers_leaves_state_untouched() {
    let mut validator = validator(&["peer-a", "peer-b"], 5, non_empty_aggregator()).await;
    let frontier_before = validator.frontier().clone();
    let scores_before = validator.scores().read().await.clone();

    let result = validator.run_cycle().await;

    assert!(matches!(result, Err(CycleError::InsufficientPeers(_))));
    assert_eq!(validator.frontier(), &frontier_before);
    assert_eq!(*validator.scores().read().await, scores_before);
    assert_eq!(validator.cycles_completed(), 0);
}

#[tokio::test]
async fn test_zero_sample_size_counted_separately() {
    let metrics = Arc::new(ValidatorMetrics::new().unwrap());
    let mut validator = validator(&["peer-a", "peer-b"], 0, non_empty_aggregator())
        .await
        .with_metrics(metrics.clone());

    let err = validator.run_cycle().await.unwrap_err();

    assert_eq!(err.reason(), "invalid_sample_size");
    assert_eq!(
        metrics
            .cycles_aborted
            .with_label_values(&["invalid_sample_size"])
            .get(),
        1
    );
    assert_eq!(
        metrics
            .cycles_aborted
            .with_label_values(&["insufficient_peers"])
            .get(),
        0
    );
}

#[tokio::test]
async fn test_registry_unavailable_leaves_state_untouched() {
    let source = Arc::new(StaticRegistrySource::unavailable());
    let registry = Arc::new(RegistryController::new(
        source,
        RegistryControllerConfig::default(),
    ));
    let metrics = Arc::new(ValidatorMetrics::new().unwrap());
    let mut validator = Validator::new(
        config(2),
        EligibilityPolicy::default(),
        registry,
        Arc::new(FakePeers),
        non_empty_aggregator(),
        tasks(),
    )
    .with_metrics(metrics.clone());
    let frontier_before = validator.frontier().clone();

    let result = validator.run_cycle().await;

    assert!(matches!(result, Err(CycleError::RegistryUnavailable(_))));
    assert_eq!(validator.frontier(), &frontier_before);
    assert!(validator.scores().read().await.is_empty());
    assert_eq!(
        metrics
            .cycles_aborted
            .with_label_values(&["registry_unavailable"])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_reward_failure_leaves_state_untouched() {
    let aggregator = RewardAggregator::new()
        .with_reward(1.0, Box::new(FailingReward))
        .unwrap();
    let mut validator = validator(&["peer-a", "peer-b"], 2, aggregator)
        .await
        .with_state(ValidatorState::new(
            ScoreState::from_scores(vec![0.3, 0.6]),
            Default::default(),
        ));
    let frontier_before = validator.frontier().clone();
    let scores_before = validator.scores().read().await.clone();

    let result = validator.run_cycle().await;

    assert!(matches!(
        result,
        Err(CycleError::Reward(RewardError::NonFinite { .. }))
    ));
    assert_eq!(validator.frontier(), &frontier_before);
    assert_eq!(*validator.scores().read().await, scores_before);
}

#[tokio::test]
async fn test_state_saved_after_cycle_and_restored() {
    let dir = tempfile::tempdir().unwrap();
    let path = ValidatorState::path_in(dir.path());

    let mut validator = validator(&["peer-a", "peer-b"], 2, non_empty_aggregator())
        .await
        .with_state_path(&path);
    validator.run_cycle().await.unwrap();

    let saved = ValidatorState::load(&path).unwrap();
    assert_eq!(saved.scores.scores(), &[0.5, 0.5]);
    assert_eq!(&saved.frontier, validator.frontier());

    // A restarted validator carries on from the saved vector
    let mut restarted = self::validator(&["peer-a", "peer-b"], 2, non_empty_aggregator())
        .await
        .with_state(saved);
    restarted.run_cycle().await.unwrap();
    let scores = restarted.scores();
    assert_eq!(scores.read().await.scores(), &[0.75, 0.75]);
}

#[tokio::test]
async fn test_failed_state_save_does_not_abort_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();

    let mut validator = validator(&["peer-a", "peer-b"], 2, non_empty_aggregator())
        .await
        .with_state_path(ValidatorState::path_in(&blocker));

    validator.run_cycle().await.unwrap();
    assert_eq!(validator.scores().read().await.scores(), &[0.5, 0.5]);
    assert!(!ValidatorState::path_in(&blocker).exists());
}

#[tokio::test]
async fn test_scores_grow_with_registry() {
    let mut validator = validator(&["peer-a", "peer-b"], 2, non_empty_aggregator())
        .await
        .with_state(ValidatorState::new(
            ScoreState::from_scores(vec![0.2]),
            Default::default(),
        ));

    validator.run_cycle().await.unwrap();
    let scores = validator.scores();
    let scores = scores.read().await;
    assert_eq!(scores.len(), 2);
    assert!((scores.scores()[0] - 0.6).abs() < 1e-9);
    assert!((scores.scores()[1] - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let mut validator = validator(&["peer-a", "peer-b"], 2, non_empty_aggregator()).await;
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        validator.run(rx).await;
        validator.cycles_completed()
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();
    let cycles = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(cycles >= 1);
}
