use crate::{Result, SamplingError};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tessera_registry::{EligibilityPolicy, RegistrySnapshot};
use tessera_types::PeerIndex;
use tracing::debug;

/// Eligible peers of one snapshot, split by the caller's exclusion list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplingPools {
    /// Every eligible peer
    pub available: Vec<PeerIndex>,
    /// Eligible peers not excluded by the caller
    pub candidates: Vec<PeerIndex>,
}

/// Draws the peers queried in a validation cycle.
///
/// Sampling is uniform without replacement over eligible, non-excluded
/// peers. When that pool is smaller than requested, excluded-but-eligible
/// peers are drawn at random to make up the difference; ineligible peers
/// are never returned.
pub struct PeerSampler {
    policy: EligibilityPolicy,
    // Metrics
    pub samples_total: Option<Arc<prometheus::IntCounter>>,
    pub backfilled_total: Option<Arc<prometheus::IntCounter>>,
    pub eligible_peers: Option<Arc<prometheus::IntGauge>>,
}

impl PeerSampler {
    pub fn new(policy: EligibilityPolicy) -> Self {
        Self {
            policy,
            samples_total: None,
            backfilled_total: None,
            eligible_peers: None,
        }
    }

    /// Set metrics for sampling
    pub fn set_metrics(
        &mut self,
        samples_total: Arc<prometheus::IntCounter>,
        backfilled_total: Arc<prometheus::IntCounter>,
        eligible_peers: Arc<prometheus::IntGauge>,
    ) {
        self.samples_total = Some(samples_total);
        self.backfilled_total = Some(backfilled_total);
        self.eligible_peers = Some(eligible_peers);
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    /// Split the snapshot into available and candidate pools
    pub fn pools(
        &self,
        snapshot: &RegistrySnapshot,
        exclude: &HashSet<PeerIndex>,
    ) -> SamplingPools {
        let mut pools = SamplingPools::default();

        for peer in snapshot.iter() {
            if !self.policy.is_eligible(peer) {
                continue;
            }
            pools.available.push(peer.index);
            if !exclude.contains(&peer.index) {
                pools.candidates.push(peer.index);
            }
        }

        pools
    }

    /// Sample `k` distinct eligible peers, preferring those not in `exclude`
    pub fn sample<R: Rng + ?Sized>(
        &self,
        snapshot: &RegistrySnapshot,
        k: usize,
        exclude: &HashSet<PeerIndex>,
        rng: &mut R,
    ) -> Result<Vec<PeerIndex>> {
        if k == 0 {
            return Err(SamplingError::InvalidSampleSize(k));
        }

        let SamplingPools {
            available,
            mut candidates,
        } = self.pools(snapshot, exclude);

        if let Some(ref gauge) = self.eligible_peers {
            gauge.set(available.len() as i64);
        }

        if available.len() < k {
            return Err(SamplingError::InsufficientPeers {
                needed: k,
                available: available.len(),
            });
        }

        let mut backfilled = 0;
        if candidates.len() < k {
            let shortfall = k - candidates.len();
            let candidate_set: HashSet<PeerIndex> = candidates.iter().copied().collect();
            let reserve: Vec<PeerIndex> = available
                .iter()
                .copied()
                .filter(|index| !candidate_set.contains(index))
                .collect();

            candidates.extend(reserve.choose_multiple(rng, shortfall).copied());
            backfilled = shortfall;
        }

        let selected: Vec<PeerIndex> = candidates.choose_multiple(rng, k).copied().collect();

        if let Some(ref counter) = self.samples_total {
            counter.inc();
        }
        if let Some(ref counter) = self.backfilled_total {
            counter.inc_by(backfilled as u64);
        }

        debug!(
            requested = k,
            available = available.len(),
            excluded = exclude.len(),
            backfilled,
            "🎲 Sampled peers"
        );

        Ok(selected)
    }

    /// [`sample`](Self::sample) using the thread-local RNG
    pub fn sample_random(
        &self,
        snapshot: &RegistrySnapshot,
        k: usize,
        exclude: &HashSet<PeerIndex>,
    ) -> Result<Vec<PeerIndex>> {
        self.sample(snapshot, k, exclude, &mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tessera_types::{PeerEndpoint, PeerInfo};

    /// Peers 0..n, where the indices in `not_serving` have no endpoint
    fn snapshot(n: usize, not_serving: &[PeerIndex]) -> RegistrySnapshot {
        let peers = (0..n)
            .map(|i| PeerInfo {
                index: i,
                hotkey: format!("hk{}", i),
                coldkey: format!("ck{}", i),
                stake: 10.0,
                validator_permit: false,
                endpoint: if not_serving.contains(&i) {
                    None
                } else {
                    Some(PeerEndpoint::new(format!("10.0.0.{}:8091", i + 1)))
                },
            })
            .collect();
        RegistrySnapshot::new(1, peers).unwrap()
    }

    fn distinct(indices: &[PeerIndex]) -> bool {
        let set: HashSet<_> = indices.iter().collect();
        set.len() == indices.len()
    }

    #[test]
    fn test_sample_returns_k_distinct_eligible() {
        let snapshot = snapshot(30, &[1, 5, 9]);
        let sampler = PeerSampler::new(EligibilityPolicy::default());
        let mut rng = StdRng::seed_from_u64(7);

        let sample = sampler
            .sample(&snapshot, 20, &HashSet::new(), &mut rng)
            .unwrap();

        assert_eq!(sample.len(), 20);
        assert!(distinct(&sample));
        assert!(sample.iter().all(|i| ![1, 5, 9].contains(i)));
    }

    #[test]
    fn test_excluded_peers_avoided_when_possible() {
        let snapshot = snapshot(10, &[]);
        let sampler = PeerSampler::new(EligibilityPolicy::default());
        let exclude: HashSet<PeerIndex> = [0, 1, 2, 3].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..20 {
            let sample = sampler.sample(&snapshot, 6, &exclude, &mut rng).unwrap();
            assert_eq!(sample.len(), 6);
            assert!(sample.iter().all(|i| !exclude.contains(i)));
        }
    }

    #[test]
    fn test_backfill_draws_from_excluded_eligible_only() {
        // Peers 8 and 9 are ineligible, 0..=5 are excluded
        let snapshot = snapshot(10, &[8, 9]);
        let sampler = PeerSampler::new(EligibilityPolicy::default());
        let exclude: HashSet<PeerIndex> = (0..=5).collect();
        let mut rng = StdRng::seed_from_u64(3);

        let sample = sampler.sample(&snapshot, 5, &exclude, &mut rng).unwrap();

        assert_eq!(sample.len(), 5);
        assert!(distinct(&sample));
        // Both non-excluded eligible peers must be present
        assert!(sample.contains(&6));
        assert!(sample.contains(&7));
        assert!(sample.iter().all(|i| *i < 8));
    }

    #[test]
    fn test_insufficient_peers() {
        let snapshot = snapshot(5, &[0, 1]);
        let sampler = PeerSampler::new(EligibilityPolicy::default());
        let mut rng = StdRng::seed_from_u64(1);

        let result = sampler.sample(&snapshot, 4, &HashSet::new(), &mut rng);
        assert_eq!(
            result,
            Err(SamplingError::InsufficientPeers {
                needed: 4,
                available: 3
            })
        );
    }

    #[test]
    fn test_zero_sample_size_rejected() {
        let snapshot = snapshot(5, &[]);
        let sampler = PeerSampler::new(EligibilityPolicy::default());
        assert_eq!(
            sampler.sample_random(&snapshot, 0, &HashSet::new()),
            Err(SamplingError::InvalidSampleSize(0))
        );
    }

    #[test]
    fn test_blacklist_respected() {
        let snapshot = snapshot(4, &[]);
        let policy = EligibilityPolicy::new(4096.0, vec!["ck2".to_string()]);
        let sampler = PeerSampler::new(policy);

        let sample = sampler
            .sample_random(&snapshot, 3, &HashSet::new())
            .unwrap();
        let mut sorted = sample.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 3]);
    }

    #[test]
    fn test_metrics_updated() {
        let snapshot = snapshot(6, &[]);
        let mut sampler = PeerSampler::new(EligibilityPolicy::default());
        let samples = Arc::new(prometheus::IntCounter::new("samples", "samples").unwrap());
        let backfilled = Arc::new(prometheus::IntCounter::new("backfilled", "backfilled").unwrap());
        let eligible = Arc::new(prometheus::IntGauge::new("eligible", "eligible").unwrap());
        sampler.set_metrics(samples.clone(), backfilled.clone(), eligible.clone());

        let exclude: HashSet<PeerIndex> = (0..4).collect();
        sampler.sample_random(&snapshot, 3, &exclude).unwrap();

        assert_eq!(samples.get(), 1);
        assert_eq!(backfilled.get(), 1);
        assert_eq!(eligible.get(), 6);
    }
}
