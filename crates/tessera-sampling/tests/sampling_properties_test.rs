use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use tessera_registry::{EligibilityPolicy, RegistrySnapshot};
use tessera_sampling::{PeerSampler, SamplingError};
use tessera_types::{PeerEndpoint, PeerIndex, PeerInfo};

/// Build a registry where `serving[i]` decides whether peer i is eligible
fn registry(serving: &[bool]) -> RegistrySnapshot {
    let peers = serving
        .iter()
        .enumerate()
        .map(|(i, serving)| PeerInfo {
            index: i,
            hotkey: format!("hk{}", i),
            coldkey: format!("ck{}", i),
            stake: 1.0,
            validator_permit: false,
            endpoint: serving.then(|| PeerEndpoint::new(format!("10.1.0.{}:8091", i))),
        })
        .collect();
    RegistrySnapshot::new(1, peers).unwrap()
}

fn eligible(serving: &[bool]) -> HashSet<PeerIndex> {
    serving
        .iter()
        .enumerate()
        .filter(|(_, s)| **s)
        .map(|(i, _)| i)
        .collect()
}

proptest! {
    /// Property: with no exclusions, k <= |eligible| yields k distinct eligible peers
    #[test]
    fn prop_sample_is_distinct_and_eligible(
        serving in prop::collection::vec(any::<bool>(), 1..64),
        k_seed in 1usize..64,
        seed in any::<u64>(),
    ) {
        let eligible = eligible(&serving);
        prop_assume!(!eligible.is_empty());
        let k = 1 + k_seed % eligible.len();

        let sampler = PeerSampler::new(EligibilityPolicy::default());
        let mut rng = StdRng::seed_from_u64(seed);
        let sample = sampler
            .sample(&registry(&serving), k, &HashSet::new(), &mut rng)
            .unwrap();

        let unique: HashSet<_> = sample.iter().copied().collect();
        prop_assert_eq!(sample.len(), k);
        prop_assert_eq!(unique.len(), k);
        prop_assert!(unique.is_subset(&eligible));
    }

    /// Property: exclusions are honoured when possible, backfill stays eligible
    #[test]
    fn prop_exclusion_and_backfill(
        serving in prop::collection::vec(any::<bool>(), 1..48),
        excluded in prop::collection::vec(any::<bool>(), 48),
        k_seed in 1usize..48,
        seed in any::<u64>(),
    ) {
        let eligible = eligible(&serving);
        prop_assume!(!eligible.is_empty());
        let k = 1 + k_seed % eligible.len();
        let exclude: HashSet<PeerIndex> = excluded
            .iter()
            .enumerate()
            .filter(|(i, e)| **e && *i < serving.len())
            .map(|(i, _)| i)
            .collect();

        let sampler = PeerSampler::new(EligibilityPolicy::default());
        let mut rng = StdRng::seed_from_u64(seed);
        let sample: HashSet<PeerIndex> = sampler
            .sample(&registry(&serving), k, &exclude, &mut rng)
            .unwrap()
            .into_iter()
            .collect();

        let preferred: HashSet<PeerIndex> = eligible.difference(&exclude).copied().collect();
        prop_assert_eq!(sample.len(), k);
        prop_assert!(sample.is_subset(&eligible));
        if preferred.len() >= k {
            prop_assert!(sample.is_subset(&preferred));
        } else {
            // Every preferred peer is kept and the rest are eligible backfill
            prop_assert!(preferred.is_subset(&sample));
        }
    }

    /// Property: asking for more than the eligible count always fails
    #[test]
    fn prop_oversized_request_fails(
        serving in prop::collection::vec(any::<bool>(), 1..32),
        extra in 1usize..8,
    ) {
        let available = eligible(&serving).len();
        let sampler = PeerSampler::new(EligibilityPolicy::default());
        let result = sampler.sample_random(&registry(&serving), available + extra, &HashSet::new());
        prop_assert_eq!(
            result,
            Err(SamplingError::InsufficientPeers { needed: available + extra, available })
        );
    }
}
