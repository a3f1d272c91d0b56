use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tessera_types::WorkItem;
use tracing::{debug, trace};

/// FIFO of URLs still to be probed, plus everything ever observed.
///
/// Invariants:
/// - an item enters the queue at most once over the frontier's lifetime
/// - `seen` contains every item ever ingested or handed out
/// - an item is handed out by [`dequeue_unseen`](Self::dequeue_unseen) at most once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlFrontier {
    queue: VecDeque<WorkItem>,
    seen: HashSet<WorkItem>,
    dispatched: HashSet<WorkItem>,
}

impl CrawlFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frontier preloaded with seed URLs
    pub fn with_seeds(seeds: impl IntoIterator<Item = WorkItem>) -> Self {
        let mut frontier = Self::new();
        frontier.seed(seeds);
        frontier
    }

    /// Add configured seed URLs, deduplicated like discovered links
    pub fn seed(&mut self, seeds: impl IntoIterator<Item = WorkItem>) -> usize {
        self.ingest(seeds)
    }

    /// Pop the next item that has not been handed out before
    pub fn dequeue_unseen(&mut self) -> Option<WorkItem> {
        while let Some(item) = self.queue.pop_front() {
            if self.dispatched.contains(&item) {
                trace!(url = %item, "Discarding already dispatched item");
                continue;
            }
            self.seen.insert(item.clone());
            self.dispatched.insert(item.clone());
            return Some(item);
        }
        None
    }

    /// Up to `n` items from [`dequeue_unseen`](Self::dequeue_unseen)
    pub fn take_batch(&mut self, n: usize) -> Vec<WorkItem> {
        let mut batch = Vec::with_capacity(n.min(self.queue.len()));
        while batch.len() < n {
            match self.dequeue_unseen() {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        batch
    }

    /// Enqueue every discovered item not seen before.
    ///
    /// New items are appended in order of first appearance in `discovered`;
    /// repeats inside `discovered` collapse to that first occurrence.
    /// Returns how many items were enqueued.
    pub fn ingest(&mut self, discovered: impl IntoIterator<Item = WorkItem>) -> usize {
        let mut added = 0;
        for item in discovered {
            if self.seen.contains(&item) {
                continue;
            }
            self.seen.insert(item.clone());
            self.queue.push_back(item);
            added += 1;
        }

        if added > 0 {
            debug!(
                added,
                queue_len = self.queue.len(),
                seen = self.seen.len(),
                "🔍 Ingested new links"
            );
        }
        added
    }

    pub fn is_seen(&self, item: &str) -> bool {
        self.seen.contains(item)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queued(&self) -> impl Iterator<Item = &WorkItem> {
        self.queue.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(n: u32) -> WorkItem {
        format!("https://example.org/{}", n)
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = CrawlFrontier::with_seeds(vec![url(1), url(2), url(3)]);
        assert_eq!(frontier.dequeue_unseen(), Some(url(1)));
        assert_eq!(frontier.dequeue_unseen(), Some(url(2)));
        assert_eq!(frontier.dequeue_unseen(), Some(url(3)));
        assert_eq!(frontier.dequeue_unseen(), None);
    }

    #[test]
    fn test_double_ingest_is_idempotent() {
        let mut frontier = CrawlFrontier::new();
        assert_eq!(frontier.ingest(vec![url(1)]), 1);
        assert_eq!(frontier.ingest(vec![url(1)]), 0);

        assert_eq!(frontier.seen_len(), 1);
        assert_eq!(frontier.queue_len(), 1);
        assert_eq!(frontier.queued().filter(|u| **u == url(1)).count(), 1);
    }

    #[test]
    fn test_ingest_dedups_within_input_preserving_first_order() {
        let mut frontier = CrawlFrontier::new();
        let added = frontier.ingest(vec![url(3), url(1), url(3), url(2), url(1)]);
        assert_eq!(added, 3);
        let queued: Vec<_> = frontier.queued().cloned().collect();
        assert_eq!(queued, vec![url(3), url(1), url(2)]);
    }

    #[test]
    fn test_dequeued_item_never_reenqueued() {
        let mut frontier = CrawlFrontier::with_seeds(vec![url(1)]);
        assert_eq!(frontier.dequeue_unseen(), Some(url(1)));

        // A peer rediscovers the same link
        assert_eq!(frontier.ingest(vec![url(1), url(2)]), 1);
        assert_eq!(frontier.dequeue_unseen(), Some(url(2)));
        assert_eq!(frontier.dequeue_unseen(), None);
    }

    #[test]
    fn test_dequeue_never_repeats() {
        let mut frontier = CrawlFrontier::with_seeds((0..50).map(url));
        let mut handed_out = HashSet::new();
        while let Some(item) = frontier.dequeue_unseen() {
            assert!(handed_out.insert(item.clone()), "{} returned twice", item);
            assert!(frontier.is_seen(&item));
            frontier.ingest(vec![item, url(7), url(99)]);
        }
        assert_eq!(handed_out.len(), 51);
    }

    #[test]
    fn test_take_batch_stops_when_exhausted() {
        let mut frontier = CrawlFrontier::with_seeds(vec![url(1), url(2)]);
        assert_eq!(frontier.take_batch(5), vec![url(1), url(2)]);
        assert!(frontier.take_batch(5).is_empty());
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut frontier = CrawlFrontier::with_seeds(vec![url(1), url(2)]);
        frontier.dequeue_unseen();
        let json = serde_json::to_string(&frontier).unwrap();
        let restored: CrawlFrontier = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, frontier);
    }
}
