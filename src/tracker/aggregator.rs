use std::{collections::HashMap, time::Duration};

use crate::utils::percentage::{duration_percentage, Percentage};

use super::activity::ActivityKey;

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityShare {
    pub key: ActivityKey,
    pub duration: Duration,
    pub percentage: Percentage,
}

#[derive(Debug, Clone, Copy)]
struct Accumulated {
    duration: Duration,
    /// Order in which the key was first recorded, used to break ties.
    first_seen: u64,
}

/// Accumulates time per [ActivityKey]. It never reads a clock; deltas are supplied by the caller.
#[derive(Debug, Default)]
pub struct DurationAggregator {
    totals: HashMap<ActivityKey, Accumulated>,
    next_order: u64,
}

impl DurationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: ActivityKey, delta: Duration) {
        let next_order = &mut self.next_order;
        let entry = self.totals.entry(key).or_insert_with(|| {
            let first_seen = *next_order;
            *next_order += 1;
            Accumulated {
                duration: Duration::ZERO,
                first_seen,
            }
        });
        entry.duration += delta;
    }

    pub fn clear(&mut self) {
        self.totals.clear();
        self.next_order = 0;
    }

    pub fn total(&self) -> Duration {
        self.totals.values().map(|v| v.duration).sum()
    }

    pub fn duration_of(&self, key: &ActivityKey) -> Duration {
        self.totals
            .get(key)
            .map_or(Duration::ZERO, |v| v.duration)
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Returns up to `n` keys with the most accumulated time, longest first. Equal durations keep
    /// the order in which keys were first recorded. Empty while nothing has been accumulated.
    pub fn top(&self, n: usize) -> Vec<ActivityShare> {
        let total = self.total();
        if total.is_zero() {
            return vec![];
        }

        let mut entries = self.totals.iter().collect::<Vec<_>>();
        entries.sort_by(|(_, a), (_, b)| {
            b.duration
                .cmp(&a.duration)
                .then(a.first_seen.cmp(&b.first_seen))
        });

        entries
            .into_iter()
            .take(n)
            .filter_map(|(key, accumulated)| {
                Some(ActivityShare {
                    key: key.clone(),
                    duration: accumulated.duration,
                    percentage: duration_percentage(accumulated.duration, total)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value)
    }

    #[test]
    fn test_total_is_sum_of_deltas() {
        let mut aggregator = DurationAggregator::new();
        let deltas = [0.9, 1.1, 0.95, 2.5, 0.0, 1.05];
        let keys = ["a", "b", "a", "c", "b", "a"];
        for (key, delta) in keys.iter().zip(deltas) {
            aggregator.record((*key).into(), secs(delta));
        }

        let expected: f64 = deltas.iter().sum();
        assert!((aggregator.total().as_secs_f64() - expected).abs() < 1e-6);

        aggregator.clear();
        assert_eq!(aggregator.total(), Duration::ZERO);
        assert!(aggregator.is_empty());
        assert!(aggregator.top(5).is_empty());
    }

    #[test]
    fn test_top_is_bounded_and_sorted() {
        let mut aggregator = DurationAggregator::new();
        for (i, key) in ["a", "b", "c", "d", "e", "f", "g"].iter().enumerate() {
            aggregator.record((*key).into(), Duration::from_secs(i as u64 + 1));
        }

        let top = aggregator.top(5);
        assert_eq!(top.len(), 5);
        assert!(top.windows(2).all(|w| w[0].duration >= w[1].duration));
        assert_eq!(top[0].key.as_str(), "g");

        let sum: f64 = top.iter().map(|share| *share.percentage).sum();
        assert!(sum < 100.);
    }

    #[test]
    fn test_percentages_cover_everything_when_all_keys_fit() {
        let mut aggregator = DurationAggregator::new();
        aggregator.record("App A".into(), Duration::from_secs(2));
        aggregator.record("App B".into(), Duration::from_secs(1));

        let top = aggregator.top(5);
        let sum: f64 = top.iter().map(|share| *share.percentage).sum();
        assert!((sum - 100.).abs() < 1e-9);
        assert!((*top[0].percentage - 66.666).abs() < 0.01);
        assert!((*top[1].percentage - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let mut aggregator = DurationAggregator::new();
        aggregator.record("later".into(), Duration::ZERO);
        aggregator.record("first".into(), Duration::from_secs(1));
        aggregator.record("later".into(), Duration::from_secs(1));
        aggregator.record("third".into(), Duration::from_secs(1));

        let order = aggregator
            .top(3)
            .into_iter()
            .map(|share| share.key.to_string())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["later", "first", "third"]);
    }

    #[test]
    fn test_only_zero_deltas_yield_nothing() {
        let mut aggregator = DurationAggregator::new();
        aggregator.record("a".into(), Duration::ZERO);
        assert_eq!(aggregator.len(), 1);
        assert!(aggregator.top(5).is_empty());
    }
}
