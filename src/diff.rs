use std::collections::HashSet;

use serde::Serialize;
use tracing::warn;

use crate::error::StrategyError;
use crate::models::record::{AbnormalPodRecord, PodKey};

/// Three disjoint buckets partitioning `keys(current) ∪ keys(previous)`.
/// `new` and `ongoing` carry current-side records, `resolved` carries
/// previous-side records; each bucket keeps its source collection's order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffResult {
    pub new: Vec<AbnormalPodRecord>,
    pub ongoing: Vec<AbnormalPodRecord>,
    pub resolved: Vec<AbnormalPodRecord>,
}

/// Key-set output of a partition strategy.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct KeyPartition {
    pub new: HashSet<PodKey>,
    pub ongoing: HashSet<PodKey>,
    pub resolved: HashSet<PodKey>,
}

/// Computes the new/ongoing/resolved key sets from the key projections of
/// two snapshots. Implementations see keys only, never full records.
pub trait KeyPartitionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn partition(
        &self,
        current: &[PodKey],
        previous: &[PodKey],
    ) -> Result<KeyPartition, StrategyError>;
}

/// Reference implementation: plain hash-set algebra.
pub struct HashPartitionStrategy;

impl KeyPartitionStrategy for HashPartitionStrategy {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn partition(
        &self,
        current: &[PodKey],
        previous: &[PodKey],
    ) -> Result<KeyPartition, StrategyError> {
        Ok(reference_partition(current, previous))
    }
}

/// Accelerated implementation: sorts both key slices once and walks them
/// with two cursors instead of building intermediate sets per operation.
pub struct SortedPartitionStrategy;

impl KeyPartitionStrategy for SortedPartitionStrategy {
    fn name(&self) -> &'static str {
        "sorted"
    }

    fn partition(
        &self,
        current: &[PodKey],
        previous: &[PodKey],
    ) -> Result<KeyPartition, StrategyError> {
        let mut cur: Vec<&PodKey> = current.iter().collect();
        let mut prev: Vec<&PodKey> = previous.iter().collect();
        cur.sort();
        prev.sort();

        let mut partition = KeyPartition::default();
        let (mut i, mut j) = (0, 0);
        while i < cur.len() && j < prev.len() {
            match cur[i].cmp(prev[j]) {
                std::cmp::Ordering::Less => {
                    partition.new.insert(cur[i].clone());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    partition.resolved.insert(prev[j].clone());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    partition.ongoing.insert(cur[i].clone());
                    i += 1;
                    j += 1;
                }
            }
        }
        for key in &cur[i..] {
            partition.new.insert((*key).clone());
        }
        for key in &prev[j..] {
            partition.resolved.insert((*key).clone());
        }
        Ok(partition)
    }
}

fn reference_partition(current: &[PodKey], previous: &[PodKey]) -> KeyPartition {
    let cur: HashSet<&PodKey> = current.iter().collect();
    let prev: HashSet<&PodKey> = previous.iter().collect();
    KeyPartition {
        new: cur.difference(&prev).map(|k| (*k).clone()).collect(),
        ongoing: cur.intersection(&prev).map(|k| (*k).clone()).collect(),
        resolved: prev.difference(&cur).map(|k| (*k).clone()).collect(),
    }
}

/// A partition is well-formed when every current key lands in exactly one of
/// new/ongoing, every previous key in exactly one of ongoing/resolved, and
/// nothing else sneaked in.
fn validate_partition(
    partition: &KeyPartition,
    current: &[PodKey],
    previous: &[PodKey],
) -> Result<(), StrategyError> {
    let cur: HashSet<&PodKey> = current.iter().collect();
    let prev: HashSet<&PodKey> = previous.iter().collect();

    for key in &cur {
        match (partition.new.contains(*key), partition.ongoing.contains(*key)) {
            (true, false) | (false, true) => {}
            (true, true) => return Err(StrategyError::InvalidPartition("key in both new and ongoing")),
            (false, false) => return Err(StrategyError::InvalidPartition("current key missing")),
        }
    }
    for key in &prev {
        let expected_ongoing = cur.contains(*key);
        if expected_ongoing != partition.ongoing.contains(*key) {
            return Err(StrategyError::InvalidPartition("ongoing disagrees with inputs"));
        }
        if !expected_ongoing && !partition.resolved.contains(*key) {
            return Err(StrategyError::InvalidPartition("previous key missing"));
        }
    }
    let union_len = cur.union(&prev).count();
    let partition_len = partition.new.len() + partition.ongoing.len() + partition.resolved.len();
    if partition_len != union_len {
        return Err(StrategyError::InvalidPartition("partition carries extra keys"));
    }
    Ok(())
}

/// Buckets two snapshots into new/ongoing/resolved records, delegating
/// key-set computation to the configured strategy. Any strategy failure or
/// malformed result falls back to the reference implementation; callers only
/// ever see a valid partition.
pub struct DiffEngine {
    strategy: Box<dyn KeyPartitionStrategy>,
}

impl DiffEngine {
    pub fn new(strategy: Box<dyn KeyPartitionStrategy>) -> Self {
        Self { strategy }
    }

    pub fn reference() -> Self {
        Self::new(Box::new(HashPartitionStrategy))
    }

    pub fn diff(
        &self,
        current: &[AbnormalPodRecord],
        previous: &[AbnormalPodRecord],
    ) -> DiffResult {
        let cur_keys: Vec<PodKey> = current.iter().map(AbnormalPodRecord::key).collect();
        let prev_keys: Vec<PodKey> = previous.iter().map(AbnormalPodRecord::key).collect();

        let partition = match self.strategy.partition(&cur_keys, &prev_keys) {
            Ok(p) => match validate_partition(&p, &cur_keys, &prev_keys) {
                Ok(()) => p,
                Err(e) => {
                    warn!(
                        "partition strategy '{}' returned a malformed result ({}), recomputing with reference implementation",
                        self.strategy.name(),
                        e
                    );
                    reference_partition(&cur_keys, &prev_keys)
                }
            },
            Err(e) => {
                warn!(
                    "partition strategy '{}' failed ({}), recomputing with reference implementation",
                    self.strategy.name(),
                    e
                );
                reference_partition(&cur_keys, &prev_keys)
            }
        };

        DiffResult {
            new: current
                .iter()
                .filter(|r| partition.new.contains(&r.key()))
                .cloned()
                .collect(),
            ongoing: current
                .iter()
                .filter(|r| partition.ongoing.contains(&r.key()))
                .cloned()
                .collect(),
            resolved: previous
                .iter()
                .filter(|r| partition.resolved.contains(&r.key()))
                .cloned()
                .collect(),
        }
    }
}
