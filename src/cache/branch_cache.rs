// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Logically independent cache partitions. They share one invalidation
/// entry point: a mutation under a branch clears all of them for that
/// branch, never a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    BranchVersions,
    ConceptDetails,
    TaxonomyAncestors,
    MemberAncestors,
    ConceptLists,
}

impl Partition {
    pub const ALL: [Partition; 5] = [
        Partition::BranchVersions,
        Partition::ConceptDetails,
        Partition::TaxonomyAncestors,
        Partition::MemberAncestors,
        Partition::ConceptLists,
    ];
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, partition: Partition, branch: &str, key: &str) -> Option<Value>;
    async fn put(&self, partition: Partition, branch: &str, key: &str, value: Value);
    /// Clear every partition for the branch.
    async fn invalidate_all(&self, branch: &str);
}

type BranchMap = HashMap<String, HashMap<String, Value>>;

/// In-process per-branch keyed store. Explicitly concurrent-safe: all
/// partitions sit behind one RwLock.
pub struct BranchCache {
    partitions: RwLock<HashMap<Partition, BranchMap>>,
}

impl BranchCache {
    pub fn new() -> Self {
        let mut partitions = HashMap::new();
        for partition in Partition::ALL {
            partitions.insert(partition, BranchMap::new());
        }
        Self {
            partitions: RwLock::new(partitions),
        }
    }
}

impl Default for BranchCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for BranchCache {
    async fn get(&self, partition: Partition, branch: &str, key: &str) -> Option<Value> {
        let partitions = self.partitions.read().await;
        partitions
            .get(&partition)
            .and_then(|branches| branches.get(branch))
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    async fn put(&self, partition: Partition, branch: &str, key: &str, value: Value) {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(partition)
            .or_default()
            .entry(branch.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    async fn invalidate_all(&self, branch: &str) {
        let mut partitions = self.partitions.write().await;
        for branches in partitions.values_mut() {
            branches.remove(branch);
        }
        debug!(branch = %branch, "Invalidated all cache partitions for branch");
    }
}
