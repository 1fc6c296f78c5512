//! Topic-keyed lookup of [`Partition`]s, created lazily on first publish.
//!
//! Grounded in the original's `glocal.partitionRegistry`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::partition::Partition;

#[derive(Default)]
pub struct PartitionRegistry {
    partitions: RwLock<HashMap<String, Arc<Partition>>>,
}

impl PartitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, topic: &str) -> Option<Arc<Partition>> {
        self.partitions.read().await.get(topic).cloned()
    }

    /// Fetch the partition for `topic`, creating it if this is the first
    /// publish to see it.
    pub async fn get_or_create(&self, topic: &str) -> Arc<Partition> {
        if let Some(partition) = self.get(topic).await {
            return partition;
        }
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(Partition::new()))
            .clone()
    }
}
