//! Topic metadata lookup used when synthesizing responses.
//!
//! The codec never owns topic state. Whatever serves the connection hands
//! the [`ProtocolHandler`](crate::handler::ProtocolHandler) a
//! [`TopicMetadataSource`]; the in-memory catalogues here are the two the
//! broker ships with.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authorized operations bitmask reported when nothing more specific is known
/// (READ, WRITE, CREATE, DELETE, ALTER, DESCRIBE, DESCRIBE_CONFIGS, ALTER_CONFIGS).
pub const DEFAULT_TOPIC_AUTHORIZED_OPERATIONS: i32 = 0x0DF8;

/// Partition as reported by DescribeTopicPartitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescription {
    pub partition_index: i32,
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub replica_nodes: Vec<i32>,
    pub isr_nodes: Vec<i32>,
}

/// Topic as known to a metadata source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDescription {
    pub name: String,
    pub topic_id: Uuid,
    pub is_internal: bool,
    pub partitions: Vec<PartitionDescription>,
    pub authorized_operations: i32,
}

impl TopicDescription {
    /// Topic with `partition_count` partitions all led by `broker_id`.
    ///
    /// Counts beyond the int32 partition index space are capped at `i32::MAX`.
    pub fn single_broker(name: impl Into<String>, topic_id: Uuid, partition_count: u32, broker_id: i32) -> Self {
        let partition_count = i32::try_from(partition_count).unwrap_or(i32::MAX);
        let partitions = (0..partition_count)
            .map(|partition_index| PartitionDescription {
                partition_index,
                leader_id: broker_id,
                leader_epoch: 0,
                replica_nodes: vec![broker_id],
                isr_nodes: vec![broker_id],
            })
            .collect();

        Self {
            name: name.into(),
            topic_id,
            is_internal: false,
            partitions,
            authorized_operations: DEFAULT_TOPIC_AUTHORIZED_OPERATIONS,
        }
    }

    pub fn has_partition(&self, partition_index: i32) -> bool {
        self.partitions.iter().any(|p| p.partition_index == partition_index)
    }
}

/// Lookup capability the dispatcher synthesizes responses from
pub trait TopicMetadataSource: Send + Sync {
    /// Find a topic by name
    fn describe_topic(&self, name: &str) -> Option<TopicDescription>;

    /// Find a topic by id
    fn topic_by_id(&self, topic_id: &Uuid) -> Option<TopicDescription>;
}

/// A source that knows no topics
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyTopicCatalog;

impl TopicMetadataSource for EmptyTopicCatalog {
    fn describe_topic(&self, _name: &str) -> Option<TopicDescription> {
        None
    }

    fn topic_by_id(&self, _topic_id: &Uuid) -> Option<TopicDescription> {
        None
    }
}

/// Fixed set of topics, indexed by name and by id
#[derive(Debug, Default, Clone)]
pub struct StaticTopicCatalog {
    by_name: HashMap<String, TopicDescription>,
    name_by_id: HashMap<Uuid, String>,
}

impl StaticTopicCatalog {
    pub fn new(topics: impl IntoIterator<Item = TopicDescription>) -> Self {
        let mut catalog = Self::default();
        for topic in topics {
            catalog.insert(topic);
        }
        catalog
    }

    /// Add or replace a topic
    pub fn insert(&mut self, topic: TopicDescription) {
        if let Some(previous) = self.by_name.remove(&topic.name) {
            self.name_by_id.remove(&previous.topic_id);
        }
        self.name_by_id.insert(topic.topic_id, topic.name.clone());
        self.by_name.insert(topic.name.clone(), topic);
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl TopicMetadataSource for StaticTopicCatalog {
    fn describe_topic(&self, name: &str) -> Option<TopicDescription> {
        self.by_name.get(name).cloned()
    }

    fn topic_by_id(&self, topic_id: &Uuid) -> Option<TopicDescription> {
        self.name_by_id
            .get(topic_id)
            .and_then(|name| self.by_name.get(name))
            .cloned()
    }
}
