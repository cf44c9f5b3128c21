//! DescribeTopicPartitions API types (key 75, v0)

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::error_codes;
use crate::metadata::{PartitionDescription, TopicDescription, TopicMetadataSource, DEFAULT_TOPIC_AUTHORIZED_OPERATIONS};
use crate::parser::{encode_framed_response, ApiKey, ArrayEncoding, Decoder, Encoder, ResponseHeader, StringEncoding};

/// Broker-side cap on partitions per response, also used when the client sends no limit
pub const MAX_PARTITIONS_PER_RESPONSE: usize = 2000;

/// Pagination position: the first partition not yet returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub topic_name: String,
    pub partition_index: i32,
}

/// DescribeTopicPartitions request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeTopicPartitionsRequest {
    pub topics: Vec<String>,
    pub response_partition_limit: i32,
    pub cursor: Option<Cursor>,
}

/// Partition entry in the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePartition {
    pub error_code: i16,
    pub partition_index: i32,
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub replica_nodes: Vec<i32>,
    pub isr_nodes: Vec<i32>,
    pub eligible_leader_replicas: Option<Vec<i32>>,
    pub last_known_elr: Option<Vec<i32>>,
    pub offline_replicas: Vec<i32>,
}

impl From<&PartitionDescription> for ResponsePartition {
    fn from(partition: &PartitionDescription) -> Self {
        Self {
            error_code: error_codes::NONE,
            partition_index: partition.partition_index,
            leader_id: partition.leader_id,
            leader_epoch: partition.leader_epoch,
            replica_nodes: partition.replica_nodes.clone(),
            isr_nodes: partition.isr_nodes.clone(),
            eligible_leader_replicas: Some(Vec::new()),
            last_known_elr: Some(Vec::new()),
            offline_replicas: Vec::new(),
        }
    }
}

/// Topic entry in the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTopic {
    pub error_code: i16,
    pub name: Option<String>,
    pub topic_id: Uuid,
    pub is_internal: bool,
    pub partitions: Vec<ResponsePartition>,
    pub topic_authorized_operations: i32,
}

impl ResponseTopic {
    /// Record for a topic the metadata source does not know
    pub fn unknown(name: &str) -> Self {
        Self {
            error_code: error_codes::UNKNOWN_TOPIC_OR_PARTITION,
            name: Some(name.to_string()),
            topic_id: Uuid::nil(),
            is_internal: false,
            partitions: Vec::new(),
            topic_authorized_operations: DEFAULT_TOPIC_AUTHORIZED_OPERATIONS,
        }
    }

    fn known(topic: &TopicDescription, partitions: Vec<ResponsePartition>) -> Self {
        Self {
            error_code: error_codes::NONE,
            name: Some(topic.name.clone()),
            topic_id: topic.topic_id,
            is_internal: topic.is_internal,
            partitions,
            topic_authorized_operations: topic.authorized_operations,
        }
    }
}

/// DescribeTopicPartitions response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeTopicPartitionsResponse {
    pub throttle_time_ms: i32,
    pub topics: Vec<ResponseTopic>,
    /// `None` is sent as the -1 sentinel: no further pages
    pub next_cursor: Option<Cursor>,
}

/// Decode the request body; the header has already been consumed.
pub fn decode_describe_topic_partitions_request(decoder: &mut Decoder<'_>) -> Result<DescribeTopicPartitionsRequest> {
    let topics = decoder.read_array(ArrayEncoding::Compact, "topics", |d| {
        let name = d.read_string(StringEncoding::Compact, "topics.name")?;
        d.skip_tagged_fields()?;
        Ok(name)
    })?;
    let response_partition_limit = decoder.read_i32("response_partition_limit")?;

    let cursor = if decoder.read_i8("cursor")? < 0 {
        None
    } else {
        let topic_name = decoder.read_string(StringEncoding::Compact, "cursor.topic_name")?;
        let partition_index = decoder.read_i32("cursor.partition_index")?;
        decoder.skip_tagged_fields()?;
        Some(Cursor {
            topic_name,
            partition_index,
        })
    };
    decoder.skip_tagged_fields()?;

    Ok(DescribeTopicPartitionsRequest {
        topics,
        response_partition_limit,
        cursor,
    })
}

/// Build the response for `request` from whatever `source` knows.
///
/// Topics are answered in name order. Partitions of known topics count
/// against the partition limit; once it is spent the response cursor points
/// at the first partition left out.
pub fn describe_topic_partitions(
    request: &DescribeTopicPartitionsRequest,
    source: &dyn TopicMetadataSource,
) -> DescribeTopicPartitionsResponse {
    let mut names: Vec<&str> = request.topics.iter().map(String::as_str).collect();
    names.sort_unstable();
    names.dedup();

    let mut budget = match request.response_partition_limit {
        limit if limit > 0 => (limit as usize).min(MAX_PARTITIONS_PER_RESPONSE),
        _ => MAX_PARTITIONS_PER_RESPONSE,
    };

    let mut topics = Vec::with_capacity(names.len());
    let mut next_cursor = None;

    for name in names {
        let first_partition = match &request.cursor {
            Some(cursor) if name < cursor.topic_name.as_str() => continue,
            Some(cursor) if name == cursor.topic_name => cursor.partition_index,
            _ => 0,
        };

        if budget == 0 {
            next_cursor = Some(Cursor {
                topic_name: name.to_string(),
                partition_index: first_partition,
            });
            break;
        }

        let Some(topic) = source.describe_topic(name) else {
            topics.push(ResponseTopic::unknown(name));
            continue;
        };

        let mut remaining: Vec<&PartitionDescription> = topic
            .partitions
            .iter()
            .filter(|p| p.partition_index >= first_partition)
            .collect();
        remaining.sort_by_key(|p| p.partition_index);

        let taken = remaining.len().min(budget);
        budget -= taken;
        let partitions = remaining[..taken].iter().map(|p| ResponsePartition::from(*p)).collect();
        topics.push(ResponseTopic::known(&topic, partitions));

        if let Some(next) = remaining.get(taken) {
            next_cursor = Some(Cursor {
                topic_name: name.to_string(),
                partition_index: next.partition_index,
            });
            break;
        }
    }

    DescribeTopicPartitionsResponse {
        throttle_time_ms: 0,
        topics,
        next_cursor,
    }
}

fn write_nullable_i32_array(encoder: &mut Encoder<'_>, values: Option<&[i32]>) {
    match values {
        Some(values) => encoder.write_compact_i32_array(values),
        None => encoder.write_compact_length(None),
    }
}

fn write_partition(encoder: &mut Encoder<'_>, partition: &ResponsePartition) {
    encoder.write_i16(partition.error_code);
    encoder.write_i32(partition.partition_index);
    encoder.write_i32(partition.leader_id);
    encoder.write_i32(partition.leader_epoch);
    encoder.write_compact_i32_array(&partition.replica_nodes);
    encoder.write_compact_i32_array(&partition.isr_nodes);
    write_nullable_i32_array(encoder, partition.eligible_leader_replicas.as_deref());
    write_nullable_i32_array(encoder, partition.last_known_elr.as_deref());
    encoder.write_compact_i32_array(&partition.offline_replicas);
    encoder.write_empty_tagged_fields();
}

fn write_topic(encoder: &mut Encoder<'_>, topic: &ResponseTopic) {
    encoder.write_i16(topic.error_code);
    encoder.write_compact_string(topic.name.as_deref());
    encoder.write_uuid(&topic.topic_id);
    encoder.write_bool(topic.is_internal);
    encoder.write_compact_length(Some(topic.partitions.len()));
    for partition in &topic.partitions {
        write_partition(encoder, partition);
    }
    encoder.write_i32(topic.topic_authorized_operations);
    encoder.write_empty_tagged_fields();
}

/// Encode a framed DescribeTopicPartitions v0 response
pub fn encode_describe_topic_partitions_response(
    header: &ResponseHeader,
    response: &DescribeTopicPartitionsResponse,
) -> Bytes {
    encode_framed_response(header, ApiKey::DescribeTopicPartitions.response_header_version(), |encoder| {
        encoder.write_i32(response.throttle_time_ms);

        encoder.write_compact_length(Some(response.topics.len()));
        for topic in &response.topics {
            write_topic(encoder, topic);
        }

        match &response.next_cursor {
            None => encoder.write_i8(-1),
            Some(cursor) => {
                encoder.write_i8(1);
                encoder.write_compact_string(Some(&cursor.topic_name));
                encoder.write_i32(cursor.partition_index);
                encoder.write_empty_tagged_fields();
            }
        }
        encoder.write_empty_tagged_fields();
    })
}
