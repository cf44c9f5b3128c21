//! Fetch API types (key 1, v16)
//!
//! There is no log behind this broker, so a fetch never returns records:
//! known partitions answer with empty record sets, unknown topic ids with
//! UNKNOWN_TOPIC_ID.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::error_codes;
use crate::metadata::TopicMetadataSource;
use crate::parser::{encode_framed_response, ApiKey, ArrayEncoding, Decoder, ResponseHeader, StringEncoding};

/// Partition to fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPartition {
    pub partition: i32,
    pub current_leader_epoch: i32,
    pub fetch_offset: i64,
    pub last_fetched_epoch: i32,
    pub log_start_offset: i64,
    pub partition_max_bytes: i32,
}

/// Topic to fetch, addressed by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTopic {
    pub topic_id: Uuid,
    pub partitions: Vec<FetchPartition>,
}

/// Partitions to drop from an incremental fetch session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgottenTopic {
    pub topic_id: Uuid,
    pub partitions: Vec<i32>,
}

/// Fetch request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub max_wait_ms: i32,
    pub min_bytes: i32,
    pub max_bytes: i32,
    pub isolation_level: i8,
    pub session_id: i32,
    pub session_epoch: i32,
    pub topics: Vec<FetchTopic>,
    pub forgotten_topics_data: Vec<ForgottenTopic>,
    pub rack_id: String,
}

/// Partition data in the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponsePartition {
    pub partition_index: i32,
    pub error_code: i16,
    pub high_watermark: i64,
    pub last_stable_offset: i64,
    pub log_start_offset: i64,
    pub preferred_read_replica: i32,
    /// Raw record batches; `None` is a null record set
    pub records: Option<Vec<u8>>,
}

impl FetchResponsePartition {
    fn empty(partition_index: i32, error_code: i16) -> Self {
        Self {
            partition_index,
            error_code,
            high_watermark: 0,
            last_stable_offset: 0,
            log_start_offset: 0,
            preferred_read_replica: -1,
            records: Some(Vec::new()),
        }
    }
}

/// Topic data in the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponseTopic {
    pub topic_id: Uuid,
    pub partitions: Vec<FetchResponsePartition>,
}

/// Fetch response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub throttle_time_ms: i32,
    pub error_code: i16,
    pub session_id: i32,
    pub responses: Vec<FetchResponseTopic>,
}

fn read_fetch_partition(decoder: &mut Decoder<'_>) -> Result<FetchPartition> {
    let partition = FetchPartition {
        partition: decoder.read_i32("topics.partitions.partition")?,
        current_leader_epoch: decoder.read_i32("topics.partitions.current_leader_epoch")?,
        fetch_offset: decoder.read_i64("topics.partitions.fetch_offset")?,
        last_fetched_epoch: decoder.read_i32("topics.partitions.last_fetched_epoch")?,
        log_start_offset: decoder.read_i64("topics.partitions.log_start_offset")?,
        partition_max_bytes: decoder.read_i32("topics.partitions.partition_max_bytes")?,
    };
    decoder.skip_tagged_fields()?;
    Ok(partition)
}

fn read_fetch_topic(decoder: &mut Decoder<'_>) -> Result<FetchTopic> {
    let topic_id = decoder.read_uuid("topics.topic_id")?;
    let partitions = decoder.read_array(ArrayEncoding::Compact, "topics.partitions", read_fetch_partition)?;
    decoder.skip_tagged_fields()?;
    Ok(FetchTopic { topic_id, partitions })
}

fn read_forgotten_topic(decoder: &mut Decoder<'_>) -> Result<ForgottenTopic> {
    let topic_id = decoder.read_uuid("forgotten_topics_data.topic_id")?;
    let partitions = decoder.read_array(ArrayEncoding::Compact, "forgotten_topics_data.partitions", |d| {
        d.read_i32("forgotten_topics_data.partitions")
    })?;
    decoder.skip_tagged_fields()?;
    Ok(ForgottenTopic { topic_id, partitions })
}

/// Decode a v16 request body; the header has already been consumed.
pub fn decode_fetch_request(decoder: &mut Decoder<'_>) -> Result<FetchRequest> {
    let max_wait_ms = decoder.read_i32("max_wait_ms")?;
    let min_bytes = decoder.read_i32("min_bytes")?;
    let max_bytes = decoder.read_i32("max_bytes")?;
    let isolation_level = decoder.read_i8("isolation_level")?;
    let session_id = decoder.read_i32("session_id")?;
    let session_epoch = decoder.read_i32("session_epoch")?;
    let topics = decoder.read_array(ArrayEncoding::Compact, "topics", read_fetch_topic)?;
    let forgotten_topics_data = decoder.read_array(ArrayEncoding::Compact, "forgotten_topics_data", read_forgotten_topic)?;
    let rack_id = decoder.read_string(StringEncoding::Compact, "rack_id")?;
    decoder.skip_tagged_fields()?;

    Ok(FetchRequest {
        max_wait_ms,
        min_bytes,
        max_bytes,
        isolation_level,
        session_id,
        session_epoch,
        topics,
        forgotten_topics_data,
        rack_id,
    })
}

/// Answer every requested partition from what `source` knows.
pub fn fetch(request: &FetchRequest, source: &dyn TopicMetadataSource) -> FetchResponse {
    let responses = request
        .topics
        .iter()
        .map(|requested| {
            let topic = source.topic_by_id(&requested.topic_id);
            let partitions = requested
                .partitions
                .iter()
                .map(|p| {
                    let error_code = match &topic {
                        None => error_codes::UNKNOWN_TOPIC_ID,
                        Some(topic) if !topic.has_partition(p.partition) => error_codes::UNKNOWN_TOPIC_OR_PARTITION,
                        Some(_) => error_codes::NONE,
                    };
                    FetchResponsePartition::empty(p.partition, error_code)
                })
                .collect();

            FetchResponseTopic {
                topic_id: requested.topic_id,
                partitions,
            }
        })
        .collect();

    FetchResponse {
        throttle_time_ms: 0,
        error_code: error_codes::NONE,
        session_id: request.session_id,
        responses,
    }
}

/// Encode a framed Fetch v16 response
pub fn encode_fetch_response(header: &ResponseHeader, response: &FetchResponse) -> Bytes {
    encode_framed_response(header, ApiKey::Fetch.response_header_version(), |encoder| {
        encoder.write_i32(response.throttle_time_ms);
        encoder.write_i16(response.error_code);
        encoder.write_i32(response.session_id);

        encoder.write_compact_length(Some(response.responses.len()));
        for topic in &response.responses {
            encoder.write_uuid(&topic.topic_id);
            encoder.write_compact_length(Some(topic.partitions.len()));
            for partition in &topic.partitions {
                encoder.write_i32(partition.partition_index);
                encoder.write_i16(partition.error_code);
                encoder.write_i64(partition.high_watermark);
                encoder.write_i64(partition.last_stable_offset);
                encoder.write_i64(partition.log_start_offset);
                // aborted_transactions
                encoder.write_compact_length(Some(0));
                encoder.write_i32(partition.preferred_read_replica);
                encoder.write_compact_bytes(partition.records.as_deref());
                encoder.write_empty_tagged_fields();
            }
            encoder.write_empty_tagged_fields();
        }
        encoder.write_empty_tagged_fields();
    })
}
