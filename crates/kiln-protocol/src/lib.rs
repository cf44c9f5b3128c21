//! Kafka wire protocol codec for Kiln.
//!
//! This crate provides the server side of a small slice of the Kafka
//! protocol:
//! - A bounds-checked request cursor and response writer
//! - Legacy and compact (length + 1) strings and arrays, tagged fields
//! - ApiVersions v0-v4, DescribeTopicPartitions v0 and Fetch v16
//! - A dispatcher that turns any request bytes into framed response bytes
//! - A stream codec that splits size-prefixed request frames

pub mod api_versions_types;
pub mod describe_topic_partitions_types;
pub mod error;
pub mod error_codes;
pub mod fetch_types;
pub mod frame;
pub mod handler;
pub mod metadata;
pub mod parser;
pub mod tagged_fields;

// Re-export main types
pub use error::{Error, Result};
pub use frame::KafkaFrameCodec;
pub use handler::{HeaderPeek, Outcome, ProtocolHandler, Response};
pub use metadata::{
    EmptyTopicCatalog, PartitionDescription, StaticTopicCatalog, TopicDescription, TopicMetadataSource,
};
pub use parser::{
    parse_request_header, supported_api_versions, write_response_header, ApiKey, ArrayEncoding, Decoder, Encoder,
    RequestHeader, RequestHeaderVersion, ResponseHeader, ResponseHeaderVersion, StringEncoding, VersionRange,
};
