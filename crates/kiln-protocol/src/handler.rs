//! Kafka protocol request handler.
//!
//! Every request ends in one of two states: routed to the decoder/encoder
//! pair registered for its (API key, version), or rejected with a minimal
//! `[size][correlation_id][error_code]` response. Decode failures are
//! rejections too; nothing a client sends can fail the connection.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::api_versions_types::{self, ApiVersionsResponse};
use crate::describe_topic_partitions_types as dtp;
use crate::error::Result;
use crate::error_codes;
use crate::fetch_types;
use crate::metadata::{EmptyTopicCatalog, TopicMetadataSource};
use crate::parser::{
    encode_framed_response, parse_request_header, ApiKey, Decoder, RequestHeader, ResponseHeader,
    ResponseHeaderVersion,
};

/// The fixed fields at the front of every request header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPeek {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
}

impl HeaderPeek {
    /// Read api_key, api_version and correlation_id without touching the rest.
    pub fn scan(frame: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(frame);
        Ok(Self {
            api_key: decoder.read_i16("api_key")?,
            api_version: decoder.read_i16("api_version")?,
            correlation_id: decoder.read_i32("correlation_id")?,
        })
    }
}

/// How the dispatcher disposed of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Decoded and answered by the pair registered for this API
    Routed(ApiKey),
    /// Answered with the minimal error response
    Rejected { error_code: i16 },
}

/// Response for an API request
#[derive(Debug, Clone)]
pub struct Response {
    pub header: ResponseHeader,
    pub outcome: Outcome,
    /// Complete wire bytes, size prefix included
    pub bytes: Bytes,
}

/// Handles Kafka protocol requests.
pub struct ProtocolHandler {
    metadata: Arc<dyn TopicMetadataSource>,
}

impl ProtocolHandler {
    /// Create a handler that knows no topics.
    pub fn new() -> Self {
        Self::with_metadata_source(Arc::new(EmptyTopicCatalog))
    }

    /// Create a handler answering topic questions from `metadata`
    pub fn with_metadata_source(metadata: Arc<dyn TopicMetadataSource>) -> Self {
        Self { metadata }
    }

    /// Handle a size-prefixed request message.
    ///
    /// Bytes beyond the declared size are ignored; a size larger than the
    /// buffer leaves the decoder to run out of bytes and reject.
    pub fn handle_request(&self, request_bytes: &[u8]) -> Response {
        let mut decoder = Decoder::new(request_bytes);
        let size = match decoder.read_i32("message_size") {
            Ok(size) => size,
            Err(e) => {
                warn!("Request too short for a size prefix: {}", e);
                return Self::error_response(0, error_codes::UNSUPPORTED_VERSION);
            }
        };

        let available = decoder.remaining();
        let frame_len = usize::try_from(size).map_or(available, |size| size.min(available));
        if frame_len < available {
            debug!("Ignoring {} bytes past the declared message size", available - frame_len);
        }

        match decoder.take(frame_len, "message") {
            Ok(frame) => self.handle_frame(frame),
            Err(e) => {
                warn!("Failed to split request frame: {}", e);
                Self::error_response(0, error_codes::UNSUPPORTED_VERSION)
            }
        }
    }

    /// Handle a request frame whose size prefix has already been stripped.
    pub fn handle_frame(&self, frame: &[u8]) -> Response {
        let peek = match HeaderPeek::scan(frame) {
            Ok(peek) => peek,
            Err(e) => {
                // No correlation id to echo
                warn!("Failed to read request header: {}", e);
                return Self::error_response(0, error_codes::UNSUPPORTED_VERSION);
            }
        };

        let Some(api_key) = Self::route(peek.api_key, peek.api_version) else {
            warn!(
                "Rejecting API key {} version {} (correlation_id={})",
                peek.api_key, peek.api_version, peek.correlation_id
            );
            return Self::error_response(peek.correlation_id, error_codes::UNSUPPORTED_VERSION);
        };

        debug!(
            "Routing {:?} v{} correlation_id={}",
            api_key, peek.api_version, peek.correlation_id
        );

        let result = match api_key {
            ApiKey::ApiVersions => self.handle_api_versions(frame, &peek),
            ApiKey::DescribeTopicPartitions => self.handle_describe_topic_partitions(frame),
            ApiKey::Fetch => self.handle_fetch(frame),
        };

        match result {
            Ok(bytes) => Response {
                header: ResponseHeader {
                    correlation_id: peek.correlation_id,
                },
                outcome: Outcome::Routed(api_key),
                bytes,
            },
            Err(e) => {
                warn!(
                    "Failed to decode {:?} v{} (correlation_id={}): {}",
                    api_key, peek.api_version, peek.correlation_id, e
                );
                Self::error_response(peek.correlation_id, error_codes::UNSUPPORTED_VERSION)
            }
        }
    }

    /// Look up the decoder/encoder pair for a key and version.
    ///
    /// ApiVersions is routed at every version: an unsupported version is
    /// answered by its own encoder so the client still sees the catalogue.
    pub fn route(api_key: i16, api_version: i16) -> Option<ApiKey> {
        match ApiKey::from_i16(api_key)? {
            ApiKey::ApiVersions => Some(ApiKey::ApiVersions),
            key if key.supported_versions().contains(api_version) => Some(key),
            _ => None,
        }
    }

    fn decode_header<'a>(frame: &'a [u8], api_key: ApiKey, api_version: i16) -> Result<(RequestHeader, Decoder<'a>)> {
        let mut decoder = Decoder::new(frame);
        let header = parse_request_header(&mut decoder, api_key.request_header_version(api_version))?;
        Ok((header, decoder))
    }

    fn log_trailing(decoder: &Decoder<'_>, api_key: ApiKey) {
        if decoder.remaining() > 0 {
            debug!("{} trailing bytes after {:?} request", decoder.remaining(), api_key);
        }
    }

    /// Handle ApiVersions request
    fn handle_api_versions(&self, frame: &[u8], peek: &HeaderPeek) -> Result<Bytes> {
        let header = ResponseHeader {
            correlation_id: peek.correlation_id,
        };

        if !ApiKey::ApiVersions.supported_versions().contains(peek.api_version) {
            debug!("ApiVersions v{} unsupported, answering in v{}", peek.api_version, api_versions_types::MAX_VERSION);
            let response = ApiVersionsResponse::catalogue(error_codes::UNSUPPORTED_VERSION);
            return Ok(api_versions_types::encode_api_versions_response(
                &header,
                &response,
                api_versions_types::MAX_VERSION,
            ));
        }

        let (request_header, mut decoder) = Self::decode_header(frame, ApiKey::ApiVersions, peek.api_version)?;
        let request = api_versions_types::decode_api_versions_request(&mut decoder, peek.api_version)?;
        Self::log_trailing(&decoder, ApiKey::ApiVersions);
        debug!(
            "ApiVersions from client_id={:?} software={:?}/{:?}",
            request_header.client_id, request.client_software_name, request.client_software_version
        );

        let response = ApiVersionsResponse::catalogue(error_codes::NONE);
        Ok(api_versions_types::encode_api_versions_response(&header, &response, peek.api_version))
    }

    /// Handle DescribeTopicPartitions request
    fn handle_describe_topic_partitions(&self, frame: &[u8]) -> Result<Bytes> {
        let (request_header, mut decoder) = Self::decode_header(frame, ApiKey::DescribeTopicPartitions, 0)?;
        let request = dtp::decode_describe_topic_partitions_request(&mut decoder)?;
        Self::log_trailing(&decoder, ApiKey::DescribeTopicPartitions);

        let response = dtp::describe_topic_partitions(&request, self.metadata.as_ref());
        debug!(
            "DescribeTopicPartitions: {} topics requested, {} returned, more={}",
            request.topics.len(),
            response.topics.len(),
            response.next_cursor.is_some()
        );

        let header = ResponseHeader {
            correlation_id: request_header.correlation_id,
        };
        Ok(dtp::encode_describe_topic_partitions_response(&header, &response))
    }

    /// Handle Fetch request
    fn handle_fetch(&self, frame: &[u8]) -> Result<Bytes> {
        let (request_header, mut decoder) = Self::decode_header(frame, ApiKey::Fetch, 16)?;
        let request = fetch_types::decode_fetch_request(&mut decoder)?;
        Self::log_trailing(&decoder, ApiKey::Fetch);

        let response = fetch_types::fetch(&request, self.metadata.as_ref());
        debug!("Fetch: {} topics requested", request.topics.len());

        let header = ResponseHeader {
            correlation_id: request_header.correlation_id,
        };
        Ok(fetch_types::encode_fetch_response(&header, &response))
    }

    /// Create an error response
    pub fn error_response(correlation_id: i32, error_code: i16) -> Response {
        let header = ResponseHeader { correlation_id };
        let bytes = encode_framed_response(&header, ResponseHeaderVersion::V0, |encoder| {
            encoder.write_i16(error_code);
        });

        Response {
            header,
            outcome: Outcome::Rejected { error_code },
            bytes,
        }
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}
