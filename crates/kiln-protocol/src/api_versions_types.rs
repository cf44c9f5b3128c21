//! ApiVersions API types (key 18, v0-v4)

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::parser::{
    encode_framed_response, supported_api_versions, ApiKey, ArrayEncoding, Decoder, ResponseHeader, StringEncoding,
};

/// Highest ApiVersions version this broker answers in
pub const MAX_VERSION: i16 = 4;

/// ApiVersions request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersionsRequest {
    /// Client software name (v3+)
    pub client_software_name: Option<String>,
    /// Client software version (v3+)
    pub client_software_version: Option<String>,
}

/// Information about a supported API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersionInfo {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

/// ApiVersions response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersionsResponse {
    pub error_code: i16,
    pub api_keys: Vec<ApiVersionInfo>,
    /// Throttle time in milliseconds (v1+)
    pub throttle_time_ms: i32,
}

impl ApiVersionsResponse {
    /// The broker's catalogue with the given error code
    pub fn catalogue(error_code: i16) -> Self {
        let api_keys = supported_api_versions()
            .into_iter()
            .map(|(key, range)| ApiVersionInfo {
                api_key: key as i16,
                min_version: range.min,
                max_version: range.max,
            })
            .collect();

        Self {
            error_code,
            api_keys,
            throttle_time_ms: 0,
        }
    }
}

/// Decode the request body; the header has already been consumed.
///
/// The body is optional at every version: clients that send only the
/// header still get the catalogue.
pub fn decode_api_versions_request(decoder: &mut Decoder<'_>, version: i16) -> Result<ApiVersionsRequest> {
    if version < 3 || decoder.remaining() == 0 {
        return Ok(ApiVersionsRequest::default());
    }

    let client_software_name = decoder.read_string(StringEncoding::Compact, "client_software_name")?;
    let client_software_version = decoder.read_string(StringEncoding::Compact, "client_software_version")?;
    decoder.skip_tagged_fields()?;

    Ok(ApiVersionsRequest {
        client_software_name: Some(client_software_name),
        client_software_version: Some(client_software_version),
    })
}

/// Encode a framed ApiVersions response in the layout of `version`.
///
/// v0: error_code, api_keys
/// v1-2: error_code, api_keys, throttle_time_ms
/// v3+: error_code, compact api_keys (each with a tag buffer), throttle_time_ms, tag buffer
pub fn encode_api_versions_response(header: &ResponseHeader, response: &ApiVersionsResponse, version: i16) -> Bytes {
    let flexible = version >= 3;
    let array_encoding = if flexible {
        ArrayEncoding::Compact
    } else {
        ArrayEncoding::Legacy
    };

    encode_framed_response(header, ApiKey::ApiVersions.response_header_version(), |encoder| {
        encoder.write_i16(response.error_code);

        encoder.write_array_len(array_encoding, response.api_keys.len());
        for api in &response.api_keys {
            encoder.write_i16(api.api_key);
            encoder.write_i16(api.min_version);
            encoder.write_i16(api.max_version);
            if flexible {
                encoder.write_empty_tagged_fields();
            }
        }

        if version >= 1 {
            encoder.write_i32(response.throttle_time_ms);
        }
        if flexible {
            encoder.write_empty_tagged_fields();
        }
    })
}
