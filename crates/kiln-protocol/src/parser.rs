//! Kafka wire protocol parser.
//!
//! [`Decoder`] is the bounds-checked cursor every request decoder reads
//! through; [`Encoder`] is its mirror for responses. Length conventions
//! (legacy vs. compact) are resolved here and nowhere else.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::tagged_fields;

/// Kafka API keys served by this codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum ApiKey {
    Fetch = 1,
    ApiVersions = 18,
    DescribeTopicPartitions = 75,
}

impl ApiKey {
    /// Try to create an ApiKey from an i16
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(ApiKey::Fetch),
            18 => Some(ApiKey::ApiVersions),
            75 => Some(ApiKey::DescribeTopicPartitions),
            _ => None,
        }
    }

    /// Version range this codec has decoders and encoders for
    pub fn supported_versions(self) -> VersionRange {
        match self {
            ApiKey::Fetch => VersionRange { min: 16, max: 16 },
            ApiKey::ApiVersions => VersionRange { min: 0, max: 4 },
            ApiKey::DescribeTopicPartitions => VersionRange { min: 0, max: 0 },
        }
    }

    /// Request header layout for a given version of this API
    pub fn request_header_version(self, api_version: i16) -> RequestHeaderVersion {
        match self {
            ApiKey::ApiVersions if api_version < 3 => RequestHeaderVersion::V1,
            ApiKey::Fetch if api_version < 12 => RequestHeaderVersion::V1,
            _ => RequestHeaderVersion::V2,
        }
    }

    /// Response header layout for this API.
    ///
    /// ApiVersions always answers with the v0 header so that a client can
    /// parse the reply before it knows which versions the broker speaks.
    pub fn response_header_version(self) -> ResponseHeaderVersion {
        match self {
            ApiKey::ApiVersions => ResponseHeaderVersion::V0,
            _ => ResponseHeaderVersion::V1,
        }
    }
}

/// Version range for an API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: i16,
    pub max: i16,
}

impl VersionRange {
    pub fn contains(&self, version: i16) -> bool {
        version >= self.min && version <= self.max
    }
}

/// The fixed catalogue advertised by ApiVersions, ordered by key.
pub fn supported_api_versions() -> Vec<(ApiKey, VersionRange)> {
    [ApiKey::Fetch, ApiKey::ApiVersions, ApiKey::DescribeTopicPartitions]
        .into_iter()
        .map(|key| (key, key.supported_versions()))
        .collect()
}

/// Request header layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestHeaderVersion {
    /// api_key, api_version, correlation_id, client_id
    V1,
    /// V1 followed by a tag buffer
    V2,
}

/// Response header layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHeaderVersion {
    /// correlation_id only
    V0,
    /// correlation_id followed by an empty tag buffer
    V1,
}

/// Kafka request header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

/// Kafka response header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub correlation_id: i32,
}

/// How a string field is length-prefixed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    /// int16 byte count, -1 for null
    Legacy,
    /// unsigned varint of byte count + 1, 0 for null
    Compact,
}

/// How an array field is length-prefixed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayEncoding {
    /// int32 element count, -1 for null
    Legacy,
    /// unsigned varint of element count + 1, 0 for null
    Compact,
}

/// Bounds-checked cursor over a request buffer.
///
/// Every read names the field it is reading so that a short buffer is
/// reported against the field that hit the end.
pub struct Decoder<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    /// Create a new decoder positioned at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Take the next `n` bytes and advance past them
    pub fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(Error::OutOfBounds {
                field,
                needed: n,
                remaining,
            });
        }
        let bytes = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    /// Read a boolean
    pub fn read_bool(&mut self, field: &'static str) -> Result<bool> {
        Ok(self.read_i8(field)? != 0)
    }

    /// Read an i8
    pub fn read_i8(&mut self, field: &'static str) -> Result<i8> {
        Ok(i8::from_be_bytes(self.take_array(field)?))
    }

    /// Read an i16
    pub fn read_i16(&mut self, field: &'static str) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take_array(field)?))
    }

    /// Read an i32
    pub fn read_i32(&mut self, field: &'static str) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array(field)?))
    }

    /// Read an i64
    pub fn read_i64(&mut self, field: &'static str) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take_array(field)?))
    }

    /// Read a 16 byte UUID
    pub fn read_uuid(&mut self, field: &'static str) -> Result<Uuid> {
        Ok(Uuid::from_bytes(self.take_array(field)?))
    }

    /// Read an unsigned varint
    pub fn read_unsigned_varint(&mut self, field: &'static str) -> Result<u32> {
        let mut value = 0u32;
        for i in 0..5 {
            let byte = self.take(1, field)?[0];
            value |= ((byte & 0x7F) as u32) << (i * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::malformed(field, "varint longer than 5 bytes"))
    }

    /// Read a compact length: the wire value is `count + 1`, 0 is null.
    pub fn read_compact_length(&mut self, field: &'static str) -> Result<Option<usize>> {
        match self.read_unsigned_varint(field)? {
            0 => Ok(None),
            encoded => Ok(Some(encoded as usize - 1)),
        }
    }

    /// Read an array length in either convention; `None` is a null array
    pub fn read_array_len(&mut self, encoding: ArrayEncoding, field: &'static str) -> Result<Option<usize>> {
        match encoding {
            ArrayEncoding::Compact => self.read_compact_length(field),
            ArrayEncoding::Legacy => match self.read_i32(field)? {
                -1 => Ok(None),
                len if len < 0 => Err(Error::malformed(field, format!("negative array length {}", len))),
                len => Ok(Some(len as usize)),
            },
        }
    }

    /// Read an array that must not be null
    pub fn read_array<T>(
        &mut self,
        encoding: ArrayEncoding,
        field: &'static str,
        mut read_element: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let len = self
            .read_array_len(encoding, field)?
            .ok_or_else(|| Error::malformed(field, "null array"))?;
        // Declared length is untrusted; never reserve more than the buffer could hold
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(read_element(self)?);
        }
        Ok(items)
    }

    /// Read a nullable string (legacy: -1 is null; compact: 0 is null)
    pub fn read_nullable_string(&mut self, encoding: StringEncoding, field: &'static str) -> Result<Option<String>> {
        let len = match encoding {
            StringEncoding::Compact => self.read_compact_length(field)?,
            StringEncoding::Legacy => match self.read_i16(field)? {
                -1 => None,
                len if len < 0 => {
                    return Err(Error::malformed(field, format!("negative string length {}", len)))
                }
                len => Some(len as usize),
            },
        };
        let Some(len) = len else {
            return Ok(None);
        };
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|e| Error::malformed(field, format!("invalid UTF-8: {}", e)))
    }

    /// Read a string that must not be null
    pub fn read_string(&mut self, encoding: StringEncoding, field: &'static str) -> Result<String> {
        self.read_nullable_string(encoding, field)?
            .ok_or_else(|| Error::malformed(field, "null where a string is required"))
    }

    /// Consume a trailing tag buffer, skipping every tagged field in it
    pub fn skip_tagged_fields(&mut self) -> Result<usize> {
        tagged_fields::skip_tagged_fields(self)
    }
}

/// Protocol encoder for writing Kafka protocol primitives
pub struct Encoder<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> Encoder<'a> {
    /// Create a new encoder
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    /// Write a boolean
    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(if value { 1 } else { 0 });
    }

    /// Write an i8
    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    /// Write an i16
    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    /// Write an i32
    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    /// Write an i64
    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    /// Write a 16 byte UUID
    pub fn write_uuid(&mut self, value: &Uuid) {
        self.buf.put_slice(value.as_bytes());
    }

    /// Write a string (null = None)
    pub fn write_string(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.write_i16(s.len() as i16);
                self.buf.put_slice(s.as_bytes());
            }
            None => {
                self.write_i16(-1);
            }
        }
    }

    /// Write a compact string (uses varint length)
    pub fn write_compact_string(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.write_compact_length(Some(s.len()));
                self.buf.put_slice(s.as_bytes());
            }
            None => self.write_compact_length(None),
        }
    }

    /// Write a compact byte array (uses varint length)
    pub fn write_compact_bytes(&mut self, value: Option<&[u8]>) {
        match value {
            Some(bytes) => {
                self.write_compact_length(Some(bytes.len()));
                self.buf.put_slice(bytes);
            }
            None => self.write_compact_length(None),
        }
    }

    /// Write a compact length: `count + 1`, or 0 for null
    pub fn write_compact_length(&mut self, len: Option<usize>) {
        match len {
            Some(len) => self.write_unsigned_varint(len as u32 + 1),
            None => self.write_unsigned_varint(0),
        }
    }

    /// Write a non-null array length in either convention
    pub fn write_array_len(&mut self, encoding: ArrayEncoding, len: usize) {
        match encoding {
            ArrayEncoding::Compact => self.write_compact_length(Some(len)),
            ArrayEncoding::Legacy => self.write_i32(len as i32),
        }
    }

    /// Write a compact array of i32 values
    pub fn write_compact_i32_array(&mut self, values: &[i32]) {
        self.write_compact_length(Some(values.len()));
        for value in values {
            self.write_i32(*value);
        }
    }

    /// Write an unsigned varint
    pub fn write_unsigned_varint(&mut self, mut value: u32) {
        while (value & !0x7F) != 0 {
            self.buf.put_u8((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    /// Write an empty tag buffer
    pub fn write_empty_tagged_fields(&mut self) {
        self.write_unsigned_varint(0);
    }
}

/// Parse a request header in the given layout
pub fn parse_request_header(decoder: &mut Decoder<'_>, version: RequestHeaderVersion) -> Result<RequestHeader> {
    let api_key = decoder.read_i16("api_key")?;
    let api_version = decoder.read_i16("api_version")?;
    let correlation_id = decoder.read_i32("correlation_id")?;
    let client_id = decoder.read_nullable_string(StringEncoding::Legacy, "client_id")?;

    if version == RequestHeaderVersion::V2 {
        decoder.skip_tagged_fields()?;
    }

    Ok(RequestHeader {
        api_key,
        api_version,
        correlation_id,
        client_id,
    })
}

/// Write a response header to bytes
pub fn write_response_header(buf: &mut BytesMut, header: &ResponseHeader, version: ResponseHeaderVersion) {
    let mut encoder = Encoder::new(buf);
    encoder.write_i32(header.correlation_id);
    if version == ResponseHeaderVersion::V1 {
        encoder.write_empty_tagged_fields();
    }
}

/// Encode a complete response: size prefix, header, then whatever `body` writes.
///
/// The 4-byte size counts every byte after itself.
pub fn encode_framed_response(
    header: &ResponseHeader,
    version: ResponseHeaderVersion,
    body: impl FnOnce(&mut Encoder<'_>),
) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_i32(0);
    write_response_header(&mut buf, header, version);
    body(&mut Encoder::new(&mut buf));

    let size = (buf.len() - 4) as i32;
    buf[..4].copy_from_slice(&size.to_be_bytes());
    buf.freeze()
}
