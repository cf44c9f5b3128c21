//! Dispatcher routing tests: which requests are answered and how.

use bytes::{Buf, BufMut, BytesMut};
use kiln_protocol::error_codes;
use kiln_protocol::{ApiKey, Outcome, ProtocolHandler};

fn header_only(api_key: i16, api_version: i16, correlation_id: i32) -> BytesMut {
    let mut frame = BytesMut::new();
    frame.put_i16(api_key);
    frame.put_i16(api_version);
    frame.put_i32(correlation_id);
    frame.put_i16(4);
    frame.put_slice(b"test");
    frame
}

#[test]
fn test_unknown_api_key_gets_minimal_error() {
    let handler = ProtocolHandler::new();
    let response = handler.handle_frame(&header_only(3, 12, 4242));

    assert_eq!(
        response.outcome,
        Outcome::Rejected {
            error_code: error_codes::UNSUPPORTED_VERSION
        }
    );
    let mut bytes = response.bytes.clone();
    assert_eq!(bytes.get_i32(), 6);
    assert_eq!(bytes.get_i32(), 4242);
    assert_eq!(bytes.get_i16(), 35);
    assert!(!bytes.has_remaining());
}

#[test]
fn test_unsupported_describe_topic_partitions_version() {
    let handler = ProtocolHandler::new();
    let response = handler.handle_frame(&header_only(75, 3, 1));
    assert_eq!(response.bytes.to_vec(), vec![0, 0, 0, 6, 0, 0, 0, 1, 0, 35]);
}

#[test]
fn test_old_fetch_versions_rejected() {
    let handler = ProtocolHandler::new();
    for version in [0, 4, 11, 15, 17] {
        let response = handler.handle_frame(&header_only(1, version, version as i32));
        assert!(matches!(response.outcome, Outcome::Rejected { .. }), "Fetch v{version}");
        assert_eq!(response.header.correlation_id, version as i32);
    }
}

#[test]
fn test_api_versions_above_max_reports_error_and_catalogue() {
    let handler = ProtocolHandler::new();
    let response = handler.handle_frame(&header_only(18, 5, 77));
    assert_eq!(response.outcome, Outcome::Routed(ApiKey::ApiVersions));

    let mut bytes = response.bytes.clone();
    bytes.advance(4);
    assert_eq!(bytes.get_i32(), 77);
    assert_eq!(bytes.get_i16(), error_codes::UNSUPPORTED_VERSION);
    // Catalogue still present in the v4 layout
    assert_eq!(bytes.get_u8(), 4);
    assert_eq!(bytes.get_i16(), 1);
}

#[test]
fn test_api_versions_every_supported_version() {
    let handler = ProtocolHandler::new();
    for version in 0..=2 {
        let response = handler.handle_frame(&header_only(18, version, 1000 + version as i32));
        assert_eq!(response.outcome, Outcome::Routed(ApiKey::ApiVersions), "v{version}");
        let mut bytes = response.bytes.clone();
        bytes.advance(4);
        assert_eq!(bytes.get_i32(), 1000 + version as i32);
        assert_eq!(bytes.get_i16(), 0);
        assert_eq!(bytes.get_i32(), 3);
    }

    for version in 3..=4 {
        let mut frame = header_only(18, version, 7);
        frame.put_u8(0); // header tag buffer
        frame.put_u8(2);
        frame.put_slice(b"x");
        frame.put_u8(2);
        frame.put_slice(b"1");
        frame.put_u8(0);
        let response = handler.handle_frame(&frame);
        assert_eq!(response.outcome, Outcome::Routed(ApiKey::ApiVersions), "v{version}");
        assert_eq!(response.bytes[10], 4);
    }
}

#[test]
fn test_correlation_id_echo_for_edge_values() {
    let handler = ProtocolHandler::new();
    for correlation_id in [0, -1, i32::MIN, i32::MAX, 7] {
        let response = handler.handle_frame(&header_only(18, 0, correlation_id));
        assert_eq!(&response.bytes[4..8], &correlation_id.to_be_bytes());

        let rejected = handler.handle_frame(&header_only(999, 0, correlation_id));
        assert_eq!(&rejected.bytes[4..8], &correlation_id.to_be_bytes());
    }
}

#[test]
fn test_size_prefixed_and_stripped_paths_agree() {
    let handler = ProtocolHandler::new();
    let frame = header_only(18, 1, 55);

    let mut message = BytesMut::new();
    message.put_i32(frame.len() as i32);
    message.put_slice(&frame);

    assert_eq!(handler.handle_frame(&frame).bytes, handler.handle_request(&message).bytes);
}

#[test]
fn test_api_versions_v4_header_only() {
    let handler = ProtocolHandler::new();
    let frame = [0x00, 0x12, 0x00, 0x04, 0x00, 0x00, 0x00, 0x07, 0xFF, 0xFF, 0x00];
    let response = handler.handle_frame(&frame);
    assert_eq!(response.outcome, Outcome::Routed(ApiKey::ApiVersions));

    let mut bytes = response.bytes.clone();
    bytes.advance(4);
    assert_eq!(bytes.get_i32(), 7);
    assert_eq!(bytes.get_i16(), error_codes::NONE);
    assert_eq!(bytes.get_u8(), 4); // three entries
}
