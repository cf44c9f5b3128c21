//! Kafka protocol error codes
//!
//! The subset of the standard error codes this broker emits.
//! See: https://kafka.apache.org/protocol#protocol_error_codes

/// No error occurred
pub const NONE: i16 = 0;

/// This server does not host this topic-partition
pub const UNKNOWN_TOPIC_OR_PARTITION: i16 = 3;

/// The version of API is not supported
pub const UNSUPPORTED_VERSION: i16 = 35;

/// This server does not host this topic ID
pub const UNKNOWN_TOPIC_ID: i16 = 100;

/// Human readable name for an error code, used in log lines.
pub fn name(code: i16) -> &'static str {
    match code {
        NONE => "NONE",
        UNKNOWN_TOPIC_OR_PARTITION => "UNKNOWN_TOPIC_OR_PARTITION",
        UNSUPPORTED_VERSION => "UNSUPPORTED_VERSION",
        UNKNOWN_TOPIC_ID => "UNKNOWN_TOPIC_ID",
        _ => "UNKNOWN_SERVER_ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_names() {
        assert_eq!(name(NONE), "NONE");
        assert_eq!(name(UNSUPPORTED_VERSION), "UNSUPPORTED_VERSION");
        assert_eq!(name(-1), "UNKNOWN_SERVER_ERROR");
    }
}
