//! Configuration validation.

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::types::{ServerConfig, DEFAULT_MAX_FRAME_SIZE};

/// Smallest frame that can carry a request header's fixed fields and a minimal response
const MIN_FRAME_SIZE: usize = 6;

/// Partition indexes are int32 on the wire
const MAX_PARTITIONS: u32 = i32::MAX as u32;

/// Longest topic name Kafka accepts
const MAX_TOPIC_NAME_LEN: usize = 249;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Value out of range for field {field}: {message}")]
    OutOfRange { field: String, message: String },

    #[error("Invalid format for field {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Duplicate {field}: {value}")]
    Duplicate { field: String, value: String },

    #[error("Validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Validate a whole server configuration, collecting every problem found
pub fn validate_config(config: &ServerConfig) -> Result<(), ValidationError> {
    let mut errors = Vec::new();

    if config.port == 0 {
        errors.push(ValidationError::OutOfRange {
            field: "port".to_string(),
            message: "must be non-zero".to_string(),
        });
    }

    if !(MIN_FRAME_SIZE..=DEFAULT_MAX_FRAME_SIZE).contains(&config.max_frame_size) {
        errors.push(ValidationError::OutOfRange {
            field: "max_frame_size".to_string(),
            message: format!(
                "{} not in {}..={}",
                config.max_frame_size, MIN_FRAME_SIZE, DEFAULT_MAX_FRAME_SIZE
            ),
        });
    }

    let mut names = HashSet::new();
    let mut ids = HashSet::new();
    for topic in &config.topics {
        if let Err(e) = validate_topic_name(&topic.name) {
            errors.push(e);
        }
        if !names.insert(topic.name.as_str()) {
            errors.push(ValidationError::Duplicate {
                field: "topic name".to_string(),
                value: topic.name.clone(),
            });
        }

        if topic.id == Uuid::nil() {
            errors.push(ValidationError::InvalidFormat {
                field: format!("topics.{}.id", topic.name),
                message: "must not be the nil UUID".to_string(),
            });
        } else if !ids.insert(topic.id) {
            errors.push(ValidationError::Duplicate {
                field: "topic id".to_string(),
                value: topic.id.to_string(),
            });
        }

        if !(1..=MAX_PARTITIONS).contains(&topic.partitions) {
            errors.push(ValidationError::OutOfRange {
                field: format!("topics.{}.partitions", topic.name),
                message: format!("{} not in 1..={}", topic.partitions, MAX_PARTITIONS),
            });
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

/// Check a topic name against Kafka's naming rules
pub fn validate_topic_name(name: &str) -> Result<(), ValidationError> {
    let invalid = |message: &str| ValidationError::InvalidFormat {
        field: "topic name".to_string(),
        message: format!("{:?}: {}", name, message),
    };

    if name.is_empty() || name.len() > MAX_TOPIC_NAME_LEN {
        return Err(invalid("length must be between 1 and 249"));
    }
    if name == "." || name == ".." {
        return Err(invalid("'.' and '..' are reserved"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(invalid("only [a-zA-Z0-9._-] allowed"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TopicConfig;

    fn topic(name: &str, id: u128) -> TopicConfig {
        TopicConfig {
            name: name.to_string(),
            id: Uuid::from_u128(id),
            is_internal: false,
            partitions: 1,
            authorized_operations: crate::types::DEFAULT_AUTHORIZED_OPERATIONS,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_topic_names() {
        assert!(validate_topic_name("orders").is_ok());
        assert!(validate_topic_name("__consumer_offsets").is_ok());
        assert!(validate_topic_name("a.b-c_1").is_ok());
        assert!(validate_topic_name(&"x".repeat(249)).is_ok());

        assert!(validate_topic_name("").is_err());
        assert!(validate_topic_name(".").is_err());
        assert!(validate_topic_name("..").is_err());
        assert!(validate_topic_name("has space").is_err());
        assert!(validate_topic_name("ünicode").is_err());
        assert!(validate_topic_name(&"x".repeat(250)).is_err());
    }

    #[test]
    fn test_listener_ranges() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        assert!(matches!(validate_config(&config), Err(ValidationError::OutOfRange { .. })));

        let config = ServerConfig {
            max_frame_size: 5,
            ..Default::default()
        };
        assert!(matches!(validate_config(&config), Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_duplicate_topics() {
        let config = ServerConfig {
            topics: vec![topic("a", 1), topic("a", 2), topic("b", 2)],
            ..Default::default()
        };
        match validate_config(&config) {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected two errors, got {:?}", other),
        }
    }

    #[test]
    fn test_partition_count_fits_int32() {
        let mut largest = topic("d", 4);
        largest.partitions = i32::MAX as u32;
        let config = ServerConfig {
            topics: vec![largest.clone()],
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());

        largest.partitions = i32::MAX as u32 + 1;
        let config = ServerConfig {
            topics: vec![largest],
            ..Default::default()
        };
        assert!(matches!(validate_config(&config), Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_nil_id_and_zero_partitions() {
        let mut bad = topic("c", 0);
        bad.partitions = 0;
        let config = ServerConfig {
            topics: vec![bad],
            ..Default::default()
        };
        match validate_config(&config) {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected two errors, got {:?}", other),
        }
    }
}
