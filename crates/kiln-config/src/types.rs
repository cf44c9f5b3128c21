//! Configuration types and structures.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest request frame accepted by default (100 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Default Kafka listener port
pub const DEFAULT_PORT: u16 = 9092;

/// Kafka's "no operations reported" bitmask for a described topic
pub const DEFAULT_AUTHORIZED_OPERATIONS: i32 = 0x0DF8;

/// Broker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_addr: String,
    /// Kafka protocol port
    pub port: u16,
    /// Largest size prefix accepted before the connection is dropped
    pub max_frame_size: usize,
    /// Topics answered by DescribeTopicPartitions and Fetch
    pub topics: Vec<TopicConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            topics: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// `bind_addr:port`, ready for `TcpListener::bind`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// A topic in the static catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub name: String,
    pub id: Uuid,
    #[serde(default)]
    pub is_internal: bool,
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    #[serde(default = "default_authorized_operations")]
    pub authorized_operations: i32,
}

fn default_partitions() -> u32 {
    1
}

fn default_authorized_operations() -> i32 {
    DEFAULT_AUTHORIZED_OPERATIONS
}
