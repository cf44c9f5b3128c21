//! Kafka listener: accepts connections and answers framed requests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use kiln_config::{ServerConfig, TopicConfig};
use kiln_protocol::{KafkaFrameCodec, ProtocolHandler, StaticTopicCatalog, TopicDescription};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

/// Node id reported as leader and sole replica of every partition
pub const BROKER_ID: i32 = 1;

/// Build the in-memory topic catalogue from configured topics
pub fn topic_catalog(topics: &[TopicConfig]) -> StaticTopicCatalog {
    StaticTopicCatalog::new(topics.iter().map(|topic| {
        let mut description = TopicDescription::single_broker(&topic.name, topic.id, topic.partitions, BROKER_ID);
        description.is_internal = topic.is_internal;
        description.authorized_operations = topic.authorized_operations;
        description
    }))
}

/// Kafka protocol server
pub struct KafkaServer {
    handler: Arc<ProtocolHandler>,
    max_frame_size: usize,
}

impl KafkaServer {
    pub fn new(config: &ServerConfig) -> Self {
        let catalog = topic_catalog(&config.topics);
        info!("Serving {} configured topics", catalog.len());

        Self {
            handler: Arc::new(ProtocolHandler::with_metadata_source(Arc::new(catalog))),
            max_frame_size: config.max_frame_size,
        }
    }

    /// Bind `bind_addr` and serve until `shutdown` resolves
    pub async fn run(&self, bind_addr: &str, shutdown: impl Future<Output = ()>) -> Result<()> {
        let listener = TcpListener::bind(bind_addr).await?;
        info!("Kafka server listening on {}", listener.local_addr()?);
        self.serve(listener, shutdown).await
    }

    /// Accept connections on an already bound listener until `shutdown` resolves
    pub async fn serve(&self, listener: TcpListener, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down Kafka listener");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((socket, addr)) => {
                        debug!("New connection from {}", addr);

                        // Responses are small and must not wait on Nagle
                        if let Err(e) = socket.set_nodelay(true) {
                            error!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                        }

                        let handler = self.handler.clone();
                        let max_frame_size = self.max_frame_size;
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(socket, addr, handler, max_frame_size).await {
                                warn!("Closing connection from {}: {}", addr, e);
                            }
                            debug!("Connection from {} closed", addr);
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
        }
    }
}

/// Read frames one at a time and write each response before reading the next
async fn handle_connection(
    socket: TcpStream,
    addr: SocketAddr,
    handler: Arc<ProtocolHandler>,
    max_frame_size: usize,
) -> Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut frames = FramedRead::new(reader, KafkaFrameCodec::with_max_frame_size(max_frame_size));

    while let Some(frame) = frames.next().await {
        let frame = frame?;
        let response = handler.handle_frame(&frame);
        debug!(
            "Answering {} with {:?} ({} bytes, correlation_id={})",
            addr,
            response.outcome,
            response.bytes.len(),
            response.header.correlation_id
        );

        writer.write_all(&response.bytes).await?;
        writer.flush().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use kiln_protocol::TopicMetadataSource;
    use tokio::io::AsyncReadExt;
    use tokio::sync::oneshot;
    use uuid::Uuid;

    async fn start(config: ServerConfig) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<Result<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = KafkaServer::new(&config);
        let task = tokio::spawn(async move {
            server
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await
        });
        (addr, tx, task)
    }

    fn api_versions_request(version: i16, correlation_id: i32) -> Vec<u8> {
        let mut frame = BytesMut::new();
        frame.put_i16(18);
        frame.put_i16(version);
        frame.put_i32(correlation_id);
        frame.put_i16(-1);

        let mut request = BytesMut::new();
        request.put_i32(frame.len() as i32);
        request.put(frame);
        request.to_vec()
    }

    async fn read_response(stream: &mut TcpStream) -> Vec<u8> {
        let size = stream.read_i32().await.unwrap();
        let mut body = vec![0u8; size as usize];
        stream.read_exact(&mut body).await.unwrap();
        body
    }

    #[test]
    fn test_topic_catalog_from_config() {
        let id = Uuid::from_u128(7);
        let catalog = topic_catalog(&[TopicConfig {
            name: "__internal".to_string(),
            id,
            is_internal: true,
            partitions: 3,
            authorized_operations: 0,
        }]);

        let topic = catalog.topic_by_id(&id).unwrap();
        assert_eq!(topic.name, "__internal");
        assert!(topic.is_internal);
        assert_eq!(topic.authorized_operations, 0);
        assert_eq!(topic.partitions.len(), 3);
        assert_eq!(topic.partitions[2].leader_id, BROKER_ID);
    }

    #[tokio::test]
    async fn test_requests_answered_in_order() {
        let (addr, shutdown, task) = start(ServerConfig::default()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let mut pipelined = api_versions_request(0, 1);
        pipelined.extend(api_versions_request(1, 2));
        stream.write_all(&pipelined).await.unwrap();

        let first = read_response(&mut stream).await;
        assert_eq!(&first[..4], &1i32.to_be_bytes());
        let second = read_response(&mut stream).await;
        assert_eq!(&second[..4], &2i32.to_be_bytes());
        // v1 carries a trailing throttle time
        assert_eq!(second.len(), first.len() + 4);

        shutdown.send(()).unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_request_keeps_connection_open() {
        let (addr, _shutdown, _task) = start(ServerConfig::default()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream
            .write_all(&[0, 0, 0, 10, 0, 3, 0, 12, 0, 0, 0, 9, 0xFF, 0xFF])
            .await
            .unwrap();
        assert_eq!(read_response(&mut stream).await, vec![0, 0, 0, 9, 0, 35]);

        stream.write_all(&api_versions_request(0, 10)).await.unwrap();
        assert_eq!(&read_response(&mut stream).await[..6], &[0, 0, 0, 10, 0, 0]);
    }

    #[tokio::test]
    async fn test_oversized_frame_closes_connection() {
        let config = ServerConfig {
            max_frame_size: 64,
            ..Default::default()
        };
        let (addr, _shutdown, _task) = start(config).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(&1024i32.to_be_bytes()).await.unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
    }
}
