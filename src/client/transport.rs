//! Bidirectional text-frame channel to the dashboard server.
//!
//! The connection manager only sees [`Channel`]s handed out by a
//! [`Connector`], so the lifecycle logic is independent of the socket
//! implementation.

use async_trait::async_trait;
use futures::future;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

/// Outbound half of a channel
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half of a channel. Ends when the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("channel closed")]
    Closed,
}

/// One live connection. Dropping it closes the connection.
pub struct Channel {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens channels to an endpoint
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, endpoint: &str) -> Result<Channel, TransportError>;
}

/// Validate an endpoint URL. Only `ws` and `wss` are accepted.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };
    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// WebSocket connector. Text messages are frames; everything else is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str) -> Result<Channel, TransportError> {
        let url = parse_endpoint(endpoint)?;
        let (socket, _response) = connect_async(url.as_str()).await?;
        let (sink, stream) = socket.split();

        let sink = sink
            .sink_map_err(TransportError::from)
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text))));

        let stream = stream.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::from(e))),
            })
        });

        Ok(Channel {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// In-memory connector for lifecycle tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use futures::channel::mpsc as chan;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// The server side of one accepted channel
    pub struct ServerEnd {
        pub endpoint: String,
        pub to_client: chan::UnboundedSender<Result<String, TransportError>>,
        pub from_client: chan::UnboundedReceiver<String>,
    }

    impl ServerEnd {
        pub fn push(&self, frame: impl Into<String>) {
            let _ = self.to_client.unbounded_send(Ok(frame.into()));
        }

        /// Next frame the client sent, if one is already queued
        pub fn try_recv(&mut self) -> Option<String> {
            self.from_client.try_next().ok().flatten()
        }
    }

    pub struct MockConnector {
        attempts: AtomicUsize,
        refuse: AtomicBool,
        endpoints: Mutex<Vec<String>>,
        accepted: mpsc::UnboundedSender<ServerEnd>,
    }

    impl MockConnector {
        pub fn new() -> (std::sync::Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
            let (accepted, rx) = mpsc::unbounded_channel();
            let connector = Self {
                attempts: AtomicUsize::new(0),
                refuse: AtomicBool::new(false),
                endpoints: Mutex::new(Vec::new()),
                accepted,
            };
            (std::sync::Arc::new(connector), rx)
        }

        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        pub fn endpoints(&self) -> Vec<String> {
            self.endpoints.lock().unwrap().clone()
        }

        pub fn set_refusing(&self, refuse: bool) {
            self.refuse.store(refuse, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, endpoint: &str) -> Result<Channel, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.endpoints.lock().unwrap().push(endpoint.to_string());
            if self.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }

            let (client_tx, server_rx) = chan::unbounded::<String>();
            let (server_tx, client_rx) = chan::unbounded::<Result<String, TransportError>>();
            let _ = self.accepted.send(ServerEnd {
                endpoint: endpoint.to_string(),
                to_client: server_tx,
                from_client: server_rx,
            });

            Ok(Channel {
                sink: Box::pin(client_tx.sink_map_err(|_| TransportError::Closed)),
                stream: Box::pin(client_rx),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod endpoints {
        use super::*;

        #[test]
        fn test_accepts_ws_and_wss() {
            assert!(parse_endpoint("ws://localhost:3456/ws").is_ok());
            assert!(parse_endpoint("wss://dash.example.com/ws").is_ok());
        }

        #[test]
        fn test_rejects_other_schemes_and_garbage() {
            for bad in ["http://localhost:3456", "localhost:3456", "", "ws://"] {
                assert!(
                    matches!(parse_endpoint(bad), Err(TransportError::InvalidEndpoint { .. })),
                    "{} should be rejected",
                    bad
                );
            }
        }
    }

    mod websocket {
        use super::*;
        use tokio::net::TcpListener;

        #[tokio::test]
        async fn test_text_frames_flow_both_ways() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();

            let server = tokio::spawn(async move {
                let (stream, _) = listener.accept().await.unwrap();
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
                ws.send(Message::Text("{\"type\":\"init\"}".into())).await.unwrap();
                loop {
                    match ws.next().await {
                        Some(Ok(Message::Text(text))) => return text,
                        Some(Ok(_)) => continue,
                        other => panic!("unexpected {:?}", other),
                    }
                }
            });

            let mut channel = WsConnector.connect(&format!("ws://{}/ws", addr)).await.unwrap();
            let first = channel.stream.next().await.unwrap().unwrap();
            assert_eq!(first, "{\"type\":\"init\"}");

            channel.sink.send("hello".to_string()).await.unwrap();
            assert_eq!(server.await.unwrap(), "hello");
        }

        #[tokio::test]
        async fn test_connect_to_invalid_endpoint_fails_fast() {
            let result = WsConnector.connect("http://localhost:1").await;
            assert!(matches!(result, Err(TransportError::InvalidEndpoint { .. })));
        }
    }
}
