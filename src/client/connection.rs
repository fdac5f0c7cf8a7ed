//! Owns the event-stream connection for one endpoint.
//!
//! A single background task connects, serves frames until the channel ends,
//! then waits [`RECONNECT_DELAY`] and starts over, until the manager is torn
//! down. Each connection is fully dropped before the next one is attempted.
//!
//! Every continuation in the task checks a liveness flag before touching
//! shared state; teardown clears the flag once and cancels the task's token,
//! which also releases any pending reconnect timer.

use crate::client::dispatcher::{Dispatcher, Listeners};
use crate::client::subscriptions::Subscriptions;
use crate::client::transport::{Channel, Connector};
use crate::common::logging::Logger;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Wait between a close and the next connect attempt
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Upper bound on a graceful close during teardown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "connected"),
            ConnectionState::Closed => write!(f, "disconnected"),
        }
    }
}

/// Current connection as seen by everyone outside the task. While open it
/// carries the outbound queue of the live channel.
#[derive(Debug, Clone)]
pub enum Link {
    Connecting,
    Open(mpsc::UnboundedSender<String>),
    Closed,
}

impl Link {
    pub fn state(&self) -> ConnectionState {
        match self {
            Link::Connecting => ConnectionState::Connecting,
            Link::Open(_) => ConnectionState::Open,
            Link::Closed => ConnectionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Link::Open(_))
    }
}

struct Worker {
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Worker {
    fn stop(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }
}

pub struct ConnectionManager {
    endpoint: String,
    connector: Arc<dyn Connector>,
    listeners: watch::Sender<Listeners>,
    link: Arc<watch::Sender<Link>>,
    worker: Option<Worker>,
    log: Logger,
}

impl ConnectionManager {
    /// Start maintaining a connection to `endpoint`. Must be called inside a
    /// tokio runtime.
    pub fn start(endpoint: impl Into<String>, connector: Arc<dyn Connector>, listeners: Listeners) -> Self {
        let (listeners, _) = watch::channel(listeners);
        let (link, _) = watch::channel(Link::Connecting);
        let mut manager = Self {
            endpoint: endpoint.into(),
            connector,
            listeners,
            link: Arc::new(link),
            worker: None,
            log: Logger::root().child("connection"),
        };
        manager.spawn();
        manager
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.link.borrow().state()
    }

    /// Observe connection state changes. Stays valid across endpoint changes.
    pub fn watch_link(&self) -> watch::Receiver<Link> {
        self.link.subscribe()
    }

    /// Multiplexer bound to whatever channel is current
    pub fn subscriptions(&self) -> Subscriptions {
        Subscriptions::new(self.link.subscribe(), self.log.child("subscriptions"))
    }

    /// Swap callbacks and filters. The live channel is left alone.
    pub fn update_listeners(&self, listeners: Listeners) {
        self.listeners.send_replace(listeners);
    }

    /// Point at a new endpoint: full teardown, then a fresh start. A no-op
    /// when the endpoint is unchanged.
    pub async fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        let endpoint = endpoint.into();
        if endpoint == self.endpoint {
            return;
        }
        self.log.info(format_args!("endpoint changed: {} -> {}", self.endpoint, endpoint));
        self.shutdown().await;
        self.endpoint = endpoint;
        self.spawn();
    }

    /// Stop the task, close the live channel and cancel any pending
    /// reconnect. No connect is attempted afterwards.
    pub async fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
            if let Err(e) = worker.handle.await {
                self.log.warn(format_args!("connection task ended abnormally: {}", e));
            }
        }
        self.link.send_replace(Link::Closed);
    }

    fn spawn(&mut self) {
        let alive = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        let task = ConnectionTask {
            endpoint: self.endpoint.clone(),
            connector: Arc::clone(&self.connector),
            link: Arc::clone(&self.link),
            dispatcher: Dispatcher::new(self.listeners.subscribe(), self.log.child("dispatch")),
            alive: Arc::clone(&alive),
            cancel: cancel.clone(),
            log: self.log.clone(),
        };
        self.link.send_replace(Link::Connecting);
        let handle = tokio::spawn(task.run());
        self.worker = Some(Worker { alive, cancel, handle });
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }
}

struct ConnectionTask {
    endpoint: String,
    connector: Arc<dyn Connector>,
    link: Arc<watch::Sender<Link>>,
    dispatcher: Dispatcher,
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
    log: Logger,
}

impl ConnectionTask {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn run(self) {
        loop {
            if !self.is_alive() {
                return;
            }
            self.link.send_replace(Link::Connecting);
            self.log.debug(format_args!("connecting to {}", self.endpoint));

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.connector.connect(&self.endpoint) => result,
            };
            if !self.is_alive() {
                return;
            }

            match connected {
                Ok(channel) => {
                    self.log.info(format_args!("connected to {}", self.endpoint));
                    self.serve(channel).await;
                }
                Err(e) => self.log.warn(format_args!("connect to {} failed: {}", self.endpoint, e)),
            }
            if !self.is_alive() {
                return;
            }

            self.link.send_replace(Link::Closed);
            self.log.info(format_args!(
                "disconnected; reconnecting in {}s",
                RECONNECT_DELAY.as_secs()
            ));
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    /// Pump one channel until it ends or the task is cancelled
    async fn serve(&self, channel: Channel) {
        let Channel { mut sink, mut stream } = channel;
        let (outbound, mut queued) = mpsc::unbounded_channel::<String>();
        self.link.send_replace(Link::Open(outbound));

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await;
                    return;
                }
                frame = stream.next() => match frame {
                    Some(Ok(text)) => {
                        if !self.is_alive() {
                            return;
                        }
                        self.dispatcher.handle_text(&text);
                    }
                    Some(Err(e)) => {
                        self.log.warn(format_args!("transport error: {}", e));
                        break;
                    }
                    None => {
                        self.log.info("server closed the channel");
                        break;
                    }
                },
                Some(text) = queued.recv() => {
                    if let Err(e) = sink.send(text).await {
                        self.log.warn(format_args!("send failed: {}", e));
                        break;
                    }
                }
            }
        }
    }
}
