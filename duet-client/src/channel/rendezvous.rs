use crate::channel::{ChannelEvent, SignalingOutput};
use crate::config::ChannelConfig;
use crate::error::ChannelError;
use async_trait::async_trait;
use dashmap::DashMap;
use duet_core::{ClientMessage, EventName, ServerMessage};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type Handler = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared switch for the channel's automatic reconnection.
#[derive(Clone, Debug)]
pub struct ReconnectSwitch(Arc<AtomicBool>);

impl ReconnectSwitch {
    pub fn disable(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn enable(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Outbox {
    live: Option<mpsc::UnboundedSender<ClientMessage>>,
    queued: Vec<ClientMessage>,
}

struct ChannelInner {
    config: ChannelConfig,
    handlers: DashMap<EventName, Vec<Handler>>,
    outbox: Mutex<Outbox>,
    auto_reconnect: ReconnectSwitch,
    connected: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Persistent duplex event connection to the coordinator.
///
/// Cheap to clone; every clone drives the same underlying transport. Handlers are
/// kept across transport reconnects, and messages emitted while the transport is
/// down are queued and flushed in order once it opens.
#[derive(Clone)]
pub struct RendezvousChannel {
    inner: Arc<ChannelInner>,
}

impl RendezvousChannel {
    pub fn new(config: ChannelConfig) -> Self {
        let auto_reconnect = ReconnectSwitch(Arc::new(AtomicBool::new(config.reconnect.enabled)));

        Self {
            inner: Arc::new(ChannelInner {
                config,
                handlers: DashMap::new(),
                outbox: Mutex::new(Outbox::default()),
                auto_reconnect,
                connected: AtomicBool::new(false),
                task: Mutex::new(None),
            }),
        }
    }

    /// Start the transport. Calling it again while the transport task is alive
    /// returns the same handle without opening a second transport.
    pub fn connect(&self) -> Result<RendezvousChannel, ChannelError> {
        let url = &self.inner.config.url;
        url.as_str()
            .into_client_request()
            .map_err(|e| ChannelError::InvalidUrl {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let mut task = lock(&self.inner.task);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            debug!("Rendezvous channel already running, reusing transport");
            return Ok(self.clone());
        }

        info!("Opening rendezvous channel to {}", url);
        *task = Some(tokio::spawn(connection_loop(self.inner.clone())));
        Ok(self.clone())
    }

    pub fn emit(&self, message: ClientMessage) {
        let mut outbox = lock(&self.inner.outbox);
        let message = match &outbox.live {
            Some(tx) => match tx.send(message) {
                Ok(()) => return,
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        debug!("Transport not open, queueing '{}'", message.name());
        outbox.live = None;
        outbox.queued.push(message);
    }

    /// Register a handler. A `connect` handler registered while the transport is
    /// already open is invoked right away.
    pub fn on<F>(&self, name: EventName, handler: F)
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.inner
            .handlers
            .entry(name)
            .or_default()
            .push(handler.clone());

        if name == EventName::Connect && self.is_connected() {
            handler(&ChannelEvent::Connected);
        }
    }

    /// Remove every handler and close the transport for good.
    pub fn disconnect(&self) {
        self.inner.auto_reconnect.disable();
        self.inner.handlers.clear();
        {
            let mut outbox = lock(&self.inner.outbox);
            outbox.live = None;
            outbox.queued.clear();
        }
        if let Some(task) = lock(&self.inner.task).take() {
            task.abort();
        }
        self.inner.connected.store(false, Ordering::SeqCst);
        info!("Rendezvous channel disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Whether the transport task is still alive (connected or waiting to retry).
    pub fn is_running(&self) -> bool {
        lock(&self.inner.task)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    pub fn reconnect_switch(&self) -> ReconnectSwitch {
        self.inner.auto_reconnect.clone()
    }

    pub fn is_auto_reconnect_enabled(&self) -> bool {
        self.inner.auto_reconnect.is_enabled()
    }

    fn queued_len(&self) -> usize {
        lock(&self.inner.outbox).queued.len()
    }
}

#[async_trait]
impl SignalingOutput for RendezvousChannel {
    async fn emit(&self, message: ClientMessage) {
        RendezvousChannel::emit(self, message);
    }

    fn disable_auto_reconnect(&self) {
        self.inner.auto_reconnect.disable();
    }

    fn reconnect(&self) {
        self.inner.auto_reconnect.enable();
        if let Err(e) = self.connect() {
            error!("Failed to restart rendezvous channel: {}", e);
        }
    }
}

async fn connection_loop(inner: Arc<ChannelInner>) {
    let policy = inner.config.reconnect.clone();
    let mut delay = policy.initial_delay;

    loop {
        match tokio_tungstenite::connect_async(inner.config.url.as_str()).await {
            Ok((ws, _response)) => {
                delay = policy.initial_delay;
                inner.run_transport(ws).await;
            }
            Err(e) => warn!("Failed to reach coordinator at {}: {}", inner.config.url, e),
        }

        if inner.retire_if_disabled() {
            info!("Automatic reconnection disabled, rendezvous channel stays down");
            break;
        }

        debug!("Reconnecting to coordinator in {:?}", delay);
        tokio::time::sleep(delay).await;
        delay = policy.next_delay(delay);
    }
}

impl ChannelInner {
    /// Decided under the task lock, so a concurrent `connect` either sees this
    /// loop continue or finds the slot empty and spawns a new one.
    fn retire_if_disabled(&self) -> bool {
        let mut task = lock(&self.task);
        if self.auto_reconnect.is_enabled() {
            return false;
        }
        task.take();
        true
    }

    async fn run_transport(&self, ws: WsStream) {
        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ClientMessage>();

        {
            let mut outbox = lock(&self.outbox);
            for message in outbox.queued.drain(..) {
                let _ = tx.send(message);
            }
            outbox.live = Some(tx);
        }

        let mut writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize '{}': {}", message.name(), e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    warn!("Failed to write to coordinator: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        self.connected.store(true, Ordering::SeqCst);
        info!("Rendezvous transport open");
        self.dispatch(&ChannelEvent::Connected);

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => self.dispatch(&ChannelEvent::Message(message)),
                        Err(e) => warn!("Invalid ServerMessage from coordinator: {:?}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Rendezvous transport error: {}", e);
                        break;
                    }
                },
                _ = &mut writer => break,
            }
        }

        writer.abort();
        lock(&self.outbox).live = None;
        self.connected.store(false, Ordering::SeqCst);
        info!("Rendezvous transport closed");
        self.dispatch(&ChannelEvent::Disconnected);
    }

    /// Runs handlers inline, so a handler's side effects land before the next
    /// frame is read.
    fn dispatch(&self, event: &ChannelEvent) {
        let handlers: Vec<Handler> = match self.handlers.get(&event.name()) {
            Some(entry) => entry.value().clone(),
            None => {
                debug!("No handler registered for '{}'", event.name());
                return;
            }
        };

        for handler in handlers {
            handler(event);
        }
    }
}
