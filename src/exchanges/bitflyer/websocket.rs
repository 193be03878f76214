use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::signer::{hmac_sha256_hex, unix_timestamp, Credentials};
use crate::core::kernel::ws::{dial, spawn_receive_loop, SessionState, StateCell, WsConfig, WsWriter};
use crate::exchanges::bitflyer::codec::LightningCodec;
use crate::exchanges::bitflyer::router::MessageRouter;
use crate::exchanges::bitflyer::types::{Board, BoardSnapshot, Executions, OrderEvent, Ticker};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_WS_URL: &str = "wss://ws.lightstream.bitflyer.com/json-rpc";

/// Subscribed channels and the RPC call id counter.
///
/// Both live behind the session's single connection lock, so check-then-insert,
/// check-then-remove and increment-then-read are never interleaved.
#[derive(Debug)]
pub struct SubscriptionBook {
    channels: HashSet<String>,
    next_id: u64,
}

impl Default for SubscriptionBook {
    fn default() -> Self {
        Self::with_initial_id(1)
    }
}

impl SubscriptionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_id(initial_id: u64) -> Self {
        Self {
            channels: HashSet::new(),
            next_id: initial_id,
        }
    }

    /// Hand out the current id and advance the counter
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, channel: &str) -> Result<(), ExchangeError> {
        if !self.channels.insert(channel.to_string()) {
            return Err(ExchangeError::AlreadySubscribed(channel.to_string()));
        }
        Ok(())
    }

    pub fn remove(&mut self, channel: &str) -> Result<(), ExchangeError> {
        if !self.channels.remove(channel) {
            return Err(ExchangeError::NotSubscribed(channel.to_string()));
        }
        Ok(())
    }

    /// Undo an `insert` whose subscribe message was never written
    pub fn revert_insert(&mut self, channel: &str) {
        self.channels.remove(channel);
    }

    /// Undo a `remove` whose unsubscribe message was never written
    pub fn revert_remove(&mut self, channel: &str) {
        self.channels.insert(channel.to_string());
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.channels.iter().cloned().collect();
        channels.sort();
        channels
    }
}

struct Connection {
    writer: WsWriter,
    book: SubscriptionBook,
}

/// One Lightning Realtime API connection.
///
/// Connecting spawns a receive loop that hands every frame to the
/// [`MessageRouter`]. `subscribe`, `unsubscribe` and `authenticate` return once
/// their message is written; no server reply is awaited.
pub struct BitflyerWs {
    url: String,
    config: WsConfig,
    codec: LightningCodec,
    connection: Mutex<Connection>,
    router: Arc<MessageRouter>,
    state: Arc<StateCell>,
    receive_loop: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for BitflyerWs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitflyerWs")
            .field("url", &self.url)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl BitflyerWs {
    /// Connect with the default configuration
    pub async fn connect(url: &str) -> Result<Self, ExchangeError> {
        Self::connect_with_config(url, WsConfig::default()).await
    }

    pub async fn connect_with_config(url: &str, config: WsConfig) -> Result<Self, ExchangeError> {
        Self::connect_with_router(url, config, Arc::new(MessageRouter::new())).await
    }

    /// Connect using a router whose handlers may already be registered, so no
    /// frame arriving right after the handshake goes unhandled.
    #[instrument(skip(config, router), fields(exchange = "bitflyer"))]
    pub async fn connect_with_router(
        url: &str,
        config: WsConfig,
        router: Arc<MessageRouter>,
    ) -> Result<Self, ExchangeError> {
        let state = Arc::new(StateCell::new(SessionState::Connecting));
        let (writer, reader) = dial(url, &config).await?.split();

        state.set(SessionState::Open);
        let limit = Arc::new(Semaphore::new(config.max_in_flight_dispatch()));
        let handle = spawn_receive_loop(reader, Arc::clone(&router), limit, Arc::clone(&state));

        info!("Lightning Realtime API session open");

        Ok(Self {
            url: url.to_string(),
            config,
            codec: LightningCodec,
            connection: Mutex::new(Connection {
                writer,
                book: SubscriptionBook::new(),
            }),
            router,
            state,
            receive_loop: parking_lot::Mutex::new(Some(handle)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn on_ticker<F>(&self, handler: F)
    where
        F: Fn(Ticker) + Send + Sync + 'static,
    {
        self.router.on_ticker(handler);
    }

    pub fn on_executions<F>(&self, handler: F)
    where
        F: Fn(Executions) + Send + Sync + 'static,
    {
        self.router.on_executions(handler);
    }

    pub fn on_board<F>(&self, handler: F)
    where
        F: Fn(Board) + Send + Sync + 'static,
    {
        self.router.on_board(handler);
    }

    pub fn on_board_snapshot<F>(&self, handler: F)
    where
        F: Fn(BoardSnapshot) + Send + Sync + 'static,
    {
        self.router.on_board_snapshot(handler);
    }

    pub fn on_order_events<F>(&self, handler: F)
    where
        F: Fn(OrderEvent) + Send + Sync + 'static,
    {
        self.router.on_order_events(handler);
    }

    pub fn on_channel<F>(&self, channel: impl Into<String>, handler: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.router.on_channel(channel, handler);
    }

    /// Channels currently marked as subscribed, sorted
    pub async fn subscriptions(&self) -> Vec<String> {
        self.connection.lock().await.book.channels()
    }

    pub async fn is_subscribed(&self, channel: &str) -> bool {
        self.connection.lock().await.book.contains(channel)
    }

    /// Write one JSON-RPC call. Callers hold the connection lock.
    async fn send_call(
        &self,
        connection: &mut Connection,
        method: &str,
        params: Value,
        id: u64,
    ) -> Result<(), ExchangeError> {
        if self.state.get() != SessionState::Open {
            return Err(ExchangeError::SendError(format!(
                "session is {:?}",
                self.state.get()
            )));
        }

        let message = self.codec.encode_call(method, params, id)?;
        connection
            .writer
            .send(message)
            .await
            .map_err(|e| ExchangeError::SendError(e.to_string()))
    }

    /// Authenticate for private channels.
    ///
    /// Success means the auth message was written, not that the server
    /// accepted the credentials.
    #[instrument(skip_all, fields(exchange = "bitflyer"))]
    pub async fn authenticate(&self, api_key: &str, api_secret: &str) -> Result<(), ExchangeError> {
        let timestamp = unix_timestamp();
        let signature = hmac_sha256_hex(
            api_secret.as_bytes(),
            format!("{}{}", timestamp, api_key).as_bytes(),
        )?;

        let mut connection = self.connection.lock().await;
        let nonce = connection.book.next_id();
        let params = json!({
            "api_key": api_key,
            "timestamp": timestamp,
            "nonce": nonce.to_string(),
            "signature": signature,
        });
        let id = connection.book.next_id();

        self.send_call(&mut connection, "auth", params, id).await?;
        debug!(id, "Auth request sent");
        Ok(())
    }

    pub async fn authenticate_with(&self, credentials: &Credentials) -> Result<(), ExchangeError> {
        self.authenticate(credentials.api_key(), credentials.api_secret())
            .await
    }

    /// Subscribe to `channel`.
    ///
    /// Fails with `AlreadySubscribed` without touching the network if the
    /// channel is already in the set. If the write fails the channel is taken
    /// back out of the set.
    #[instrument(skip(self), fields(exchange = "bitflyer"))]
    pub async fn subscribe(&self, channel: &str) -> Result<(), ExchangeError> {
        let mut connection = self.connection.lock().await;
        connection.book.insert(channel)?;
        let id = connection.book.next_id();

        if let Err(e) = self
            .send_call(&mut connection, "subscribe", json!({ "channel": channel }), id)
            .await
        {
            connection.book.revert_insert(channel);
            return Err(e);
        }

        debug!(id, "Subscribe request sent");
        Ok(())
    }

    /// Unsubscribe from `channel`.
    ///
    /// Fails with `NotSubscribed` without touching the network if the channel
    /// is not in the set. If the write fails the channel stays subscribed.
    #[instrument(skip(self), fields(exchange = "bitflyer"))]
    pub async fn unsubscribe(&self, channel: &str) -> Result<(), ExchangeError> {
        let mut connection = self.connection.lock().await;
        connection.book.remove(channel)?;
        let id = connection.book.next_id();

        if let Err(e) = self
            .send_call(&mut connection, "unsubscribe", json!({ "channel": channel }), id)
            .await
        {
            connection.book.revert_remove(channel);
            return Err(e);
        }

        debug!(id, "Unsubscribe request sent");
        Ok(())
    }

    /// Close the connection with a normal-closure code.
    ///
    /// Failures during the close handshake are logged. If the receive loop has
    /// not finished within the configured close timeout it is aborted.
    #[instrument(skip(self), fields(exchange = "bitflyer", url = %self.url))]
    pub async fn close(&self) {
        if self.state.get() != SessionState::Closed {
            self.state.set(SessionState::Closing);
        }

        {
            let mut connection = self.connection.lock().await;
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "client closed".into(),
            };
            if let Err(e) = connection.writer.send(Message::Close(Some(frame))).await {
                warn!("Error while closing WebSocket connection: {}", e);
            }
        }

        let handle = self.receive_loop.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(self.config.close_timeout(), &mut handle)
                .await
                .is_err()
            {
                debug!("Receive loop still running after close timeout, aborting");
                handle.abort();
            }
        }

        self.state.set(SessionState::Closed);
        info!("Lightning Realtime API session closed");
    }
}

impl Drop for BitflyerWs {
    fn drop(&mut self) {
        if let Some(handle) = self.receive_loop.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::thread;

    #[test]
    fn test_call_ids_start_at_initial_value() {
        let mut book = SubscriptionBook::with_initial_id(42);
        assert_eq!(book.next_id(), 42);
        assert_eq!(book.next_id(), 43);
    }

    #[test]
    fn test_default_call_ids_start_at_one() {
        let mut book = SubscriptionBook::new();
        assert_eq!(book.next_id(), 1);
    }

    #[test]
    fn test_concurrent_ids_are_distinct_and_gap_free() {
        let book = Arc::new(parking_lot::Mutex::new(SubscriptionBook::with_initial_id(42)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let book = Arc::clone(&book);
                thread::spawn(move || (0..250).map(|_| book.lock().next_id()).collect::<Vec<_>>())
            })
            .collect();

        let ids: BTreeSet<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(ids.len(), 2000);
        assert_eq!(ids.first(), Some(&42));
        assert_eq!(ids.last(), Some(&2041));
    }

    #[test]
    fn test_subscribe_twice_fails() {
        let mut book = SubscriptionBook::new();
        book.insert("lightning_ticker_BTC_JPY").unwrap();

        let err = book.insert("lightning_ticker_BTC_JPY").unwrap_err();
        assert!(matches!(err, ExchangeError::AlreadySubscribed(ref c) if c == "lightning_ticker_BTC_JPY"));
    }

    #[test]
    fn test_unsubscribe_unknown_fails() {
        let mut book = SubscriptionBook::new();
        let err = book.remove("test_channel").unwrap_err();
        assert!(matches!(err, ExchangeError::NotSubscribed(_)));
    }

    #[test]
    fn test_subscribe_unsubscribe_subscribe() {
        let mut book = SubscriptionBook::new();
        book.insert("test_channel").unwrap();
        book.remove("test_channel").unwrap();
        book.insert("test_channel").unwrap();
        assert!(book.contains("test_channel"));
        assert_eq!(book.channels(), vec!["test_channel".to_string()]);
    }

    #[test]
    fn test_revert_restores_previous_membership() {
        let mut book = SubscriptionBook::new();

        book.insert("test_channel").unwrap();
        book.revert_insert("test_channel");
        assert!(!book.contains("test_channel"));
        book.insert("test_channel").unwrap();

        book.remove("test_channel").unwrap();
        book.revert_remove("test_channel");
        assert!(book.contains("test_channel"));
        assert!(matches!(
            book.insert("test_channel"),
            Err(ExchangeError::AlreadySubscribed(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_invalid_url_fails() {
        let err = BitflyerWs::connect("invalid://url").await.unwrap_err();
        assert!(matches!(err, ExchangeError::ConnectError(_)));
    }
}
