use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::ws::FrameHandler;
use crate::exchanges::bitflyer::codec::{ChannelFrame, LightningCodec, LightningMessage};
use crate::exchanges::bitflyer::types::{Board, BoardSnapshot, Executions, OrderEvent, Ticker};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Raw handler for a single channel: receives the channel name and the
/// undecoded `params` object.
pub type ChannelCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// One optional callback per message kind, plus exact-match channel handlers.
///
/// Registering a callback for a kind that already has one replaces it.
#[derive(Default)]
pub struct HandlerRegistry {
    ticker: Option<Callback<Ticker>>,
    executions: Option<Callback<Executions>>,
    board: Option<Callback<Board>>,
    board_snapshot: Option<Callback<BoardSnapshot>>,
    order_events: Option<Callback<OrderEvent>>,
    channels: HashMap<String, ChannelCallback>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("ticker", &self.ticker.is_some())
            .field("executions", &self.executions.is_some())
            .field("board", &self.board.is_some())
            .field("board_snapshot", &self.board_snapshot.is_some())
            .field("order_events", &self.order_events.is_some())
            .field("channels", &self.channels.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Routes inbound frames to the registered callbacks.
///
/// Frames that are not channel notifications, and payloads that fail to
/// decode, are dropped without invoking anything.
#[derive(Debug, Default)]
pub struct MessageRouter {
    codec: LightningCodec,
    handlers: RwLock<HandlerRegistry>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_ticker<F>(&self, handler: F)
    where
        F: Fn(Ticker) + Send + Sync + 'static,
    {
        self.handlers.write().ticker = Some(Arc::new(handler));
    }

    pub fn on_executions<F>(&self, handler: F)
    where
        F: Fn(Executions) + Send + Sync + 'static,
    {
        self.handlers.write().executions = Some(Arc::new(handler));
    }

    pub fn on_board<F>(&self, handler: F)
    where
        F: Fn(Board) + Send + Sync + 'static,
    {
        self.handlers.write().board = Some(Arc::new(handler));
    }

    pub fn on_board_snapshot<F>(&self, handler: F)
    where
        F: Fn(BoardSnapshot) + Send + Sync + 'static,
    {
        self.handlers.write().board_snapshot = Some(Arc::new(handler));
    }

    /// Called once per event on `child_order_events` and `parent_order_events`
    pub fn on_order_events<F>(&self, handler: F)
    where
        F: Fn(OrderEvent) + Send + Sync + 'static,
    {
        self.handlers.write().order_events = Some(Arc::new(handler));
    }

    /// Receive the raw `params` of every frame on exactly `channel`, in
    /// addition to any typed callback.
    pub fn on_channel<F>(&self, channel: impl Into<String>, handler: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .channels
            .insert(channel.into(), Arc::new(handler));
    }

    /// Parse, classify and deliver one raw text frame.
    pub fn dispatch(&self, raw_frame: &str) {
        match self.codec.decode_frame(raw_frame) {
            Ok(Some(frame)) => self.dispatch_frame(&frame),
            Ok(None) => trace!("Dropping frame without params.channel"),
            Err(e) => trace!("Dropping malformed frame: {}", e),
        }
    }

    /// Clone one handler out of the registry so no lock is held while it runs.
    fn handler<T>(&self, pick: impl FnOnce(&HandlerRegistry) -> Option<T>) -> Option<T> {
        pick(&self.handlers.read())
    }

    /// Deliver an already-parsed channel frame.
    pub fn dispatch_frame(&self, frame: &ChannelFrame) {
        match frame.decode() {
            Some(LightningMessage::Ticker(ticker)) => {
                if let Some(handler) = self.handler(|h| h.ticker.clone()) {
                    handler(ticker);
                }
            }
            Some(LightningMessage::Executions(executions)) => {
                if let Some(handler) = self.handler(|h| h.executions.clone()) {
                    handler(executions);
                }
            }
            Some(LightningMessage::BoardSnapshot(snapshot)) => {
                if let Some(handler) = self.handler(|h| h.board_snapshot.clone()) {
                    handler(snapshot);
                }
            }
            Some(LightningMessage::Board(board)) => {
                if let Some(handler) = self.handler(|h| h.board.clone()) {
                    handler(board);
                }
            }
            Some(LightningMessage::OrderEvents(events)) => {
                if let Some(handler) = self.handler(|h| h.order_events.clone()) {
                    for event in events {
                        handler(event);
                    }
                }
            }
            None => trace!(channel = %frame.channel, "No typed payload for frame"),
        }

        if let Some(handler) = self.handler(|h| h.channels.get(&frame.channel).cloned()) {
            handler(&frame.channel, &frame.params);
        }
    }
}

impl FrameHandler for MessageRouter {
    fn handle_frame(&self, frame: &str) {
        self.dispatch(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        ticker: AtomicUsize,
        executions: AtomicUsize,
        board: AtomicUsize,
        snapshot: AtomicUsize,
        orders: AtomicUsize,
    }

    impl Counters {
        fn counts(&self) -> [usize; 5] {
            [
                self.ticker.load(Ordering::SeqCst),
                self.executions.load(Ordering::SeqCst),
                self.board.load(Ordering::SeqCst),
                self.snapshot.load(Ordering::SeqCst),
                self.orders.load(Ordering::SeqCst),
            ]
        }
    }

    fn counting_router() -> (MessageRouter, Arc<Counters>) {
        let router = MessageRouter::new();
        let counters = Arc::new(Counters::default());

        let c = Arc::clone(&counters);
        router.on_ticker(move |_| {
            c.ticker.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&counters);
        router.on_executions(move |_| {
            c.executions.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&counters);
        router.on_board(move |_| {
            c.board.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&counters);
        router.on_board_snapshot(move |_| {
            c.snapshot.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&counters);
        router.on_order_events(move |_| {
            c.orders.fetch_add(1, Ordering::SeqCst);
        });

        (router, counters)
    }

    fn notification(channel: &str, message: &str) -> String {
        format!(
            r#"{{"jsonrpc":"2.0","method":"channelMessage","params":{{"channel":"{}","message":{}}}}}"#,
            channel, message
        )
    }

    const TICKER: &str = r#"{"product_code":"BTC_JPY","timestamp":"2019-04-11T05:14:12.3739915Z","best_bid":580006,"best_ask":580771,"best_bid_size":2.00000013,"best_ask_size":0.4,"total_bid_depth":1581.64414981,"total_ask_depth":1415.32079982,"ltp":580790,"volume":6703.96837634,"volume_by_product":6703.96837634}"#;
    const BOARD: &str = r#"{"mid_price":35625,"bids":[{"price":33350,"size":1}],"asks":[]}"#;

    #[test]
    fn test_ticker_only_invokes_ticker_callback() {
        let (router, counters) = counting_router();

        router.dispatch(&notification("lightning_ticker_BTC_JPY", TICKER));

        assert_eq!(counters.counts(), [1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_snapshot_does_not_reach_board_callback() {
        let (router, counters) = counting_router();

        router.dispatch(&notification("lightning_board_snapshot_BTC_JPY", BOARD));
        assert_eq!(counters.counts(), [0, 0, 0, 1, 0]);

        router.dispatch(&notification("lightning_board_BTC_JPY", BOARD));
        assert_eq!(counters.counts(), [0, 0, 1, 1, 0]);
    }

    #[test]
    fn test_snapshot_callback_receives_product_code() {
        let router = MessageRouter::new();
        let seen = Arc::new(parking_lot::Mutex::new(None));

        let s = Arc::clone(&seen);
        router.on_board_snapshot(move |snapshot| {
            *s.lock() = Some(snapshot);
        });

        router.dispatch(&notification("lightning_board_snapshot_FX_BTC_JPY", BOARD));

        let snapshot = seen.lock().take().expect("snapshot delivered");
        assert_eq!(snapshot.product_code, "FX_BTC_JPY");
        assert_eq!(snapshot.data.bids.len(), 1);
        assert!(snapshot.data.asks.is_empty());
    }

    #[test]
    fn test_order_events_invoke_callback_per_event() {
        let (router, counters) = counting_router();
        let events = r#"[{"product_code":"BTC_JPY","event_type":"ORDER","event_date":"a"},{"product_code":"BTC_JPY","event_type":"EXECUTION","event_date":"b"}]"#;

        router.dispatch(&notification("child_order_events", events));

        assert_eq!(counters.counts(), [0, 0, 0, 0, 2]);
    }

    #[test]
    fn test_malformed_frames_invoke_nothing() {
        let (router, counters) = counting_router();

        router.dispatch("not json at all");
        router.dispatch(r#"{"jsonrpc":"2.0","id":3,"result":true}"#);
        router.dispatch(r#"{"params":{"message":{}}}"#);
        router.dispatch(r#"{"params":"oops"}"#);
        router.dispatch(&notification("lightning_ticker_BTC_JPY", r#"{"ltp":"x"}"#));

        assert_eq!(counters.counts(), [0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_channel_handler_gets_raw_params_alongside_typed() {
        let (router, counters) = counting_router();
        let raw = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let r = Arc::clone(&raw);
        router.on_channel("lightning_ticker_BTC_JPY", move |channel, params| {
            r.lock().push((channel.to_string(), params.clone()));
        });

        router.dispatch(&notification("lightning_ticker_BTC_JPY", TICKER));
        router.dispatch(&notification("lightning_ticker_ETH_JPY", TICKER));

        assert_eq!(counters.counts(), [2, 0, 0, 0, 0]);
        let raw = raw.lock();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].0, "lightning_ticker_BTC_JPY");
        assert_eq!(raw[0].1["message"]["ltp"], 580_790);
    }

    #[test]
    fn test_channel_handler_runs_for_unknown_or_undecodable_channels() {
        let router = MessageRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        router.on_channel("custom_channel", move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let h = Arc::clone(&hits);
        router.on_channel("lightning_board_BTC_JPY", move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        router.dispatch(&notification("custom_channel", "{}"));
        router.dispatch(&notification("lightning_board_BTC_JPY", r#""bad""#));

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_last_registration_wins() {
        let router = MessageRouter::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&first);
        router.on_ticker(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        let s = Arc::clone(&second);
        router.on_ticker(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        router.dispatch(&notification("lightning_ticker_BTC_JPY", TICKER));

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_frames_without_handlers_are_ignored() {
        let router = MessageRouter::new();
        router.dispatch(&notification("lightning_ticker_BTC_JPY", TICKER));
        router.dispatch(&notification("parent_order_events", "[]"));
    }
}
