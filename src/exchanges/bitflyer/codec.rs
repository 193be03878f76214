use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::{encode_jsonrpc, WsCodec};
use crate::exchanges::bitflyer::types::{
    Board, BoardData, BoardSnapshot, Execution, Executions, OrderEvent, Ticker,
    BOARD_PREFIX, BOARD_SNAPSHOT_PREFIX, CHILD_ORDER_EVENTS, EXECUTIONS_PREFIX,
    PARENT_ORDER_EVENTS, TICKER_PREFIX,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// Payload shape carried by a channel, decided from the channel name alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Ticker,
    Executions,
    BoardSnapshot,
    Board,
    OrderEvents,
}

impl ChannelKind {
    /// Classify a channel name.
    ///
    /// `lightning_board_` is a prefix of `lightning_board_snapshot_`, so the
    /// snapshot rule must be tested first.
    pub fn classify(channel: &str) -> Option<Self> {
        if channel.starts_with(TICKER_PREFIX) {
            Some(Self::Ticker)
        } else if channel.starts_with(EXECUTIONS_PREFIX) {
            Some(Self::Executions)
        } else if channel.starts_with(BOARD_SNAPSHOT_PREFIX) {
            Some(Self::BoardSnapshot)
        } else if channel.starts_with(BOARD_PREFIX) {
            Some(Self::Board)
        } else if channel == CHILD_ORDER_EVENTS || channel == PARENT_ORDER_EVENTS {
            Some(Self::OrderEvents)
        } else {
            None
        }
    }

    const fn prefix(self) -> &'static str {
        match self {
            Self::Ticker => TICKER_PREFIX,
            Self::Executions => EXECUTIONS_PREFIX,
            Self::BoardSnapshot => BOARD_SNAPSHOT_PREFIX,
            Self::Board => BOARD_PREFIX,
            Self::OrderEvents => "",
        }
    }
}

/// Typed channel payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LightningMessage {
    Ticker(Ticker),
    Executions(Executions),
    Board(Board),
    BoardSnapshot(BoardSnapshot),
    OrderEvents(Vec<OrderEvent>),
}

/// A `channelMessage` notification: channel name plus the untouched `params`
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFrame {
    pub channel: String,
    pub params: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl ChannelFrame {
    pub fn kind(&self) -> Option<ChannelKind> {
        ChannelKind::classify(&self.channel)
    }

    /// Product code encoded in the channel name, if the channel carries one
    pub fn product_code(&self) -> Option<&str> {
        match self.kind()? {
            ChannelKind::OrderEvents => None,
            kind => self.channel.strip_prefix(kind.prefix()),
        }
    }

    fn message<T: DeserializeOwned>(&self) -> Option<T> {
        let message = self.params.get("message")?;
        T::deserialize(message).ok()
    }

    /// Decode `params.message` into the shape the channel name calls for.
    ///
    /// Returns `None` for unknown channels and for payloads that do not match
    /// the expected shape.
    pub fn decode(&self) -> Option<LightningMessage> {
        let kind = self.kind()?;
        let product_code = || self.product_code().unwrap_or_default().to_string();

        match kind {
            ChannelKind::Ticker => self.message::<Ticker>().map(LightningMessage::Ticker),
            ChannelKind::Executions => self.message::<Vec<Execution>>().map(|executions| {
                LightningMessage::Executions(Executions {
                    product_code: product_code(),
                    executions,
                })
            }),
            ChannelKind::BoardSnapshot => self.message::<BoardData>().map(|data| {
                LightningMessage::BoardSnapshot(BoardSnapshot {
                    product_code: product_code(),
                    data,
                })
            }),
            ChannelKind::Board => self.message::<BoardData>().map(|data| {
                LightningMessage::Board(Board {
                    product_code: product_code(),
                    data,
                })
            }),
            ChannelKind::OrderEvents => self
                .message::<OneOrMany<OrderEvent>>()
                .map(|events| LightningMessage::OrderEvents(events.into())),
        }
    }
}

/// JSON-RPC codec for the Lightning Realtime API
#[derive(Debug, Clone, Copy, Default)]
pub struct LightningCodec;

impl WsCodec for LightningCodec {
    type Message = ChannelFrame;

    fn encode_call(&self, method: &str, params: Value, id: u64) -> Result<Message, ExchangeError> {
        encode_jsonrpc(method, params, id)
    }

    fn decode_frame(&self, frame: &str) -> Result<Option<ChannelFrame>, ExchangeError> {
        let mut value: Value = serde_json::from_str(frame)?;

        // RPC results and errors carry no params; only notifications are routed
        let Some(params) = value.get_mut("params").map(Value::take) else {
            return Ok(None);
        };
        let Some(channel) = params.get("channel").and_then(Value::as_str) else {
            return Ok(None);
        };

        Ok(Some(ChannelFrame {
            channel: channel.to_string(),
            params,
        }))
    }
}
