pub mod codec;
pub mod router;
pub mod types;

pub mod builder;
pub mod rest;
pub mod websocket;

// Re-export main components
pub use builder::BitflyerBuilder;
pub use codec::{ChannelFrame, ChannelKind, LightningCodec, LightningMessage};
pub use rest::{BitflyerRest, DEFAULT_BASE_URL};
pub use router::MessageRouter;
pub use types::{
    Balance, Board, BoardData, BoardSnapshot, BoardState, Channel, Execution, Executions, Market,
    OrderEvent, PriceLevel, Ticker,
};
pub use websocket::{BitflyerWs, SubscriptionBook, DEFAULT_WS_URL};

/// Environment variable prefix: `BITFLYER_API_KEY`, `BITFLYER_API_SECRET`, ...
pub const ENV_PREFIX: &str = "BITFLYER";
