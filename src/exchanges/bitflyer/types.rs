use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const TICKER_PREFIX: &str = "lightning_ticker_";
pub const EXECUTIONS_PREFIX: &str = "lightning_executions_";
pub const BOARD_SNAPSHOT_PREFIX: &str = "lightning_board_snapshot_";
pub const BOARD_PREFIX: &str = "lightning_board_";
pub const CHILD_ORDER_EVENTS: &str = "child_order_events";
pub const PARENT_ORDER_EVENTS: &str = "parent_order_events";

/// Channel name builders
pub struct Channel;

impl Channel {
    pub fn ticker(product_code: &str) -> String {
        format!("{}{}", TICKER_PREFIX, product_code)
    }

    pub fn executions(product_code: &str) -> String {
        format!("{}{}", EXECUTIONS_PREFIX, product_code)
    }

    pub fn board(product_code: &str) -> String {
        format!("{}{}", BOARD_PREFIX, product_code)
    }

    pub fn board_snapshot(product_code: &str) -> String {
        format!("{}{}", BOARD_SNAPSHOT_PREFIX, product_code)
    }

    pub fn child_order_events() -> String {
        CHILD_ORDER_EVENTS.to_string()
    }

    pub fn parent_order_events() -> String {
        PARENT_ORDER_EVENTS.to_string()
    }
}

/// `lightning_ticker_*` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub product_code: String,
    #[serde(default)]
    pub state: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub tick_id: Option<u64>,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub best_bid_size: Decimal,
    pub best_ask_size: Decimal,
    pub total_bid_depth: Decimal,
    pub total_ask_depth: Decimal,
    #[serde(default)]
    pub market_bid_size: Option<Decimal>,
    #[serde(default)]
    pub market_ask_size: Option<Decimal>,
    pub ltp: Decimal,
    pub volume: Decimal,
    pub volume_by_product: Decimal,
}

/// One trade from a `lightning_executions_*` batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub id: u64,
    pub side: String,
    pub price: Decimal,
    pub size: Decimal,
    pub exec_date: String,
    pub buy_child_order_acceptance_id: String,
    pub sell_child_order_acceptance_id: String,
}

/// Executions batch; the product code comes from the channel name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executions {
    pub product_code: String,
    pub executions: Vec<Execution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Order book body shared by board deltas and snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardData {
    pub mid_price: Decimal,
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
}

/// Incremental board update. A level with size zero removes that price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub product_code: String,
    pub data: BoardData,
}

/// Full board replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSnapshot {
    pub product_code: String,
    pub data: BoardData,
}

/// Private order event from `child_order_events` or `parent_order_events`.
///
/// Fields present depend on `event_type` (ORDER, EXECUTION, CANCEL, EXPIRE, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderEvent {
    pub product_code: String,
    pub event_type: String,
    pub event_date: String,
    pub child_order_id: Option<String>,
    pub child_order_acceptance_id: Option<String>,
    pub child_order_type: Option<String>,
    pub parent_order_id: Option<String>,
    pub parent_order_acceptance_id: Option<String>,
    pub parent_order_type: Option<String>,
    pub side: Option<String>,
    pub price: Option<Decimal>,
    pub size: Option<Decimal>,
    pub expire_date: Option<String>,
    pub reason: Option<String>,
    pub exec_id: Option<u64>,
    pub commission: Option<Decimal>,
    pub sfd: Option<Decimal>,
}

/// `GET /v1/markets` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub product_code: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub market_type: String,
}

/// `GET /v1/getboardstate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    pub health: String,
    pub state: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// `GET /v1/me/getbalance` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub currency_code: String,
    pub amount: Decimal,
    pub available: Decimal,
}
