use crate::core::errors::ExchangeError;
use serde::Serialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

pub const JSONRPC_VERSION: &str = "2.0";

/// Client-to-server JSON-RPC envelope
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    #[serde(rename = "jsonrpc")]
    pub version: &'static str,
    pub method: &'a str,
    pub params: Value,
    pub id: u64,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(method: &'a str, params: Value, id: u64) -> Self {
        Self {
            version: JSONRPC_VERSION,
            method,
            params,
            id,
        }
    }
}

/// Codec trait for handling exchange-specific WebSocket message encoding/decoding
///
/// This trait defines the contract for converting between raw WebSocket messages
/// and exchange-specific typed messages.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed messages from this exchange
    type Message: Send + Sync;

    /// Encode an RPC call into a WebSocket message
    ///
    /// # Arguments
    /// * `method` - RPC method name (`subscribe`, `auth`, ...)
    /// * `params` - Method parameters
    /// * `id` - Call identifier
    fn encode_call(&self, method: &str, params: Value, id: u64) -> Result<Message, ExchangeError>;

    /// Decode a raw text frame into a typed message
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully decoded message
    /// - `Ok(None)` - Frame is not a channel message and was ignored
    /// - `Err(error)` - Frame is not valid JSON
    fn decode_frame(&self, frame: &str) -> Result<Option<Self::Message>, ExchangeError>;
}

/// Serialize a JSON-RPC call into a text frame
pub fn encode_jsonrpc(method: &str, params: Value, id: u64) -> Result<Message, ExchangeError> {
    let request = JsonRpcRequest::new(method, params, id);
    Ok(Message::Text(serde_json::to_string(&request)?))
}
