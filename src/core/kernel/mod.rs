/// Transport kernel shared by the exchange modules
///
/// The kernel holds only transport concerns: request signing, the signing
/// HTTP transport decorator, WebSocket dialing and the receive loop, and the
/// codec contract for turning frames into typed messages. Everything that
/// knows about specific channels or endpoints lives under `exchanges`.
///
/// # Signed REST calls
/// ```rust,no_run
/// use bitflyer_lightning::core::kernel::*;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let rest_config = RestClientConfig::new(
///     "https://api.bitflyer.com".to_string(),
///     "bitflyer".to_string(),
/// );
/// let rest = RestClientBuilder::new(rest_config)
///     .with_signer(Arc::new(HmacSigner::new("api_key", "api_secret")))
///     .build()?;
///
/// let balance = rest.get("/v1/me/getbalance", &[], true).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Wrapping an existing transport
/// ```rust,no_run
/// use bitflyer_lightning::core::kernel::{AuthenticatedTransport, HmacSigner, HttpTransport};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = AuthenticatedTransport::new(Arc::new(HmacSigner::new("key", "secret")));
/// let request = reqwest::Request::new(
///     reqwest::Method::GET,
///     "https://api.bitflyer.com/v1/me/getpositions?product_code=FX_BTC_JPY".parse()?,
/// );
/// let response = transport.execute(request).await?;
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod rest;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use codec::{encode_jsonrpc, JsonRpcRequest, WsCodec};
pub use rest::{AuthenticatedTransport, HttpTransport, ReqwestRest, RestClientBuilder, RestClientConfig};
pub use signer::{hmac_sha256_hex, Credentials, HmacSigner, SignatureResult, Signer};
pub use ws::{FrameHandler, SessionState, WsConfig};
