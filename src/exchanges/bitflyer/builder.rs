use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{Credentials, HmacSigner, RestClientBuilder, RestClientConfig, WsConfig};
use crate::exchanges::bitflyer::rest::{BitflyerRest, DEFAULT_BASE_URL};
use crate::exchanges::bitflyer::router::MessageRouter;
use crate::exchanges::bitflyer::websocket::{BitflyerWs, DEFAULT_WS_URL};
use std::sync::Arc;

/// Builder for bitFlyer REST clients and Realtime API sessions
///
/// Credentials are optional; without them only public endpoints and channels
/// are usable.
#[derive(Debug, Clone)]
pub struct BitflyerBuilder {
    config: ExchangeConfig,
    rest_timeout: u64,
    ws_config: WsConfig,
}

impl Default for BitflyerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BitflyerBuilder {
    pub fn new() -> Self {
        Self {
            config: ExchangeConfig::read_only(),
            rest_timeout: 30,
            ws_config: WsConfig::default(),
        }
    }

    /// Set the exchange configuration
    pub fn with_config(mut self, config: ExchangeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set API credentials, keeping any custom URLs
    pub fn with_credentials(mut self, api_key: String, api_secret: String) -> Self {
        let mut config = ExchangeConfig::new(api_key, api_secret);
        config.base_url = self.config.base_url.take();
        config.ws_url = self.config.ws_url.take();
        self.config = config;
        self
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.config.base_url = Some(base_url);
        self
    }

    pub fn with_ws_url(mut self, ws_url: String) -> Self {
        self.config.ws_url = Some(ws_url);
        self
    }

    /// Set REST request timeout in seconds
    pub fn with_rest_timeout(mut self, timeout: u64) -> Self {
        self.rest_timeout = timeout;
        self
    }

    pub fn with_ws_config(mut self, ws_config: WsConfig) -> Self {
        self.ws_config = ws_config;
        self
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn ws_url(&self) -> &str {
        self.config.ws_url.as_deref().unwrap_or(DEFAULT_WS_URL)
    }

    /// Credentials from the configuration, if both key and secret are set
    pub fn credentials(&self) -> Option<Credentials> {
        self.config
            .has_credentials()
            .then(|| Credentials::new(self.config.api_key(), self.config.api_secret()))
    }

    /// Build the REST client, signing private calls when credentials are present
    pub fn build_rest(&self) -> Result<BitflyerRest, ExchangeError> {
        let rest_config = RestClientConfig::new(self.base_url().to_string(), "bitflyer".to_string())
            .with_timeout(self.rest_timeout);

        let mut rest_builder = RestClientBuilder::new(rest_config);
        if let Some(credentials) = self.credentials() {
            rest_builder = rest_builder.with_signer(Arc::new(HmacSigner::from_credentials(credentials)));
        }

        Ok(BitflyerRest::new(rest_builder.build()?))
    }

    /// Open a Realtime API session
    pub async fn connect_ws(&self) -> Result<BitflyerWs, ExchangeError> {
        BitflyerWs::connect_with_config(self.ws_url(), self.ws_config.clone()).await
    }

    /// Open a Realtime API session dispatching to an already populated router
    pub async fn connect_ws_with_router(
        &self,
        router: Arc<MessageRouter>,
    ) -> Result<BitflyerWs, ExchangeError> {
        BitflyerWs::connect_with_router(self.ws_url(), self.ws_config.clone(), router).await
    }

    /// Open a Realtime API session and send the auth request
    pub async fn connect_ws_authenticated(&self) -> Result<BitflyerWs, ExchangeError> {
        let credentials = self.credentials().ok_or_else(|| {
            ExchangeError::AuthError("API key and secret are required for private channels".to_string())
        })?;

        let ws = self.connect_ws().await?;
        ws.authenticate_with(&credentials).await?;
        Ok(ws)
    }
}
