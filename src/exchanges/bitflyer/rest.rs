use crate::core::errors::ExchangeError;
use crate::core::kernel::{HttpTransport, ReqwestRest};
use crate::exchanges::bitflyer::types::{Balance, BoardData, BoardState, Market, Ticker};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

pub const DEFAULT_BASE_URL: &str = "https://api.bitflyer.com";

/// Typed wrapper over the Lightning HTTP API.
///
/// With a signer configured on the underlying [`ReqwestRest`] every request is
/// signed. Without one, private endpoints fail before any request is sent.
#[derive(Debug)]
pub struct BitflyerRest<T: HttpTransport = Client> {
    rest: ReqwestRest<T>,
}

impl<T: HttpTransport> BitflyerRest<T> {
    pub fn new(rest: ReqwestRest<T>) -> Self {
        Self { rest }
    }

    /// Underlying client, for endpoints without a typed wrapper
    pub fn rest(&self) -> &ReqwestRest<T> {
        &self.rest
    }

    pub fn can_authenticate(&self) -> bool {
        self.rest.can_authenticate()
    }

    pub async fn get_json<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<R, ExchangeError> {
        self.rest.get_json(endpoint, query_params, authenticated).await
    }

    pub async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
        authenticated: bool,
    ) -> Result<R, ExchangeError> {
        self.rest.post_json(endpoint, body, authenticated).await
    }

    #[instrument(skip(self), fields(exchange = "bitflyer"))]
    pub async fn get_markets(&self) -> Result<Vec<Market>, ExchangeError> {
        self.get_json("/v1/markets", &[], false).await
    }

    #[instrument(skip(self), fields(exchange = "bitflyer"))]
    pub async fn get_ticker(&self, product_code: &str) -> Result<Ticker, ExchangeError> {
        self.get_json("/v1/getticker", &[("product_code", product_code)], false)
            .await
    }

    #[instrument(skip(self), fields(exchange = "bitflyer"))]
    pub async fn get_board(&self, product_code: &str) -> Result<BoardData, ExchangeError> {
        self.get_json("/v1/getboard", &[("product_code", product_code)], false)
            .await
    }

    #[instrument(skip(self), fields(exchange = "bitflyer"))]
    pub async fn get_board_state(&self, product_code: &str) -> Result<BoardState, ExchangeError> {
        self.get_json("/v1/getboardstate", &[("product_code", product_code)], false)
            .await
    }

    #[instrument(skip(self), fields(exchange = "bitflyer"))]
    pub async fn get_balance(&self) -> Result<Vec<Balance>, ExchangeError> {
        self.get_json("/v1/me/getbalance", &[], true).await
    }
}
