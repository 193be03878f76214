use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{sign_http_request, unix_timestamp, Signer, CONTENT_TYPE_JSON};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Request, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, trace};

/// Anything that can put an HTTP request on the wire and hand back the response.
///
/// `reqwest::Client` is the default implementation; tests and callers with
/// their own middleware can provide another.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response, ExchangeError>;
}

#[async_trait]
impl HttpTransport for Client {
    async fn execute(&self, request: Request) -> Result<Response, ExchangeError> {
        Ok(Self::execute(self, request).await?)
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn execute(&self, request: Request) -> Result<Response, ExchangeError> {
        (**self).execute(request).await
    }
}

/// Transport decorator that signs every request before delegating.
///
/// If signing fails the request is never sent and the signing error is
/// returned as is. Responses and transport errors from the inner transport
/// pass through unmodified.
pub struct AuthenticatedTransport<T: HttpTransport = Client> {
    inner: T,
    signer: Arc<dyn Signer>,
}

impl AuthenticatedTransport<Client> {
    /// Wrap a default `reqwest::Client`
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self::with_transport(Client::new(), signer)
    }
}

impl<T: HttpTransport> AuthenticatedTransport<T> {
    pub fn with_transport(inner: T, signer: Arc<dyn Signer>) -> Self {
        Self { inner, signer }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for AuthenticatedTransport<T> {
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.url().path()))]
    async fn execute(&self, mut request: Request) -> Result<Response, ExchangeError> {
        sign_http_request(self.signer.as_ref(), &mut request, unix_timestamp())?;
        self.inner.execute(request).await
    }
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl RestClientConfig {
    /// Create a new configuration
    ///
    /// # Arguments
    /// * `base_url` - Base URL for the API
    /// * `exchange_name` - Name of the exchange
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout_seconds: 30,
            user_agent: concat!("bitflyer-lightning/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
        }
    }

    /// Set the signer for authenticated requests
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Build the REST client on a `reqwest::Client` configured from the builder
    pub fn build(self) -> Result<ReqwestRest<Client>, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| {
                ExchangeError::Other(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(self.build_with_transport(client))
    }

    /// Build the REST client on a caller-provided transport
    pub fn build_with_transport<T: HttpTransport>(self, transport: T) -> ReqwestRest<T> {
        let transport = Arc::new(transport);
        let authenticated = self
            .signer
            .map(|signer| AuthenticatedTransport::with_transport(Arc::clone(&transport), signer));

        ReqwestRest {
            config: self.config,
            transport,
            authenticated,
        }
    }
}

/// REST client that routes private calls through an `AuthenticatedTransport`
pub struct ReqwestRest<T: HttpTransport = Client> {
    config: RestClientConfig,
    transport: Arc<T>,
    authenticated: Option<AuthenticatedTransport<Arc<T>>>,
}

impl<T: HttpTransport> std::fmt::Debug for ReqwestRest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.authenticated.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: HttpTransport> ReqwestRest<T> {
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    pub fn can_authenticate(&self) -> bool {
        self.authenticated.is_some()
    }

    /// Build the full URL for an endpoint, appending query parameters
    fn build_url(&self, endpoint: &str, query_params: &[(&str, &str)]) -> Result<Url, ExchangeError> {
        let mut url = Url::parse(&format!("{}{}", self.config.base_url, endpoint)).map_err(|e| {
            ExchangeError::Other(format!("Invalid URL for endpoint {}: {}", endpoint, e))
        })?;

        if !query_params.is_empty() {
            url.query_pairs_mut().extend_pairs(query_params);
        }

        Ok(url)
    }

    /// Handle the response and extract JSON
    #[instrument(skip(self, response), fields(exchange = %self.config.exchange_name, status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<Value, ExchangeError> {
        let status = response.status();
        let response_text = response.text().await?;

        trace!("Response body: {}", response_text);

        if !status.is_success() {
            return Err(ExchangeError::ApiError {
                code: i32::from(status.as_u16()),
                message: response_text,
            });
        }

        // Some private endpoints (cancel*) answer 200 with an empty body
        if response_text.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&response_text)?)
    }

    /// Make a request with the given parameters
    #[instrument(skip(self, body), fields(exchange = %self.config.exchange_name, method = %method, endpoint = %endpoint))]
    async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: Option<Vec<u8>>,
        authenticated: bool,
    ) -> Result<Value, ExchangeError> {
        let url = self.build_url(endpoint, query_params)?;
        let mut request = Request::new(method, url);

        if let Some(body) = body {
            request
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
            *request.body_mut() = Some(body.into());
        }

        // With a signer configured every request is signed, public ones included
        let response = match &self.authenticated {
            Some(transport) => transport.execute(request).await?,
            None if authenticated => {
                return Err(ExchangeError::AuthError(
                    "Authentication required but no signer provided".to_string(),
                ));
            }
            None => self.transport.execute(request).await?,
        };

        self.handle_response(response).await
    }

    /// Make a GET request
    pub async fn get(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<Value, ExchangeError> {
        self.make_request(Method::GET, endpoint, query_params, None, authenticated)
            .await
    }

    /// Make a GET request with strongly-typed response
    pub async fn get_json<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<R, ExchangeError> {
        let value = self.get(endpoint, query_params, authenticated).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Make a POST request with a JSON body
    pub async fn post<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
        authenticated: bool,
    ) -> Result<Value, ExchangeError> {
        let body_bytes = serde_json::to_vec(body)?;
        self.make_request(Method::POST, endpoint, &[], Some(body_bytes), authenticated)
            .await
    }

    /// Make a POST request with strongly-typed response
    pub async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
        authenticated: bool,
    ) -> Result<R, ExchangeError> {
        let value = self.post(endpoint, body, authenticated).await?;
        Ok(serde_json::from_value(value)?)
    }
}
