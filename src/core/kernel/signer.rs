use crate::core::errors::ExchangeError;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Request, Url};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

pub const ACCESS_KEY: &str = "ACCESS-KEY";
pub const ACCESS_TIMESTAMP: &str = "ACCESS-TIMESTAMP";
pub const ACCESS_SIGN: &str = "ACCESS-SIGN";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Result type for signing operations: header name -> value
pub type SignatureResult = Result<HashMap<String, String>, ExchangeError>;

/// Signer trait for request authentication
///
/// Implementations turn the request parts into the headers the exchange
/// expects. The caller supplies the timestamp so signing stays deterministic.
pub trait Signer: Send + Sync {
    /// Sign a request and return the headers to attach
    ///
    /// # Arguments
    /// * `method` - HTTP method exactly as sent (GET, POST, etc.)
    /// * `request_target` - Path plus query string, verbatim
    /// * `body` - Raw request body bytes, empty when there is none
    /// * `timestamp` - Request timestamp in Unix seconds
    fn sign_request(
        &self,
        method: &str,
        request_target: &str,
        body: &[u8],
        timestamp: i64,
    ) -> SignatureResult;
}

/// API key and secret pair. The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: Secret<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: Secret::new(api_secret.into()),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn api_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }

    pub(crate) fn secret_bytes(&self) -> &[u8] {
        self.api_secret().as_bytes()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Lower-case hex HMAC-SHA256 of `message` keyed by `secret`.
pub fn hmac_sha256_hex(secret: &[u8], message: &[u8]) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;

    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Current Unix time in seconds. The exchange rejects millisecond timestamps.
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// HMAC-SHA256 signer producing the `ACCESS-*` header set
#[derive(Debug, Clone)]
pub struct HmacSigner {
    credentials: Credentials,
}

impl HmacSigner {
    /// Create a new HMAC signer
    ///
    /// # Arguments
    /// * `api_key` - API key sent as `ACCESS-KEY`
    /// * `api_secret` - Secret used to key the digest
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(api_key, api_secret),
        }
    }

    pub fn from_credentials(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Sign `timestamp || method || request_target || body`
    pub fn signature(
        &self,
        method: &str,
        request_target: &str,
        body: &[u8],
        timestamp: i64,
    ) -> Result<String, ExchangeError> {
        let prefix = format!("{}{}{}", timestamp, method, request_target);
        let mut message = Vec::with_capacity(prefix.len() + body.len());
        message.extend_from_slice(prefix.as_bytes());
        message.extend_from_slice(body);

        hmac_sha256_hex(self.credentials.secret_bytes(), &message)
    }
}

impl Signer for HmacSigner {
    fn sign_request(
        &self,
        method: &str,
        request_target: &str,
        body: &[u8],
        timestamp: i64,
    ) -> SignatureResult {
        let signature = self.signature(method, request_target, body, timestamp)?;

        let mut headers = HashMap::new();
        headers.insert(
            ACCESS_KEY.to_string(),
            self.credentials.api_key().to_string(),
        );
        headers.insert(ACCESS_TIMESTAMP.to_string(), timestamp.to_string());
        headers.insert(ACCESS_SIGN.to_string(), signature);
        headers.insert(
            CONTENT_TYPE.as_str().to_string(),
            CONTENT_TYPE_JSON.to_string(),
        );

        Ok(headers)
    }
}

/// Path plus query string as it goes on the wire, without scheme or host
pub fn request_target(url: &Url) -> String {
    url.query().map_or_else(
        || url.path().to_string(),
        |query| format!("{}?{}", url.path(), query),
    )
}

/// Borrow the full body without consuming it.
///
/// Streaming bodies cannot be replayed after signing, so they are rejected
/// rather than sent unsigned or dropped.
fn buffered_body(request: &Request) -> Result<&[u8], ExchangeError> {
    match request.body() {
        None => Ok(&[]),
        Some(body) => body.as_bytes().ok_or_else(|| {
            ExchangeError::BodyReadError(
                "streaming request bodies cannot be captured for signing".to_string(),
            )
        }),
    }
}

/// Sign `request` in place at the given timestamp.
///
/// Only headers are touched; the body is left exactly as it was.
pub fn sign_http_request(
    signer: &dyn Signer,
    request: &mut Request,
    timestamp: i64,
) -> Result<(), ExchangeError> {
    let target = request_target(request.url());
    let headers = {
        let body = buffered_body(request)?;
        signer.sign_request(request.method().as_str(), &target, body, timestamp)?
    };

    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ExchangeError::AuthError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| ExchangeError::AuthError(format!("Invalid header value: {}", e)))?;
        request.headers_mut().insert(name, value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Body, Method};

    const GOLDEN_GETBALANCE: &str =
        "ea41f674c12e83b2781f150f57d68a2fae9bddfe7deae393aec938fe45f3f1a5";

    fn signer() -> HmacSigner {
        HmacSigner::new("key123", "secret123")
    }

    fn request(method: Method, url: &str) -> Request {
        Request::new(method, Url::parse(url).unwrap())
    }

    #[test]
    fn test_golden_signature() {
        let signature = signer()
            .signature("GET", "/v1/me/getbalance", b"", 1_700_000_000)
            .unwrap();

        assert_eq!(signature.len(), 64);
        assert_eq!(signature, GOLDEN_GETBALANCE);
    }

    #[test]
    fn test_golden_signature_with_body() {
        let body = br#"{"product_code":"BTC_JPY"}"#;
        let signature = signer()
            .signature("POST", "/v1/me/sendchildorder", body, 1_700_000_000)
            .unwrap();

        assert_eq!(
            signature,
            "d8732df3eebc52c1a106be7539917970e713a5fb104412c4078667b818e454b0"
        );
    }

    #[test]
    fn test_signature_is_deterministic() {
        let s = signer();
        let a = s.signature("GET", "/v1/me/getbalance", b"", 1_700_000_000).unwrap();
        let b = s.signature("GET", "/v1/me/getbalance", b"", 1_700_000_000).unwrap();
        let later = s.signature("GET", "/v1/me/getbalance", b"", 1_700_000_001).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, later);
    }

    #[test]
    fn test_sign_request_headers() {
        let headers = signer()
            .sign_request("GET", "/v1/me/getbalance", b"", 1_700_000_000)
            .unwrap();

        assert_eq!(headers[ACCESS_KEY], "key123");
        assert_eq!(headers[ACCESS_TIMESTAMP], "1700000000");
        assert_eq!(headers[ACCESS_SIGN], GOLDEN_GETBALANCE);
        assert_eq!(headers["content-type"], CONTENT_TYPE_JSON);
    }

    #[test]
    fn test_request_target_keeps_query() {
        let url = Url::parse("https://api.bitflyer.com/v1/me/getpositions?product_code=FX_BTC_JPY")
            .unwrap();
        assert_eq!(
            request_target(&url),
            "/v1/me/getpositions?product_code=FX_BTC_JPY"
        );

        let url = Url::parse("https://api.bitflyer.com/v1/me/getbalance").unwrap();
        assert_eq!(request_target(&url), "/v1/me/getbalance");
    }

    #[test]
    fn test_query_string_changes_signature() {
        let s = signer();
        let mut req1 = request(
            Method::GET,
            "https://api.bitflyer.com/v1/me/getpositions?product_code=BTC_JPY",
        );
        let mut req2 = request(
            Method::GET,
            "https://api.bitflyer.com/v1/me/getpositions?product_code=FX_BTC_JPY",
        );

        sign_http_request(&s, &mut req1, 1_700_000_000).unwrap();
        sign_http_request(&s, &mut req2, 1_700_000_000).unwrap();

        assert_ne!(
            req1.headers()[ACCESS_SIGN],
            req2.headers()[ACCESS_SIGN]
        );
    }

    #[test]
    fn test_sign_http_request_sets_headers() {
        let mut req = request(Method::GET, "https://api.bitflyer.com/v1/me/getbalance");
        sign_http_request(&signer(), &mut req, 1_700_000_000).unwrap();

        let headers = req.headers();
        assert_eq!(headers[ACCESS_KEY], "key123");
        assert_eq!(headers[ACCESS_TIMESTAMP], "1700000000");
        assert_eq!(headers[ACCESS_SIGN], GOLDEN_GETBALANCE);
        assert_eq!(headers[CONTENT_TYPE], CONTENT_TYPE_JSON);
    }

    #[test]
    fn test_sign_http_request_preserves_body() {
        let body = r#"{"product_code":"BTC_JPY"}"#;
        let mut req = request(
            Method::POST,
            "https://api.bitflyer.com/v1/me/sendchildorder",
        );
        *req.body_mut() = Some(Body::from(body));

        sign_http_request(&signer(), &mut req, 1_700_000_000).unwrap();

        assert_eq!(
            req.headers()[ACCESS_SIGN],
            "d8732df3eebc52c1a106be7539917970e713a5fb104412c4078667b818e454b0"
        );
        assert_eq!(
            req.body().and_then(|b| b.as_bytes()),
            Some(body.as_bytes())
        );
    }

    #[test]
    fn test_streaming_body_is_rejected() {
        let chunks: Vec<Result<&'static str, std::io::Error>> = vec![Ok("{}")];
        let mut req = request(Method::POST, "https://api.bitflyer.com/v1/me/sendchildorder");
        *req.body_mut() = Some(Body::wrap_stream(futures_util::stream::iter(chunks)));

        let err = sign_http_request(&signer(), &mut req, 1_700_000_000).unwrap_err();

        assert!(matches!(err, ExchangeError::BodyReadError(_)));
        assert!(req.headers().get(ACCESS_SIGN).is_none());
    }

    #[test]
    fn test_timestamp_is_seconds() {
        let ts = unix_timestamp();
        assert_eq!(ts.to_string().len(), 10);
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::new("key123", "secret123");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("secret123"));
        assert!(!debug.contains("key123"));
    }

    #[test]
    fn test_credentials_secret_accessors_agree() {
        let creds = Credentials::new("key123", "secret123");
        assert_eq!(creds.api_secret(), "secret123");
        assert_eq!(creds.secret_bytes(), b"secret123");
    }
}
