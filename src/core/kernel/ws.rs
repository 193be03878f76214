use crate::core::errors::ExchangeError;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument, trace, warn};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsWriter = SplitSink<WsStream, Message>;
pub type WsReader = SplitStream<WsStream>;

/// WebSocket session configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Deadline for the opening handshake in milliseconds
    pub connect_timeout_ms: u64,
    /// How long `close()` waits for the receive loop to drain in milliseconds
    pub close_timeout_ms: u64,
    /// Upper bound on frames being dispatched concurrently.
    /// Read through `max_in_flight_dispatch()`, which keeps it in range.
    max_in_flight_dispatch: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000, // 10 seconds
            close_timeout_ms: 3_000,
            max_in_flight_dispatch: 1024,
        }
    }
}

impl WsConfig {
    /// Set the handshake deadline
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set how long `close()` waits before aborting the receive loop
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Bound the number of concurrently dispatched frames, clamped to
    /// `1..=Semaphore::MAX_PERMITS`
    pub fn with_max_in_flight_dispatch(mut self, limit: usize) -> Self {
        self.max_in_flight_dispatch = clamp_dispatch_limit(limit);
        self
    }

    pub fn max_in_flight_dispatch(&self) -> usize {
        clamp_dispatch_limit(self.max_in_flight_dispatch)
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub const fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

// Zero permits would stall the receive loop; more than MAX_PERMITS panics in Semaphore::new
fn clamp_dispatch_limit(limit: usize) -> usize {
    limit.clamp(1, Semaphore::MAX_PERMITS)
}

/// Lifecycle of a WebSocket session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl SessionState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Session state shared between the session handle and its receive loop
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: SessionState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// Receives every text frame read off the connection
pub trait FrameHandler: Send + Sync + 'static {
    fn handle_frame(&self, frame: &str);
}

/// Dial `url`, failing with `ConnectionTimeout` if the handshake outlasts the
/// configured deadline.
#[instrument(skip(config), fields(timeout_ms = config.connect_timeout_ms))]
pub async fn dial(url: &str, config: &WsConfig) -> Result<WsStream, ExchangeError> {
    let connect_timeout = config.connect_timeout();

    let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(url))
        .await
        .map_err(|_| {
            ExchangeError::ConnectionTimeout(format!(
                "handshake with {} did not complete within {:?}",
                url, connect_timeout
            ))
        })?
        .map_err(|e| ExchangeError::ConnectError(format!("{}: {}", url, e)))?;

    debug!("WebSocket connected");
    Ok(ws_stream)
}

/// Spawn the receive loop for one connection.
///
/// Each text frame is handed to `handler` on its own blocking task so a slow
/// callback never holds up the next read. At most `limit` frames are in flight;
/// once that many are running the loop stops reading until one finishes.
/// The loop ends when the stream errors or closes, leaving `state` at `Closed`.
pub fn spawn_receive_loop<H: FrameHandler>(
    mut reader: WsReader,
    handler: Arc<H>,
    limit: Arc<Semaphore>,
    state: Arc<StateCell>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = reader.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
                        break;
                    };
                    let handler = Arc::clone(&handler);
                    tokio::task::spawn_blocking(move || {
                        handler.handle_frame(&text);
                        drop(permit);
                    });
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Close frame received");
                }
                Ok(other) => {
                    trace!("Ignoring non-text frame: {:?}", other);
                }
                Err(e) => {
                    warn!("WebSocket read failed, ending receive loop: {}", e);
                    break;
                }
            }
        }

        state.set(SessionState::Closed);
        debug!("Receive loop finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cell_transitions() {
        let cell = StateCell::new(SessionState::Connecting);
        assert_eq!(cell.get(), SessionState::Connecting);

        for state in [
            SessionState::Open,
            SessionState::Closing,
            SessionState::Closed,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn test_config_setters() {
        let config = WsConfig::default()
            .with_connect_timeout(Duration::from_millis(250))
            .with_close_timeout(Duration::from_secs(1))
            .with_max_in_flight_dispatch(0);

        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.close_timeout(), Duration::from_secs(1));
        assert_eq!(config.max_in_flight_dispatch(), 1);
    }

    #[test]
    fn test_dispatch_limit_is_clamped_to_semaphore_range() {
        let config = WsConfig::default().with_max_in_flight_dispatch(usize::MAX);
        assert_eq!(config.max_in_flight_dispatch(), Semaphore::MAX_PERMITS);

        // Builds without panicking
        let limit = Semaphore::new(config.max_in_flight_dispatch());
        assert_eq!(limit.available_permits(), Semaphore::MAX_PERMITS);

        assert_eq!(WsConfig::default().max_in_flight_dispatch(), 1024);
    }

    #[test]
    fn test_zero_dispatch_limit_still_admits_frames() {
        let config = WsConfig {
            max_in_flight_dispatch: 0,
            ..WsConfig::default()
        };
        let limit = Semaphore::new(config.max_in_flight_dispatch());
        assert!(limit.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_dial_invalid_url_is_connect_error() {
        let err = dial("invalid://url", &WsConfig::default()).await.unwrap_err();
        assert!(matches!(err, ExchangeError::ConnectError(_)));
        assert!(!err.is_timeout());
    }

    #[tokio::test]
    async fn test_dial_empty_url_is_connect_error() {
        let err = dial("", &WsConfig::default()).await.unwrap_err();
        assert!(matches!(err, ExchangeError::ConnectError(_)));
    }
}
