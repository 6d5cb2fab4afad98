use std::time::Duration;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a client connects and how patient it is.
///
/// ```
/// use std::time::Duration;
/// use matatena_client::ClientConfig;
///
/// let config = ClientConfig::new("http://localhost:8000", "ws://localhost:9003", "token")
///     .with_poll_interval(Duration::from_secs(1))
///     .with_reconnect_attempts(3);
/// assert_eq!(config.reconnect_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub rest_url: String,
    pub ws_url: String,
    pub token: String,
    pub poll_interval: Duration,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub handshake_timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        rest_url: impl Into<String>,
        ws_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        ClientConfig {
            rest_url: rest_url.into().trim_end_matches('/').to_string(),
            ws_url: ws_url.into(),
            token: token.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new("http://h/", "ws://h", "t");
        assert_eq!(config.rest_url, "http://h");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_secs(3));
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
    }
}
