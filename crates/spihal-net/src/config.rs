use std::time::Duration;

use serde::{Deserialize, Serialize};
use spihal_transport::Endpoint;

/// Where a slot finds its peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EndpointSource {
    /// Read `HAL_SPI_SOCKET_HOST` / `HAL_SPI_SOCKET_PORT` at each `init`,
    /// defaulting to `127.0.0.1:9000`.
    #[default]
    Environment,
    /// Always use this endpoint.
    Fixed(Endpoint),
}

impl EndpointSource {
    pub fn resolve(&self) -> spihal_transport::Result<Endpoint> {
        match self {
            EndpointSource::Environment => Endpoint::from_env(),
            EndpointSource::Fixed(endpoint) => Ok(endpoint.clone()),
        }
    }
}

/// Connection retry settings.
///
/// Carried for peers that expect them; the connect path makes a single
/// attempt per resolved address and does not consult this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub count: u32,
    #[serde(with = "millis")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            count: 3,
            delay: Duration::from_millis(1000),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Configuration for [`SocketBackend`](crate::SocketBackend).
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Peer endpoint, resolved once per `init`.
    pub endpoint: EndpointSource,
    /// Accept a response only when its kind is `Response` and its sequence
    /// matches the pending request. Off by default: the first complete frame
    /// is taken as the answer.
    pub strict_correlation: bool,
    /// Bound on each connect attempt. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Bound on writing one request.
    pub write_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointSource::Environment,
            strict_correlation: false,
            connect_timeout: Some(Duration::from_secs(2)),
            write_timeout: Some(Duration::from_secs(5)),
            retry: RetryPolicy::default(),
        }
    }
}

impl SocketConfig {
    /// Default configuration pinned to `endpoint`.
    pub fn fixed(endpoint: Endpoint) -> Self {
        Self {
            endpoint: EndpointSource::Fixed(endpoint),
            ..Self::default()
        }
    }

    pub fn strict(mut self, strict_correlation: bool) -> Self {
        self.strict_correlation = strict_correlation;
        self
    }
}
