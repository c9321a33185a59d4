// MIT License

use std::fmt;
use std::sync::Arc;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_PORT,
    DEFAULT_RECONNECT_DELAY_MS, DEFAULT_RETRY_DELAY_MS, DEFAULT_WRITE_TIMEOUT_MS,
};
use crate::signal::ConnectionState;

/// How much the engine reports through `tracing`.
///
/// `Off` silences all output, `Low` emits lifecycle and errors, `Moderate`
/// adds a line per event, `High` additionally hex-dumps every inbound and
/// outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Off,
    Low,
    Moderate,
    High,
}

/// Invoked on every connection-state transition.
pub type ConnectionStateCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;
/// Invoked on every registration change.
pub type RegistrationCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Configuration for connecting to a control processor. Immutable once the
/// engine is created.
#[derive(Clone)]
pub struct CipConfig {
    /// Processor host name or IP address.
    pub host: String,
    /// Processor CIP port (default: 41794).
    pub port: u16,
    /// The virtual panel identity to register as. Must match an XPanel
    /// slot in the processor's program.
    pub ipid: u8,
    /// Logging verbosity.
    pub debug: DebugLevel,
    /// Keep retrying even after the processor reports that the IPID does
    /// not exist. Off by default: a rejected IPID is a configuration
    /// error, and retrying loops forever against the same refusal.
    pub reconnect_on_ipid_rejection: bool,
    /// Heartbeat cadence while registered (default: 15000).
    pub heartbeat_interval_ms: u64,
    /// TCP connect timeout (default: 2000).
    pub connect_timeout_ms: u64,
    /// Delay before re-attempting a failed connect (default: 2000).
    pub retry_delay_ms: u64,
    /// Delay before reconnecting after an established session drops
    /// (default: 1000).
    pub reconnect_delay_ms: u64,
    /// Timeout for an individual socket write (default: 2000).
    pub write_timeout_ms: u64,
    /// Observer for connection-state transitions.
    pub on_connection_change: Option<ConnectionStateCallback>,
    /// Observer for registration changes.
    pub on_registration_change: Option<RegistrationCallback>,
}

impl Default for CipConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            ipid: 0x03,
            debug: DebugLevel::Low,
            reconnect_on_ipid_rejection: false,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            on_connection_change: None,
            on_registration_change: None,
        }
    }
}

impl fmt::Debug for CipConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ipid", &format_args!("0x{:02X}", self.ipid))
            .field("debug", &self.debug)
            .field("reconnect_on_ipid_rejection", &self.reconnect_on_ipid_rejection)
            .field("heartbeat_interval_ms", &self.heartbeat_interval_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("write_timeout_ms", &self.write_timeout_ms)
            .field("on_connection_change", &self.on_connection_change.is_some())
            .field("on_registration_change", &self.on_registration_change.is_some())
            .finish()
    }
}

impl CipConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> CipConfigBuilder {
        CipConfigBuilder::default()
    }
}

/// Builder for [`CipConfig`].
#[derive(Clone, Default)]
pub struct CipConfigBuilder {
    config: CipConfig,
}

impl CipConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn ipid(mut self, ipid: u8) -> Self {
        self.config.ipid = ipid;
        self
    }

    pub fn debug(mut self, level: DebugLevel) -> Self {
        self.config.debug = level;
        self
    }

    pub fn reconnect_on_ipid_rejection(mut self, enabled: bool) -> Self {
        self.config.reconnect_on_ipid_rejection = enabled;
        self
    }

    pub fn heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.config.heartbeat_interval_ms = ms;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_delay_ms = ms;
        self
    }

    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn on_connection_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.config.on_connection_change = Some(Arc::new(callback));
        self
    }

    pub fn on_registration_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.config.on_registration_change = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> CipConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CipConfig::default();
        assert_eq!(config.port, 41794);
        assert_eq!(config.heartbeat_interval_ms, 15_000);
        assert_eq!(config.connect_timeout_ms, 2_000);
        assert_eq!(config.retry_delay_ms, 2_000);
        assert_eq!(config.reconnect_delay_ms, 1_000);
        assert!(!config.reconnect_on_ipid_rejection);
        assert!(config.on_connection_change.is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = CipConfig::builder()
            .host("10.0.0.50")
            .port(41795)
            .ipid(0x0A)
            .debug(DebugLevel::High)
            .heartbeat_interval_ms(5_000)
            .on_connection_change(|_| {})
            .build();

        assert_eq!(config.host, "10.0.0.50");
        assert_eq!(config.port, 41795);
        assert_eq!(config.ipid, 0x0A);
        assert_eq!(config.debug, DebugLevel::High);
        assert_eq!(config.heartbeat_interval_ms, 5_000);
        assert!(config.on_connection_change.is_some());
    }

    #[test]
    fn debug_levels_are_ordered() {
        assert!(DebugLevel::Off < DebugLevel::Low);
        assert!(DebugLevel::Low < DebugLevel::Moderate);
        assert!(DebugLevel::Moderate < DebugLevel::High);
    }
}
