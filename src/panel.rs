// MIT License

use std::sync::Arc;

use crate::codec;
use crate::comm::CipComm;
use crate::config::CipConfig;
use crate::constants::UPDATE_REQUEST_FRAME;
use crate::error::Result;
use crate::signal::{ConnectionState, SignalType, SignalValue};

/// A virtual touch panel: the main public API for talking to a Crestron
/// control processor over CIP.
///
/// # Example
///
/// ```no_run
/// use cip_xpanel::{CipConfig, SignalType, XpanelClient};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = CipConfig::builder()
///         .host("192.168.1.50")
///         .ipid(0x03)
///         .build();
///
///     let mut panel = XpanelClient::new(config);
///
///     // Subscribe before connecting to observe the initial join burst.
///     panel.subscribe_digital(1, |high| {
///         println!("digital 1 is now {}", high);
///     });
///     panel.subscribe_analog(2, |value| {
///         println!("analog 2 is now {}", value);
///     });
///
///     panel.connect(true).await?;
///
///     tokio::signal::ctrl_c().await?;
///     panel.disconnect().await;
///     Ok(())
/// }
/// ```
pub struct XpanelClient {
    comm: CipComm,
}

impl XpanelClient {
    /// Create a disconnected client with an empty subscription registry.
    pub fn new(config: CipConfig) -> Self {
        Self {
            comm: CipComm::new(config),
        }
    }

    /// Start connecting to the processor. Returns immediately; the
    /// registration handshake runs in the background and progress is
    /// observable through [`connection_state`](Self::connection_state),
    /// [`registered`](Self::registered) and the configured callbacks.
    ///
    /// With `auto_reconnect` the engine re-establishes the session after
    /// transport failures, except after the processor reports that the
    /// configured IPID does not exist.
    pub async fn connect(&mut self, auto_reconnect: bool) -> Result<()> {
        self.comm.connect(auto_reconnect).await
    }

    /// Disconnect and disable auto-reconnect. Cancels all timers and
    /// pending writes.
    pub async fn disconnect(&mut self) {
        self.comm.disconnect().await;
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.comm.connection_state()
    }

    /// Whether the registration handshake has completed for the current
    /// session.
    pub fn registered(&self) -> bool {
        self.comm.registered()
    }

    /// Observe a join. Callbacks for the same key fire in subscription
    /// order; subscriptions cannot be removed. Subscribing before
    /// `connect` guarantees the observer sees the initial burst of joins
    /// the processor emits on registration.
    pub fn subscribe<F>(&self, signal_type: SignalType, join: u16, callback: F)
    where
        F: Fn(SignalType, u16, &SignalValue) + Send + Sync + 'static,
    {
        self.comm.subscribe(signal_type, join, Arc::new(callback));
    }

    /// Observe a digital join as a plain `bool`.
    pub fn subscribe_digital<F>(&self, join: u16, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.subscribe(SignalType::Digital, join, move |_, _, value| {
            if let Some(high) = value.as_bool() {
                callback(high);
            }
        });
    }

    /// Observe an analog join as a plain `u16`.
    pub fn subscribe_analog<F>(&self, join: u16, callback: F)
    where
        F: Fn(u16) + Send + Sync + 'static,
    {
        self.subscribe(SignalType::Analog, join, move |_, _, value| {
            if let Some(v) = value.as_u16() {
                callback(v);
            }
        });
    }

    /// Observe a serial join as text.
    pub fn subscribe_serial<F>(&self, join: u16, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(SignalType::Serial, join, move |_, _, value| {
            if let Some(text) = value.as_str() {
                callback(text);
            }
        });
    }

    /// Drive a digital join high or low. `button_style` selects the
    /// momentary encoding used for push-button presses.
    pub fn set_digital_join(&self, join: u16, high: bool, button_style: bool) -> Result<()> {
        let frame = codec::encode_digital(join, high, button_style)?;
        self.comm.send_frames("digital join", vec![frame])
    }

    /// Push a button-style digital join high.
    pub fn press(&self, join: u16) -> Result<()> {
        let frame = codec::encode_digital(join, true, true)?;
        self.comm.send_frames("press", vec![frame])
    }

    /// Release a button-style digital join.
    pub fn release(&self, join: u16) -> Result<()> {
        let frame = codec::encode_digital(join, false, true)?;
        self.comm.send_frames("release", vec![frame])
    }

    /// Press immediately followed by release. The two frames share one
    /// queue entry, so they reach the wire adjacent and paced.
    pub fn pulse(&self, join: u16) -> Result<()> {
        let press = codec::encode_digital(join, true, true)?;
        let release = codec::encode_digital(join, false, true)?;
        self.comm.send_frames("pulse", vec![press, release])
    }

    /// Set an analog join to a 16-bit value.
    pub fn set_analog(&self, join: u16, value: u16) -> Result<()> {
        let frame = codec::encode_analog(join, value)?;
        self.comm.send_frames("analog join", vec![frame])
    }

    /// Send ASCII text on a serial join (1-255 bytes).
    pub fn send_serial(&self, join: u16, text: &str) -> Result<()> {
        let frame = codec::encode_serial(join, text)?;
        self.comm.send_frames("serial join", vec![frame])
    }

    /// Ask the processor to re-broadcast the current value of every join.
    pub fn send_update_request(&self) -> Result<()> {
        self.comm
            .send_frames("update request", vec![UPDATE_REQUEST_FRAME.to_vec()])
    }
}
