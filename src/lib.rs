// MIT License

//! # cip-xpanel
//!
//! Direct TCP/IP communication with Crestron control processors using the
//! CIP protocol, registering as a virtual touch panel (XPanel).
//!
//! The library handles the TCP framing, the registration handshake, the
//! heartbeat cadence, the end-of-query update handshake, digital/analog/
//! serial join encoding with its bit-packing quirks, subscription
//! dispatch, and automatic reconnection. No external dependencies beyond
//! tokio, thiserror, tracing, and bytes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cip_xpanel::{CipConfig, SignalType, XpanelClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CipConfig::builder()
//!         .host("192.168.1.50")
//!         .ipid(0x03)
//!         .build();
//!
//!     let mut panel = XpanelClient::new(config);
//!
//!     panel.subscribe(SignalType::Digital, 1, |signal_type, join, value| {
//!         println!("{}{} = {}", signal_type, join, value);
//!     });
//!
//!     panel.connect(true).await?;
//!
//!     // Once registered, drive joins back to the processor.
//!     // panel.pulse(1)?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     panel.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod comm;
pub mod config;
pub mod constants;
pub mod error;
pub mod framing;
pub mod panel;
pub mod registry;
pub mod signal;

// Re-exports for convenience
pub use codec::{InboundMessage, UpdateKind};
pub use config::{CipConfig, CipConfigBuilder, ConnectionStateCallback, DebugLevel, RegistrationCallback};
pub use error::{CipError, Result};
pub use framing::{Frame, FrameBuffer};
pub use panel::XpanelClient;
pub use registry::{SignalCallback, SubscriptionRegistry};
pub use signal::{ConnectionState, SignalType, SignalValue};
