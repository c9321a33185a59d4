//! Example: Drive joins on the processor once registered.

use std::time::Duration;

use cip_xpanel::{CipConfig, ConnectionState, XpanelClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let host = std::env::args().nth(1).unwrap_or_else(|| "192.168.1.50".to_string());

    let config = CipConfig::builder().host(host).ipid(0x03).build();
    let mut panel = XpanelClient::new(config);
    panel.connect(true).await?;

    // Wait for the registration handshake to finish.
    while !panel.registered() {
        if panel.connection_state() == ConnectionState::Disconnected {
            anyhow::bail!("connection failed");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!("Registered. Driving joins...");

    // Momentary button press on digital join 1.
    panel.pulse(1)?;

    // Slider on analog join 2.
    for value in [0u16, 16384, 32768, 49152, 65535] {
        panel.set_analog(2, value)?;
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    // Text on serial join 1.
    panel.send_serial(1, "hello from cip-xpanel")?;

    // Ask the processor to re-broadcast everything.
    panel.send_update_request()?;

    tokio::time::sleep(Duration::from_secs(1)).await;
    panel.disconnect().await;
    Ok(())
}
