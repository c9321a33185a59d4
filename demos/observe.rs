//! Example: Register as an XPanel and print every observed join change.

use cip_xpanel::{CipConfig, DebugLevel, SignalType, XpanelClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let host = std::env::args().nth(1).unwrap_or_else(|| "192.168.1.50".to_string());

    let config = CipConfig::builder()
        .host(host)
        .ipid(0x03)
        .debug(DebugLevel::Moderate)
        .on_connection_change(|state| println!("connection: {state}"))
        .on_registration_change(|registered| println!("registered: {registered}"))
        .build();

    let mut panel = XpanelClient::new(config);

    // Watch the first 20 joins of each type.
    for join in 1..=20 {
        panel.subscribe(SignalType::Digital, join, |t, join, value| {
            println!("  {t}{join} = {value}");
        });
        panel.subscribe(SignalType::Analog, join, |t, join, value| {
            println!("  {t}{join} = {value}");
        });
        panel.subscribe(SignalType::Serial, join, |t, join, value| {
            println!("  {t}{join} = {value}");
        });
    }

    println!("Connecting...");
    panel.connect(true).await?;

    println!("Press Ctrl+C to disconnect...");
    tokio::signal::ctrl_c().await?;
    panel.disconnect().await;
    println!("Disconnected.");

    Ok(())
}
