//! Monitor keyer events.
//!
//! Opens host mode and prints every event as it arrives: status bytes,
//! speed pot movement, paddle echo, and register changes. Squeeze the
//! paddles or turn the speed knob to generate traffic.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p wk3lib --example monitor_events -- /dev/ttyUSB0
//! ```

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use wk3lib::{KeyerBuilder, KeyerEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let serial_port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    println!("Connecting to WK3 on {}...", serial_port);

    let keyer = KeyerBuilder::new()
        .serial_port(&serial_port)
        .baud_rate(1200)
        .build()
        .await?;

    let mut events = keyer.subscribe();
    keyer.enter_host_mode().await?;
    println!("Monitoring for 60 seconds...\n");

    let start = tokio::time::Instant::now();
    let deadline = start + Duration::from_secs(60);

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, events.recv()).await {
            Ok(Ok(event)) => {
                let elapsed = start.elapsed();
                let timestamp = format!("{:>6}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis());

                match event {
                    KeyerEvent::Log { category, message } => {
                        println!("{} [{:<12}] {}", timestamp, category, message);
                    }
                    KeyerEvent::DisplayChar(c) => {
                        println!("{} DisplayChar      {:?}", timestamp, c);
                    }
                    KeyerEvent::HostModeChanged { active } => {
                        println!("{} HostModeChanged  -> {}", timestamp, active);
                    }
                    KeyerEvent::RegistersChanged { mode, pin_config } => {
                        println!(
                            "{} RegistersChanged mode {} pin config {}",
                            timestamp, mode, pin_config
                        );
                    }
                    KeyerEvent::StatusReceived { status, solicited } => {
                        println!(
                            "{} StatusReceived   0x{:02X} {}{}",
                            timestamp,
                            status.raw(),
                            status,
                            if solicited { " (requested)" } else { "" }
                        );
                    }
                    KeyerEvent::SpeedPotChanged { value } => {
                        println!("{} SpeedPotChanged  {}/63", timestamp, value);
                    }
                    KeyerEvent::RevisionCode { code } => {
                        println!("{} RevisionCode     {}", timestamp, code);
                    }
                    KeyerEvent::Disconnected => {
                        println!("{} Disconnected", timestamp);
                        break;
                    }
                    other => println!("{} {:?}", timestamp, other),
                }
            }
            Ok(Err(RecvError::Lagged(n))) => {
                println!("(missed {} events due to lag)", n);
            }
            Ok(Err(RecvError::Closed)) => {
                println!("Event channel closed.");
                break;
            }
            Err(_) => break,
        }
    }

    keyer.exit_host_mode().await?;
    keyer.disconnect().await?;
    println!("\nMonitoring complete.");
    Ok(())
}
