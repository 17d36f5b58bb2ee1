//! Serial port source for live odometer streams.
//!
//! Requires the `serial` feature:
//!
//! ```toml
//! [dependencies]
//! nav-driver-odometer = { path = "../nav-driver-odometer", features = ["serial"] }
//! ```
//!
//! Serial settings come from the same `[streams.config]` table as the
//! calibration; unknown keys are ignored by each reader.
//!
//! ```toml
//! [streams.config]
//! wheel_radius_m = 0.5
//! format = "Pulse"
//! baud_rate = 115200
//! ```

use anyhow::Context;
use serde::Deserialize;
use tokio::task::spawn_blocking;
use tokio_serial::SerialPortBuilderExt;

/// Baud rate used when the stream config does not set one.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial settings of an odometer stream.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SerialSettings {
    /// Line speed
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl SerialSettings {
    /// Reads the serial keys of a stream `config` table.
    ///
    /// # Errors
    ///
    /// Returns an error if `baud_rate` is present but not an unsigned integer.
    pub fn from_value(value: &toml::Value) -> anyhow::Result<Self> {
        value
            .clone()
            .try_into()
            .context("Invalid serial settings in stream config")
    }
}

/// Opens a serial port (8N1, no flow control) without blocking the runtime.
///
/// # Errors
///
/// Returns an error if the port cannot be opened or `spawn_blocking` fails.
pub async fn open_serial_async(
    port_path: &str,
    baud_rate: u32,
) -> anyhow::Result<tokio_serial::SerialStream> {
    let port_path_owned = port_path.to_string();
    tracing::info!(port = %port_path, baud_rate, "Opening odometer serial port");

    spawn_blocking(move || {
        tokio_serial::new(&port_path_owned, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .context(format!("Failed to open odometer serial port: {}", port_path_owned))
    })
    .await
    .context("spawn_blocking for serial port opening failed")?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baud_rate_defaults() {
        let value: toml::Value = toml::from_str("wheel_radius_m = 0.5\nformat = \"Pulse\"\n").unwrap();
        assert_eq!(SerialSettings::from_value(&value).unwrap().baud_rate, DEFAULT_BAUD_RATE);
    }

    #[test]
    fn baud_rate_from_config() {
        let value: toml::Value = toml::from_str("baud_rate = 9600\n").unwrap();
        assert_eq!(SerialSettings::from_value(&value).unwrap().baud_rate, 9600);
    }

    #[tokio::test]
    async fn missing_port_is_an_error() {
        let err = open_serial_async("/dev/nonexistent-odometer-port", 9600)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nonexistent-odometer-port"));
    }
}
