//! PeakTech 4115 Arbitrary Waveform Generator Driver
//!
//! Reference: PeakTech 4115 / 4120 series programming notes
//!
//! Protocol Overview:
//! - Format: ASCII command/response over RS-232 (USB bridge)
//! - Baud: 9600 (default), 8N1, no flow control
//! - Command terminator: LF (\n)
//! - Response terminator: NONE. The device sends replies without any line
//!   ending, so a query flushes stale receive data, writes, waits a fixed
//!   200 ms settle interval, and then takes whatever bytes arrived.
//! - Channel subsystem prefixes: `:SOUR{n}` (source), `:OUTP{n}` (output)
//! - Commands: `*RST`, `*CLS`, `:DISP ON|OFF`, `:POL INV|NORM`, `:SYST:LOC`
//! - Queries: `:SYST:ERR?`, `:DISP?`, `:POL?`, `:FREQ?`
//!
//! The display query reports `1`/`0` as well as `ON`/`OFF`, while setting
//! only accepts `ON`/`OFF`; the token tables below make that asymmetry
//! explicit.

use anyhow::{Context, Result};
use async_trait::async_trait;
use awg_core::capabilities::{DisplayControl, LocalControl, StatusControl};
use awg_core::error::AwgError;
use awg_core::scpi::{BoolTokens, ReplyFraming, ScpiInterface};
use awg_core::serial::{open_serial, wrap_shared, SharedPort};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

/// Number of output channels on the PT4115.
pub const CHANNEL_COUNT: usize = 2;

/// Fixed post-write settle interval; the device provides no reply terminator
/// the client could block on.
pub const SETTLE_DELAY: Duration = Duration::from_millis(200);

const DEVICE_NAME: &str = "PT4115";

fn default_baud_rate() -> u32 {
    9600
}

fn default_channels() -> usize {
    CHANNEL_COUNT
}

/// Display state tokens: set with `ON`/`OFF`, reported as `ON`/`1` and
/// `OFF`/`0`.
static DISPLAY_TOKENS: BoolTokens =
    BoolTokens::with_replies("ON", "OFF", &["ON", "1"], &["OFF", "0"]);

/// Polarity tokens: `INV` maps to inverted (`true`), `NORM` to normal.
static POLARITY_TOKENS: BoolTokens = BoolTokens::symmetric("INV", "NORM");

/// Configuration for the PT4115 driver.
#[derive(Debug, Clone, Deserialize)]
pub struct Pt4115Config {
    /// Serial port path (e.g. "/dev/ttyUSB0") or resolver hint.
    pub port: String,
    /// Baud rate (default: 9600).
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Number of output channels (default: 2).
    #[serde(default = "default_channels")]
    pub channels: usize,
}

/// One output channel of the PT4115.
///
/// Owns two dispatchers on the shared port, one per channel subsystem:
/// `:SOUR{n}` for source settings and `:OUTP{n}` for output settings.
pub struct Pt4115Channel {
    index: usize,
    source: ScpiInterface,
    output: ScpiInterface,
}

impl Pt4115Channel {
    fn new(index: usize, port: SharedPort, settle: Duration) -> Self {
        let framing = ReplyFraming::Settle { delay: settle };
        Self {
            index,
            source: ScpiInterface::new(port.clone(), format!(":SOUR{}", index), framing),
            output: ScpiInterface::new(port, format!(":OUTP{}", index), framing),
        }
    }

    /// Channel number, starting at 1.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the channel polarity is inverted.
    #[instrument(skip(self), fields(channel = self.index), err)]
    pub async fn inversion(&self) -> Result<bool> {
        Ok(self.output.query_bool(":POL", &POLARITY_TOKENS).await?)
    }

    /// Set the channel polarity: `true` mirrors the output at the time axis.
    #[instrument(skip(self), fields(channel = self.index, inverted), err)]
    pub async fn set_inversion(&self, inverted: bool) -> Result<()> {
        Ok(self
            .output
            .set_bool(":POL", &POLARITY_TOKENS, inverted)
            .await?)
    }

    /// Set the polarity from untyped text (CLI/scripting boundary).
    ///
    /// `None` and non-boolean text fail with the respective usage error and
    /// write nothing to the transport.
    pub async fn set_inversion_from_text(&self, value: Option<&str>) -> Result<()> {
        let device = format!("{} channel {}", DEVICE_NAME, self.index);
        Ok(self
            .output
            .set_bool_from_text(":POL", &POLARITY_TOKENS, &device, "inversion", value)
            .await?)
    }

    /// Query the output frequency in Hz.
    #[instrument(skip(self), fields(channel = self.index), err)]
    pub async fn frequency(&self) -> Result<f64> {
        let reply = self.source.ask(":FREQ?").await?;
        let value = reply
            .split_whitespace()
            .next_back()
            .unwrap_or(&reply)
            .parse::<f64>()
            .map_err(|_| AwgError::MalformedReply {
                command: ":FREQ?".to_string(),
                reply: reply.clone(),
                expected: "a frequency in Hz",
            })?;
        Ok(value)
    }

    /// Set the output frequency in Hz. One write, no read.
    #[instrument(skip(self), fields(channel = self.index, hz), err)]
    pub async fn set_frequency(&self, hz: f64) -> Result<()> {
        self.source
            .write(&format!(":FREQ {}", hz))
            .await
            .context("Failed to set frequency")?;
        Ok(())
    }
}

/// Driver for the PeakTech 4115 arbitrary waveform generator.
///
/// The 4115 answers no identification query, so construction performs no
/// probe; the first real command will surface a wrong port. The device owns
/// the transport: dropping it (or calling [`Pt4115::close`]) closes the
/// serial connection exactly once.
pub struct Pt4115 {
    iface: ScpiInterface,
    channels: Vec<Pt4115Channel>,
}

impl Pt4115 {
    /// Build a device on an already-resolved transport.
    ///
    /// This is the core construction contract; [`Pt4115::new_async`] is a
    /// convenience wrapper that opens the serial port first. `channels` is
    /// the number of physical outputs, fixed at construction.
    pub fn with_port(port: SharedPort, channels: usize) -> Self {
        Self::with_port_and_settle(port, channels, SETTLE_DELAY)
    }

    fn with_port_and_settle(port: SharedPort, channels: usize, settle: Duration) -> Self {
        let framing = ReplyFraming::Settle { delay: settle };
        let iface = ScpiInterface::new(port.clone(), "", framing);
        let channels = (1..=channels)
            .map(|n| Pt4115Channel::new(n, port.clone(), settle))
            .collect();
        Self { iface, channels }
    }

    /// Open a serial port at the default baud rate (9600).
    pub async fn new_async(port_path: &str) -> Result<Self> {
        let port = open_serial(port_path, default_baud_rate(), DEVICE_NAME).await?;
        Ok(Self::with_port(
            wrap_shared(Box::new(port)),
            CHANNEL_COUNT,
        ))
    }

    /// Open a device from a TOML configuration table.
    pub async fn from_config(config: toml::Value) -> Result<Self> {
        let cfg: Pt4115Config = config.try_into().context("Invalid PT4115 config")?;
        let port = open_serial(&cfg.port, cfg.baud_rate, DEVICE_NAME).await?;
        Ok(Self::with_port(wrap_shared(Box::new(port)), cfg.channels))
    }

    /// All output channels, ordered by channel number.
    pub fn channels(&self) -> &[Pt4115Channel] {
        &self.channels
    }

    /// Look up a channel by its 1-based number.
    pub fn channel(&self, number: usize) -> Option<&Pt4115Channel> {
        number.checked_sub(1).and_then(|i| self.channels.get(i))
    }

    /// Set the display state from untyped text (CLI/scripting boundary).
    pub async fn set_display_from_text(&self, value: Option<&str>) -> Result<()> {
        Ok(self
            .iface
            .set_bool_from_text(":DISP", &DISPLAY_TOKENS, DEVICE_NAME, "display", value)
            .await?)
    }

    /// Release the instrument.
    ///
    /// Consumes the device, dropping the last references to the serial port;
    /// the transport is closed exactly once, here.
    pub fn close(self) {}
}

#[async_trait]
impl StatusControl for Pt4115 {
    async fn reset(&self) -> Result<()> {
        Ok(self.iface.write("*RST").await?)
    }

    async fn clear_error(&self) -> Result<()> {
        Ok(self.iface.write("*CLS").await?)
    }

    async fn errors(&self) -> Result<String> {
        Ok(self.iface.ask(":SYST:ERR?").await?)
    }
}

#[async_trait]
impl DisplayControl for Pt4115 {
    async fn display(&self) -> Result<bool> {
        Ok(self.iface.query_bool(":DISP", &DISPLAY_TOKENS).await?)
    }

    async fn set_display(&self, on: bool) -> Result<()> {
        Ok(self.iface.set_bool(":DISP", &DISPLAY_TOKENS, on).await?)
    }
}

#[async_trait]
impl LocalControl for Pt4115 {
    async fn unlock(&self) -> Result<()> {
        Ok(self.iface.write(":SYST:LOC").await?)
    }
}
