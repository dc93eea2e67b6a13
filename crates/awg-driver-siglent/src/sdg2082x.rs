//! Siglent SDG2082X Arbitrary Waveform Generator Driver
//!
//! Reference: SDG Series Programming Guide
//!
//! Protocol Overview:
//! - Format: ASCII command/response, serial over USB
//! - Command terminator: LF (\n)
//! - Response terminator: LF (\n)
//! - Channel subsystem prefixes: `:C1`, `:C2`
//! - Commands: `*RST`, `*CLS`, `:ARWV INDEX,{n}`
//! - Queries: `*IDN?`, `:SYST:ERR?`, `:ARWV?`, `:STL? BUILDIN`, `:STL? USER`
//!
//! The stored-waveform catalog queries answer with comma-separated
//! `M{index}, {name}` pairs; an empty catalog is reported with a bare
//! sentinel token instead of a list, which this driver passes through
//! unparsed.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use awg_core::capabilities::{Identification, StatusControl};
use awg_core::error::AwgError;
use awg_core::scpi::{ReplyFraming, ScpiInterface};
use awg_core::serial::{open_serial, wrap_shared, SharedPort};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

/// Number of output channels on the SDG2082X.
pub const CHANNEL_COUNT: usize = 2;

const DEVICE_NAME: &str = "SDG2082X";

fn default_baud_rate() -> u32 {
    115200
}

/// Configuration for the SDG2082X driver.
#[derive(Debug, Clone, Deserialize)]
pub struct Sdg2082xConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0") or resolver hint.
    pub port: String,
    /// Baud rate of the USB-serial bridge (default: 115200).
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Optional custom read timeout in seconds (default: 5).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// One entry of the stored-waveform catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformEntry {
    /// Numeric catalog index (the `M{n}` tag).
    pub index: u32,
    /// Waveform name as reported by the instrument.
    pub name: String,
}

/// Result of a `:STL? BUILDIN` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltinWaveforms {
    /// The instrument reported an empty catalog; the raw sentinel reply is
    /// preserved unparsed.
    Empty(String),
    /// Catalog entries, sorted by index.
    Entries(Vec<WaveformEntry>),
}

/// Result of a `:STL? USER` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserWaveforms {
    /// Empty-catalog sentinel reply, preserved unparsed.
    Empty(String),
    /// Names of user-uploaded waveforms.
    Names(Vec<String>),
}

/// One output channel of the SDG2082X.
///
/// Owns a dispatcher scoped to the `:C{n}` subsystem of the shared port.
pub struct SdgChannel {
    index: usize,
    iface: ScpiInterface,
}

impl SdgChannel {
    fn new(index: usize, port: SharedPort, timeout: Duration) -> Self {
        Self {
            index,
            iface: ScpiInterface::new(port, format!(":C{}", index), ReplyFraming::Line)
                .with_timeout(timeout),
        }
    }

    /// Channel number, starting at 1.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Query the catalog index of the currently active waveform.
    ///
    /// The `:ARWV?` reply is a comma-separated composite; the index is its
    /// second field.
    #[instrument(skip(self), fields(channel = self.index), err)]
    pub async fn waveform_index(&self) -> Result<u32> {
        let reply = self.iface.ask(":ARWV?").await?;
        let field = reply
            .split(',')
            .nth(1)
            .ok_or_else(|| AwgError::MalformedReply {
                command: ":ARWV?".to_string(),
                reply: reply.clone(),
                expected: "at least two comma-separated fields",
            })?;
        let index = field
            .trim()
            .parse::<u32>()
            .map_err(|_| AwgError::MalformedReply {
                command: ":ARWV?".to_string(),
                reply: reply.clone(),
                expected: "an integer waveform index in the second field",
            })?;
        Ok(index)
    }

    /// Activate a stored waveform by its catalog index. One write, no read.
    #[instrument(skip(self), fields(channel = self.index, index), err)]
    pub async fn set_waveform_index(&self, index: u32) -> Result<()> {
        self.iface
            .write(&format!(":ARWV INDEX,{}", index))
            .await
            .context("Failed to select waveform")?;
        Ok(())
    }
}

/// Driver for the Siglent SDG2082X arbitrary waveform generator.
///
/// Owns the transport: the device holds the last references to the shared
/// port, so dropping it (or calling [`Sdg2082x::close`]) closes the serial
/// connection exactly once.
pub struct Sdg2082x {
    iface: ScpiInterface,
    channels: Vec<SdgChannel>,
}

impl Sdg2082x {
    /// Build a device on an already-resolved transport.
    ///
    /// This is the core construction contract; [`Sdg2082x::new_async`] is a
    /// convenience wrapper that opens and validates a serial port first.
    pub fn with_port(port: SharedPort) -> Self {
        Self::with_port_and_timeout(port, Duration::from_secs(5))
    }

    fn with_port_and_timeout(port: SharedPort, timeout: Duration) -> Self {
        let iface =
            ScpiInterface::new(port.clone(), "", ReplyFraming::Line).with_timeout(timeout);
        let channels = (1..=CHANNEL_COUNT)
            .map(|n| SdgChannel::new(n, port.clone(), timeout))
            .collect();
        Self { iface, channels }
    }

    /// Open a serial port and validate the connected instrument.
    ///
    /// # Errors
    /// Returns error if:
    /// - the serial port cannot be opened
    /// - the device doesn't answer the identity query
    /// - the identity banner doesn't indicate an SDG-series generator
    pub async fn new_async(port_path: &str) -> Result<Self> {
        Self::connect(port_path, default_baud_rate(), Duration::from_secs(5)).await
    }

    /// Open a device from a TOML configuration table.
    pub async fn from_config(config: toml::Value) -> Result<Self> {
        let cfg: Sdg2082xConfig = config.try_into().context("Invalid SDG2082X config")?;
        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(5));
        Self::connect(&cfg.port, cfg.baud_rate, timeout).await
    }

    async fn connect(port_path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = open_serial(port_path, baud_rate, DEVICE_NAME).await?;
        let device = Self::with_port_and_timeout(wrap_shared(Box::new(port)), timeout);

        match device.identify().await {
            Ok(identity) => {
                if !identity.to_uppercase().contains("SDG") {
                    return Err(anyhow!(
                        "SDG2082X validation failed: identity '{}' doesn't indicate an SDG-series generator",
                        identity
                    ));
                }
                tracing::info!(%identity, "SDG2082X validated");
            }
            Err(e) => {
                return Err(anyhow!(
                    "SDG2082X validation failed: no response to identity query (*IDN?). Error: {}",
                    e
                ));
            }
        }

        Ok(device)
    }

    /// All output channels, ordered by channel number.
    pub fn channels(&self) -> &[SdgChannel] {
        &self.channels
    }

    /// Look up a channel by its 1-based number.
    pub fn channel(&self, number: usize) -> Option<&SdgChannel> {
        number.checked_sub(1).and_then(|i| self.channels.get(i))
    }

    /// Query the identification banner (`*IDN?`).
    #[instrument(skip(self), err)]
    pub async fn identify(&self) -> Result<String> {
        Ok(self.iface.ask("*IDN?").await?)
    }

    /// Query the built-in waveform catalog (`:STL? BUILDIN`).
    ///
    /// Entries are sorted by catalog index. An empty catalog comes back as
    /// [`BuiltinWaveforms::Empty`] carrying the instrument's raw sentinel.
    #[instrument(skip(self), err)]
    pub async fn get_builtin_list(&self) -> Result<BuiltinWaveforms> {
        let reply = self.iface.ask(":STL? BUILDIN").await?;
        if reply == "EMPTY" {
            return Ok(BuiltinWaveforms::Empty(reply));
        }
        Ok(BuiltinWaveforms::Entries(parse_builtin_catalog(&reply)?))
    }

    /// Query the user-uploaded waveform catalog (`:STL? USER`).
    #[instrument(skip(self), err)]
    pub async fn get_user_list(&self) -> Result<UserWaveforms> {
        let reply = self.iface.ask(":STL? USER").await?;
        if reply == "EMPTY" || reply == "STL WVNM" {
            return Ok(UserWaveforms::Empty(reply));
        }
        let names = reply
            .strip_prefix("STL WVNM,")
            .ok_or_else(|| AwgError::MalformedReply {
                command: ":STL? USER".to_string(),
                reply: reply.clone(),
                expected: "a reply starting with \"STL WVNM,\"",
            })?;
        Ok(UserWaveforms::Names(
            names.split(',').map(|n| n.trim().to_string()).collect(),
        ))
    }

    /// Release the instrument.
    ///
    /// Consumes the device, dropping the last references to the serial port;
    /// the transport is closed exactly once, here. An instrument left open
    /// blocks subsequent sessions, so prefer calling this at a chosen point
    /// over relying on scope ends.
    pub fn close(self) {}
}

#[async_trait]
impl StatusControl for Sdg2082x {
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
impl Identification for Sdg2082x {
    async fn identify(&self) -> Result<String> {
        Sdg2082x::identify(self).await
    }
}

/// Parse a non-empty `:STL? BUILDIN` reply into catalog entries.
///
/// The reply alternates `M{index}` tags and names; the first tag may carry a
/// leading `STL ` header token. Entries come back sorted by index.
fn parse_builtin_catalog(reply: &str) -> Result<Vec<WaveformEntry>, AwgError> {
    let fields: Vec<&str> = reply.split(',').collect();
    if fields.len() % 2 != 0 {
        return Err(AwgError::MalformedReply {
            command: ":STL? BUILDIN".to_string(),
            reply: reply.to_string(),
            expected: "an even number of comma-separated fields",
        });
    }

    let mut entries = Vec::with_capacity(fields.len() / 2);
    for pair in fields.chunks(2) {
        let tag = pair[0].trim();
        let digits = tag.rsplit('M').next().unwrap_or_default();
        let index = digits
            .trim()
            .parse::<u32>()
            .map_err(|_| AwgError::MalformedReply {
                command: ":STL? BUILDIN".to_string(),
                reply: reply.to_string(),
                expected: "an M{index} tag in every odd field",
            })?;
        entries.push(WaveformEntry {
            index,
            name: pair[1].trim().to_string(),
        });
    }
    entries.sort_by(|a, b| a.index.cmp(&b.index));
    Ok(entries)
}
