//! SCPI command-prefix dispatcher.
//!
//! Every subsystem of an instrument lives under a fixed branch of the SCPI
//! command tree (`:C1`, `:SOUR2`, `:OUTP1`, or the root). Instead of spelling
//! out the full path in every call, a device or channel object holds a
//! [`ScpiInterface`] carrying that branch as an immutable prefix: calling
//! `write(":ARWV INDEX,2")` on the `:C1` interface puts exactly
//! `:C1:ARWV INDEX,2` on the wire.
//!
//! The two supported instrument families differ in how replies are framed,
//! and that difference is explicit data here ([`ReplyFraming`]) rather than
//! per-driver copy-paste:
//!
//! - `Line`: replies end in a newline; a query writes and then reads one line
//!   under the read timeout.
//! - `Settle`: the device sends no reply terminator at all. A query must
//!   discard stale receive data before writing, wait a fixed settle interval
//!   for the device to process the command, then take whatever bytes arrived.
//!
//! Many interfaces may share one port; the port mutex serializes them, and a
//! query holds the lock across its whole write/settle/read sequence so a
//! request/response pair can never interleave with another interface's
//! traffic.

use crate::error::AwgError;
use crate::serial::{drain_stale, read_available, DynSerial, SharedPort};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// How the instrument frames its replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFraming {
    /// Replies are newline-terminated.
    Line,
    /// No reply terminator; wait `delay` after writing, then read what came.
    Settle { delay: Duration },
}

/// Window used when draining stale data and when deciding a settle-framed
/// reply is complete.
const IDLE_WINDOW: Duration = Duration::from_millis(20);

/// Token table for a boolean instrument setting.
///
/// `on`/`off` are the tokens sent when setting. Some instruments report state
/// with a different (or larger) vocabulary than they accept, so the tokens
/// accepted when reading back can be listed separately; when the reply lists
/// are empty, the set tokens are accepted. All matching is
/// case-insensitive.
#[derive(Debug, Clone, Copy)]
pub struct BoolTokens {
    pub on: &'static str,
    pub off: &'static str,
    pub reply_on: &'static [&'static str],
    pub reply_off: &'static [&'static str],
}

impl BoolTokens {
    /// Token table where the instrument reports the same tokens it accepts.
    pub const fn symmetric(on: &'static str, off: &'static str) -> Self {
        Self {
            on,
            off,
            reply_on: &[],
            reply_off: &[],
        }
    }

    /// Token table with a distinct reply vocabulary.
    pub const fn with_replies(
        on: &'static str,
        off: &'static str,
        reply_on: &'static [&'static str],
        reply_off: &'static [&'static str],
    ) -> Self {
        Self {
            on,
            off,
            reply_on,
            reply_off,
        }
    }

    fn matches_on(&self, reply: &str) -> bool {
        Self::matches(reply, self.on, self.reply_on)
    }

    fn matches_off(&self, reply: &str) -> bool {
        Self::matches(reply, self.off, self.reply_off)
    }

    fn matches(reply: &str, set_token: &str, reply_tokens: &[&str]) -> bool {
        if reply_tokens.is_empty() {
            reply.eq_ignore_ascii_case(set_token)
        } else {
            reply_tokens.iter().any(|t| reply.eq_ignore_ascii_case(t))
        }
    }
}

/// Dispatcher for one branch of an instrument's SCPI command tree.
///
/// Immutable after construction: the prefix, framing policy, write
/// terminator, and timeout never change. Cloning shares the underlying port.
#[derive(Clone)]
pub struct ScpiInterface {
    port: SharedPort,
    prefix: String,
    framing: ReplyFraming,
    write_terminator: &'static str,
    timeout: Duration,
}

impl fmt::Debug for ScpiInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScpiInterface")
            .field("prefix", &self.prefix)
            .field("framing", &self.framing)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ScpiInterface {
    /// Create a dispatcher for `prefix` on a shared port.
    ///
    /// Defaults: `\n` write terminator, 5 second read timeout.
    pub fn new(port: SharedPort, prefix: impl Into<String>, framing: ReplyFraming) -> Self {
        Self {
            port,
            prefix: prefix.into(),
            framing,
            write_terminator: "\n",
            timeout: Duration::from_secs(5),
        }
    }

    /// Override the terminator appended to every outgoing command.
    pub fn with_write_terminator(mut self, terminator: &'static str) -> Self {
        self.write_terminator = terminator;
        self
    }

    /// Override the read timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command-tree prefix this interface is scoped to.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Send `prefix + command` to the instrument. Exactly one write, no read.
    pub async fn write(&self, command: &str) -> Result<(), AwgError> {
        let mut guard = self.port.lock().await;
        self.write_locked(&mut guard, command).await
    }

    async fn write_locked(
        &self,
        port: &mut BufReader<DynSerial>,
        command: &str,
    ) -> Result<(), AwgError> {
        let wire = format!("{}{}{}", self.prefix, command, self.write_terminator);
        tracing::trace!(command = %wire.trim_end(), "scpi write");
        let writer = port.get_mut();
        writer.write_all(wire.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read a pending reply as raw bytes.
    ///
    /// The caller must already have triggered a reply with a `?` query; there
    /// is no correlation between queries and replies beyond ordering.
    pub async fn read_raw(&self) -> Result<Vec<u8>, AwgError> {
        let mut guard = self.port.lock().await;
        self.read_locked(&mut guard).await
    }

    /// Read a pending reply as trimmed text.
    pub async fn read(&self) -> Result<String, AwgError> {
        let raw = self.read_raw().await?;
        Ok(String::from_utf8_lossy(&raw).trim().to_string())
    }

    async fn read_locked(&self, port: &mut BufReader<DynSerial>) -> Result<Vec<u8>, AwgError> {
        match self.framing {
            ReplyFraming::Line => {
                let mut line = String::new();
                let n = tokio::time::timeout(self.timeout, port.read_line(&mut line))
                    .await
                    .map_err(|_| AwgError::Timeout)??;
                if n == 0 {
                    return Err(AwgError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "serial port closed",
                    )));
                }
                tracing::trace!(reply = %line.trim_end(), "scpi read");
                Ok(line.into_bytes())
            }
            ReplyFraming::Settle { .. } => {
                let bytes = read_available(port, self.timeout, IDLE_WINDOW).await?;
                if bytes.is_empty() {
                    return Err(AwgError::Timeout);
                }
                tracing::trace!(reply = %String::from_utf8_lossy(&bytes), "scpi read");
                Ok(bytes)
            }
        }
    }

    /// Query: write `prefix + command`, then read the reply as trimmed text.
    pub async fn ask(&self, command: &str) -> Result<String, AwgError> {
        let raw = self.ask_raw(command).await?;
        Ok(String::from_utf8_lossy(&raw).trim().to_string())
    }

    /// Query: write `prefix + command`, then read the reply as raw bytes.
    ///
    /// The port lock is held for the whole sequence. Under settle framing
    /// this also drains stale receive data before writing and sleeps the
    /// settle interval before reading.
    pub async fn ask_raw(&self, command: &str) -> Result<Vec<u8>, AwgError> {
        let mut guard = self.port.lock().await;

        if let ReplyFraming::Settle { .. } = self.framing {
            let stale = drain_stale(&mut *guard, IDLE_WINDOW).await;
            if stale > 0 {
                tracing::warn!(bytes = stale, "discarded stale reply data");
            }
        }

        self.write_locked(&mut guard, command).await?;

        if let ReplyFraming::Settle { delay } = self.framing {
            tokio::time::sleep(delay).await;
        }

        self.read_locked(&mut guard).await
    }

    /// Read back a boolean setting.
    ///
    /// Issues `command + "?"` and maps the reply through the token table,
    /// case-insensitively. A reply matching neither token set fails with
    /// [`AwgError::UnexpectedReply`] instead of guessing.
    pub async fn query_bool(&self, command: &str, tokens: &BoolTokens) -> Result<bool, AwgError> {
        let query = format!("{}?", command);
        let reply = self.ask(&query).await?;
        let token = reply.trim();
        if tokens.matches_on(token) {
            Ok(true)
        } else if tokens.matches_off(token) {
            Ok(false)
        } else {
            Err(AwgError::UnexpectedReply {
                command: format!("{}{}", self.prefix, query),
                reply,
            })
        }
    }

    /// Write a boolean setting. One write, no read.
    pub async fn set_bool(
        &self,
        command: &str,
        tokens: &BoolTokens,
        value: bool,
    ) -> Result<(), AwgError> {
        let token = if value { tokens.on } else { tokens.off };
        self.write(&format!("{} {}", command, token)).await
    }

    /// Write a boolean setting from untyped text (CLI/scripting boundary).
    ///
    /// `device` and `option` label the owning object and setting in error
    /// messages. `None` fails with [`AwgError::MissingValue`]; anything other
    /// than the literals `true`/`false` fails with
    /// [`AwgError::InvalidArgument`]. In both failure cases nothing is
    /// written to the transport.
    pub async fn set_bool_from_text(
        &self,
        command: &str,
        tokens: &BoolTokens,
        device: &str,
        option: &str,
        value: Option<&str>,
    ) -> Result<(), AwgError> {
        let raw = value.ok_or_else(|| AwgError::MissingValue {
            device: device.to_string(),
            option: option.to_string(),
        })?;
        let parsed = if raw.trim().eq_ignore_ascii_case("true") {
            true
        } else if raw.trim().eq_ignore_ascii_case("false") {
            false
        } else {
            return Err(AwgError::InvalidArgument {
                device: device.to_string(),
                option: option.to_string(),
                value: raw.to_string(),
            });
        };
        self.set_bool(command, tokens, parsed).await
    }
}
