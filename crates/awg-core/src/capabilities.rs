//! Capability traits for waveform generators.
//!
//! Vendors differ in what their instruments support (the PeakTech has a
//! display toggle and panel unlock, the Siglent an identification banner),
//! so instead of one monolithic device trait each capability is its own
//! small async trait and a driver implements the ones its hardware has.
//! Generic callers such as the CLI take trait objects or bounds and stay
//! vendor-agnostic.
//!
//! Each trait is async (`#[async_trait]`), `Send + Sync`, and uses
//! `anyhow::Result`.

use anyhow::Result;
use async_trait::async_trait;

/// IEEE 488.2 status and error-queue operations.
#[async_trait]
pub trait StatusControl: Send + Sync {
    /// Reset the instrument (`*RST`). Fire-and-forget.
    async fn reset(&self) -> Result<()>;

    /// Clear the status registers including the error queue (`*CLS`).
    async fn clear_error(&self) -> Result<()>;

    /// Read the pending error-queue contents as text.
    ///
    /// Not an idempotent getter: querying drains the queue, so a second call
    /// returns the instrument's empty-queue sentinel.
    async fn errors(&self) -> Result<String>;
}

/// Identification banner query (`*IDN?`), where supported.
#[async_trait]
pub trait Identification: Send + Sync {
    /// Model/serial/firmware banner.
    async fn identify(&self) -> Result<String>;
}

/// On-device screen control, where supported.
#[async_trait]
pub trait DisplayControl: Send + Sync {
    /// Whether the on-device screen is active.
    async fn display(&self) -> Result<bool>;

    /// Turn the on-device screen on or off.
    async fn set_display(&self, on: bool) -> Result<()>;
}

/// Return-to-local control, where supported.
#[async_trait]
pub trait LocalControl: Send + Sync {
    /// Re-enable the physical front panel after remote lockout.
    async fn unlock(&self) -> Result<()>;
}
