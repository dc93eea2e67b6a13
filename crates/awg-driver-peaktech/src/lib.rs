//! PeakTech waveform generator drivers for rust-awg.
//!
//! This crate provides drivers for PeakTech instruments, currently:
//! - PeakTech 4115 Arbitrary Waveform Generator (RS-232 over USB)
//!
//! # Usage
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! awg-driver-peaktech = { path = "../awg-driver-peaktech" }
//! ```
//!
//! Open a device and invert a channel:
//!
//! ```rust,ignore
//! use awg_driver_peaktech::Pt4115;
//!
//! let awg = Pt4115::new_async("/dev/ttyUSB0").await?;
//! let channel = awg.channel(1).expect("channel 1 exists");
//! channel.set_inversion(true).await?;
//! ```

mod pt4115;

pub use pt4115::{Pt4115, Pt4115Channel, Pt4115Config};
