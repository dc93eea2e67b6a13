//! Siglent waveform generator drivers for rust-awg.
//!
//! This crate provides drivers for Siglent instruments, currently:
//! - SDG2082X Arbitrary Waveform Generator (serial over USB)
//!
//! # Usage
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! awg-driver-siglent = { path = "../awg-driver-siglent" }
//! ```
//!
//! Open a device and select a waveform:
//!
//! ```rust,ignore
//! use awg_driver_siglent::Sdg2082x;
//!
//! let awg = Sdg2082x::new_async("/dev/ttyUSB0").await?;
//! let channel = awg.channel(1).expect("channel 1 exists");
//! channel.set_waveform_index(7).await?;
//! ```

mod sdg2082x;

pub use sdg2082x::{
    BuiltinWaveforms, Sdg2082x, Sdg2082xConfig, SdgChannel, UserWaveforms, WaveformEntry,
};
