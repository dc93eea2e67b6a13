//! Aggregation crate for the rust-awg drivers.
//!
//! Downstream code depends on this crate and picks vendors via features
//! instead of tracking the individual driver crates:
//!
//! ```toml
//! [dependencies]
//! awg-drivers = { path = "../awg-drivers", features = ["all"] }
//! ```
//!
//! The shared abstractions are re-exported as [`core`].

pub use awg_core as core;

#[cfg(feature = "siglent")]
pub use awg_driver_siglent as siglent;

#[cfg(feature = "peaktech")]
pub use awg_driver_peaktech as peaktech;
