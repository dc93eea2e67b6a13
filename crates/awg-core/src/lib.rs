//! Core abstractions shared by the rust-awg driver crates.
//!
//! This crate holds everything the vendor driver crates have in common:
//!
//! - **`serial`**: async serial transport types (`SharedPort`, `DynSerial`)
//!   and utilities for opening ports, draining stale receive data, and
//!   collecting unterminated replies.
//! - **`scpi`**: the command-prefix dispatcher ([`ScpiInterface`]) that turns
//!   short command suffixes into fully-qualified SCPI commands, plus the
//!   boolean token tables ([`BoolTokens`]) that translate between native
//!   booleans and instrument on/off vocabularies.
//! - **`error`**: the shared [`AwgError`] type covering usage, protocol, and
//!   transport failures.
//! - **`capabilities`**: small async traits (`StatusControl`,
//!   `Identification`, ...) so callers can drive any supported generator
//!   through a common surface.
//! - **`port_resolver`**: maps a device-identifier hint to exactly one serial
//!   port, without any interactive fallback (that lives in the CLI).

pub mod capabilities;
pub mod error;
pub mod port_resolver;
pub mod scpi;
pub mod serial;

pub use capabilities::{DisplayControl, Identification, LocalControl, StatusControl};
pub use error::AwgError;
pub use scpi::{BoolTokens, ReplyFraming, ScpiInterface};
pub use serial::{wrap_shared, DynSerial, SerialIO, SharedPort};
