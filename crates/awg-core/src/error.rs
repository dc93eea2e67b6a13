//! Shared error type for the AWG driver crates.
//!
//! Three kinds of failures can surface from a driver call, and each gets its
//! own set of variants so callers can match on them:
//!
//! - **Usage errors** ([`AwgError::MissingValue`],
//!   [`AwgError::InvalidArgument`]): the caller handed a value that cannot be
//!   coerced into what the instrument expects. Nothing is written to the
//!   transport in this case.
//! - **Protocol errors** ([`AwgError::UnexpectedReply`],
//!   [`AwgError::MalformedReply`]): the instrument answered, but the reply
//!   matches no expected token set or cannot be decomposed. A decoding error
//!   is returned rather than a wrong value.
//! - **Transport errors** ([`AwgError::Io`], [`AwgError::Timeout`]):
//!   connection loss, resource-busy, or an expired read deadline, propagated
//!   unmodified from the serial layer.
//!
//! There is no recovery tier and no retry policy; every error is surfaced to
//! the immediate caller.

use thiserror::Error;

/// Convenience alias for results using the shared error type.
pub type Result<T> = std::result::Result<T, AwgError>;

#[derive(Error, Debug)]
pub enum AwgError {
    /// A setting that requires a value was invoked without one.
    ///
    /// Kept distinct from [`AwgError::InvalidArgument`]: an absent value and a
    /// wrongly-typed value are different caller mistakes and get different
    /// messages.
    #[error("{device}, {option}: cannot assign empty value, must be true or false")]
    MissingValue { device: String, option: String },

    /// A setting was invoked with a value that cannot be coerced.
    #[error("{device}, {option}: cannot assign \"{value}\", must be true or false")]
    InvalidArgument {
        device: String,
        option: String,
        value: String,
    },

    /// The instrument replied with a token outside the expected set.
    #[error("unexpected reply \"{reply}\" to query \"{command}\"")]
    UnexpectedReply { command: String, reply: String },

    /// The instrument replied, but the reply cannot be decomposed as expected.
    #[error("malformed reply \"{reply}\" to query \"{command}\": expected {expected}")]
    MalformedReply {
        command: String,
        reply: String,
        expected: &'static str,
    },

    /// No reply arrived within the read deadline.
    #[error("timed out waiting for a reply from the instrument")]
    Timeout,

    /// Transport-level failure, passed through from the serial layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_name_the_offending_option() {
        let err = AwgError::InvalidArgument {
            device: "PT4115".to_string(),
            option: "display".to_string(),
            value: "on".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("PT4115"));
        assert!(msg.contains("display"));
        assert!(msg.contains("\"on\""));
    }

    #[test]
    fn missing_and_invalid_are_distinct_messages() {
        let missing = AwgError::MissingValue {
            device: "PT4115".to_string(),
            option: "display".to_string(),
        };
        let invalid = AwgError::InvalidArgument {
            device: "PT4115".to_string(),
            option: "display".to_string(),
            value: "7".to_string(),
        };
        assert_ne!(missing.to_string(), invalid.to_string());
    }

    #[test]
    fn protocol_error_carries_command_and_reply() {
        let err = AwgError::UnexpectedReply {
            command: ":DISP?".to_string(),
            reply: "MAYBE".to_string(),
        };
        assert!(err.to_string().contains(":DISP?"));
        assert!(err.to_string().contains("MAYBE"));
    }
}
