//! Serial port resolution from device-identifier hints.
//!
//! Construction of a device takes an already-opened transport, so something
//! has to turn "the Siglent on this machine" into one concrete port path.
//! This module does the non-interactive part: enumerate the candidate serial
//! ports with their USB identifiers, and match an optional hint against
//! them. Zero or multiple matches are structured errors carrying the
//! candidate list; the CLI turns those into an interactive selection, the
//! library never prompts.

use std::path::Path;
use thiserror::Error;

/// Errors that can occur during port resolution.
#[derive(Debug, Error)]
pub enum PortResolveError {
    /// The hint looked like a device path but nothing exists there.
    #[error("port not found: {0}")]
    PortNotFound(String),

    /// No enumerated port matches the hint.
    #[error("no serial port matches \"{hint}\"")]
    NoMatch {
        hint: String,
        candidates: Vec<CandidatePort>,
    },

    /// More than one enumerated port matches the hint.
    #[error("multiple serial ports match \"{hint}\": {matches:?}")]
    AmbiguousMatch { hint: String, matches: Vec<String> },

    /// No serial ports were detected on this system at all.
    #[error("no serial ports detected")]
    NoPorts,

    /// Enumeration failed.
    #[error("serial port enumeration failed: {0}")]
    Enumeration(#[from] serialport::Error),
}

/// One enumerated serial port.
#[derive(Debug, Clone)]
pub struct CandidatePort {
    /// Device path (e.g. `/dev/ttyUSB0`, `COM3`).
    pub path: String,
    /// USB manufacturer/product/serial string, when the port is a USB bridge.
    pub description: Option<String>,
}

impl CandidatePort {
    fn matches(&self, hint: &str) -> bool {
        self.path.contains(hint)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&hint.to_lowercase()))
    }
}

impl std::fmt::Display for CandidatePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "{} ({})", self.path, desc),
            None => write!(f, "{}", self.path),
        }
    }
}

/// Enumerate candidate serial ports, sorted by path.
pub fn list_candidates() -> Result<Vec<CandidatePort>, PortResolveError> {
    let mut ports: Vec<CandidatePort> = serialport::available_ports()?
        .into_iter()
        .map(|info| {
            let description = match info.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let parts: Vec<String> = [usb.manufacturer, usb.product, usb.serial_number]
                        .into_iter()
                        .flatten()
                        .collect();
                    if parts.is_empty() {
                        None
                    } else {
                        Some(parts.join(" "))
                    }
                }
                _ => None,
            };
            CandidatePort {
                path: info.port_name,
                description,
            }
        })
        .collect();
    ports.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(ports)
}

/// Resolve a hint to exactly one port path.
///
/// A hint that is a device path (`/dev/...`, `COM*`) is checked for existence
/// and used as-is. Anything else is substring-matched against the enumerated
/// ports' paths and USB identifiers; exactly one match resolves, zero or
/// several fail with the candidate list attached.
pub fn resolve(hint: &str) -> Result<String, PortResolveError> {
    if hint.starts_with("/dev/") {
        return if Path::new(hint).exists() {
            Ok(hint.to_string())
        } else {
            Err(PortResolveError::PortNotFound(hint.to_string()))
        };
    }
    if hint.to_uppercase().starts_with("COM") {
        return Ok(hint.to_string());
    }

    let candidates = list_candidates()?;
    if candidates.is_empty() {
        return Err(PortResolveError::NoPorts);
    }
    resolve_against(hint, candidates)
}

/// Hint matching against a known candidate list.
///
/// Split out of [`resolve`] so the matching rules are testable without
/// hardware attached.
pub fn resolve_against(
    hint: &str,
    candidates: Vec<CandidatePort>,
) -> Result<String, PortResolveError> {
    let matches: Vec<&CandidatePort> = candidates.iter().filter(|c| c.matches(hint)).collect();
    match matches.len() {
        0 => Err(PortResolveError::NoMatch {
            hint: hint.to_string(),
            candidates,
        }),
        1 => Ok(matches[0].path.clone()),
        _ => Err(PortResolveError::AmbiguousMatch {
            hint: hint.to_string(),
            matches: matches.into_iter().map(|c| c.path.clone()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<CandidatePort> {
        vec![
            CandidatePort {
                path: "/dev/ttyUSB0".to_string(),
                description: Some("Siglent Technologies SDG2082X SDG2XCAD1R0001".to_string()),
            },
            CandidatePort {
                path: "/dev/ttyUSB1".to_string(),
                description: Some("FTDI FT232R USB UART A50285BI".to_string()),
            },
            CandidatePort {
                path: "/dev/ttyS0".to_string(),
                description: None,
            },
        ]
    }

    #[test]
    fn unique_hint_resolves_to_single_path() {
        let path = resolve_against("SDG2082X", candidates()).unwrap();
        assert_eq!(path, "/dev/ttyUSB0");
    }

    #[test]
    fn hint_matching_is_case_insensitive_on_descriptions() {
        let path = resolve_against("siglent", candidates()).unwrap();
        assert_eq!(path, "/dev/ttyUSB0");
    }

    #[test]
    fn unmatched_hint_reports_candidates() {
        let err = resolve_against("Rigol", candidates()).unwrap_err();
        match err {
            PortResolveError::NoMatch { hint, candidates } => {
                assert_eq!(hint, "Rigol");
                assert_eq!(candidates.len(), 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn ambiguous_hint_lists_all_matches() {
        let err = resolve_against("ttyUSB", candidates()).unwrap_err();
        match err {
            PortResolveError::AmbiguousMatch { matches, .. } => {
                assert_eq!(matches, vec!["/dev/ttyUSB0", "/dev/ttyUSB1"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_device_path_is_port_not_found() {
        let err = resolve("/dev/does-not-exist-awg").unwrap_err();
        assert!(matches!(err, PortResolveError::PortNotFound(_)));
    }
}
