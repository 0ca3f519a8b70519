//! Unified error type for the solr2-lib crate.
//!
//! [`Solr2Error`] wraps module-specific errors (`DeviceError`, `AddressError`,
//! `ParseError`) and string-carrying kinds (`Config`, `Color`, `Protocol`).
//! `From` impls let `?` propagate across module boundaries.

use std::fmt;

use crate::address_map::AddressError;
use crate::command::ParseError;
use crate::device::DeviceError;

#[derive(Debug)]
pub enum Solr2Error {
    /// USB transport error (open, claim, write).
    Device(DeviceError),
    /// Unknown LED name or malformed address table.
    Address(AddressError),
    /// Malformed command line.
    Parse(ParseError),
    /// Socket or file I/O error.
    Io(std::io::Error),
    /// Configuration load or validation error.
    Config(String),
    /// Color string parsing error.
    Color(String),
    /// Unexpected reply on the TCP line protocol.
    Protocol(String),
}

impl fmt::Display for Solr2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Solr2Error::Device(e) => write!(f, "{e}"),
            Solr2Error::Address(e) => write!(f, "{e}"),
            Solr2Error::Parse(e) => write!(f, "{e}"),
            Solr2Error::Io(e) => write!(f, "I/O error: {e}"),
            Solr2Error::Config(e) => write!(f, "Config error: {e}"),
            Solr2Error::Color(e) => write!(f, "Color error: {e}"),
            Solr2Error::Protocol(e) => write!(f, "Protocol error: {e}"),
        }
    }
}

impl std::error::Error for Solr2Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Solr2Error::Device(e) => Some(e),
            Solr2Error::Address(e) => Some(e),
            Solr2Error::Parse(e) => Some(e),
            Solr2Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for Solr2Error {
    fn from(e: DeviceError) -> Self {
        Solr2Error::Device(e)
    }
}

impl From<AddressError> for Solr2Error {
    fn from(e: AddressError) -> Self {
        Solr2Error::Address(e)
    }
}

impl From<ParseError> for Solr2Error {
    fn from(e: ParseError) -> Self {
        Solr2Error::Parse(e)
    }
}

impl From<std::io::Error> for Solr2Error {
    fn from(e: std::io::Error) -> Self {
        Solr2Error::Io(e)
    }
}

/// Crate-level Result alias using [`Solr2Error`].
pub type Result<T> = std::result::Result<T, Solr2Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_device_error() {
        let e: Solr2Error = DeviceError::Unsupported.into();
        assert!(matches!(e, Solr2Error::Device(DeviceError::Unsupported)));
    }

    #[test]
    fn from_address_error() {
        let e: Solr2Error = AddressError::NotFound("LED99".into()).into();
        assert_eq!(e.to_string(), "LED not defined: LED99");
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: Solr2Error = io_err.into();
        assert!(matches!(e, Solr2Error::Io(_)));
    }

    #[test]
    fn display_string_variants() {
        assert_eq!(
            Solr2Error::Config("bad port".into()).to_string(),
            "Config error: bad port"
        );
        assert_eq!(
            Solr2Error::Color("bad hex".into()).to_string(),
            "Color error: bad hex"
        );
        assert_eq!(
            Solr2Error::Protocol("empty reply".into()).to_string(),
            "Protocol error: empty reply"
        );
    }

    #[test]
    fn source_chains_device_error() {
        let e = Solr2Error::Device(DeviceError::WriteFailed {
            board: "LEFT".into(),
            reason: "stall".into(),
        });
        let source = std::error::Error::source(&e).unwrap();
        assert!(source.to_string().contains("stall"));
    }

    #[test]
    fn source_none_for_string_variants() {
        let e = Solr2Error::Config("test".into());
        assert!(std::error::Error::source(&e).is_none());
    }

    #[test]
    fn question_mark_propagation_parse_to_solr2() {
        fn inner() -> std::result::Result<(), ParseError> {
            Err(ParseError::Empty)
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        let err = outer().unwrap_err();
        assert!(matches!(err, Solr2Error::Parse(ParseError::Empty)));
    }
}
