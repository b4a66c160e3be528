//! Error types for archive parsing and generation.
//!
//! This module provides the [`PaxError`] type which covers all failure
//! modes of the header codecs and the surrounding read/write engine.
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Format | [`InvalidHeader`], [`UnknownFormat`] | Stream is not (or no longer) a valid archive |
//! | Compressed input | [`CompressedInput`] | Stream is compressed, not a raw archive |
//! | Limits | [`NameTooLong`] | A value exceeds a hard bound |
//! | Selection | [`UnknownFormatName`], [`UnsupportedOption`] | Bad caller-supplied format or option |
//! | I/O | [`Io`] | Read/write errors from the underlying stream |
//!
//! Overflowing numeric fields and unsupported entry types are *not* errors:
//! those follow the clamp-and-warn / skip-and-warn policy and are reported
//! through [`Diagnostics`](crate::Diagnostics) instead, so one bad member
//! never aborts a whole run.
//!
//! [`InvalidHeader`]: PaxError::InvalidHeader
//! [`UnknownFormat`]: PaxError::UnknownFormat
//! [`CompressedInput`]: PaxError::CompressedInput
//! [`NameTooLong`]: PaxError::NameTooLong
//! [`UnknownFormatName`]: PaxError::UnknownFormatName
//! [`UnsupportedOption`]: PaxError::UnsupportedOption
//! [`Io`]: PaxError::Io

use std::fmt;
use std::io;

/// Error type for archive operations.
///
/// Covers header parsing, format detection, and stream I/O. Implements
/// [`std::error::Error`] for integration with the Rust error handling
/// ecosystem.
#[derive(Debug)]
pub enum PaxError {
    /// A member header is malformed: bad magic, failed checksum, or a
    /// field that cannot be parsed.
    ///
    /// On the auto-detection path this simply means "not this format";
    /// mid-archive it usually indicates corruption.
    InvalidHeader,

    /// None of the probed formats recognized the stream.
    UnknownFormat,

    /// The stream starts with a known compression magic rather than an
    /// archive header.
    ///
    /// Carries the name of the compressor and the conventional
    /// command-line flag that would decompress it, so the caller can
    /// produce an actionable message instead of a generic parse failure.
    CompressedInput {
        /// Compressor the magic bytes belong to (`gzip`, `bzip2`, ...).
        program: &'static str,
        /// Conventional decompression option letter (`z`, `j`, ...).
        flag: char,
    },

    /// A member name exceeds the format-independent path bound, or an
    /// extended-name length field claims more than the bound allows.
    NameTooLong {
        /// Claimed or actual name length in bytes.
        len: usize,
        /// The maximum the engine accepts ([`PAX_PATH_MAX`]).
        ///
        /// [`PAX_PATH_MAX`]: crate::entry::PAX_PATH_MAX
        max: usize,
    },

    /// An explicitly selected format name is not in the registry.
    UnknownFormatName(String),

    /// A `-o name[=value]` pair was handed to a format that does not
    /// accept it.
    UnsupportedOption {
        /// Format the option was offered to.
        format: &'static str,
        /// The rejected option name.
        option: String,
    },

    /// An underlying I/O error, including short reads mid-header.
    Io(io::Error),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PaxError>;

impl fmt::Display for PaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHeader => write!(f, "invalid or corrupt member header"),
            Self::UnknownFormat => write!(f, "unable to determine archive format"),
            Self::CompressedInput { program, flag } => write!(
                f,
                "input compressed with {program}; use the -{flag} option to decompress it"
            ),
            Self::NameTooLong { len, max } => {
                write!(f, "member name of {len} bytes exceeds maximum of {max}")
            }
            Self::UnknownFormatName(name) => write!(f, "unknown format: {name}"),
            Self::UnsupportedOption { format, option } => {
                write!(f, "option {option} is not supported by the {format} format")
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for PaxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for PaxError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_input_message_names_the_flag() {
        let err = PaxError::CompressedInput {
            program: "gzip",
            flag: 'z',
        };
        assert_eq!(
            err.to_string(),
            "input compressed with gzip; use the -z option to decompress it"
        );
    }

    #[test]
    fn test_io_error_source_is_preserved() {
        use std::error::Error as _;
        let err = PaxError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "short"));
        assert!(err.source().is_some());
    }
}
