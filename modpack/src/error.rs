use std::io;
use thiserror::Error;

/// Errors produced while encoding or decoding a package stream. Every
/// variant is fatal for the stream it was raised on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("stream ended before the declared data was read")]
    Truncated,
    #[error("string or blob of {len} bytes exceeds the {max} byte limit of its length prefix")]
    TooLong { len: usize, max: usize },
    #[error("string data is not valid utf-8")]
    InvalidUtf8,
    #[error("package version {found} is newer than the supported version {max}")]
    UnsupportedVersion { found: u32, max: u32 },
    #[error("package does not start with a header record")]
    MissingHeader,
    #[error("package contains more than one header record")]
    DuplicateHeader,
    #[error("unknown record tag {0}")]
    UnknownTag(u8),
    #[error("unknown archive id {0}")]
    UnknownArchive(u8),
    #[error("unknown extra file kind {0}")]
    UnknownFileKind(u8),
    #[error("extra file path {0:?} is not a relative path below its root")]
    InvalidPath(String),
    #[error("i/o error: {0}")]
    Io(#[source] io::Error),
}

// short reads are reported as `Truncated` so callers can tell a cut-off
// package apart from a failing device
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::Truncated,
            _ => Error::Io(e),
        }
    }
}
