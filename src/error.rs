//! The `"bc"` error category: a stable numeric enumeration mirroring POSIX
//! errno values plus a handful of notifier-specific codes.
//!
//! Codes 1-122 mirror the errno values the core actually surfaces; 200-202
//! are notifier/parse-specific and have no POSIX equivalent.

use std::io;

/// Error codes for the `"bc"` category, numbered to match the original
/// POSIX errno values where one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("operation not permitted")]
    OperationNotPermitted = 1,
    #[error("no such file or directory")]
    NoSuchFileOrDirectory = 2,
    #[error("interrupted system call")]
    Interrupted = 4,
    #[error("input/output error")]
    IoError = 5,
    #[error("bad file descriptor")]
    BadFileDescriptor = 9,
    #[error("cannot allocate memory")]
    NotEnoughMemory = 12,
    #[error("permission denied")]
    PermissionDenied = 13,
    #[error("bad address")]
    BadAddress = 14,
    #[error("file exists")]
    FileExists = 17,
    #[error("not a directory")]
    NotADirectory = 20,
    #[error("invalid argument")]
    InvalidArgument = 22,
    #[error("too many open files")]
    TooManyFilesOpen = 24,
    #[error("file too large")]
    FileTooLarge = 27,
    #[error("no space left on device")]
    NoSpaceOnDevice = 28,
    #[error("read-only file system")]
    ReadOnlyFileSystem = 30,
    #[error("broken pipe")]
    BrokenPipe = 32,
    #[error("name too long")]
    NameTooLong = 36,
    #[error("too many levels of symbolic links")]
    TooManySymbolicLinkLevels = 40,
    #[error("socket operation on non-socket")]
    NotASocket = 88,
    #[error("destination address required")]
    DestinationAddressRequired = 89,
    #[error("protocol not available")]
    NoProtocolOption = 92,
    #[error("operation not supported")]
    OperationNotSupported = 95,
    #[error("address already in use")]
    AddressInUse = 98,
    #[error("cannot assign requested address")]
    AddressNotAvailable = 99,
    #[error("quota exceeded")]
    QuotaExceeded = 122,
    /// The notifier reported an error condition on the fd.
    #[error("epoll error")]
    EpollError = 200,
    /// The peer closed (or half-closed) the connection.
    #[error("closed by peer")]
    ClosedByPeer = 201,
    /// Address parsing failed (not a valid IPv4 dotted-quad or IPv6
    /// colon-hex literal).
    #[error("invalid address")]
    InvalidAddress = 202,
}

impl Error {
    /// Numeric code, stable across versions, matching the original
    /// implementation's `bc_error_category` values.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map a raw errno (as returned by `io::Error::raw_os_error`) onto the
    /// category. Unknown/unmapped errno values fall back to `IoError`,
    /// matching the spirit of the original (which only enumerates the
    /// errno values the library actually surfaces).
    #[must_use]
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            1 => Self::OperationNotPermitted,
            2 => Self::NoSuchFileOrDirectory,
            4 => Self::Interrupted,
            5 => Self::IoError,
            9 => Self::BadFileDescriptor,
            12 => Self::NotEnoughMemory,
            13 => Self::PermissionDenied,
            14 => Self::BadAddress,
            17 => Self::FileExists,
            20 => Self::NotADirectory,
            22 => Self::InvalidArgument,
            24 => Self::TooManyFilesOpen,
            27 => Self::FileTooLarge,
            28 => Self::NoSpaceOnDevice,
            30 => Self::ReadOnlyFileSystem,
            32 => Self::BrokenPipe,
            36 => Self::NameTooLong,
            40 => Self::TooManySymbolicLinkLevels,
            88 => Self::NotASocket,
            89 => Self::DestinationAddressRequired,
            92 => Self::NoProtocolOption,
            95 => Self::OperationNotSupported,
            98 => Self::AddressInUse,
            99 => Self::AddressNotAvailable,
            122 => Self::QuotaExceeded,
            _ => Self::IoError,
        }
    }

    /// True for transient conditions (`EAGAIN`/`EWOULDBLOCK`/`EINTR`) that
    /// the core treats as "no progress yet" rather than an error.
    #[must_use]
    pub fn is_transient(io_err: &io::Error) -> bool {
        matches!(
            io_err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
        )
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        value
            .raw_os_error()
            .map_or(Self::IoError, Self::from_errno)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_matches_original_category_numbering() {
        assert_eq!(Error::OperationNotPermitted.code(), 1);
        assert_eq!(Error::QuotaExceeded.code(), 122);
        assert_eq!(Error::EpollError.code(), 200);
        assert_eq!(Error::ClosedByPeer.code(), 201);
        assert_eq!(Error::InvalidAddress.code(), 202);
    }

    #[test]
    fn from_errno_round_trips_known_codes() {
        assert_eq!(Error::from_errno(98), Error::AddressInUse);
        assert_eq!(Error::from_errno(9999), Error::IoError);
    }

    #[test]
    fn transient_io_errors_are_recognized() {
        let would_block = io::Error::from(io::ErrorKind::WouldBlock);
        let interrupted = io::Error::from(io::ErrorKind::Interrupted);
        let other = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(Error::is_transient(&would_block));
        assert!(Error::is_transient(&interrupted));
        assert!(!Error::is_transient(&other));
    }
}
