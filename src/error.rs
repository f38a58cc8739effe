use embassy_time::TimeoutError;

use crate::at_command::{AtParseErr, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The talk layer failed to deliver a command or read its response.
    Transport,
    Timeout,
    Sim(SimError),
    Parse(AtParseErr),
    BufferOverflow,

    /// The value was never read from the modem.
    NoData,

    Socket(SocketError),

    /// The connection health check failed.
    Check(CheckError),

    /// The SIM returned an ICCID of unexpected length.
    InvalidIccid,

    /// No PDN context with both an APN and an address was found.
    NoPdnContext,

    /// The modem library failed to start or stop.
    Modem,

    CallbackExists,
    CallbackNotFound,
    CallbackListFull,
}

/// Errors reported by the data socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketError {
    TimedOut,
    Closed,
    Refused,
    Other(i32),
}

/// Reason a connection health check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CheckError {
    /// Functional mode is not 1.
    NotFunctional,
    /// Registration URCs are not subscribed.
    NotSubscribed,
    NotRegistered,
    NotAttached,
    /// The PDN context is not active.
    NotConnected,
    NoSocket,
    SocketError,
    /// A query command failed.
    Command,
}

impl CheckError {
    /// Failures that only need the socket to be reopened.
    pub fn is_socket_only(&self) -> bool {
        matches!(self, CheckError::NoSocket | CheckError::SocketError)
    }
}

impl embedded_io_async::Error for Error {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        use embedded_io_async::ErrorKind;
        match self {
            Error::Transport => ErrorKind::BrokenPipe,
            Error::Timeout => ErrorKind::TimedOut,
            Error::Sim(_) => ErrorKind::Other,
            Error::Parse(_) => ErrorKind::InvalidData,
            Error::BufferOverflow => ErrorKind::OutOfMemory,
            Error::NoData => ErrorKind::NotFound,
            Error::Socket(SocketError::TimedOut) => ErrorKind::TimedOut,
            Error::Socket(SocketError::Closed) => ErrorKind::NotConnected,
            Error::Socket(SocketError::Refused) => ErrorKind::ConnectionRefused,
            Error::Socket(SocketError::Other(_)) => ErrorKind::Other,
            Error::Check(_) => ErrorKind::NotConnected,
            Error::InvalidIccid => ErrorKind::InvalidData,
            Error::NoPdnContext => ErrorKind::AddrNotAvailable,
            Error::Modem => ErrorKind::Other,
            Error::CallbackExists => ErrorKind::AlreadyExists,
            Error::CallbackNotFound => ErrorKind::NotFound,
            Error::CallbackListFull => ErrorKind::OutOfMemory,
        }
    }
}

impl From<TimeoutError> for Error {
    fn from(_: TimeoutError) -> Self {
        Error::Timeout
    }
}

impl From<AtParseErr> for Error {
    fn from(e: AtParseErr) -> Self {
        Error::Parse(e)
    }
}

impl From<SocketError> for Error {
    fn from(e: SocketError) -> Self {
        Error::Socket(e)
    }
}

impl From<CheckError> for Error {
    fn from(e: CheckError) -> Self {
        Error::Check(e)
    }
}
