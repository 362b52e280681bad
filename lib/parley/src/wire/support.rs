use std::io;

pub type WireResult<T> = Result<T, WireError>;

#[derive(Debug, Eq, PartialEq)]
pub enum WireError {
    /// The remote end closed the connection.
    Closed,
    /// The frame body did not arrive within the receive deadline.
    Timeout,
    /// The frame could not be decoded.
    Malformed(MalformedKind),
    /// The encoded payload would not fit behind a 16-bit length prefix.
    Oversize,
    Io(io::ErrorKind),
}

#[derive(Debug, Eq, PartialEq)]
pub enum MalformedKind {
    Truncated,
    Base64,
    Document,
}

impl From<io::Error> for WireError {
    #[inline]
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => WireError::Closed,
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => WireError::Timeout,
            kind => WireError::Io(kind),
        }
    }
}
