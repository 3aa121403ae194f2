//! Driver error type.
//!
//! Driver code uses [`NetError`] exclusively. Conversion to a negative
//! POSIX-style errno happens only at the application boundary via
//! [`NetError::to_errno`].

use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetError {
    /// Socket descriptor out of range (EBADF).
    InvalidDescriptor,
    /// Operation not valid for the socket's protocol (EOPNOTSUPP).
    OperationNotSupported,
    /// Protocol number not supported by the chip (EPROTONOSUPPORT).
    ProtocolNotSupported,
    /// Every hardware socket is claimed (ENFILE).
    NoFreeSocket,
    /// Port bound or established in a conflicting way, or the link-layer
    /// slot is already taken (EADDRINUSE).
    AddressInUse,
    /// Socket already has an established session (EISCONN).
    AlreadyConnected,
    /// No active connection and no data pending (ENOTCONN).
    NotConnected,
    /// PHY reports no link (ENETDOWN).
    NetworkDown,
    /// Peer disconnected mid-operation (ECONNABORTED).
    ConnectionAborted,
    /// Peer rejected the connection (ECONNREFUSED).
    ConnectionRefused,
    /// Chip-level retransmission timeout (ETIMEDOUT).
    TimedOut,
    /// Not enough free TX ring space; nothing was written (ENOBUFS).
    BufferExhausted,
    /// Nothing available right now; retry later (EAGAIN).
    WouldBlock,
    /// Chip status disagrees with the command sequence just issued (EFAULT).
    InternalFault,
    /// Malformed argument or configuration value (EINVAL).
    InvalidArgument,
}

impl NetError {
    /// Convert to a negative errno value for the application boundary.
    pub const fn to_errno(&self) -> i32 {
        match self {
            Self::InvalidDescriptor => -9,      // EBADF
            Self::OperationNotSupported => -95, // EOPNOTSUPP
            Self::ProtocolNotSupported => -93,  // EPROTONOSUPPORT
            Self::NoFreeSocket => -23,          // ENFILE
            Self::AddressInUse => -98,          // EADDRINUSE
            Self::AlreadyConnected => -106,     // EISCONN
            Self::NotConnected => -107,         // ENOTCONN
            Self::NetworkDown => -100,          // ENETDOWN
            Self::ConnectionAborted => -103,    // ECONNABORTED
            Self::ConnectionRefused => -111,    // ECONNREFUSED
            Self::TimedOut => -110,             // ETIMEDOUT
            Self::BufferExhausted => -105,      // ENOBUFS
            Self::WouldBlock => -11,            // EAGAIN
            Self::InternalFault => -14,         // EFAULT
            Self::InvalidArgument => -22,       // EINVAL
        }
    }

    /// `true` for the non-blocking "try again" signal.
    #[inline]
    pub const fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDescriptor => write!(f, "bad socket descriptor"),
            Self::OperationNotSupported => write!(f, "operation not supported on this socket"),
            Self::ProtocolNotSupported => write!(f, "protocol not supported"),
            Self::NoFreeSocket => write!(f, "no free hardware socket"),
            Self::AddressInUse => write!(f, "address already in use"),
            Self::AlreadyConnected => write!(f, "socket already connected"),
            Self::NotConnected => write!(f, "socket not connected"),
            Self::NetworkDown => write!(f, "network is down"),
            Self::ConnectionAborted => write!(f, "connection aborted"),
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::TimedOut => write!(f, "operation timed out"),
            Self::BufferExhausted => write!(f, "no buffer space available"),
            Self::WouldBlock => write!(f, "operation would block"),
            Self::InternalFault => write!(f, "unexpected chip state"),
            Self::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

/// Result alias used throughout the driver.
pub type NetResult<T> = Result<T, NetError>;
