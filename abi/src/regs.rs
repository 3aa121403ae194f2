//! W5200 register map.
//!
//! Global registers live in the low 64 bytes of the address space. Each
//! hardware socket owns a 256-byte register block starting at
//! [`SOCK_BASE`], and a TX and RX ring window inside the two 16 KiB buffer
//! memories at [`TXMEM_BASE`] / [`RXMEM_BASE`].

use bitflags::bitflags;

// =============================================================================
// Global registers
// =============================================================================

pub const MR: u16 = 0x0000;
pub const GATEWAY: u16 = 0x0001;
pub const SUBNET_MASK: u16 = 0x0005;
pub const SOURCE_MAC: u16 = 0x0009;
pub const SOURCE_IP: u16 = 0x000F;
pub const IR: u16 = 0x0015;
/// Socket interrupt mask, one bit per socket.
pub const IMR: u16 = 0x0016;
/// Retransmission timeout, 100 µs units.
pub const RTR: u16 = 0x0017;
/// Retransmission count.
pub const RCR: u16 = 0x0019;
pub const PPPOE_AUTH_TYPE: u16 = 0x001C;
pub const PPPOE_ALGORITHM: u16 = 0x001E;
pub const VERSIONR: u16 = 0x001F;
pub const PPPOE_TIMER: u16 = 0x0028;
pub const PPPOE_MAGIC: u16 = 0x0029;
pub const INTLEVEL: u16 = 0x0030;
/// Socket interrupt register, one bit per socket with a pending event.
pub const IR2: u16 = 0x0034;
pub const PHYSTATUS: u16 = 0x0035;
/// System interrupt mask (IP conflict, PPPoE close).
pub const IMR2: u16 = 0x0036;

// =============================================================================
// Per-socket register file
// =============================================================================

pub const SOCK_BASE: u16 = 0x4000;
pub const SOCK_STRIDE: u16 = 0x0100;

pub const SOCK_MR: u16 = 0x0000;
pub const SOCK_CR: u16 = 0x0001;
pub const SOCK_IR: u16 = 0x0002;
pub const SOCK_SR: u16 = 0x0003;
pub const SOCK_SRC_PORT: u16 = 0x0004;
pub const SOCK_DEST_MAC: u16 = 0x0006;
pub const SOCK_DEST_IP: u16 = 0x000C;
pub const SOCK_DEST_PORT: u16 = 0x0010;
pub const SOCK_MSS: u16 = 0x0012;
/// IP protocol number used by IP-raw sockets.
pub const SOCK_PROTO: u16 = 0x0014;
pub const SOCK_TOS: u16 = 0x0015;
pub const SOCK_TTL: u16 = 0x0016;
/// RX window size in KiB.
pub const SOCK_RXMEM_SIZE: u16 = 0x001E;
/// TX window size in KiB.
pub const SOCK_TXMEM_SIZE: u16 = 0x001F;
pub const SOCK_TX_FSR: u16 = 0x0020;
pub const SOCK_TX_RD: u16 = 0x0022;
pub const SOCK_TX_WR: u16 = 0x0024;
pub const SOCK_RX_RSR: u16 = 0x0026;
pub const SOCK_RX_RD: u16 = 0x0028;
pub const SOCK_RX_WR: u16 = 0x002A;
pub const SOCK_IMR: u16 = 0x002C;
pub const SOCK_FRAG: u16 = 0x002D;

// =============================================================================
// Buffer memory
// =============================================================================

pub const TXMEM_BASE: u16 = 0x8000;
pub const RXMEM_BASE: u16 = 0xC000;
/// Each of the TX and RX memories is 16 KiB, shared by all sockets.
pub const BUFFER_MEMORY_SIZE: usize = 16 * 1024;

/// Number of hardware sockets.
pub const MAX_SOCKETS: usize = 8;

/// Expected contents of [`VERSIONR`] on a W5200.
pub const CHIP_VERSION: u8 = 0x03;

/// Resolve a per-socket register to its global address.
#[inline]
pub const fn sock_reg(sock: usize, offset: u16) -> u16 {
    SOCK_BASE + SOCK_STRIDE * sock as u16 + offset
}

// =============================================================================
// SPI framing
// =============================================================================

/// OR-ed into the high length byte of a write frame.
pub const SPI_OPCODE_WRITE: u8 = 0x80;
pub const SPI_OPCODE_READ: u8 = 0x00;
/// Largest payload a single SPI frame can carry (15-bit length field).
pub const SPI_MAX_FRAME_LEN: usize = 0x7FFF;

// =============================================================================
// Register bits
// =============================================================================

bitflags! {
    /// Common mode register (`MR`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ModeFlags: u8 {
        /// Software reset; self-clearing.
        const RESET       = 0x80;
        const WAKE_ON_LAN = 0x20;
        /// Ignore ICMP echo requests.
        const PING_BLOCK  = 0x10;
        const PPPOE       = 0x08;
    }
}

bitflags! {
    /// PHY status register (`PHYSTATUS`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PhyStatus: u8 {
        const LINK       = 0x20;
        const POWER_SAVE = 0x10;
        const POWER_DOWN = 0x08;
    }
}

bitflags! {
    /// System interrupt mask (`IMR2`) / system interrupt register (`IR`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SystemInterrupt: u8 {
        const IP_CONFLICT = 0x80;
        const PPPOE_CLOSE = 0x20;
    }
}

bitflags! {
    /// Per-socket interrupt register (`Sn_IR`) and mask (`Sn_IMR`).
    ///
    /// `Sn_IR` bits are write-one-to-clear.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SocketInterrupt: u8 {
        const PPPOE_RECV = 0x80;
        const PPPOE_FAIL = 0x40;
        const PPPOE_NEXT = 0x20;
        const SEND_OK    = 0x10;
        const TIMEOUT    = 0x08;
        const RECV       = 0x04;
        const DISCON     = 0x02;
        const CON        = 0x01;

        /// Events that end a TCP session.
        const TERMINAL = Self::TIMEOUT.bits() | Self::DISCON.bits();
        /// Everything except the PPPoE bits.
        const STANDARD = 0x1F;
    }
}

bitflags! {
    /// Option bits of the socket mode register (`Sn_MR`), above the protocol nibble.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SocketModeFlags: u8 {
        /// Multicast for UDP, MAC filter for MAC-raw.
        const MULTI  = 0x80;
        const MAC_FILTER = 0x40;
        /// No delayed ACK (TCP) / IGMP version (UDP multicast).
        const NO_DELAYED_ACK = 0x20;
    }
}

// =============================================================================
// Protocol modes, commands, status codes
// =============================================================================

pub const SOCK_MR_PROTO_MASK: u8 = 0x0F;

/// Protocol nibble of `Sn_MR`.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp = 0x01,
    Udp = 0x02,
    IpRaw = 0x03,
    MacRaw = 0x04,
    PppoeRaw = 0x05,
}

impl Protocol {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw & SOCK_MR_PROTO_MASK {
            0x01 => Some(Self::Tcp),
            0x02 => Some(Self::Udp),
            0x03 => Some(Self::IpRaw),
            0x04 => Some(Self::MacRaw),
            0x05 => Some(Self::PppoeRaw),
            _ => None,
        }
    }

    /// Link-layer modes are pinned to socket 0.
    #[inline]
    pub const fn is_link_layer(self) -> bool {
        matches!(self, Self::MacRaw | Self::PppoeRaw)
    }

    /// Protocols that deliver discrete datagrams with a chip preamble.
    #[inline]
    pub const fn is_datagram(self) -> bool {
        matches!(self, Self::Udp | Self::IpRaw)
    }
}

impl TryFrom<u8> for Protocol {
    type Error = crate::NetError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        if raw & !SOCK_MR_PROTO_MASK != 0 {
            return Err(crate::NetError::ProtocolNotSupported);
        }
        Self::from_raw(raw).ok_or(crate::NetError::ProtocolNotSupported)
    }
}

/// Socket command register (`Sn_CR`) opcodes.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketCommand {
    Open = 0x01,
    Listen = 0x02,
    Connect = 0x04,
    Disconnect = 0x08,
    Close = 0x10,
    Send = 0x20,
    SendMac = 0x21,
    SendKeepalive = 0x22,
    Recv = 0x40,
}

impl SocketCommand {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::Open),
            0x02 => Some(Self::Listen),
            0x04 => Some(Self::Connect),
            0x08 => Some(Self::Disconnect),
            0x10 => Some(Self::Close),
            0x20 => Some(Self::Send),
            0x21 => Some(Self::SendMac),
            0x22 => Some(Self::SendKeepalive),
            0x40 => Some(Self::Recv),
            _ => None,
        }
    }
}

pub const SOCK_SR_CLOSED: u8 = 0x00;
pub const SOCK_SR_ARP: u8 = 0x01;
pub const SOCK_SR_INIT: u8 = 0x13;
pub const SOCK_SR_LISTEN: u8 = 0x14;
pub const SOCK_SR_SYNSENT: u8 = 0x15;
pub const SOCK_SR_SYNRECV: u8 = 0x16;
pub const SOCK_SR_ESTABLISHED: u8 = 0x17;
pub const SOCK_SR_FIN_WAIT: u8 = 0x18;
pub const SOCK_SR_CLOSING: u8 = 0x1A;
pub const SOCK_SR_TIME_WAIT: u8 = 0x1B;
pub const SOCK_SR_CLOSE_WAIT: u8 = 0x1C;
pub const SOCK_SR_LAST_ACK: u8 = 0x1D;
pub const SOCK_SR_UDP: u8 = 0x22;
pub const SOCK_SR_IPRAW: u8 = 0x32;
pub const SOCK_SR_MACRAW: u8 = 0x42;
pub const SOCK_SR_PPPOE: u8 = 0x5F;

/// Decoded socket status register (`Sn_SR`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketStatus {
    Closed,
    Arp,
    Init,
    Listen,
    SynSent,
    SynRecv,
    Established,
    FinWait,
    Closing,
    TimeWait,
    CloseWait,
    LastAck,
    Udp,
    IpRaw,
    MacRaw,
    Pppoe,
    Unknown(u8),
}

impl SocketStatus {
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            SOCK_SR_CLOSED => Self::Closed,
            SOCK_SR_ARP => Self::Arp,
            SOCK_SR_INIT => Self::Init,
            SOCK_SR_LISTEN => Self::Listen,
            SOCK_SR_SYNSENT => Self::SynSent,
            SOCK_SR_SYNRECV => Self::SynRecv,
            SOCK_SR_ESTABLISHED => Self::Established,
            SOCK_SR_FIN_WAIT => Self::FinWait,
            SOCK_SR_CLOSING => Self::Closing,
            SOCK_SR_TIME_WAIT => Self::TimeWait,
            SOCK_SR_CLOSE_WAIT => Self::CloseWait,
            SOCK_SR_LAST_ACK => Self::LastAck,
            SOCK_SR_UDP => Self::Udp,
            SOCK_SR_IPRAW => Self::IpRaw,
            SOCK_SR_MACRAW => Self::MacRaw,
            SOCK_SR_PPPOE => Self::Pppoe,
            other => Self::Unknown(other),
        }
    }

    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Closed => SOCK_SR_CLOSED,
            Self::Arp => SOCK_SR_ARP,
            Self::Init => SOCK_SR_INIT,
            Self::Listen => SOCK_SR_LISTEN,
            Self::SynSent => SOCK_SR_SYNSENT,
            Self::SynRecv => SOCK_SR_SYNRECV,
            Self::Established => SOCK_SR_ESTABLISHED,
            Self::FinWait => SOCK_SR_FIN_WAIT,
            Self::Closing => SOCK_SR_CLOSING,
            Self::TimeWait => SOCK_SR_TIME_WAIT,
            Self::CloseWait => SOCK_SR_CLOSE_WAIT,
            Self::LastAck => SOCK_SR_LAST_ACK,
            Self::Udp => SOCK_SR_UDP,
            Self::IpRaw => SOCK_SR_IPRAW,
            Self::MacRaw => SOCK_SR_MACRAW,
            Self::Pppoe => SOCK_SR_PPPOE,
            Self::Unknown(raw) => raw,
        }
    }

    /// Linux-style TCP state name, or the mode name for non-TCP states.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Established => "ESTABLISHED",
            Self::SynSent => "SYN_SENT",
            Self::SynRecv => "SYN_RECV",
            Self::FinWait => "FIN_WAIT",
            Self::TimeWait => "TIME_WAIT",
            Self::Closed => "CLOSE",
            Self::CloseWait => "CLOSE_WAIT",
            Self::LastAck => "LAST_ACK",
            Self::Listen => "LISTEN",
            Self::Closing => "CLOSING",
            Self::Arp => "ARP",
            Self::Init => "INIT",
            Self::Udp => "UDP",
            Self::IpRaw => "IPRAW",
            Self::MacRaw => "MACRAW",
            Self::Pppoe => "PPPOE",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl core::fmt::Display for SocketStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "UNKNOWN(0x{raw:02x})"),
            other => f.write_str(other.name()),
        }
    }
}
