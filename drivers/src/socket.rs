//! Socket engine: the descriptor table and the per-protocol state machine
//! driving the chip's eight hardware sockets.
//!
//! Descriptors are plain slot indices (`0..MAX_SOCKETS`). Every operation
//! is synchronous; only [`W5200::connect`] and [`W5200::txcommit`] poll the
//! chip until it reports an outcome, everything else returns
//! [`NetError::WouldBlock`] instead of waiting.

use w52_abi::regs::{
    IMR, IMR2, MAX_SOCKETS, Protocol, SocketCommand, SocketInterrupt, SocketStatus,
    SystemInterrupt,
};
use w52_abi::{Ipv4Addr, NetError, NetResult, Port, SockAddr};
use w52_lib::{IrqFlag, NetConfig, klog_debug, klog_warn};

use crate::idle::Idle;
use crate::sockreg::RegisterExt;
use crate::spi::RegisterPort;

/// Hardware socket index.
pub type SocketFd = usize;

/// Status polls allowed for OPEN/LISTEN to take effect.
const STATUS_SETTLE_POLLS: u32 = 64;

/// Chip preamble in front of every UDP datagram: source IP, port, length.
pub const UDP_PREAMBLE_LEN: usize = 8;
/// Chip preamble in front of every IP-raw datagram: source IP, length.
pub const IPRAW_PREAMBLE_LEN: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SocketRecord {
    /// `None` while the slot is free.
    pub mode: Option<Protocol>,
    /// TCP server socket created through `bind()`; re-armed automatically.
    pub is_bind: bool,
    /// Rotates the ephemeral port on every `connect()`; survives close.
    pub srcport_idx: u8,
    /// Cached virtual TX write cursor.
    pub tx_wr: u16,
    /// Cached virtual RX read cursor.
    pub rx_rd: u16,
}

impl SocketRecord {
    pub const fn empty() -> Self {
        Self {
            mode: None,
            is_bind: false,
            srcport_idx: 0,
            tx_wr: 0,
            rx_rd: 0,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.mode.is_some()
    }
}

pub struct SocketTable {
    slots: [SocketRecord; MAX_SOCKETS],
}

impl SocketTable {
    pub const fn new() -> Self {
        Self {
            slots: [SocketRecord::empty(); MAX_SOCKETS],
        }
    }

    /// Highest free index; low slots stay available for link-layer modes.
    pub fn alloc_slot(&self) -> Option<SocketFd> {
        (0..MAX_SOCKETS).rev().find(|&fd| !self.slots[fd].is_active())
    }

    pub fn get(&self, fd: SocketFd) -> Option<&SocketRecord> {
        self.slots.get(fd).filter(|s| s.is_active())
    }

    pub fn get_mut(&mut self, fd: SocketFd) -> Option<&mut SocketRecord> {
        self.slots.get_mut(fd).filter(|s| s.is_active())
    }

    fn claim(&mut self, fd: SocketFd, mode: Protocol, tx_wr: u16, rx_rd: u16) {
        let slot = &mut self.slots[fd];
        slot.mode = Some(mode);
        slot.is_bind = false;
        slot.tx_wr = tx_wr;
        slot.rx_rd = rx_rd;
    }

    pub fn release(&mut self, fd: SocketFd) {
        if let Some(slot) = self.slots.get_mut(fd) {
            *slot = SocketRecord {
                srcport_idx: slot.srcport_idx,
                ..SocketRecord::empty()
            };
        }
    }

    pub fn reset_all(&mut self) {
        self.slots = [SocketRecord::empty(); MAX_SOCKETS];
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_active()).count()
    }
}

impl Default for SocketTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Driver instance for one W5200 chip.
///
/// Owns the register port, the board's idle primitive and the descriptor
/// table. The sticky interrupt flag is borrowed so the ISR can reach it
/// without going through the driver.
pub struct W5200<'irq, P: RegisterPort, W: Idle> {
    pub(crate) port: P,
    pub(crate) idle: W,
    pub(crate) irq: &'irq IrqFlag,
    pub(crate) config: NetConfig,
    pub(crate) table: SocketTable,
}

impl<'irq, P: RegisterPort, W: Idle> W5200<'irq, P, W> {
    /// Wrap a register port. No bus traffic happens until [`W5200::init`].
    pub fn new(port: P, idle: W, irq: &'irq IrqFlag, config: NetConfig) -> Self {
        Self {
            port,
            idle,
            irq,
            config,
            table: SocketTable::new(),
        }
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn table(&self) -> &SocketTable {
        &self.table
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn irq_flag(&self) -> &'irq IrqFlag {
        self.irq
    }

    pub fn into_port(self) -> P {
        self.port
    }

    // -------------------------------------------------------------------------
    // Descriptor helpers
    // -------------------------------------------------------------------------

    #[inline]
    pub(crate) fn check_fd(fd: SocketFd) -> NetResult<()> {
        if fd < MAX_SOCKETS {
            Ok(())
        } else {
            Err(NetError::InvalidDescriptor)
        }
    }

    pub(crate) fn record(&self, fd: SocketFd) -> NetResult<&SocketRecord> {
        Self::check_fd(fd)?;
        self.table.get(fd).ok_or(NetError::InvalidDescriptor)
    }

    pub(crate) fn record_mut(&mut self, fd: SocketFd) -> NetResult<&mut SocketRecord> {
        Self::check_fd(fd)?;
        self.table.get_mut(fd).ok_or(NetError::InvalidDescriptor)
    }

    pub(crate) fn protocol(&self, fd: SocketFd) -> NetResult<Protocol> {
        self.record(fd)?.mode.ok_or(NetError::InvalidDescriptor)
    }

    /// Re-read both cursors from the chip after it (re)opened the socket.
    fn refresh_cursors(&mut self, fd: SocketFd) -> NetResult<()> {
        let tx_wr = self.port.read_sock_tx_wr(fd);
        let rx_rd = self.port.read_sock_rx_rd(fd);
        let rec = self.record_mut(fd)?;
        rec.tx_wr = tx_wr;
        rec.rx_rd = rx_rd;
        Ok(())
    }

    fn set_irq_enabled(&mut self, fd: SocketFd, enabled: bool) {
        let mask = self.port.read_u8(IMR);
        let bit = 1u8 << fd;
        let mask = if enabled { mask | bit } else { mask & !bit };
        self.port.write_u8(IMR, mask);
    }

    /// Park in the idle primitive unless something is already pending.
    pub(crate) fn idle_unless_pending(&mut self, ir: SocketInterrupt) {
        if ir.is_empty() && !self.irq.is_raised() {
            self.idle.wait_for_event();
        }
    }

    /// Poll until the socket reaches `expected`; force-close it otherwise.
    fn settle(&mut self, fd: SocketFd, expected: SocketStatus) -> NetResult<()> {
        let mut status = self.port.sock_status(fd);
        for _ in 0..STATUS_SETTLE_POLLS {
            if status == expected {
                return Ok(());
            }
            status = self.port.sock_status(fd);
        }
        if status == expected {
            return Ok(());
        }
        klog_warn!(
            "w52: socket {} stuck in {} waiting for {}, closing",
            fd,
            status,
            expected
        );
        self.port.sock_command(fd, SocketCommand::Close);
        Err(NetError::InternalFault)
    }

    fn close_if_open(&mut self, fd: SocketFd, status: SocketStatus) {
        if status != SocketStatus::Closed {
            self.port.sock_command(fd, SocketCommand::Close);
        }
    }

    fn set_destination(&mut self, fd: SocketFd, dest: SockAddr) {
        self.port.set_sock_dest_ip(fd, dest.ip);
        self.port.write_sock_dest_port(fd, dest.port.as_u16());
    }

    /// `base + offset + idx * MAX_SOCKETS + fd`, all modulo 2^16.
    fn next_ephemeral_port(&mut self, fd: SocketFd) -> NetResult<u16> {
        let base = self.config.srcport_base.wrapping_add(self.config.srcport_offset);
        let rec = self.record_mut(fd)?;
        rec.srcport_idx = rec.srcport_idx.wrapping_add(1);
        Ok((rec.srcport_idx as u16)
            .wrapping_mul(MAX_SOCKETS as u16)
            .wrapping_add(fd as u16)
            .wrapping_add(base))
    }

    fn rearm_if_bound(&mut self, fd: SocketFd) -> NetResult<()> {
        if self.record(fd)?.is_bind {
            self.quickbind(fd)?;
        }
        Ok(())
    }

    /// Finish our side of a TCP session the chip reported as ended, then
    /// acknowledge the TIMEOUT/DISCON and map it to an error. DISCON wins
    /// when both are latched.
    fn abort_session(&mut self, fd: SocketFd, ir: SocketInterrupt) -> NetError {
        self.port.sock_command(fd, SocketCommand::Disconnect);
        self.port
            .clear_sock_interrupts(fd, ir & SocketInterrupt::TERMINAL);
        let err = if ir.contains(SocketInterrupt::DISCON) {
            NetError::ConnectionAborted
        } else {
            NetError::TimedOut
        };
        klog_debug!("w52: socket {} session ended: {}", fd, err);
        if let Err(e) = self.rearm_if_bound(fd) {
            klog_warn!("w52: socket {} re-arm failed: {}", fd, e);
        }
        err
    }

    /// Fallback when a read finds nothing buffered: distinguishes a dead
    /// TCP session from "nothing yet".
    fn check_connection(&mut self, fd: SocketFd) -> NetResult<()> {
        if self.protocol(fd)? != Protocol::Tcp {
            return Ok(());
        }
        let ir = self.port.sock_interrupts(fd);
        if ir.intersects(SocketInterrupt::TERMINAL) {
            self.port.sock_command(fd, SocketCommand::Disconnect);
            self.port
                .clear_sock_interrupts(fd, ir & SocketInterrupt::TERMINAL);
        }
        let status = self.port.sock_status(fd);
        if status == SocketStatus::Established {
            return Ok(());
        }
        if !matches!(status, SocketStatus::Listen | SocketStatus::SynRecv) {
            self.rearm_if_bound(fd)?;
        }
        Err(NetError::NotConnected)
    }

    // -------------------------------------------------------------------------
    // Public socket API
    // -------------------------------------------------------------------------

    /// Claim a hardware socket for `protocol`.
    ///
    /// TCP, UDP and IP-raw take the highest free slot. MAC-raw and PPPoE
    /// are pinned to slot 0.
    pub fn socket(&mut self, protocol: Protocol) -> NetResult<SocketFd> {
        let fd = if protocol.is_link_layer() {
            if self.table.get(0).is_some() {
                return Err(NetError::AddressInUse);
            }
            0
        } else {
            self.table.alloc_slot().ok_or(NetError::NoFreeSocket)?
        };

        let tx_wr = self.port.read_sock_tx_wr(fd);
        let rx_rd = self.port.read_sock_rx_rd(fd);
        self.table.claim(fd, protocol, tx_wr, rx_rd);

        self.port.write_sock_mode(fd, protocol as u8);
        self.port.sock_command(fd, SocketCommand::Close);
        match protocol {
            Protocol::PppoeRaw => {
                self.port.write_sock_imr(fd, 0xFF);
                self.port.write_u8(
                    IMR2,
                    (SystemInterrupt::IP_CONFLICT | SystemInterrupt::PPPOE_CLOSE).bits(),
                );
            }
            Protocol::MacRaw => {
                self.port.write_sock_imr(fd, SocketInterrupt::STANDARD.bits());
                self.port.write_u8(IMR2, 0);
            }
            _ => self.port.write_sock_imr(fd, SocketInterrupt::STANDARD.bits()),
        }
        self.set_irq_enabled(fd, true);

        klog_debug!("w52: socket {} claimed ({:?})", fd, protocol);
        Ok(fd)
    }

    /// [`W5200::socket`] for a raw `Sn_MR` protocol number.
    pub fn socket_raw(&mut self, protocol: u8) -> NetResult<SocketFd> {
        self.socket(Protocol::try_from(protocol)?)
    }

    /// Open the socket on a local port.
    ///
    /// TCP sockets go to LISTEN and are re-armed automatically whenever
    /// their connection ends. For IP-raw sockets `port` is the IP protocol
    /// number. MAC-raw sockets ignore `port`.
    pub fn bind(&mut self, fd: SocketFd, port: u16) -> NetResult<()> {
        let proto = self.protocol(fd)?;
        let status = self.port.sock_status(fd);
        match proto {
            Protocol::Tcp | Protocol::Udp => {
                if matches!(status, SocketStatus::Established | SocketStatus::SynSent) {
                    return Err(NetError::AddressInUse);
                }
                self.close_if_open(fd, status);
                self.port.write_sock_src_port(fd, port);
                self.port.sock_command(fd, SocketCommand::Open);
                if proto == Protocol::Udp {
                    self.settle(fd, SocketStatus::Udp)?;
                } else {
                    self.settle(fd, SocketStatus::Init)?;
                    self.port.sock_command(fd, SocketCommand::Listen);
                    self.settle(fd, SocketStatus::Listen)?;
                    self.record_mut(fd)?.is_bind = true;
                }
            }
            Protocol::IpRaw => {
                let ip_proto = u8::try_from(port).map_err(|_| NetError::InvalidArgument)?;
                self.close_if_open(fd, status);
                self.port.write_sock_proto(fd, ip_proto);
                self.port.sock_command(fd, SocketCommand::Open);
                self.settle(fd, SocketStatus::IpRaw)?;
            }
            Protocol::MacRaw => {
                self.close_if_open(fd, status);
                self.port.sock_command(fd, SocketCommand::Open);
                self.settle(fd, SocketStatus::MacRaw)?;
            }
            Protocol::PppoeRaw => return Err(NetError::OperationNotSupported),
        }
        self.refresh_cursors(fd)?;
        klog_debug!("w52: socket {} bound ({:?} port {})", fd, proto, port);
        Ok(())
    }

    /// Connect a TCP socket (blocking until established or refused) or set
    /// the default destination of a UDP socket.
    pub fn connect(&mut self, fd: SocketFd, dest: SockAddr) -> NetResult<()> {
        let proto = self.protocol(fd)?;
        if self.config.link_check || cfg!(feature = "strict-link") {
            self.link_up()?;
        }
        match proto {
            Protocol::Tcp => self.connect_stream(fd, dest),
            Protocol::Udp => self.connect_datagram(fd, dest),
            _ => Err(NetError::OperationNotSupported),
        }
    }

    fn connect_stream(&mut self, fd: SocketFd, dest: SockAddr) -> NetResult<()> {
        match self.port.sock_status(fd) {
            SocketStatus::Established => return Err(NetError::AlreadyConnected),
            SocketStatus::Listen => return Err(NetError::AddressInUse),
            SocketStatus::Closed => {}
            _ => self.port.sock_command(fd, SocketCommand::Close),
        }

        let src_port = self.next_ephemeral_port(fd)?;
        self.port.write_sock_src_port(fd, src_port);
        self.port.sock_command(fd, SocketCommand::Open);
        self.settle(fd, SocketStatus::Init)?;

        self.set_destination(fd, dest);
        self.record_mut(fd)?.is_bind = false;
        self.port.sock_command(fd, SocketCommand::Connect);

        loop {
            let ir = self.port.sock_interrupts(fd);
            if ir.intersects(SocketInterrupt::TERMINAL) {
                self.port.clear_sock_interrupts(fd, ir);
                self.port.sock_command(fd, SocketCommand::Close);
                let err = if ir.contains(SocketInterrupt::TIMEOUT) {
                    NetError::TimedOut
                } else {
                    NetError::ConnectionRefused
                };
                klog_debug!("w52: socket {} connect to {} failed: {}", fd, dest, err);
                return Err(err);
            }
            if ir.contains(SocketInterrupt::CON)
                || self.port.sock_status(fd) == SocketStatus::Established
            {
                break;
            }
            self.idle_unless_pending(ir);
        }

        self.port.clear_sock_interrupts(fd, SocketInterrupt::CON);
        self.refresh_cursors(fd)?;
        klog_debug!("w52: socket {} connected {} -> {}", fd, src_port, dest);
        Ok(())
    }

    fn connect_datagram(&mut self, fd: SocketFd, dest: SockAddr) -> NetResult<()> {
        let status = self.port.sock_status(fd);
        self.close_if_open(fd, status);
        let src_port = self.next_ephemeral_port(fd)?;
        self.port.write_sock_src_port(fd, src_port);
        self.port.sock_command(fd, SocketCommand::Open);
        self.settle(fd, SocketStatus::Udp)?;
        self.set_destination(fd, dest);
        self.refresh_cursors(fd)?;
        Ok(())
    }

    /// Non-blocking check whether a listening TCP socket got a client.
    pub fn accept(&mut self, fd: SocketFd) -> NetResult<()> {
        if self.protocol(fd)? != Protocol::Tcp {
            return Err(NetError::OperationNotSupported);
        }
        let ir = self.port.sock_interrupts(fd);
        if ir.contains(SocketInterrupt::CON) {
            self.port.clear_sock_interrupts(fd, SocketInterrupt::CON);
            self.refresh_cursors(fd)?;
            klog_debug!("w52: socket {} accepted a client", fd);
            return Ok(());
        }

        let status = self.port.sock_status(fd);
        if status == SocketStatus::Established {
            return Err(NetError::AlreadyConnected);
        }
        let ended = ir.intersects(SocketInterrupt::TERMINAL);
        if ended {
            self.port
                .clear_sock_interrupts(fd, ir & SocketInterrupt::TERMINAL);
        }
        if (ended && status != SocketStatus::Listen) || status == SocketStatus::Closed {
            self.rearm_if_bound(fd)?;
        }
        Err(NetError::WouldBlock)
    }

    /// Close, reopen and LISTEN again on the socket's current source port.
    pub fn quickbind(&mut self, fd: SocketFd) -> NetResult<()> {
        if self.protocol(fd)? != Protocol::Tcp {
            return Err(NetError::OperationNotSupported);
        }
        let status = self.port.sock_status(fd);
        self.close_if_open(fd, status);
        self.port.sock_command(fd, SocketCommand::Open);
        self.settle(fd, SocketStatus::Init)?;
        self.port.sock_command(fd, SocketCommand::Listen);
        self.settle(fd, SocketStatus::Listen)?;
        self.refresh_cursors(fd)?;
        klog_debug!(
            "w52: socket {} re-armed on port {}",
            fd,
            self.port.read_sock_src_port(fd)
        );
        Ok(())
    }

    /// Queue `data` on an established TCP socket. Never writes partially.
    pub fn send(&mut self, fd: SocketFd, data: &[u8], commit: bool) -> NetResult<usize> {
        if self.protocol(fd)? != Protocol::Tcp {
            return Err(NetError::OperationNotSupported);
        }
        let ir = self.port.sock_interrupts(fd);
        if ir.intersects(SocketInterrupt::TERMINAL) {
            return Err(self.abort_session(fd, ir));
        }
        if self.port.sock_status(fd) != SocketStatus::Established {
            return Err(NetError::NotConnected);
        }
        if data.len() > self.available_tx_free(fd)? as usize {
            return Err(NetError::BufferExhausted);
        }
        self.write_tx(fd, data)?;
        if commit {
            self.txcommit(fd)?;
        }
        Ok(data.len())
    }

    /// Queue a datagram on a UDP or IP-raw socket, optionally retargeting it.
    pub fn sendto(
        &mut self,
        fd: SocketFd,
        data: &[u8],
        dest: Option<SockAddr>,
        commit: bool,
    ) -> NetResult<usize> {
        if !self.protocol(fd)?.is_datagram() {
            return Err(NetError::OperationNotSupported);
        }
        if data.len() > self.available_tx_free(fd)? as usize {
            return Err(NetError::BufferExhausted);
        }
        if let Some(dest) = dest {
            self.set_destination(fd, dest);
        }
        self.write_tx(fd, data)?;
        if commit {
            self.txcommit(fd)?;
        }
        Ok(data.len())
    }

    /// Hand everything queued in the TX ring to the chip and wait until it
    /// has been sent.
    pub fn txcommit(&mut self, fd: SocketFd) -> NetResult<()> {
        let proto = self.protocol(fd)?;
        if self.tx_pending(fd)? == 0 {
            return Ok(());
        }
        self.port.clear_sock_interrupts(fd, SocketInterrupt::SEND_OK);
        self.port.sock_command(fd, SocketCommand::Send);

        loop {
            let ir = self.port.sock_interrupts(fd);
            if ir.contains(SocketInterrupt::SEND_OK) {
                self.port.clear_sock_interrupts(fd, SocketInterrupt::SEND_OK);
                if self.tx_pending(fd)? == 0 {
                    return Ok(());
                }
                self.port.sock_command(fd, SocketCommand::Send);
                continue;
            }
            if ir.intersects(SocketInterrupt::TERMINAL) {
                if proto == Protocol::Tcp {
                    return Err(self.abort_session(fd, ir));
                }
                // Datagram sockets report an ARP failure as TIMEOUT.
                self.port
                    .clear_sock_interrupts(fd, ir & SocketInterrupt::TERMINAL);
                return Err(NetError::TimedOut);
            }
            self.idle_unless_pending(ir);
        }
    }

    /// Copy up to `buf.len()` buffered bytes out.
    pub fn recv(&mut self, fd: SocketFd, buf: &mut [u8], consume: bool) -> NetResult<usize> {
        let avail = self.available_rx(fd)? as usize;
        if avail > 0 {
            let n = avail.min(buf.len());
            self.read_rx(fd, &mut buf[..n], consume)?;
            return Ok(n);
        }
        self.check_connection(fd)?;
        Err(NetError::WouldBlock)
    }

    /// As [`W5200::recv`] but stop after the first `delimiter`.
    pub fn search_recv(
        &mut self,
        fd: SocketFd,
        buf: &mut [u8],
        delimiter: u8,
        consume: bool,
    ) -> NetResult<usize> {
        let avail = self.available_rx(fd)? as usize;
        if avail > 0 {
            let n = avail.min(buf.len());
            return self.search_read_rx(fd, &mut buf[..n], delimiter, consume);
        }
        self.check_connection(fd)?;
        Err(NetError::WouldBlock)
    }

    /// Read ahead at `offset` without moving the read cursor.
    pub fn peek(&mut self, fd: SocketFd, offset: usize, buf: &mut [u8]) -> NetResult<usize> {
        let avail = self.available_rx(fd)? as usize;
        if avail > 0 {
            if avail <= offset {
                return Err(NetError::WouldBlock);
            }
            let n = (avail - offset).min(buf.len());
            self.peek_rx(fd, offset, &mut buf[..n])?;
            return Ok(n);
        }
        self.check_connection(fd)?;
        Err(NetError::WouldBlock)
    }

    /// Discard up to `len` buffered bytes.
    pub fn flush(&mut self, fd: SocketFd, len: usize, consume: bool) -> NetResult<usize> {
        let avail = self.available_rx(fd)? as usize;
        if avail > 0 {
            let n = avail.min(len);
            self.flush_rx(fd, n, consume)?;
            return Ok(n);
        }
        self.check_connection(fd)?;
        Err(NetError::WouldBlock)
    }

    /// Receive one datagram from a UDP or IP-raw socket.
    ///
    /// IP-raw datagrams carry no port; the returned address has port 0. A
    /// datagram longer than `buf` is truncated and its tail discarded.
    pub fn recvfrom(
        &mut self,
        fd: SocketFd,
        buf: &mut [u8],
        consume: bool,
    ) -> NetResult<(usize, SockAddr)> {
        let proto = self.protocol(fd)?;
        let header_len = match proto {
            Protocol::Udp => UDP_PREAMBLE_LEN,
            Protocol::IpRaw => IPRAW_PREAMBLE_LEN,
            _ => return Err(NetError::OperationNotSupported),
        };
        let avail = self.available_rx(fd)? as usize;
        if avail < header_len {
            return Err(NetError::WouldBlock);
        }

        let mut raw = [0u8; UDP_PREAMBLE_LEN];
        let header = &mut raw[..header_len];
        self.read_rx(fd, header, false)?;
        let ip = Ipv4Addr([header[0], header[1], header[2], header[3]]);
        let (port, len) = if proto == Protocol::Udp {
            (
                Port::from_network_bytes([header[4], header[5]]),
                u16::from_be_bytes([header[6], header[7]]),
            )
        } else {
            (Port(0), u16::from_be_bytes([header[4], header[5]]))
        };

        let len = (len as usize).min(avail - header_len);
        let take = len.min(buf.len());
        let rest = len - take;
        self.read_rx(fd, &mut buf[..take], consume && rest == 0)?;
        if rest > 0 {
            self.flush_rx(fd, rest, consume)?;
        }
        Ok((take, SockAddr::new(ip, port)))
    }

    /// Release the socket. TCP sessions get a graceful DISCON first.
    pub fn close(&mut self, fd: SocketFd) -> NetResult<()> {
        Self::check_fd(fd)?;
        let mut ir = self.port.sock_interrupts(fd);
        if let Some(rec) = self.table.get_mut(fd).filter(|r| r.mode == Some(Protocol::Tcp)) {
            rec.is_bind = false;
            if !ir.contains(SocketInterrupt::DISCON)
                && self.port.sock_status(fd) == SocketStatus::Established
            {
                self.port.sock_command(fd, SocketCommand::Disconnect);
                if !self.irq.is_raised() {
                    self.idle.wait_for_event();
                }
                ir = self.port.sock_interrupts(fd);
            }
        }
        self.port.clear_sock_interrupts(fd, ir);
        self.port.sock_command(fd, SocketCommand::Close);
        self.set_irq_enabled(fd, false);
        self.table.release(fd);
        klog_debug!("w52: socket {} closed", fd);
        Ok(())
    }

    /// Current hardware state of any slot, claimed or not.
    pub fn socket_status(&mut self, fd: SocketFd) -> NetResult<SocketStatus> {
        Self::check_fd(fd)?;
        Ok(self.port.sock_status(fd))
    }
}
