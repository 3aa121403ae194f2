//! Register-level W5200 model used by the driver tests.
//!
//! Decodes SPI frames into a flat 64 KiB address space and reacts to
//! socket commands the way the chip does, with scripted outcomes for the
//! parts that depend on a network peer.

use w52_abi::regs::*;
use w52_abi::{Ipv4Addr, SockAddr};
use w52_lib::{IrqFlag, NetConfig};

use crate::idle::Idle;
use crate::socket::{SocketFd, W5200};
use crate::spi::{SpiRegisters, SpiTransport};

const MEM_SIZE: usize = 0x1_0000;
const DEFAULT_RTR: u16 = 0x07D0;
const DEFAULT_RCR: u8 = 8;

/// What the remote end does with a CONNECT.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    Established,
    Timeout,
    Refused,
}

#[derive(Default)]
struct Frame {
    active: bool,
    pos: usize,
    addr: u16,
    write: bool,
}

pub struct SimChip<'irq> {
    mem: Vec<u8>,
    frame: Frame,
    irq: &'irq IrqFlag,
    link: bool,
    pub connect_outcome: ConnectOutcome,
    /// Bytes the chip transmits per SEND; `None` drains everything.
    pub send_chunk: Option<usize>,
    /// Raised instead of SEND_OK on the next SEND.
    pub send_fault: Option<SocketInterrupt>,
    /// LISTEN leaves the socket in INIT.
    pub listen_fault: bool,
    /// Payload handed to the wire by every SEND, per socket.
    pub sent: Vec<(SocketFd, Vec<u8>)>,
    pub commands: Vec<(SocketFd, SocketCommand)>,
}

impl<'irq> SimChip<'irq> {
    pub fn new(irq: &'irq IrqFlag) -> Self {
        let mut chip = Self {
            mem: vec![0; MEM_SIZE],
            frame: Frame::default(),
            irq,
            link: true,
            connect_outcome: ConnectOutcome::Established,
            send_chunk: None,
            send_fault: None,
            listen_fault: false,
            sent: Vec::new(),
            commands: Vec::new(),
        };
        chip.reset();
        chip
    }

    fn reset(&mut self) {
        self.mem[..TXMEM_BASE as usize].fill(0);
        self.mem[VERSIONR as usize] = CHIP_VERSION;
        self.set_reg16(RTR, DEFAULT_RTR);
        self.mem[RCR as usize] = DEFAULT_RCR;
        self.set_link(self.link);
        for fd in 0..MAX_SOCKETS {
            self.mem[sock_reg(fd, SOCK_RXMEM_SIZE) as usize] = 2;
            self.mem[sock_reg(fd, SOCK_TXMEM_SIZE) as usize] = 2;
        }
    }

    // -------------------------------------------------------------------------
    // Raw access
    // -------------------------------------------------------------------------

    pub fn reg(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    pub fn set_reg(&mut self, addr: u16, val: u8) {
        self.mem[addr as usize] = val;
    }

    pub fn reg16(&self, addr: u16) -> u16 {
        u16::from_be_bytes([self.reg(addr), self.reg(addr.wrapping_add(1))])
    }

    pub fn set_reg16(&mut self, addr: u16, val: u16) {
        let [hi, lo] = val.to_be_bytes();
        self.set_reg(addr, hi);
        self.set_reg(addr.wrapping_add(1), lo);
    }

    fn sock16(&self, fd: SocketFd, offset: u16) -> u16 {
        self.reg16(sock_reg(fd, offset))
    }

    fn set_sock16(&mut self, fd: SocketFd, offset: u16, val: u16) {
        self.set_reg16(sock_reg(fd, offset), val);
    }

    fn window(&self, fd: SocketFd) -> u16 {
        match self.reg(sock_reg(fd, SOCK_TXMEM_SIZE)) {
            0 => 2048,
            kib => kib as u16 * 1024,
        }
    }

    fn tx_addr(&self, fd: SocketFd, cursor: u16) -> usize {
        let size = self.window(fd);
        (TXMEM_BASE + size * fd as u16 + (cursor & (size - 1))) as usize
    }

    fn rx_addr(&self, fd: SocketFd, cursor: u16) -> usize {
        let size = self.window(fd);
        (RXMEM_BASE + size * fd as u16 + (cursor & (size - 1))) as usize
    }

    // -------------------------------------------------------------------------
    // Chip behaviour
    // -------------------------------------------------------------------------

    fn store(&mut self, addr: u16, val: u8) {
        if (SOCK_BASE..SOCK_BASE + SOCK_STRIDE * MAX_SOCKETS as u16).contains(&addr) {
            let fd = ((addr - SOCK_BASE) / SOCK_STRIDE) as SocketFd;
            match (addr - SOCK_BASE) % SOCK_STRIDE {
                SOCK_CR => {
                    self.execute(fd, val);
                    return;
                }
                SOCK_IR => {
                    self.mem[addr as usize] &= !val;
                    self.update_ir2();
                    return;
                }
                _ => {}
            }
        }
        match addr {
            MR if val & ModeFlags::RESET.bits() != 0 => {
                self.reset();
                return;
            }
            IR => {
                self.mem[addr as usize] &= !val;
                return;
            }
            IR2 | PHYSTATUS | VERSIONR => return,
            _ => {}
        }
        self.mem[addr as usize] = val;
        self.update_ir2();
    }

    fn update_ir2(&mut self) {
        let imr = self.reg(IMR);
        let mut ir2 = 0u8;
        for fd in 0..MAX_SOCKETS {
            let ir = self.reg(sock_reg(fd, SOCK_IR));
            let mask = self.reg(sock_reg(fd, SOCK_IMR));
            if ir & mask != 0 && imr & (1 << fd) != 0 {
                ir2 |= 1 << fd;
            }
        }
        self.mem[IR2 as usize] = ir2;
    }

    /// Latch socket interrupt bits and assert the line if unmasked.
    pub fn raise(&mut self, fd: SocketFd, bits: SocketInterrupt) {
        self.mem[sock_reg(fd, SOCK_IR) as usize] |= bits.bits();
        self.update_ir2();
        if self.reg(IR2) & (1 << fd) != 0 {
            self.irq.raise();
        }
    }

    fn execute(&mut self, fd: SocketFd, raw: u8) {
        let Some(cmd) = SocketCommand::from_raw(raw) else {
            return;
        };
        self.commands.push((fd, cmd));
        let status = self.status(fd);
        match cmd {
            SocketCommand::Open => {
                let next = match Protocol::from_raw(self.reg(sock_reg(fd, SOCK_MR))) {
                    Some(Protocol::Tcp) => SocketStatus::Init,
                    Some(Protocol::Udp) => SocketStatus::Udp,
                    Some(Protocol::IpRaw) => SocketStatus::IpRaw,
                    Some(Protocol::MacRaw) => SocketStatus::MacRaw,
                    Some(Protocol::PppoeRaw) => SocketStatus::Pppoe,
                    None => SocketStatus::Closed,
                };
                self.set_status(fd, next);
            }
            SocketCommand::Listen => {
                if status == SocketStatus::Init && !self.listen_fault {
                    self.set_status(fd, SocketStatus::Listen);
                }
            }
            SocketCommand::Connect => {
                if status != SocketStatus::Init {
                    return;
                }
                match self.connect_outcome {
                    ConnectOutcome::Established => {
                        self.set_status(fd, SocketStatus::Established);
                        self.raise(fd, SocketInterrupt::CON);
                    }
                    ConnectOutcome::Timeout => {
                        self.set_status(fd, SocketStatus::Closed);
                        self.raise(fd, SocketInterrupt::TIMEOUT);
                    }
                    ConnectOutcome::Refused => {
                        self.set_status(fd, SocketStatus::Closed);
                        self.raise(fd, SocketInterrupt::DISCON);
                    }
                }
            }
            SocketCommand::Disconnect => {
                if matches!(status, SocketStatus::Established | SocketStatus::CloseWait) {
                    self.set_status(fd, SocketStatus::Closed);
                    self.raise(fd, SocketInterrupt::DISCON);
                }
            }
            SocketCommand::Close => self.set_status(fd, SocketStatus::Closed),
            SocketCommand::Send | SocketCommand::SendMac => {
                if let Some(fault) = self.send_fault.take() {
                    if fault.intersects(SocketInterrupt::TERMINAL) && status != SocketStatus::Udp {
                        self.set_status(fd, SocketStatus::Closed);
                    }
                    self.raise(fd, fault);
                } else {
                    self.transmit(fd);
                }
            }
            SocketCommand::Recv => {
                if self.sock16(fd, SOCK_RX_WR) != self.sock16(fd, SOCK_RX_RD) {
                    self.raise(fd, SocketInterrupt::RECV);
                }
            }
            SocketCommand::SendKeepalive => {}
        }
    }

    fn transmit(&mut self, fd: SocketFd) {
        let rd = self.sock16(fd, SOCK_TX_RD);
        let wr = self.sock16(fd, SOCK_TX_WR);
        let pending = wr.wrapping_sub(rd) as usize;
        let n = self.send_chunk.map_or(pending, |chunk| chunk.min(pending));
        let data = self.tx_bytes(fd, rd, n);
        self.set_sock16(fd, SOCK_TX_RD, rd.wrapping_add(n as u16));
        self.sent.push((fd, data));
        self.raise(fd, SocketInterrupt::SEND_OK);
    }

    // -------------------------------------------------------------------------
    // Test hooks
    // -------------------------------------------------------------------------

    pub fn status(&self, fd: SocketFd) -> SocketStatus {
        SocketStatus::from_raw(self.reg(sock_reg(fd, SOCK_SR)))
    }

    pub fn set_status(&mut self, fd: SocketFd, status: SocketStatus) {
        self.set_reg(sock_reg(fd, SOCK_SR), status.to_raw());
    }

    pub fn interrupts(&self, fd: SocketFd) -> SocketInterrupt {
        SocketInterrupt::from_bits_retain(self.reg(sock_reg(fd, SOCK_IR)))
    }

    pub fn set_link(&mut self, up: bool) {
        self.link = up;
        self.mem[PHYSTATUS as usize] = if up { PhyStatus::LINK.bits() } else { 0 };
    }

    /// Move all four ring pointers of a socket, as if it had carried traffic.
    pub fn set_pointers(&mut self, fd: SocketFd, tx: u16, rx: u16) {
        self.set_sock16(fd, SOCK_TX_RD, tx);
        self.set_sock16(fd, SOCK_TX_WR, tx);
        self.set_sock16(fd, SOCK_RX_RD, rx);
        self.set_sock16(fd, SOCK_RX_WR, rx);
    }

    pub fn tx_rd(&self, fd: SocketFd) -> u16 {
        self.sock16(fd, SOCK_TX_RD)
    }

    pub fn tx_wr(&self, fd: SocketFd) -> u16 {
        self.sock16(fd, SOCK_TX_WR)
    }

    pub fn rx_rd(&self, fd: SocketFd) -> u16 {
        self.sock16(fd, SOCK_RX_RD)
    }

    /// Pretend the chip transmitted `n` bytes without a SEND command.
    pub fn drain_tx(&mut self, fd: SocketFd, n: u16) {
        let rd = self.sock16(fd, SOCK_TX_RD);
        self.set_sock16(fd, SOCK_TX_RD, rd.wrapping_add(n));
    }

    /// TX ring contents starting at virtual `cursor`.
    pub fn tx_bytes(&self, fd: SocketFd, cursor: u16, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.mem[self.tx_addr(fd, cursor.wrapping_add(i as u16))])
            .collect()
    }

    /// Append raw bytes to a socket's RX ring and flag RECV.
    pub fn deliver(&mut self, fd: SocketFd, bytes: &[u8]) {
        let wr = self.sock16(fd, SOCK_RX_WR);
        for (i, &b) in bytes.iter().enumerate() {
            let addr = self.rx_addr(fd, wr.wrapping_add(i as u16));
            self.mem[addr] = b;
        }
        self.set_sock16(fd, SOCK_RX_WR, wr.wrapping_add(bytes.len() as u16));
        self.raise(fd, SocketInterrupt::RECV);
    }

    pub fn deliver_udp(&mut self, fd: SocketFd, from: SockAddr, payload: &[u8]) {
        let mut bytes = Vec::with_capacity(8 + payload.len());
        bytes.extend_from_slice(from.ip.as_bytes());
        bytes.extend_from_slice(&from.port.to_network_bytes());
        bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        bytes.extend_from_slice(payload);
        self.deliver(fd, &bytes);
    }

    pub fn deliver_ipraw(&mut self, fd: SocketFd, from: Ipv4Addr, payload: &[u8]) {
        let mut bytes = Vec::with_capacity(6 + payload.len());
        bytes.extend_from_slice(from.as_bytes());
        bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        bytes.extend_from_slice(payload);
        self.deliver(fd, &bytes);
    }

    /// Deliver an Ethernet frame to the MAC-raw socket with its length word.
    pub fn deliver_frame(&mut self, frame: &[u8]) {
        let mut bytes = Vec::with_capacity(2 + frame.len());
        bytes.extend_from_slice(&((frame.len() + 2) as u16).to_be_bytes());
        bytes.extend_from_slice(frame);
        self.deliver(0, &bytes);
    }

    /// A client completes the handshake with a listening socket.
    pub fn peer_connects(&mut self, fd: SocketFd, from: Ipv4Addr) {
        assert_eq!(self.status(fd), SocketStatus::Listen, "peer_connects on non-listener");
        for (i, b) in from.0.iter().enumerate() {
            self.set_reg(sock_reg(fd, SOCK_DEST_IP) + i as u16, *b);
        }
        self.set_status(fd, SocketStatus::Established);
        self.raise(fd, SocketInterrupt::CON);
    }

    /// The remote end tears the connection down.
    pub fn peer_disconnects(&mut self, fd: SocketFd) {
        self.set_status(fd, SocketStatus::Closed);
        self.raise(fd, SocketInterrupt::DISCON);
    }

    pub fn commands_for(&self, fd: SocketFd) -> Vec<SocketCommand> {
        self.commands
            .iter()
            .filter(|(sock, _)| *sock == fd)
            .map(|(_, cmd)| *cmd)
            .collect()
    }
}

impl SpiTransport for SimChip<'_> {
    fn select(&mut self) {
        assert!(!self.frame.active, "chip select asserted twice");
        self.frame = Frame {
            active: true,
            ..Frame::default()
        };
    }

    fn deselect(&mut self) {
        assert!(self.frame.active, "chip select released twice");
        self.frame.active = false;
    }

    fn transfer(&mut self, out: u8) -> u8 {
        assert!(self.frame.active, "transfer outside a frame");
        let pos = self.frame.pos;
        self.frame.pos += 1;
        match pos {
            0 => self.frame.addr = (out as u16) << 8,
            1 => self.frame.addr |= out as u16,
            2 => self.frame.write = out & SPI_OPCODE_WRITE != 0,
            3 => {}
            _ => {
                let addr = self.frame.addr;
                self.frame.addr = addr.wrapping_add(1);
                if self.frame.write {
                    self.store(addr, out);
                } else {
                    return self.mem[addr as usize];
                }
            }
        }
        0
    }
}

/// Idle primitive that returns immediately.
pub struct NoIdle;

impl Idle for NoIdle {
    fn wait_for_event(&mut self) {}
}

pub type SimDriver<'irq> = W5200<'irq, SpiRegisters<SimChip<'irq>>, NoIdle>;

pub fn driver_with(irq: &IrqFlag, config: NetConfig) -> SimDriver<'_> {
    let sim = SimChip::new(irq);
    let mut drv = W5200::new(SpiRegisters::new(sim), NoIdle, irq, config);
    drv.init().expect("sim chip init");
    chip(&mut drv).commands.clear();
    drv
}

pub fn driver(irq: &IrqFlag) -> SimDriver<'_> {
    driver_with(irq, NetConfig::default())
}

pub fn chip<'a, 'irq>(drv: &'a mut SimDriver<'irq>) -> &'a mut SimChip<'irq> {
    drv.port_mut().transport_mut()
}
