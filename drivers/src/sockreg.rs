//! Typed accessors for the per-socket register blocks and the address
//! registers, layered over any [`RegisterPort`].

use w52_abi::regs::*;
use w52_abi::{Ipv4Addr, MacAddr};
use w52_lib::paste::paste;

use crate::spi::RegisterPort;

macro_rules! sock_accessors {
    (@one u8 $name:ident $offset:ident) => {
        paste! {
            #[inline]
            fn [<read_ $name>](&mut self, sock: usize) -> u8 {
                self.read_u8(sock_reg(sock, $offset))
            }

            #[inline]
            fn [<write_ $name>](&mut self, sock: usize, val: u8) {
                self.write_u8(sock_reg(sock, $offset), val)
            }
        }
    };
    (@one u16 $name:ident $offset:ident) => {
        paste! {
            #[inline]
            fn [<read_ $name>](&mut self, sock: usize) -> u16 {
                self.read_u16(sock_reg(sock, $offset))
            }

            #[inline]
            fn [<write_ $name>](&mut self, sock: usize, val: u16) {
                self.write_u16(sock_reg(sock, $offset), val)
            }
        }
    };
    ($($width:ident $name:ident = $offset:ident;)*) => {
        $(sock_accessors!(@one $width $name $offset);)*
    };
}

/// Register-level vocabulary shared by the ring layer and the socket engine.
///
/// Blanket-implemented for every [`RegisterPort`].
pub trait RegisterExt: RegisterPort {
    sock_accessors! {
        u8  sock_mode = SOCK_MR;
        u8  sock_proto = SOCK_PROTO;
        u8  sock_ttl = SOCK_TTL;
        u8  sock_imr = SOCK_IMR;
        u8  sock_rxmem_size = SOCK_RXMEM_SIZE;
        u8  sock_txmem_size = SOCK_TXMEM_SIZE;
        u16 sock_src_port = SOCK_SRC_PORT;
        u16 sock_dest_port = SOCK_DEST_PORT;
        u16 sock_mss = SOCK_MSS;
        u16 sock_tx_fsr = SOCK_TX_FSR;
        u16 sock_tx_rd = SOCK_TX_RD;
        u16 sock_tx_wr = SOCK_TX_WR;
        u16 sock_rx_rsr = SOCK_RX_RSR;
        u16 sock_rx_rd = SOCK_RX_RD;
        u16 sock_rx_wr = SOCK_RX_WR;
    }

    #[inline]
    fn sock_command(&mut self, sock: usize, cmd: SocketCommand) {
        self.write_u8(sock_reg(sock, SOCK_CR), cmd as u8);
    }

    #[inline]
    fn sock_status(&mut self, sock: usize) -> SocketStatus {
        SocketStatus::from_raw(self.read_u8(sock_reg(sock, SOCK_SR)))
    }

    #[inline]
    fn sock_interrupts(&mut self, sock: usize) -> SocketInterrupt {
        SocketInterrupt::from_bits_retain(self.read_u8(sock_reg(sock, SOCK_IR)))
    }

    /// `Sn_IR` is write-one-to-clear.
    #[inline]
    fn clear_sock_interrupts(&mut self, sock: usize, bits: SocketInterrupt) {
        if !bits.is_empty() {
            self.write_u8(sock_reg(sock, SOCK_IR), bits.bits());
        }
    }

    fn read_ip(&mut self, addr: u16) -> Ipv4Addr {
        let mut raw = [0u8; 4];
        self.read_block(addr, &mut raw);
        Ipv4Addr(raw)
    }

    fn write_ip(&mut self, addr: u16, ip: Ipv4Addr) {
        self.write_block(addr, ip.as_bytes());
    }

    fn read_mac(&mut self, addr: u16) -> MacAddr {
        let mut raw = [0u8; 6];
        self.read_block(addr, &mut raw);
        MacAddr(raw)
    }

    fn write_mac(&mut self, addr: u16, mac: MacAddr) {
        self.write_block(addr, mac.as_bytes());
    }

    #[inline]
    fn sock_dest_ip(&mut self, sock: usize) -> Ipv4Addr {
        self.read_ip(sock_reg(sock, SOCK_DEST_IP))
    }

    #[inline]
    fn set_sock_dest_ip(&mut self, sock: usize, ip: Ipv4Addr) {
        self.write_ip(sock_reg(sock, SOCK_DEST_IP), ip);
    }
}

impl<P: RegisterPort + ?Sized> RegisterExt for P {}
