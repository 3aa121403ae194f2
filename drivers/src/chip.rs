//! Chip bring-up, PHY probe and the network identity registers.

use w52_abi::regs::{
    CHIP_VERSION, GATEWAY, IMR, IMR2, MAX_SOCKETS, MR, ModeFlags, PhyStatus, PHYSTATUS, RCR,
    RTR, SOURCE_IP, SOURCE_MAC, SUBNET_MASK, SocketCommand, VERSIONR,
};
use w52_abi::{Ipv4Addr, MacAddr, NetError, NetResult};
use w52_lib::{NetConfig, klog_error, klog_info, klog_set_level, klog_warn};

use crate::idle::Idle;
use crate::socket::W5200;
use crate::sockreg::RegisterExt;
use crate::spi::RegisterPort;

/// Mode-register polls allowed for the software reset to complete.
const RESET_POLLS: u32 = 1000;

impl<P: RegisterPort, W: Idle> W5200<'_, P, W> {
    /// Reset the chip and program it from the driver's [`NetConfig`].
    ///
    /// Every socket ends up CLOSED and the descriptor table empty.
    pub fn init(&mut self) -> NetResult<()> {
        klog_set_level(self.config.log_level);
        if !NetConfig::window_size_valid(self.config.window_size) {
            klog_error!("w52: invalid socket window size {}", self.config.window_size);
            return Err(NetError::InvalidArgument);
        }

        let version = self.port.read_u8(VERSIONR);
        if version == 0x00 || version == 0xFF {
            klog_error!("w52: no chip on the bus (version 0x{:02x})", version);
            return Err(NetError::InternalFault);
        }
        if version != CHIP_VERSION {
            klog_warn!("w52: unexpected chip version 0x{:02x}", version);
        }

        self.port.write_u8(MR, ModeFlags::RESET.bits());
        let mut polls = 0;
        while ModeFlags::from_bits_retain(self.port.read_u8(MR)).contains(ModeFlags::RESET) {
            polls += 1;
            if polls >= RESET_POLLS {
                klog_error!("w52: software reset did not complete");
                return Err(NetError::InternalFault);
            }
        }

        self.port.write_u8(IMR, 0);
        // Ping replies on, no PPPoE, no wake-on-LAN.
        self.port.write_u8(MR, 0);
        let cfg = self.config;
        self.port.write_ip(SUBNET_MASK, cfg.subnet_mask);
        self.port.write_ip(GATEWAY, cfg.gateway);
        self.port.write_ip(SOURCE_IP, cfg.source_ip);
        self.port.write_mac(SOURCE_MAC, cfg.mac);
        self.port.write_u8(IMR2, 0);

        let kib = (cfg.window_size / 1024) as u8;
        for fd in 0..MAX_SOCKETS {
            self.port.write_sock_rxmem_size(fd, kib);
            self.port.write_sock_txmem_size(fd, kib);
            self.port.sock_command(fd, SocketCommand::Close);
            self.port.write_sock_mode(fd, 0);
        }
        self.table.reset_all();
        self.irq.clear();

        klog_info!(
            "w52: chip v{} up, {} mac {}, {} sockets x {} bytes",
            version,
            cfg.source_ip,
            cfg.mac,
            MAX_SOCKETS,
            cfg.window_size
        );
        Ok(())
    }

    pub fn chip_version(&mut self) -> u8 {
        self.port.read_u8(VERSIONR)
    }

    pub fn phy_state(&mut self) -> PhyStatus {
        PhyStatus::from_bits_retain(self.port.read_u8(PHYSTATUS))
    }

    /// `Err(NetworkDown)` while the PHY reports no link.
    pub fn link_up(&mut self) -> NetResult<()> {
        if self.phy_state().contains(PhyStatus::LINK) {
            Ok(())
        } else {
            Err(NetError::NetworkDown)
        }
    }

    pub fn source_ip(&mut self) -> Ipv4Addr {
        self.port.read_ip(SOURCE_IP)
    }

    pub fn set_source_ip(&mut self, ip: Ipv4Addr) {
        self.port.write_ip(SOURCE_IP, ip);
        self.config.source_ip = ip;
    }

    pub fn subnet_mask(&mut self) -> Ipv4Addr {
        self.port.read_ip(SUBNET_MASK)
    }

    pub fn set_subnet_mask(&mut self, mask: Ipv4Addr) {
        self.port.write_ip(SUBNET_MASK, mask);
        self.config.subnet_mask = mask;
    }

    pub fn gateway(&mut self) -> Ipv4Addr {
        self.port.read_ip(GATEWAY)
    }

    pub fn set_gateway(&mut self, gateway: Ipv4Addr) {
        self.port.write_ip(GATEWAY, gateway);
        self.config.gateway = gateway;
    }

    pub fn mac(&mut self) -> MacAddr {
        self.port.read_mac(SOURCE_MAC)
    }

    pub fn set_mac(&mut self, mac: MacAddr) {
        self.port.write_mac(SOURCE_MAC, mac);
        self.config.mac = mac;
    }

    /// Retransmission timeout in 100 µs units.
    pub fn retry_time(&mut self) -> u16 {
        self.port.read_u16(RTR)
    }

    pub fn set_retry_time(&mut self, units: u16) {
        self.port.write_u16(RTR, units);
    }

    pub fn retry_count(&mut self) -> u8 {
        self.port.read_u8(RCR)
    }

    pub fn set_retry_count(&mut self, count: u8) {
        self.port.write_u8(RCR, count);
    }

    pub fn source_port_offset(&self) -> u16 {
        self.config.srcport_offset
    }

    /// Shift every subsequently generated ephemeral port by `offset`.
    pub fn set_source_port_offset(&mut self, offset: u16) {
        self.config.srcport_offset = offset;
    }
}
