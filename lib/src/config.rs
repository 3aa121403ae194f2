//! Driver configuration and boot-argument parsing.
//!
//! Board code builds a [`NetConfig`] either from [`Default`] or from a
//! whitespace separated argument line (`w52.ip=10.0.0.5 w52.log=debug`).
//! Unknown tokens are ignored; malformed values leave the default in place.

use w52_abi::regs::{BUFFER_MEMORY_SIZE, MAX_SOCKETS};
use w52_abi::{Ipv4Addr, MacAddr};

use crate::klog::KlogLevel;

const DEFAULT_SOURCE_IP: Ipv4Addr = Ipv4Addr::new(169, 128, 128, 130);
const DEFAULT_SUBNET_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);
const DEFAULT_GATEWAY: Ipv4Addr = Ipv4Addr::UNSPECIFIED;
const DEFAULT_MAC: MacAddr = MacAddr([0x54, 0x52, 0x00, 0x00, 0xF8, 0x01]);
const DEFAULT_SRCPORT_BASE: u16 = 40000;
const DEFAULT_WINDOW_SIZE: u16 = 2048;

/// Smallest per-socket ring the chip supports (1 KiB).
pub const MIN_WINDOW_SIZE: u16 = 1024;
/// Largest per-socket ring the chip supports (16 KiB).
pub const MAX_WINDOW_SIZE: u16 = 16 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetConfig {
    pub source_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub mac: MacAddr,
    /// First port of the ephemeral range used by connect().
    pub srcport_base: u16,
    /// Added to every ephemeral port; firmware may randomise it per boot.
    pub srcport_offset: u16,
    /// TX and RX ring size per socket; a power of two.
    pub window_size: u16,
    /// Refuse connect() while the PHY reports no link.
    pub link_check: bool,
    pub log_level: KlogLevel,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            source_ip: DEFAULT_SOURCE_IP,
            subnet_mask: DEFAULT_SUBNET_MASK,
            gateway: DEFAULT_GATEWAY,
            mac: DEFAULT_MAC,
            srcport_base: DEFAULT_SRCPORT_BASE,
            srcport_offset: 0,
            window_size: DEFAULT_WINDOW_SIZE,
            link_check: true,
            log_level: KlogLevel::Info,
        }
    }
}

impl NetConfig {
    /// `true` if `size` is a ring size the chip can host for every socket.
    pub const fn window_size_valid(size: u16) -> bool {
        size.is_power_of_two()
            && size >= MIN_WINDOW_SIZE
            && size <= MAX_WINDOW_SIZE
            && size as usize * MAX_SOCKETS <= BUFFER_MEMORY_SIZE
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("on")
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("enabled")
        || value == "1"
    {
        Some(true)
    } else if value.eq_ignore_ascii_case("off")
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no")
        || value.eq_ignore_ascii_case("disabled")
        || value == "0"
    {
        Some(false)
    } else {
        None
    }
}

pub fn config_from_cmdline(cmdline: Option<&str>) -> NetConfig {
    let mut cfg = NetConfig::default();
    let Some(cmdline) = cmdline else {
        return cfg;
    };

    for token in cmdline.split_whitespace() {
        if let Some(value) = token.strip_prefix("w52.ip=") {
            if let Ok(ip) = value.parse() {
                cfg.source_ip = ip;
            }
        } else if let Some(value) = token.strip_prefix("w52.subnet=") {
            if let Ok(mask) = value.parse() {
                cfg.subnet_mask = mask;
            }
        } else if let Some(value) = token.strip_prefix("w52.gateway=") {
            if let Ok(gw) = value.parse() {
                cfg.gateway = gw;
            }
        } else if let Some(value) = token.strip_prefix("w52.mac=") {
            if let Ok(mac) = value.parse() {
                cfg.mac = mac;
            }
        } else if let Some(value) = token.strip_prefix("w52.srcport=") {
            if let Ok(base) = value.parse::<u16>() {
                cfg.srcport_base = base;
            }
        } else if let Some(value) = token.strip_prefix("w52.portoffset=") {
            if let Ok(offset) = value.parse::<u16>() {
                cfg.srcport_offset = offset;
            }
        } else if let Some(value) = token.strip_prefix("w52.bufsize=") {
            let value = value.trim_end_matches(['k', 'K']);
            let parsed = value.parse::<u16>().ok().map(|v| {
                if token.ends_with(['k', 'K']) {
                    v.saturating_mul(1024)
                } else {
                    v
                }
            });
            if let Some(size) = parsed.filter(|&s| NetConfig::window_size_valid(s)) {
                cfg.window_size = size;
            }
        } else if let Some(value) = token.strip_prefix("w52.linkcheck=") {
            if let Some(check) = parse_bool(value) {
                cfg.link_check = check;
            }
        } else if let Some(value) = token.strip_prefix("w52.log=") {
            if let Some(level) = KlogLevel::from_name(value) {
                cfg.log_level = level;
            }
        }
    }
    cfg
}
