use w52_abi::regs::{Protocol, SocketStatus};
use w52_abi::{MacAddr, NetError};
use w52_lib::{IrqFlag, NetConfig};

use crate::macraw::{ETH_HEADER_LEN, MacFrameInfo, build_eth_header};
use crate::sim::{self, SimDriver};

const PEER_MAC: MacAddr = MacAddr([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
const ETHERTYPE_ARP: u16 = 0x0806;
const ETHERTYPE_IPV4: u16 = 0x0800;

fn macraw(drv: &mut SimDriver<'_>) {
    assert_eq!(drv.socket(Protocol::MacRaw), Ok(0));
    drv.bind(0, 0).expect("bind");
}

fn frame(dst: MacAddr, src: MacAddr, ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = build_eth_header(dst, src, ethertype).to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn test_bind_opens_macraw() {
    let irq = IrqFlag::new();
    let mut drv = sim::driver(&irq);
    macraw(&mut drv);
    assert_eq!(sim::chip(&mut drv).status(0), SocketStatus::MacRaw);
}

#[test]
fn test_mac_ops_need_macraw_socket() {
    let irq = IrqFlag::new();
    let mut drv = sim::driver(&irq);
    let mut buf = [0u8; 8];
    assert_eq!(
        drv.mac_sendto(b"x", PEER_MAC, ETHERTYPE_IPV4, true, true),
        Err(NetError::InvalidDescriptor)
    );
    assert_eq!(
        drv.mac_recvfrom(&mut buf, true, true),
        Err(NetError::InvalidDescriptor)
    );

    drv.socket(Protocol::PppoeRaw).unwrap();
    assert_eq!(
        drv.mac_recvfrom(&mut buf, true, true),
        Err(NetError::InvalidDescriptor)
    );
}

#[test]
fn test_mac_sendto_builds_header() {
    let irq = IrqFlag::new();
    let mut drv = sim::driver(&irq);
    macraw(&mut drv);
    let payload = [0xAAu8; 28];
    assert_eq!(
        drv.mac_sendto(&payload, MacAddr::BROADCAST, ETHERTYPE_ARP, true, true),
        Ok(28)
    );

    let own = NetConfig::default().mac;
    let sent = &sim::chip(&mut drv).sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 0);
    assert_eq!(sent[0].1, frame(MacAddr::BROADCAST, own, ETHERTYPE_ARP, &payload));
}

#[test]
fn test_mac_sendto_raw_frame() {
    let irq = IrqFlag::new();
    let mut drv = sim::driver(&irq);
    macraw(&mut drv);
    let raw = frame(PEER_MAC, MacAddr([2, 0, 0, 0, 0, 1]), 0x88B5, b"custom");
    assert_eq!(drv.mac_sendto(&raw, MacAddr::ZERO, 0, false, true), Ok(raw.len()));
    assert_eq!(sim::chip(&mut drv).sent, vec![(0, raw)]);
}

#[test]
fn test_mac_sendto_counts_header_against_space() {
    let irq = IrqFlag::new();
    let mut drv = sim::driver(&irq);
    macraw(&mut drv);
    let payload = vec![0u8; 2048 - ETH_HEADER_LEN + 1];
    assert_eq!(
        drv.mac_sendto(&payload, PEER_MAC, ETHERTYPE_IPV4, true, true),
        Err(NetError::BufferExhausted)
    );
    assert_eq!(
        drv.mac_sendto(&payload[1..], PEER_MAC, ETHERTYPE_IPV4, true, true),
        Ok(2048 - ETH_HEADER_LEN)
    );
}

#[test]
fn test_mac_recvfrom_parses_header() {
    let irq = IrqFlag::new();
    let mut drv = sim::driver(&irq);
    macraw(&mut drv);
    let mut buf = [0u8; 64];
    assert_eq!(drv.mac_recvfrom(&mut buf, true, true), Err(NetError::WouldBlock));

    let own = NetConfig::default().mac;
    sim::chip(&mut drv).deliver_frame(&frame(own, PEER_MAC, ETHERTYPE_IPV4, b"payload"));
    let (n, info) = drv.mac_recvfrom(&mut buf, true, true).unwrap();
    assert_eq!(n, 7);
    assert_eq!(&buf[..7], b"payload");
    assert_eq!(
        info,
        Some(MacFrameInfo {
            dst: own,
            src: PEER_MAC,
            ethertype: ETHERTYPE_IPV4,
            payload_len: 7,
        })
    );
    assert_eq!(drv.available_rx(0), Ok(0));
}

#[test]
fn test_mac_recvfrom_truncates_and_skips_tail() {
    let irq = IrqFlag::new();
    let mut drv = sim::driver(&irq);
    macraw(&mut drv);
    sim::chip(&mut drv).deliver_frame(&frame(PEER_MAC, PEER_MAC, ETHERTYPE_IPV4, &[7u8; 100]));
    sim::chip(&mut drv).deliver_frame(&frame(PEER_MAC, PEER_MAC, ETHERTYPE_ARP, b"arp"));

    let mut buf = [0u8; 10];
    let (n, info) = drv.mac_recvfrom(&mut buf, true, true).unwrap();
    assert_eq!(n, 10);
    assert_eq!(info.map(|i| i.payload_len), Some(100));

    let (n, info) = drv.mac_recvfrom(&mut buf, true, true).unwrap();
    assert_eq!(n, 3);
    assert_eq!(&buf[..3], b"arp");
    assert_eq!(info.map(|i| i.ethertype), Some(ETHERTYPE_ARP));
}

#[test]
fn test_mac_recvfrom_as_stream() {
    let irq = IrqFlag::new();
    let mut drv = sim::driver(&irq);
    macraw(&mut drv);
    let raw = frame(PEER_MAC, PEER_MAC, ETHERTYPE_IPV4, b"abc");
    sim::chip(&mut drv).deliver_frame(&raw);

    let mut buf = [0u8; 2];
    assert_eq!(drv.mac_recvfrom(&mut buf, false, true), Ok((2, None)));
    assert_eq!(buf, ((raw.len() + 2) as u16).to_be_bytes());
    assert_eq!(drv.available_rx(0), Ok(raw.len() as u16));
}

#[test]
fn test_mac_recvfrom_waits_for_full_header() {
    let irq = IrqFlag::new();
    let mut drv = sim::driver(&irq);
    macraw(&mut drv);
    sim::chip(&mut drv).deliver(0, &[0, 20, 1, 2, 3]);
    let mut buf = [0u8; 8];
    assert_eq!(drv.mac_recvfrom(&mut buf, true, true), Err(NetError::WouldBlock));
    assert_eq!(drv.available_rx(0), Ok(5));
}
