//! Ethernet framing for slot 0 in MAC-raw mode.
//!
//! In MAC-raw mode the chip passes whole Ethernet frames through the
//! socket's rings. Received frames are preceded by a 2-byte big-endian
//! length that counts itself, the 14-byte header and the payload.

use w52_abi::regs::{Protocol, SOURCE_MAC};
use w52_abi::{MacAddr, NetError, NetResult};

use crate::idle::Idle;
use crate::socket::{SocketFd, W5200};
use crate::sockreg::RegisterExt;
use crate::spi::RegisterPort;

pub const ETH_HEADER_LEN: usize = 14;
pub const MACRAW_PREAMBLE_LEN: usize = 2;

const MACRAW_FD: SocketFd = 0;

/// Header fields of a received frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MacFrameInfo {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
    /// Payload bytes following the header, before any truncation.
    pub payload_len: usize,
}

impl MacFrameInfo {
    fn parse(header: &[u8; ETH_HEADER_LEN], payload_len: usize) -> Self {
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&header[0..6]);
        src.copy_from_slice(&header[6..12]);
        Self {
            dst: MacAddr(dst),
            src: MacAddr(src),
            ethertype: u16::from_be_bytes([header[12], header[13]]),
            payload_len,
        }
    }
}

pub fn build_eth_header(dst: MacAddr, src: MacAddr, ethertype: u16) -> [u8; ETH_HEADER_LEN] {
    let mut header = [0u8; ETH_HEADER_LEN];
    header[0..6].copy_from_slice(dst.as_bytes());
    header[6..12].copy_from_slice(src.as_bytes());
    header[12..14].copy_from_slice(&ethertype.to_be_bytes());
    header
}

impl<P: RegisterPort, W: Idle> W5200<'_, P, W> {
    fn check_macraw(&self) -> NetResult<()> {
        match self.table.get(MACRAW_FD).and_then(|r| r.mode) {
            Some(Protocol::MacRaw) => Ok(()),
            _ => Err(NetError::InvalidDescriptor),
        }
    }

    /// Queue one Ethernet frame, optionally prefixed with a header built
    /// from `dst`, the chip's own MAC and `ethertype`.
    pub fn mac_sendto(
        &mut self,
        payload: &[u8],
        dst: MacAddr,
        ethertype: u16,
        write_header: bool,
        commit: bool,
    ) -> NetResult<usize> {
        self.check_macraw()?;
        let header_len = if write_header { ETH_HEADER_LEN } else { 0 };
        if payload.len() + header_len > self.available_tx_free(MACRAW_FD)? as usize {
            return Err(NetError::BufferExhausted);
        }
        if write_header {
            let src = self.port.read_mac(SOURCE_MAC);
            let header = build_eth_header(dst, src, ethertype);
            self.write_tx(MACRAW_FD, &header)?;
        }
        self.write_tx(MACRAW_FD, payload)?;
        if commit {
            self.txcommit(MACRAW_FD)?;
        }
        Ok(payload.len())
    }

    /// Receive from the MAC-raw socket.
    ///
    /// With `read_header`, one whole frame is consumed: its header is
    /// returned and a payload longer than `buf` is truncated. Without it,
    /// bytes are copied as a plain stream.
    pub fn mac_recvfrom(
        &mut self,
        buf: &mut [u8],
        read_header: bool,
        consume: bool,
    ) -> NetResult<(usize, Option<MacFrameInfo>)> {
        self.check_macraw()?;
        let avail = self.available_rx(MACRAW_FD)? as usize;
        if !read_header {
            if avail == 0 {
                return Err(NetError::WouldBlock);
            }
            let n = avail.min(buf.len());
            self.read_rx(MACRAW_FD, &mut buf[..n], consume)?;
            return Ok((n, None));
        }

        if avail < MACRAW_PREAMBLE_LEN + ETH_HEADER_LEN {
            return Err(NetError::WouldBlock);
        }
        let mut preamble = [0u8; MACRAW_PREAMBLE_LEN];
        self.read_rx(MACRAW_FD, &mut preamble, false)?;
        let mut header = [0u8; ETH_HEADER_LEN];
        self.read_rx(MACRAW_FD, &mut header, false)?;

        let frame_len = u16::from_be_bytes(preamble) as usize;
        let remaining = avail - MACRAW_PREAMBLE_LEN - ETH_HEADER_LEN;
        let payload_len = frame_len
            .saturating_sub(MACRAW_PREAMBLE_LEN + ETH_HEADER_LEN)
            .min(remaining);
        let info = MacFrameInfo::parse(&header, payload_len);

        let take = payload_len.min(buf.len());
        let rest = payload_len - take;
        self.read_rx(MACRAW_FD, &mut buf[..take], consume && rest == 0)?;
        if rest > 0 {
            self.flush_rx(MACRAW_FD, rest, consume)?;
        }
        Ok((take, Some(info)))
    }
}
