//! TX/RX ring transfers.
//!
//! Each socket owns a `window_size` slice of the chip's TX and RX buffer
//! memories. The chip tracks positions with free-running 16-bit virtual
//! cursors; the physical address is `base + (cursor & (window - 1))`. A
//! transfer that runs past the end of the window is split in two, the
//! second half starting back at the window base.
//!
//! Cursor arithmetic is modulo 2^16, exactly like the chip's pointer
//! registers, so a full window reports `window` bytes rather than zero.

use w52_abi::regs::{RXMEM_BASE, SocketCommand, SocketInterrupt, TXMEM_BASE};
use w52_abi::{NetError, NetResult};

use crate::idle::Idle;
use crate::socket::{SocketFd, W5200};
use crate::sockreg::RegisterExt;
use crate::spi::RegisterPort;

/// One contiguous run of buffer memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub addr: u16,
    pub len: usize,
}

/// A socket's slice of TX or RX buffer memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingWindow {
    base: u16,
    size: u16,
}

impl RingWindow {
    /// `size` must be a power of two.
    pub const fn new(base: u16, size: u16) -> Self {
        Self { base, size }
    }

    pub const fn tx(fd: SocketFd, size: u16) -> Self {
        Self::new(TXMEM_BASE.wrapping_add(size.wrapping_mul(fd as u16)), size)
    }

    pub const fn rx(fd: SocketFd, size: u16) -> Self {
        Self::new(RXMEM_BASE.wrapping_add(size.wrapping_mul(fd as u16)), size)
    }

    #[inline]
    pub const fn base(&self) -> u16 {
        self.base
    }

    #[inline]
    pub const fn size(&self) -> u16 {
        self.size
    }

    #[inline]
    pub const fn mask(&self) -> u16 {
        self.size - 1
    }

    #[inline]
    pub const fn physical(&self, cursor: u16) -> u16 {
        self.base + (cursor & self.mask())
    }

    /// Split a `len`-byte transfer at virtual `cursor` into at most two
    /// physical runs. `len` must not exceed the window size.
    pub fn split(&self, cursor: u16, len: usize) -> (Segment, Option<Segment>) {
        let offset = (cursor & self.mask()) as usize;
        let room = self.size as usize - offset;
        let addr = self.base + offset as u16;
        if len <= room {
            (Segment { addr, len }, None)
        } else {
            (
                Segment { addr, len: room },
                Some(Segment {
                    addr: self.base,
                    len: len - room,
                }),
            )
        }
    }

    /// Bytes between `from` and `to`, clamped to the window.
    #[inline]
    pub fn distance(&self, from: u16, to: u16) -> u16 {
        to.wrapping_sub(from).min(self.size)
    }
}

impl<P: RegisterPort, W: Idle> W5200<'_, P, W> {
    #[inline]
    pub fn tx_window(&self, fd: SocketFd) -> RingWindow {
        RingWindow::tx(fd, self.config.window_size)
    }

    #[inline]
    pub fn rx_window(&self, fd: SocketFd) -> RingWindow {
        RingWindow::rx(fd, self.config.window_size)
    }

    fn check_len(window: RingWindow, len: usize) -> NetResult<()> {
        if len > window.size() as usize {
            Err(NetError::BufferExhausted)
        } else {
            Ok(())
        }
    }

    /// Advance the cached TX cursor and tell the chip about it.
    fn publish_tx(&mut self, fd: SocketFd, cursor: u16) -> NetResult<()> {
        self.record_mut(fd)?.tx_wr = cursor;
        self.port.write_sock_tx_wr(fd, cursor);
        Ok(())
    }

    /// Publish a new RX read cursor. With `consume`, issue RECV so the chip
    /// reclaims the space, and resync from the pointer the chip settled on.
    fn publish_rx(&mut self, fd: SocketFd, cursor: u16, consume: bool) -> NetResult<()> {
        self.port.write_sock_rx_rd(fd, cursor);
        let cursor = if consume {
            self.port.clear_sock_interrupts(fd, SocketInterrupt::RECV);
            self.port.sock_command(fd, SocketCommand::Recv);
            self.port.read_sock_rx_rd(fd)
        } else {
            cursor
        };
        self.record_mut(fd)?.rx_rd = cursor;
        Ok(())
    }

    pub fn write_tx(&mut self, fd: SocketFd, data: &[u8]) -> NetResult<()> {
        let window = self.tx_window(fd);
        Self::check_len(window, data.len())?;
        let cursor = self.record(fd)?.tx_wr;
        let (first, second) = window.split(cursor, data.len());
        self.port.write_block(first.addr, &data[..first.len]);
        if let Some(second) = second {
            self.port.write_block(second.addr, &data[first.len..]);
        }
        self.publish_tx(fd, cursor.wrapping_add(data.len() as u16))
    }

    /// Queue `len` copies of `val`.
    pub fn fill_tx(&mut self, fd: SocketFd, len: usize, val: u8) -> NetResult<()> {
        let window = self.tx_window(fd);
        Self::check_len(window, len)?;
        let cursor = self.record(fd)?.tx_wr;
        let (first, second) = window.split(cursor, len);
        self.port.write_fill(first.addr, first.len, val);
        if let Some(second) = second {
            self.port.write_fill(second.addr, second.len, val);
        }
        self.publish_tx(fd, cursor.wrapping_add(len as u16))
    }

    fn read_at(&mut self, fd: SocketFd, cursor: u16, buf: &mut [u8]) -> NetResult<()> {
        let window = self.rx_window(fd);
        Self::check_len(window, buf.len())?;
        let (first, second) = window.split(cursor, buf.len());
        let (head, tail) = buf.split_at_mut(first.len);
        self.port.read_block(first.addr, head);
        if let Some(second) = second {
            self.port.read_block(second.addr, tail);
        }
        Ok(())
    }

    /// Fill `buf` from the read cursor and advance past it.
    pub fn read_rx(&mut self, fd: SocketFd, buf: &mut [u8], consume: bool) -> NetResult<()> {
        let cursor = self.record(fd)?.rx_rd;
        self.read_at(fd, cursor, buf)?;
        self.publish_rx(fd, cursor.wrapping_add(buf.len() as u16), consume)
    }

    /// Fill `buf` from `offset` bytes past the read cursor. Moves nothing.
    pub fn peek_rx(&mut self, fd: SocketFd, offset: usize, buf: &mut [u8]) -> NetResult<()> {
        let window = self.rx_window(fd);
        if offset + buf.len() > window.size() as usize {
            return Err(NetError::InvalidArgument);
        }
        let cursor = self.record(fd)?.rx_rd.wrapping_add(offset as u16);
        self.read_at(fd, cursor, buf)
    }

    /// Skip `len` buffered bytes without reading them.
    pub fn flush_rx(&mut self, fd: SocketFd, len: usize, consume: bool) -> NetResult<()> {
        if len > self.available_rx(fd)? as usize {
            return Err(NetError::InvalidArgument);
        }
        if len == 0 {
            return Ok(());
        }
        let cursor = self.record(fd)?.rx_rd.wrapping_add(len as u16);
        self.publish_rx(fd, cursor, consume)
    }

    /// Read up to `buf.len()` bytes, stopping after the first `delimiter`.
    ///
    /// The whole requested length is still clocked over the bus, but the
    /// cursor only advances past the bytes actually copied.
    pub fn search_read_rx(
        &mut self,
        fd: SocketFd,
        buf: &mut [u8],
        delimiter: u8,
        consume: bool,
    ) -> NetResult<usize> {
        let window = self.rx_window(fd);
        Self::check_len(window, buf.len())?;
        let cursor = self.record(fd)?.rx_rd;
        let (first, second) = window.split(cursor, buf.len());
        let (head, tail) = buf.split_at_mut(first.len);
        let mut copied = self.port.read_block_until(first.addr, head, delimiter);
        let found = head[..copied].last() == Some(&delimiter);
        if let Some(second) = second.filter(|_| !found) {
            copied += self.port.read_block_until(second.addr, tail, delimiter);
        }
        self.publish_rx(fd, cursor.wrapping_add(copied as u16), consume)?;
        Ok(copied)
    }

    /// Bytes received and not yet read.
    pub fn available_rx(&mut self, fd: SocketFd) -> NetResult<u16> {
        let cursor = self.record(fd)?.rx_rd;
        let chip_wr = self.port.read_sock_rx_wr(fd);
        Ok(self.rx_window(fd).distance(cursor, chip_wr))
    }

    /// Bytes queued in TX that the chip has not sent yet.
    pub(crate) fn tx_pending(&mut self, fd: SocketFd) -> NetResult<u16> {
        let cursor = self.record(fd)?.tx_wr;
        let chip_rd = self.port.read_sock_tx_rd(fd);
        Ok(self.tx_window(fd).distance(chip_rd, cursor))
    }

    /// Room left in the TX ring.
    pub fn available_tx_free(&mut self, fd: SocketFd) -> NetResult<u16> {
        let pending = self.tx_pending(fd)?;
        Ok(self.tx_window(fd).size() - pending)
    }
}
