//! Register I/O over the W5200's SPI framing.
//!
//! Every transaction is one chip-select window carrying a 4-byte header
//! followed by the payload:
//!
//! | byte | meaning                                  |
//! |------|------------------------------------------|
//! | 0    | address high                             |
//! | 1    | address low                              |
//! | 2    | `0x80` for write, `0x00` for read, OR-ed with length bits 14..8 |
//! | 3    | length bits 7..0                         |
//!
//! The chip auto-increments the address for every payload byte. There is no
//! acknowledge and no error reporting on this bus; a dead chip reads as all
//! zeroes or all ones, which the chip bring-up code checks for.

use w52_abi::regs::{SPI_MAX_FRAME_LEN, SPI_OPCODE_READ, SPI_OPCODE_WRITE};

/// Byte-level bus with chip-select framing.
///
/// Implemented by the board support code on top of its SPI peripheral.
/// Calls are synchronous and never interleaved: the driver always issues
/// `select`, a run of `transfer`s, then `deselect`.
pub trait SpiTransport {
    /// Assert chip select.
    fn select(&mut self);
    /// Release chip select.
    fn deselect(&mut self);
    /// Clock one byte out and return the byte clocked in.
    fn transfer(&mut self, out: u8) -> u8;
}

/// Addressed register access, independent of how the bytes reach the chip.
pub trait RegisterPort {
    fn write_u8(&mut self, addr: u16, val: u8);
    fn read_u8(&mut self, addr: u16) -> u8;
    /// Big-endian 16-bit write to `addr` / `addr + 1`.
    fn write_u16(&mut self, addr: u16, val: u16);
    fn read_u16(&mut self, addr: u16) -> u16;
    /// Write `len` copies of `val` starting at `addr`.
    fn write_fill(&mut self, addr: u16, len: usize, val: u8);
    fn write_block(&mut self, addr: u16, data: &[u8]);
    fn read_block(&mut self, addr: u16, buf: &mut [u8]);
    /// Clock `buf.len()` bytes from `addr` but store only up to and
    /// including the first `delimiter`. Returns the number of bytes stored.
    fn read_block_until(&mut self, addr: u16, buf: &mut [u8], delimiter: u8) -> usize;
}

/// [`RegisterPort`] implementation over an [`SpiTransport`].
pub struct SpiRegisters<T: SpiTransport> {
    bus: T,
}

impl<T: SpiTransport> SpiRegisters<T> {
    pub const fn new(bus: T) -> Self {
        Self { bus }
    }

    pub fn transport(&self) -> &T {
        &self.bus
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.bus
    }

    pub fn into_transport(self) -> T {
        self.bus
    }

    #[inline]
    fn header(&mut self, addr: u16, opcode: u8, len: usize) {
        debug_assert!(len <= SPI_MAX_FRAME_LEN);
        let len = len as u16;
        self.bus.transfer((addr >> 8) as u8);
        self.bus.transfer(addr as u8);
        self.bus.transfer(opcode | ((len >> 8) as u8 & 0x7F));
        self.bus.transfer(len as u8);
    }

    fn write_frame(&mut self, addr: u16, len: usize, mut next: impl FnMut(usize) -> u8) {
        self.bus.select();
        self.header(addr, SPI_OPCODE_WRITE, len);
        for i in 0..len {
            self.bus.transfer(next(i));
        }
        self.bus.deselect();
    }
}

impl<T: SpiTransport> RegisterPort for SpiRegisters<T> {
    fn write_u8(&mut self, addr: u16, val: u8) {
        self.write_frame(addr, 1, |_| val);
    }

    fn read_u8(&mut self, addr: u16) -> u8 {
        self.bus.select();
        self.header(addr, SPI_OPCODE_READ, 1);
        let val = self.bus.transfer(0xFF);
        self.bus.deselect();
        val
    }

    fn write_u16(&mut self, addr: u16, val: u16) {
        let bytes = val.to_be_bytes();
        self.write_frame(addr, 2, |i| bytes[i]);
    }

    fn read_u16(&mut self, addr: u16) -> u16 {
        self.bus.select();
        self.header(addr, SPI_OPCODE_READ, 2);
        let hi = self.bus.transfer(0xFF);
        let lo = self.bus.transfer(0xFF);
        self.bus.deselect();
        u16::from_be_bytes([hi, lo])
    }

    fn write_fill(&mut self, addr: u16, len: usize, val: u8) {
        let mut addr = addr;
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(SPI_MAX_FRAME_LEN);
            self.write_frame(addr, chunk, |_| val);
            addr = addr.wrapping_add(chunk as u16);
            remaining -= chunk;
        }
    }

    fn write_block(&mut self, addr: u16, data: &[u8]) {
        let mut addr = addr;
        for chunk in data.chunks(SPI_MAX_FRAME_LEN) {
            self.write_frame(addr, chunk.len(), |i| chunk[i]);
            addr = addr.wrapping_add(chunk.len() as u16);
        }
    }

    fn read_block(&mut self, addr: u16, buf: &mut [u8]) {
        let mut addr = addr;
        for chunk in buf.chunks_mut(SPI_MAX_FRAME_LEN) {
            self.bus.select();
            self.header(addr, SPI_OPCODE_READ, chunk.len());
            for byte in chunk.iter_mut() {
                *byte = self.bus.transfer(0xFF);
            }
            self.bus.deselect();
            addr = addr.wrapping_add(chunk.len() as u16);
        }
    }

    fn read_block_until(&mut self, addr: u16, buf: &mut [u8], delimiter: u8) -> usize {
        let mut addr = addr;
        let mut stored = 0;
        let mut found = false;
        for chunk in buf.chunks_mut(SPI_MAX_FRAME_LEN) {
            let len = chunk.len();
            self.bus.select();
            self.header(addr, SPI_OPCODE_READ, len);
            for byte in chunk.iter_mut() {
                // The frame must run to completion even after the delimiter.
                let val = self.bus.transfer(0xFF);
                if !found {
                    *byte = val;
                    stored += 1;
                    found = val == delimiter;
                }
            }
            self.bus.deselect();
            if found {
                break;
            }
            addr = addr.wrapping_add(len as u16);
        }
        stored
    }
}
