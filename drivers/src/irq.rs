//! Interrupt demultiplexing.
//!
//! The chip has a single interrupt line. The board ISR only raises the
//! sticky [`IrqFlag`](w52_lib::IrqFlag); the main loop then calls
//! [`W5200::resolve_pending_socket`] to learn which socket to service.
//! Lower socket indices always win. When more than one socket is pending
//! the flag stays raised so the next call picks up the rest.

use w52_abi::regs::{IR, IR2, SystemInterrupt};
use w52_abi::{NetError, NetResult};
use w52_lib::klog_trace;

use crate::idle::Idle;
use crate::socket::{SocketFd, W5200};
use crate::spi::RegisterPort;

/// Index of the lowest set bit and whether any other bit remains.
#[inline]
pub fn lowest_pending(mask: u8) -> Option<(SocketFd, bool)> {
    if mask == 0 {
        return None;
    }
    let fd = mask.trailing_zeros() as SocketFd;
    Some((fd, mask & (mask - 1) != 0))
}

impl<P: RegisterPort, W: Idle> W5200<'_, P, W> {
    /// Which socket raised the interrupt line, if any.
    pub fn resolve_pending_socket(&mut self) -> NetResult<SocketFd> {
        if !self.irq.is_raised() {
            return Err(NetError::WouldBlock);
        }
        let pending = self.port.read_u8(IR2);
        match lowest_pending(pending) {
            None => {
                self.irq.clear();
                Err(NetError::WouldBlock)
            }
            Some((fd, more)) => {
                self.irq.set(more);
                klog_trace!("w52: irq socket {} (pending 0x{:02x})", fd, pending);
                Ok(fd)
            }
        }
    }

    /// Read and acknowledge chip-level events (IP conflict, PPPoE close).
    pub fn take_system_interrupts(&mut self) -> SystemInterrupt {
        let raised = SystemInterrupt::from_bits_truncate(self.port.read_u8(IR));
        if !raised.is_empty() {
            self.port.write_u8(IR, raised.bits());
        }
        raised
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowest_pending() {
        assert_eq!(lowest_pending(0), None);
        assert_eq!(lowest_pending(0b0000_0100), Some((2, false)));
        assert_eq!(lowest_pending(0b0010_0100), Some((2, true)));
        assert_eq!(lowest_pending(0b1000_0000), Some((7, false)));
    }
}
