//! Sticky device interrupt flag.
//!
//! The chip drives a single active-low interrupt line. The board's ISR for
//! that pin calls [`IrqFlag::raise`] and returns; everything else happens in
//! the main loop, which reads the chip's socket interrupt register to find
//! out which socket needs attention.
//!
//! ```ignore
//! static W52_IRQ: IrqFlag = IrqFlag::new();
//!
//! fn port2_isr() {
//!     W52_IRQ.raise();
//! }
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

/// Level flag set from interrupt context, cleared by the driver.
pub struct IrqFlag {
    pending: AtomicBool,
}

impl IrqFlag {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Mark that the chip asserted its interrupt line. ISR-safe.
    #[inline]
    pub fn raise(&self) {
        self.pending.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn clear(&self) {
        self.pending.store(false, Ordering::Release);
    }

    /// Set or clear in one store.
    #[inline]
    pub fn set(&self, raised: bool) {
        self.pending.store(raised, Ordering::Release);
    }
}

impl Default for IrqFlag {
    fn default() -> Self {
        Self::new()
    }
}
