//! The driver's only suspension point.
//!
//! `connect()` and `txcommit()` poll the chip until it reports an outcome.
//! Between polls, when no interrupt is pending, they hand control to an
//! [`Idle`] implementation supplied by the board: typically a wait-for-
//! interrupt instruction that a periodic timer tick also wakes.

/// Wait until an interrupt (or timer tick) might have changed chip state.
pub trait Idle {
    fn wait_for_event(&mut self);
}

/// Busy-wait for a fixed number of spin-loop hints.
#[derive(Clone, Copy, Debug)]
pub struct SpinIdle {
    spins: u32,
}

impl SpinIdle {
    pub const DEFAULT_SPINS: u32 = 1024;

    pub const fn new(spins: u32) -> Self {
        Self { spins }
    }
}

impl Default for SpinIdle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SPINS)
    }
}

impl Idle for SpinIdle {
    fn wait_for_event(&mut self) {
        for _ in 0..self.spins {
            core::hint::spin_loop();
        }
    }
}

impl<W: Idle + ?Sized> Idle for &mut W {
    fn wait_for_event(&mut self) {
        (**self).wait_for_event();
    }
}
