//! Global home for the driver instance.
//!
//! ```ignore
//! static W52_IRQ: IrqFlag = IrqFlag::new();
//! static NET: DriverCell<'static, SpiRegisters<Spi1>, Wfi> = DriverCell::new();
//!
//! NET.install(W5200::new(SpiRegisters::new(spi), Wfi, &W52_IRQ, cfg))?;
//! NET.with(|drv| drv.init());
//! ```
//!
//! The interrupt flag lives outside the lock, so the ISR never contends
//! with the main loop.

use spin::Mutex;

use crate::idle::Idle;
use crate::socket::W5200;
use crate::spi::RegisterPort;

pub struct DriverCell<'irq, P: RegisterPort, W: Idle> {
    inner: Mutex<Option<W5200<'irq, P, W>>>,
}

impl<'irq, P: RegisterPort, W: Idle> DriverCell<'irq, P, W> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Store the driver. Hands it back if one is already installed.
    pub fn install(&self, driver: W5200<'irq, P, W>) -> Result<(), W5200<'irq, P, W>> {
        let mut slot = self.inner.lock();
        if slot.is_some() {
            return Err(driver);
        }
        *slot = Some(driver);
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Run `f` with exclusive access; `None` before installation.
    pub fn with<R>(&self, f: impl FnOnce(&mut W5200<'irq, P, W>) -> R) -> Option<R> {
        let mut guard = self.inner.lock();
        Option::as_mut(&mut *guard).map(f)
    }

    /// As [`DriverCell::with`] but gives up instead of spinning on the lock.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut W5200<'irq, P, W>) -> R) -> Option<R> {
        let mut guard = self.inner.try_lock()?;
        Option::as_mut(&mut *guard).map(f)
    }

    pub fn take(&self) -> Option<W5200<'irq, P, W>> {
        self.inner.lock().take()
    }
}

impl<P: RegisterPort, W: Idle> Default for DriverCell<'_, P, W> {
    fn default() -> Self {
        Self::new()
    }
}
