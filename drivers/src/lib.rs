#![cfg_attr(not(test), no_std)]

pub mod cell;
pub mod chip;
pub mod idle;
pub mod irq;
pub mod macraw;
pub mod ring;
pub mod socket;
pub mod sockreg;
pub mod spi;

#[cfg(test)]
mod sim;

#[cfg(test)]
mod macraw_tests;

pub use cell::DriverCell;
pub use idle::{Idle, SpinIdle};
pub use macraw::MacFrameInfo;
pub use ring::RingWindow;
pub use socket::{SocketFd, W5200};
pub use spi::{RegisterPort, SpiRegisters, SpiTransport};
