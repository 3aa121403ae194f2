//! W5200 driver ABI types
//!
//! Canonical definitions shared between the socket engine and the firmware
//! that consumes it: the chip's register map, socket command and status
//! codes, network value types and the driver error enumeration.
//!
//! Nothing in here touches hardware. Everything is plain data so it can be
//! used from interrupt handlers, host-side tools and tests alike.

#![no_std]
#![forbid(unsafe_code)]

pub mod error;
pub mod net;
pub mod regs;

pub use error::*;
pub use net::*;
