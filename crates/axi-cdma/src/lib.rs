//! Driver for the AXI CDMA memory-to-memory transfer engine.
//!
//! Moves a contiguous byte range from a source to a destination address
//! without CPU copying. Two execution modes over one simple-transfer
//! register block:
//!
//! - [`AxiCdma::transfer_blocking`]: program, busy-wait for the idle bit,
//!   surface faults, done.
//! - [`AxiCdma::start_transfer`]: arm interrupts and return; the platform's
//!   interrupt dispatch feeds [`AxiCdma::handle_irq`], which queues an
//!   [`EventSet`] and notifies an optional callback.
//!
//! The driver is generic over its register block ([`RegIo`]; [`Mmio`] for
//! mapped hardware, [`sim::SimDma`] for host tests) and over the platform
//! hooks ([`Hal`]: data-cache maintenance and a monotonic clock for
//! bounded waits). Scatter-gather descriptor chains are out of scope; the
//! hardware's SG presence is probed once at init and only reported.

#![no_std]

extern crate alloc;

mod cdma;
mod config;
mod error;
mod event;
mod hal;
mod reg;
pub mod sim;

pub use cdma::AxiCdma;
pub use config::{Config, DeviceInfo};
pub use error::{Error, Result};
pub use event::{EventHandler, EventSet};
pub use hal::{CacheOp, Hal};
pub use reg::{Control, MAX_BTT, Mmio, Reg, RegIo, Status};
