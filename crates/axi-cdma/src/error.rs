use thiserror::Error;

use crate::event::EventSet;

pub type Result<T = ()> = core::result::Result<T, Error>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("no device descriptor matches id {0}")]
    DeviceNotFound(u32),
    #[error("transfer length {0} outside 1..={max}", max = crate::reg::MAX_BTT)]
    LengthExceeded(usize),
    #[error("source address {addr:#x} not {align}-byte aligned and device has no DRE")]
    SourceUnaligned { addr: u64, align: usize },
    #[error("destination address {addr:#x} not {align}-byte aligned and device has no DRE")]
    DestUnaligned { addr: u64, align: usize },
    #[error("a transfer is already in flight")]
    Busy,
    #[error("engine halted by a previous fault; reset required")]
    Faulted,
    #[error("timed out waiting for the engine to go idle")]
    Timeout,
    #[error("engine fault ({0:?})")]
    HardwareFault(EventSet),
}
