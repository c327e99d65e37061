//! Board-support descriptors and handle configuration.
//!
//! Descriptor resolution belongs to the board layer: it knows where the
//! engine sits and how it was synthesized. The driver only consumes one
//! record per device, looked up by id.

use core::time::Duration;

use crate::{Error, Result};

/// Hardware description of one AXI CDMA instance.
///
/// The bus widths and the realignment capability are synthesis options;
/// they never change after init.
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    pub device_id: u32,
    /// Virtual address of the register block.
    pub base_addr: usize,
    /// Address bus width in bits, 32 or 64.
    pub addr_width: usize,
    /// Data bus width in bits; dictates alignment when `has_dre` is false.
    pub data_width: usize,
    /// Data realignment engine present: unaligned addresses allowed.
    pub has_dre: bool,
    /// Maximum burst length, in data-width beats.
    pub burst_len: usize,
}

impl DeviceInfo {
    /// Find the descriptor for `device_id` in a board table.
    pub fn lookup(table: &[DeviceInfo], device_id: u32) -> Result<&DeviceInfo> {
        table
            .iter()
            .find(|d| d.device_id == device_id)
            .ok_or(Error::DeviceNotFound(device_id))
    }

    /// Required address alignment in bytes when no DRE is present.
    pub fn alignment(&self) -> usize {
        self.data_width / 8
    }
}

/// Per-handle driver configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Bound on every idle/reset busy-wait. `None` waits forever, which
    /// turns a wedged engine into a hang; opt into it deliberately.
    pub poll_timeout: Option<Duration>,
    /// Interrupt threshold programmed before an event-driven transfer.
    pub irq_threshold: u8,
    /// Interrupt delay programmed before an event-driven transfer.
    pub irq_delay: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_timeout: Some(Duration::from_secs(1)),
            irq_threshold: 1,
            irq_delay: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[DeviceInfo] = &[
        DeviceInfo {
            device_id: 0,
            base_addr: 0x4400_0000,
            addr_width: 32,
            data_width: 32,
            has_dre: false,
            burst_len: 16,
        },
        DeviceInfo {
            device_id: 7,
            base_addr: 0x4401_0000,
            addr_width: 64,
            data_width: 64,
            has_dre: true,
            burst_len: 256,
        },
    ];

    #[test]
    fn lookup_hits() {
        let d = DeviceInfo::lookup(TABLE, 7).unwrap();
        assert_eq!(d.base_addr, 0x4401_0000);
        assert_eq!(d.alignment(), 8);
    }

    #[test]
    fn lookup_misses() {
        assert_eq!(
            DeviceInfo::lookup(TABLE, 3).unwrap_err(),
            Error::DeviceNotFound(3)
        );
    }
}
