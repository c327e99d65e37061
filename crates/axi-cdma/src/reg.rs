//! The AXI CDMA register block.
//!
//! Eleven consecutive 32-bit registers. The descriptor-pointer pairs are
//! only meaningful in scatter-gather mode; simple transfers never drive
//! them, but the layout keeps them so offsets stay bit-exact.

use core::ptr::NonNull;

use bitflags::bitflags;

/// Largest value the byte-transfer-count register accepts (26 bits).
pub const MAX_BTT: usize = (1 << 26) - 1;

/// Register offsets from the block base.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    /// Control (CDMACR).
    Control = 0x00,
    /// Status (CDMASR).
    Status = 0x04,
    /// Current descriptor pointer, low half.
    CurDesc = 0x08,
    /// Current descriptor pointer, high half.
    CurDescMsb = 0x0C,
    /// Tail descriptor pointer, low half.
    TailDesc = 0x10,
    /// Tail descriptor pointer, high half.
    TailDescMsb = 0x14,
    /// Source address, low half.
    SrcAddr = 0x18,
    /// Source address, high half.
    SrcAddrMsb = 0x1C,
    /// Destination address, low half.
    DstAddr = 0x20,
    /// Destination address, high half.
    DstAddrMsb = 0x24,
    /// Byte transfer count. Writing this starts the transfer.
    Btt = 0x28,
}

bitflags! {
    /// Control register (CDMACR) bits.
    pub struct Control: u32 {
        const TAILPTR_EN    = 1 << 1;
        const RESET         = 1 << 2;
        const SG_MODE       = 1 << 3;
        const KEYHOLE_READ  = 1 << 4;
        const KEYHOLE_WRITE = 1 << 5;
        const IOC_IRQ_EN    = 1 << 12;
        const DLY_IRQ_EN    = 1 << 13;
        const ERR_IRQ_EN    = 1 << 14;
    }
}

impl Control {
    /// Shift of the 8-bit interrupt threshold field.
    pub const IRQ_THRESHOLD_SHIFT: u32 = 16;
    /// Shift of the 8-bit interrupt delay field.
    pub const IRQ_DELAY_SHIFT: u32 = 24;
    /// Mask of both 8-bit counter fields.
    pub const COUNTER_MASK: u32 =
        (0xff << Self::IRQ_THRESHOLD_SHIFT) | (0xff << Self::IRQ_DELAY_SHIFT);
}

bitflags! {
    /// Status register (CDMASR) bits.
    ///
    /// The irq bits (12..=14) are latched by hardware and cleared by
    /// writing 1 back to them. The threshold/delay counter fields share
    /// the layout of the control register and are not modeled here.
    pub struct Status: u32 {
        const IDLE        = 1 << 1;
        const SG_INCLD    = 1 << 3;
        const DMA_INT_ERR = 1 << 4;
        const DMA_SLV_ERR = 1 << 5;
        const DMA_DEC_ERR = 1 << 6;
        const SG_INT_ERR  = 1 << 8;
        const SG_SLV_ERR  = 1 << 9;
        const SG_DEC_ERR  = 1 << 10;
        const IOC_IRQ     = 1 << 12;
        const DLY_IRQ     = 1 << 13;
        const ERR_IRQ     = 1 << 14;
    }
}

impl Status {
    /// The four DMA error classes plus their scatter-gather mirrors.
    pub const FAULTS: Status = Status::from_bits_truncate(
        Status::DMA_INT_ERR.bits
            | Status::DMA_SLV_ERR.bits
            | Status::DMA_DEC_ERR.bits
            | Status::SG_INT_ERR.bits
            | Status::SG_SLV_ERR.bits
            | Status::SG_DEC_ERR.bits,
    );
}

/// Raw access to the register block.
///
/// The driver is generic over this so a simulated block can stand in for
/// mapped hardware. Implementations must perform each call as exactly one
/// 32-bit access: reads of latched status bits are not idempotent on real
/// hardware, and a skipped or widened write changes device behavior.
pub trait RegIo {
    fn read(&self, reg: Reg) -> u32;
    fn write(&mut self, reg: Reg, val: u32);
}

/// Memory-mapped register block.
///
/// Owns its base pointer exclusively; the handle holding it is the only
/// software path to the device.
pub struct Mmio {
    base: NonNull<u32>,
}

// The block is a raw device pointer; the driver serializes all access.
unsafe impl Send for Mmio {}

impl Mmio {
    /// Wrap a mapped register block.
    ///
    /// # Safety
    ///
    /// `base` must be the virtual address of an AXI CDMA register block,
    /// mapped device-memory, valid for the lifetime of the value, and not
    /// aliased by any other software accessor.
    pub const unsafe fn new(base: NonNull<u32>) -> Self {
        Self { base }
    }

    fn ptr(&self, reg: Reg) -> *mut u32 {
        // Offsets are byte offsets within an 11-word block.
        unsafe { self.base.as_ptr().byte_add(reg as usize) }
    }
}

impl RegIo for Mmio {
    fn read(&self, reg: Reg) -> u32 {
        unsafe { self.ptr(reg).read_volatile() }
    }

    fn write(&mut self, reg: Reg, val: u32) {
        unsafe { self.ptr(reg).write_volatile(val) }
    }
}
