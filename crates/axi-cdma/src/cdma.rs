//! The transfer driver proper.

use core::hint::spin_loop;
use core::marker::PhantomData;
use core::ptr::NonNull;

use log::{debug, trace};

use crate::config::{Config, DeviceInfo};
use crate::error::{Error, Result};
use crate::event::{EventHandler, EventQueue, EventSet};
use crate::hal::{CacheOp, Hal};
use crate::reg::{Control, MAX_BTT, Mmio, Reg, RegIo, Status};

/// Software view of the in-flight state.
///
/// The hardware idle bit alone cannot distinguish "ready" from "halted by
/// a fault", and cannot be consulted without hardware; this flag makes the
/// one-transfer-per-handle invariant checkable on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
    Faulted,
}

/// One AXI CDMA channel.
///
/// Generic over the register block (`R`) so tests can substitute a
/// simulated device, and over the platform hooks (`H`) for cache
/// maintenance and the poll clock. One value per physical channel; all
/// methods take `&mut self`, so a handle is single-context by
/// construction.
pub struct AxiCdma<R, H>
where
    R: RegIo,
    H: Hal,
{
    regs: R,
    addr_width: usize,
    data_width: usize,
    has_dre: bool,
    burst_len: usize,
    sg_included: bool,
    config: Config,
    state: State,
    queue: EventQueue,
    callback: Option<EventHandler>,
    _hal: PhantomData<H>,
}

impl<R, H> AxiCdma<R, H>
where
    R: RegIo,
    H: Hal,
{
    /// Build a handle over an already-acquired register block.
    ///
    /// Captures the descriptor's capabilities and probes the status
    /// register once for scatter-gather presence. No other hardware side
    /// effect.
    pub fn new(regs: R, info: &DeviceInfo, config: Config) -> Self {
        let sr = Status::from_bits_truncate(regs.read(Reg::Status));
        let sg_included = sr.contains(Status::SG_INCLD);
        debug!(
            "cdma {:#x}: addr {}b, data {}b, dre {}, burst {}, sg {}",
            info.base_addr, info.addr_width, info.data_width, info.has_dre, info.burst_len,
            sg_included
        );
        Self {
            regs,
            addr_width: info.addr_width,
            data_width: info.data_width,
            has_dre: info.has_dre,
            burst_len: info.burst_len,
            sg_included,
            config,
            state: State::Idle,
            queue: EventQueue::new(),
            callback: None,
            _hal: PhantomData,
        }
    }

    /// Check one transfer request against the channel's capabilities.
    ///
    /// Pure: reads no register, mutates nothing. Both transfer paths run
    /// exactly this check before touching hardware.
    pub fn validate(&self, src: u64, dst: u64, len: usize) -> Result {
        if len == 0 || len > MAX_BTT {
            return Err(Error::LengthExceeded(len));
        }
        if !self.has_dre {
            let align = self.data_width / 8;
            let mask = align as u64 - 1;
            if src & mask != 0 {
                return Err(Error::SourceUnaligned { addr: src, align });
            }
            if dst & mask != 0 {
                return Err(Error::DestUnaligned { addr: dst, align });
            }
        }
        Ok(())
    }

    /// Copy `len` bytes from `src` to `dst`, blocking until done.
    ///
    /// Busy-waits for the idle bit, bounded by `Config::poll_timeout`.
    /// Surfaces any of the DMA error classes as [`Error::HardwareFault`];
    /// after a fault (or a timeout with the engine still running) the
    /// handle refuses further transfers until [`reset`](Self::reset).
    pub fn transfer_blocking(&mut self, src: u64, dst: u64, len: usize) -> Result {
        self.validate(src, dst, len)?;
        self.claim()?;
        trace!("poll transfer {src:#x} -> {dst:#x}, {len} bytes");

        // The engine must read committed source data and must not race a
        // stale write-back over the destination.
        H::dcache_range(CacheOp::Clean, src as usize, len);
        H::dcache_range(CacheOp::Clean, dst as usize, len);

        self.wait_idle()?;
        self.load_transfer(src, dst, len);
        self.wait_idle()?;

        let faults = self.status() & Status::FAULTS;
        if !faults.is_empty() {
            self.state = State::Faulted;
            return Err(Error::HardwareFault(
                EventSet::from_status(self.status()) & EventSet::FAULTS,
            ));
        }
        self.state = State::Idle;

        // Drop any cached destination lines so the CPU reads what the
        // engine wrote.
        H::dcache_range(CacheOp::Invalidate, dst as usize, len);
        Ok(())
    }

    /// Start a transfer and return without waiting.
    ///
    /// Arms the completion and error interrupts (threshold and delay from
    /// the handle config) before loading the addresses. Completion arrives
    /// through [`handle_irq`](Self::handle_irq); until then the handle
    /// reports [`Error::Busy`] for new transfers.
    pub fn start_transfer(&mut self, src: u64, dst: u64, len: usize) -> Result {
        self.validate(src, dst, len)?;
        self.claim()?;
        trace!("event transfer {src:#x} -> {dst:#x}, {len} bytes");

        H::dcache_range(CacheOp::Clean, src as usize, len);
        H::dcache_range(CacheOp::Clean, dst as usize, len);
        // Completion is asynchronous and the caller returns immediately,
        // so the destination view is dropped now rather than on completion.
        H::dcache_range(CacheOp::Invalidate, dst as usize, len);

        let mut cr = self.regs.read(Reg::Control);
        cr &= !Control::COUNTER_MASK;
        cr |= (self.config.irq_threshold as u32) << Control::IRQ_THRESHOLD_SHIFT;
        cr |= (self.config.irq_delay as u32) << Control::IRQ_DELAY_SHIFT;
        cr |= (Control::IOC_IRQ_EN | Control::ERR_IRQ_EN).bits();
        self.regs.write(Reg::Control, cr);

        self.wait_idle()?;
        self.load_transfer(src, dst, len);
        Ok(())
    }

    /// Service the channel interrupt.
    ///
    /// Called by the platform's interrupt dispatch. Acknowledges the
    /// latched bits, retires the in-flight transfer, queues the event set
    /// and notifies the callback. Returns `None` for a spurious interrupt.
    pub fn handle_irq(&mut self) -> Option<EventSet> {
        let sr = self.status();
        let pending = sr & (Status::IOC_IRQ | Status::DLY_IRQ | Status::ERR_IRQ);
        if pending.is_empty() {
            return None;
        }
        // Latched bits are write-1-to-clear.
        self.regs.write(Reg::Status, pending.bits());

        let mut events = EventSet::from_status(pending);
        if events.contains(EventSet::ERROR) {
            events |= EventSet::from_status(sr & Status::FAULTS);
            self.state = State::Faulted;
        } else if events.contains(EventSet::COMPLETE) {
            self.state = State::Idle;
        }
        trace!("irq events {events:?}");

        self.queue.push(events);
        if let Some(cb) = &self.callback {
            cb(events);
        }
        Some(events)
    }

    /// Take the oldest undelivered event set, if any.
    pub fn pop_event(&mut self) -> Option<EventSet> {
        self.queue.pop()
    }

    /// Replace the completion callback.
    ///
    /// Runs on the interrupt-dispatch context, after the event has been
    /// queued.
    pub fn set_callback<F>(&mut self, f: F)
    where
        F: Fn(EventSet) + Send + 'static,
    {
        self.callback = Some(alloc::boxed::Box::new(f));
    }

    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    /// Enable interrupt generation for the given conditions.
    ///
    /// Only the three summary conditions have enable bits; error-class
    /// bits in `events` are folded into the error summary.
    pub fn enable_events(&mut self, events: EventSet) {
        let cr = self.regs.read(Reg::Control);
        self.regs
            .write(Reg::Control, cr | Self::irq_enables(events).bits());
    }

    /// Disable interrupt generation for the given conditions.
    pub fn disable_events(&mut self, events: EventSet) {
        let cr = self.regs.read(Reg::Control);
        self.regs
            .write(Reg::Control, cr & !Self::irq_enables(events).bits());
    }

    /// Set the interrupt threshold field and remember it for future
    /// event-driven transfers.
    pub fn set_irq_threshold(&mut self, threshold: u8) {
        self.config.irq_threshold = threshold;
        let cr = self.regs.read(Reg::Control) & !(0xff << Control::IRQ_THRESHOLD_SHIFT);
        self.regs.write(
            Reg::Control,
            cr | (threshold as u32) << Control::IRQ_THRESHOLD_SHIFT,
        );
    }

    /// Set the interrupt delay field and remember it for future
    /// event-driven transfers.
    pub fn set_irq_delay(&mut self, delay: u8) {
        self.config.irq_delay = delay;
        let cr = self.regs.read(Reg::Control) & !(0xff << Control::IRQ_DELAY_SHIFT);
        self.regs
            .write(Reg::Control, cr | (delay as u32) << Control::IRQ_DELAY_SHIFT);
    }

    /// Soft-reset the engine and clear the handle's state.
    ///
    /// The reset bit self-clears when the engine is back up; the wait is
    /// bounded like every other busy-wait. Discards undelivered events.
    pub fn reset(&mut self) -> Result {
        debug!("cdma reset");
        self.regs.write(Reg::Control, Control::RESET.bits());
        self.wait_for(|regs| regs.read(Reg::Control) & Control::RESET.bits() == 0)?;
        self.state = State::Idle;
        self.queue.clear();
        Ok(())
    }

    /// Hardware idle bit: no transfer in progress, ready for a new one.
    pub fn is_idle(&self) -> bool {
        self.status().contains(Status::IDLE)
    }

    pub fn has_dre(&self) -> bool {
        self.has_dre
    }

    pub fn addr_width(&self) -> usize {
        self.addr_width
    }

    pub fn data_width(&self) -> usize {
        self.data_width
    }

    pub fn burst_len(&self) -> usize {
        self.burst_len
    }

    /// Scatter-gather hardware present, as probed at init. Informational:
    /// this driver only issues simple transfers.
    pub fn sg_included(&self) -> bool {
        self.sg_included
    }

    /// Control-register enable bits for the given event conditions. The
    /// summary bits share positions with their enables; fault classes fold
    /// into the error summary enable.
    fn irq_enables(events: EventSet) -> Control {
        let mut en = Control::from_bits_truncate(
            events.bits()
                & (Control::IOC_IRQ_EN | Control::DLY_IRQ_EN | Control::ERR_IRQ_EN).bits(),
        );
        if events.is_fault() {
            en |= Control::ERR_IRQ_EN;
        }
        en
    }

    fn claim(&self) -> Result {
        match self.state {
            State::Idle => Ok(()),
            State::Running => Err(Error::Busy),
            State::Faulted => Err(Error::Faulted),
        }
    }

    fn status(&self) -> Status {
        Status::from_bits_truncate(self.regs.read(Reg::Status))
    }

    /// Load addresses and trigger. The caller has already observed idle;
    /// writing the count register is what starts the engine.
    fn load_transfer(&mut self, src: u64, dst: u64, len: usize) {
        self.regs.write(Reg::SrcAddr, src as u32);
        if self.addr_width > 32 {
            self.regs.write(Reg::SrcAddrMsb, (src >> 32) as u32);
        }
        self.regs.write(Reg::DstAddr, dst as u32);
        if self.addr_width > 32 {
            self.regs.write(Reg::DstAddrMsb, (dst >> 32) as u32);
        }
        self.state = State::Running;
        self.regs.write(Reg::Btt, len as u32);
    }

    fn wait_idle(&self) -> Result {
        self.wait_for(|regs| Status::from_bits_truncate(regs.read(Reg::Status)).contains(Status::IDLE))
    }

    fn wait_for(&self, mut cond: impl FnMut(&R) -> bool) -> Result {
        let deadline = self.config.poll_timeout.map(|t| H::since_boot() + t);
        loop {
            if cond(&self.regs) {
                return Ok(());
            }
            if let Some(deadline) = deadline
                && H::since_boot() > deadline
            {
                return Err(Error::Timeout);
            }
            spin_loop();
        }
    }
}

impl<H> AxiCdma<Mmio, H>
where
    H: Hal,
{
    /// Resolve `device_id` against a board table and take over the
    /// device's register block.
    ///
    /// # Safety
    ///
    /// The descriptor's `base_addr` must be the mapped register block of a
    /// real AXI CDMA instance, and nothing else may access it for the
    /// lifetime of the handle.
    pub unsafe fn probe(table: &[DeviceInfo], device_id: u32, config: Config) -> Result<Self> {
        let info = DeviceInfo::lookup(table, device_id)?;
        let base = NonNull::new(info.base_addr as *mut u32)
            .ok_or(Error::DeviceNotFound(device_id))?;
        Ok(Self::new(unsafe { Mmio::new(base) }, info, config))
    }
}
