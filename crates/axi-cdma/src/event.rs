//! Completion events and their delivery.
//!
//! The interrupt path does not run user code directly against shared
//! state: [`handle_irq`](crate::AxiCdma::handle_irq) acknowledges the
//! hardware, pushes the event set onto a small queue, and the owning
//! context drains it with [`pop_event`](crate::AxiCdma::pop_event). A
//! callback slot is kept for callers that want the C-style notification;
//! it runs on the interrupt-dispatch context.

use alloc::boxed::Box;

use arrayvec::ArrayVec;
use bitflags::bitflags;
use log::warn;
use spin::Mutex;

use crate::reg::Status;

bitflags! {
    /// Conditions reported for one transfer.
    ///
    /// Bit positions match the status-register flags one-to-one, so a raw
    /// mask can be compared against hardware documentation directly.
    pub struct EventSet: u32 {
        /// Transfer ran to completion.
        const COMPLETE     = 1 << 12;
        /// Interrupt delay timer expired.
        const DELAY        = 1 << 13;
        /// Error summary; one of the class bits below is also set.
        const ERROR        = 1 << 14;
        const DMA_INTERNAL = 1 << 4;
        const DMA_SLAVE    = 1 << 5;
        const DMA_DECODE   = 1 << 6;
        const SG_INTERNAL  = 1 << 8;
        const SG_SLAVE     = 1 << 9;
        const SG_DECODE    = 1 << 10;
    }
}

impl EventSet {
    /// The error summary and all six error classes.
    pub const FAULTS: EventSet = EventSet::from_bits_truncate(
        EventSet::ERROR.bits
            | EventSet::DMA_INTERNAL.bits
            | EventSet::DMA_SLAVE.bits
            | EventSet::DMA_DECODE.bits
            | EventSet::SG_INTERNAL.bits
            | EventSet::SG_SLAVE.bits
            | EventSet::SG_DECODE.bits,
    );

    pub(crate) fn from_status(sr: Status) -> Self {
        EventSet::from_bits_truncate(sr.bits())
    }

    /// True if any error class or the error summary is present.
    pub fn is_fault(self) -> bool {
        self.intersects(EventSet::FAULTS)
    }
}

/// Completion notification, invoked with the event set of one interrupt.
pub type EventHandler = Box<dyn Fn(EventSet) + Send>;

const QUEUE_DEPTH: usize = 8;

/// Fixed-capacity event queue shared with the interrupt context.
pub(crate) struct EventQueue {
    inner: Mutex<ArrayVec<EventSet, QUEUE_DEPTH>>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(ArrayVec::new_const()),
        }
    }

    pub fn push(&self, events: EventSet) {
        let mut q = self.inner.lock();
        if q.try_push(events).is_err() {
            // Oldest event wins; the caller stopped draining long ago.
            warn!("event queue full, dropping {events:?}");
        }
    }

    pub fn pop(&self) -> Option<EventSet> {
        let mut q = self.inner.lock();
        if q.is_empty() { None } else { Some(q.remove(0)) }
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
