//! Single-slot hand-off of nozzle rows to the output path.
//!
//! The producer computes the next row while the hardware prints the current
//! one. Only one row may be pending: [`FiringQueue::send`] waits until the
//! consumer has taken the previous row, which throttles the producer to the
//! print speed. The consumer runs from the peripheral's buffer callback and
//! must never wait, so it only uses [`FiringQueue::try_take`].
//!
//! Rows are passed by value. Once sent, later changes to the producer's
//! buffer never reach the consumer, so the producer can clear and refill it
//! right away.
//!
//! # Example
//! ```rust
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use printspider::nozzle::{InkColor, NozzleData};
//! use printspider::queue::FiringQueue;
//!
//! let queue = FiringQueue::<NoopRawMutex>::new();
//! let mut row = NozzleData::new();
//! row.set_color(3, InkColor::Magenta);
//!
//! assert!(queue.try_send(row).is_ok());
//! assert!(queue.try_send(row).is_err()); // slot taken
//! assert_eq!(queue.try_take(), Some(row));
//! assert_eq!(queue.try_take(), None);
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use crate::nozzle::NozzleData;

/// Number of rows that may wait for the output path.
pub const QUEUE_DEPTH: usize = 1;

/// Capacity-1 channel of nozzle rows.
///
/// `M` selects the lock protecting the slot: use
/// `CriticalSectionRawMutex` when the consumer runs in an interrupt, or
/// `NoopRawMutex` when producer and consumer share one executor.
pub struct FiringQueue<M: RawMutex> {
    channel: Channel<M, NozzleData, QUEUE_DEPTH>,
}

impl<M: RawMutex> Default for FiringQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> FiringQueue<M> {
    /// An empty queue, usable in a `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Hand `row` to the output path, waiting while the previous row is still
    /// pending.
    pub async fn send(&self, row: NozzleData) {
        self.channel.send(row).await;
    }

    /// Hand `row` to the output path if the slot is free; otherwise give it
    /// back.
    ///
    /// # Errors
    ///
    /// Returns the row when another row is still pending.
    pub fn try_send(&self, row: NozzleData) -> Result<(), NozzleData> {
        match self.channel.try_send(row) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(row)) => Err(row),
        }
    }

    /// Take the pending row, or `None` when the slot is empty. Never waits.
    pub fn try_take(&self) -> Option<NozzleData> {
        self.channel.try_receive().ok()
    }

    /// Wait for the next row.
    pub async fn take(&self) -> NozzleData {
        self.channel.receive().await
    }

    /// `true` if a row waits for the output path.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.channel.is_full()
    }
}

impl<M: RawMutex> core::fmt::Debug for FiringQueue<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FiringQueue")
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<M: RawMutex> defmt::Format for FiringQueue<M> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FiringQueue {{ pending: {} }}", self.is_pending());
    }
}
