//! Buffer filler for continuously clocked output peripherals.
//!
//! A parallel output peripheral (I²S, LCD/camera, …) streams a ring of DMA
//! buffers and asks for the next one while the current one is on the wire.
//! That request cannot wait: if the buffer is not ready in time the bus glitches
//! and the cartridge misfires. [`BufferFiller::fill`] therefore never blocks
//! and never allocates. Per call it takes at most one row from the
//! [`FiringQueue`], and otherwise writes the idle pattern (all words zero), so
//! the bus keeps its cadence while the producer catches up.
//!
//! The cost of a fill is bounded by the buffer length plus one encoded row,
//! `14 × template.len()` words.
//!
//! # Example
//! ```rust
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use printspider::filler::{BufferFiller, Fill};
//! use printspider::nozzle::{InkColor, NozzleData};
//! use printspider::queue::FiringQueue;
//! use printspider::template::TemplateKind;
//!
//! let queue = FiringQueue::<NoopRawMutex>::new();
//! let mut filler = BufferFiller::new(&queue, TemplateKind::ColorB);
//! let mut dma_buffer = [0u16; 512];
//!
//! assert_eq!(filler.fill(&mut dma_buffer), Fill::Idle);
//!
//! let mut row = NozzleData::new();
//! row.set_color(40, InkColor::Cyan);
//! queue.try_send(row).unwrap();
//! assert_eq!(filler.fill(&mut dma_buffer), Fill::Row(490));
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::encoder::generate;
use crate::queue::FiringQueue;
use crate::template::{Template, TemplateKind};

/// What a call to [`BufferFiller::fill`] put into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fill {
    /// A row was encoded; the waveform is this many words long.
    Row(usize),
    /// No row was pending; the buffer is idle.
    Idle,
    /// The buffer cannot hold a waveform. It is idle and any pending row
    /// stays queued.
    Undersized,
}

/// Fills output buffers from a [`FiringQueue`].
pub struct BufferFiller<'q, M: RawMutex> {
    queue: &'q FiringQueue<M>,
    template: Template<'static>,
    words_used: usize,
    rows_fired: u32,
    idle_fills: u32,
}

impl<'q, M: RawMutex> BufferFiller<'q, M> {
    /// Filler drawing rows from `queue` and encoding them with the built-in
    /// template `kind`.
    #[must_use]
    pub const fn new(queue: &'q FiringQueue<M>, kind: TemplateKind) -> Self {
        Self::with_template(queue, Template::get(kind))
    }

    /// Filler using a hand-authored template.
    #[must_use]
    pub const fn with_template(queue: &'q FiringQueue<M>, template: Template<'static>) -> Self {
        Self {
            queue,
            template,
            words_used: 0,
            rows_fired: 0,
            idle_fills: 0,
        }
    }

    /// Switch to another built-in template, e.g. when the cartridge changes.
    pub fn select(&mut self, kind: TemplateKind) {
        self.template = Template::get(kind);
    }

    /// The template rows are encoded with.
    #[must_use]
    pub const fn template(&self) -> Template<'static> {
        self.template
    }

    /// Minimum buffer length, in words, for [`BufferFiller::fill`] to encode
    /// rows.
    #[must_use]
    pub const fn waveform_len(&self) -> usize {
        self.template.waveform_len()
    }

    /// Fill `buf` with the next waveform, or with the idle pattern when no
    /// row is pending. Never blocks.
    pub fn fill(&mut self, buf: &mut [u16]) -> Fill {
        buf.fill(0);

        if buf.len() < self.template.waveform_len() {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "output buffer of {} words cannot hold a {} word waveform",
                buf.len(),
                self.template.waveform_len()
            );
            self.words_used = 0;
            self.idle_fills = self.idle_fills.wrapping_add(1);
            return Fill::Undersized;
        }

        match self.queue.try_take() {
            Some(row) => {
                let len = generate(buf, &self.template, &row);
                #[cfg(feature = "defmt")]
                defmt::trace!("row with {} nozzles, {} words", row.fired_count(), len);
                self.words_used = len;
                self.rows_fired = self.rows_fired.wrapping_add(1);
                Fill::Row(len)
            }
            None => {
                self.words_used = 0;
                self.idle_fills = self.idle_fills.wrapping_add(1);
                Fill::Idle
            }
        }
    }

    /// Words of waveform written by the last fill; 0 when it was idle.
    #[must_use]
    pub const fn words_used(&self) -> usize {
        self.words_used
    }

    /// Rows encoded so far.
    #[must_use]
    pub const fn rows_fired(&self) -> u32 {
        self.rows_fired
    }

    /// Fills that produced the idle pattern.
    #[must_use]
    pub const fn idle_fills(&self) -> u32 {
        self.idle_fills
    }
}

impl<M: RawMutex> core::fmt::Debug for BufferFiller<'_, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferFiller")
            .field("template_len", &self.template.len())
            .field("words_used", &self.words_used)
            .field("rows_fired", &self.rows_fired)
            .field("idle_fills", &self.idle_fills)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "defmt")]
impl<M: RawMutex> defmt::Format for BufferFiller<'_, M> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "BufferFiller {{ template_len: {}, words_used: {}, rows_fired: {}, idle_fills: {} }}",
            self.template.len(),
            self.words_used,
            self.rows_fired,
            self.idle_fills
        );
    }
}
