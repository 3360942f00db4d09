//! Synchronous output of waveforms.
//!
//! Without a DMA-capable parallel peripheral the waveform can still be
//! clocked out word by word. [`WordSink`] is the capability to put one word on
//! the cartridge bus; [`GpioBus`] implements it by driving one
//! [`OutputPin`] per bit. [`Printhead`] ties a sink to a template and a
//! [`WaveformBuffer`], so that firing a row is a single call.
//!
//! Bit-banging is far slower than the waveform timing the cartridge expects,
//! so this path suits bring-up and logic-analyser captures more than
//! printing.

use embedded_hal::digital::{OutputPin, PinState};

use crate::encoder::WaveformBuffer;
use crate::nozzle::NozzleData;
use crate::template::{Template, TemplateKind};

/// Something that can put one output word on the cartridge bus.
pub trait WordSink {
    /// Error raised by the underlying hardware.
    type Error;

    /// Drive `word` onto the bus.
    ///
    /// # Errors
    ///
    /// Propagates the hardware error.
    fn write_word(&mut self, word: u16) -> Result<(), Self::Error>;

    /// Drive `words` onto the bus, in order.
    ///
    /// # Errors
    ///
    /// Stops at, and returns, the first hardware error.
    fn write_words(&mut self, words: &[u16]) -> Result<(), Self::Error> {
        for &word in words {
            self.write_word(word)?;
        }
        Ok(())
    }
}

/// A bus made of `LINES` GPIO outputs. Pin `i` carries bit `i` of each word.
///
/// The built-in templates use the twelve low bits: D1..D3 on pins 0..2,
/// CSYNC on pin 3 and the strobes and clock on pins 4..11.
pub struct GpioBus<P: OutputPin, const LINES: usize = 12> {
    pins: [P; LINES],
}

impl<P: OutputPin, const LINES: usize> GpioBus<P, LINES> {
    /// Bus driving `pins`, lowest bit first.
    pub fn new(pins: [P; LINES]) -> Self {
        const { assert!(LINES <= 16, "an output word has 16 bits") };
        Self { pins }
    }

    /// Give the pins back.
    pub fn release(self) -> [P; LINES] {
        self.pins
    }
}

impl<P: OutputPin, const LINES: usize> WordSink for GpioBus<P, LINES> {
    type Error = P::Error;

    fn write_word(&mut self, word: u16) -> Result<(), Self::Error> {
        for (bit, pin) in self.pins.iter_mut().enumerate() {
            pin.set_state(PinState::from(word & (1 << bit) != 0))?;
        }
        Ok(())
    }
}

/// Errors from a [`Printhead`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PrintError<E> {
    /// The waveform buffer cannot hold a waveform for the template.
    BufferTooSmall {
        /// Words the template's waveform needs.
        needed: usize,
        /// Words the buffer holds.
        capacity: usize,
    },
    /// The sink failed while clocking out a waveform.
    Bus(E),
}

impl<E: core::fmt::Debug> core::fmt::Display for PrintError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferTooSmall { needed, capacity } => write!(
                f,
                "waveform needs {needed} words, buffer holds {capacity}"
            ),
            Self::Bus(e) => write!(f, "bus error: {e:?}"),
        }
    }
}

/// A cartridge fired synchronously: render a row, then clock out every word.
///
/// # Example
/// ```rust
/// use core::convert::Infallible;
/// use printspider::bus::{Printhead, WordSink};
/// use printspider::nozzle::{InkColor, NozzleData};
/// use printspider::template::TemplateKind;
///
/// struct Counter(usize);
///
/// impl WordSink for Counter {
///     type Error = Infallible;
///     fn write_word(&mut self, _word: u16) -> Result<(), Infallible> {
///         self.0 += 1;
///         Ok(())
///     }
/// }
///
/// let mut head = Printhead::<_, 490>::new(Counter(0), TemplateKind::ColorA).unwrap();
/// let mut row = NozzleData::new();
/// row.set_color(8, InkColor::Yellow);
/// assert_eq!(head.fire(&row), Ok(490));
/// assert_eq!(head.release().0, 490);
/// ```
pub struct Printhead<S: WordSink, const WORDS: usize> {
    sink: S,
    template: Template<'static>,
    buffer: WaveformBuffer<WORDS>,
}

impl<S: WordSink, const WORDS: usize> Printhead<S, WORDS> {
    /// Printhead using the built-in template `kind`.
    ///
    /// # Errors
    ///
    /// [`PrintError::BufferTooSmall`] if `WORDS` cannot hold the waveform.
    pub fn new(sink: S, kind: TemplateKind) -> Result<Self, PrintError<S::Error>> {
        Self::with_template(sink, Template::get(kind))
    }

    /// Printhead using a hand-authored template.
    ///
    /// # Errors
    ///
    /// [`PrintError::BufferTooSmall`] if `WORDS` cannot hold the waveform.
    pub fn with_template(
        sink: S,
        template: Template<'static>,
    ) -> Result<Self, PrintError<S::Error>> {
        check_fits::<S::Error, WORDS>(&template)?;
        Ok(Self {
            sink,
            template,
            buffer: WaveformBuffer::new(),
        })
    }

    /// Switch to another built-in template. The current one stays on error.
    ///
    /// # Errors
    ///
    /// [`PrintError::BufferTooSmall`] if `WORDS` cannot hold the waveform.
    pub fn select(&mut self, kind: TemplateKind) -> Result<(), PrintError<S::Error>> {
        let template = Template::get(kind);
        check_fits::<S::Error, WORDS>(&template)?;
        self.template = template;
        Ok(())
    }

    /// The template rows are encoded with.
    #[must_use]
    pub const fn template(&self) -> Template<'static> {
        self.template
    }

    /// Encode `nozzles` and clock the waveform out. Returns its length in
    /// words.
    ///
    /// # Errors
    ///
    /// [`PrintError::Bus`] if the sink fails; the rest of the waveform is
    /// not sent.
    pub fn fire(&mut self, nozzles: &NozzleData) -> Result<usize, PrintError<S::Error>> {
        let len = self.buffer.render(&self.template, nozzles);
        for i in 0..len {
            self.sink
                .write_word(self.buffer.word(i).raw())
                .map_err(PrintError::Bus)?;
        }
        Ok(len)
    }

    /// The sink, e.g. to park the bus between rows.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Give the sink back.
    pub fn release(self) -> S {
        self.sink
    }
}

fn check_fits<E, const WORDS: usize>(template: &Template<'_>) -> Result<(), PrintError<E>> {
    if WaveformBuffer::<WORDS>::fits(template) {
        Ok(())
    } else {
        Err(PrintError::BufferTooSmall {
            needed: template.waveform_len(),
            capacity: WORDS,
        })
    }
}
