//! Waveform encoder: nozzle data + template → bus words.
//!
//! The cartridge holds three 112-bit shift registers, one per data line. A row
//! is shifted in as 14 stages; each stage replays the template once, clocks
//! one byte into every register and pulses the strobes that fire the selected
//! nozzles. Eight idle words follow every stage.
//!
//! For every stage `j` the encoder:
//! - drops the F3 power line when no nozzle in the low nibble of stage `j`
//!   fires, and F5 when none in the high nibble does, so unused drive
//!   circuitry stays off;
//! - walks the template, selecting the next data bit (1, 2, 4, … 128) on every
//!   change of the toggle pair;
//! - on words where the toggle pair is non-zero, drives D1/D2/D3 **high when
//!   the nozzle bit is clear**. The data lines are active-low;
//! - raises CSYNC from bit 14 of the template word on the last stage and from
//!   bit 15 on all others.
//!
//! A row with no nozzle set is emitted as all-zero words. The output length
//! only depends on the template length, see [`waveform_len`].
//!
//! # Example
//! ```rust
//! use printspider::encoder::{generate, waveform_len};
//! use printspider::nozzle::{InkColor, NozzleData};
//! use printspider::template::{Template, TemplateKind};
//!
//! let template = Template::get(TemplateKind::ColorB);
//! let mut nozzles = NozzleData::new();
//! nozzles.set_color(20, InkColor::Yellow);
//!
//! let mut words = [0u16; 512];
//! let len = generate(&mut words, &template, &nozzles);
//! assert_eq!(len, waveform_len(template.len()));
//! ```
//!
//! # Memory Layout
//! With the `esp32-ordering` feature, every pair of words is stored swapped,
//! because the original ESP32 I²S peripheral emits the upper half of each
//! 32-bit word first in 16-bit mode. The generated length is always even so
//! the swap never leaves the buffer.

use bitfield::bitfield;
#[cfg(not(feature = "esp-dma"))]
use embedded_dma::ReadBuffer;
#[cfg(feature = "esp-dma")]
use esp_hal::dma::ReadBuffer;

use crate::nozzle::NozzleData;
use crate::template::Template;
use crate::{IDLE_WORDS, STAGES};

bitfield! {
    /// 16-bit word driven onto the cartridge bus.
    ///
    /// The bit layout is as follows:
    /// - Bit 11: F5 power line
    /// - Bit 10: F3 power line
    /// - Bit 9: Strobe S3
    /// - Bit 8: Data clock
    /// - Bit 7: Strobe S5
    /// - Bit 6: Strobe S1
    /// - Bit 5: Strobe S4
    /// - Bit 4: Strobe S2
    /// - Bit 3: CSYNC
    /// - Bit 2: Data line D3 (active low)
    /// - Bit 1: Data line D2 (active low)
    /// - Bit 0: Data line D1 (active low)
    ///
    /// Bits 12-15 carry whatever the template had there; the bus ignores them.
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct OutputWord(u16);
    impl Debug;
    pub f5, set_f5: 11;
    pub f3, set_f3: 10;
    pub s3, set_s3: 9;
    pub dclk, set_dclk: 8;
    pub s5, set_s5: 7;
    pub s1, set_s1: 6;
    pub s4, set_s4: 5;
    pub s2, set_s2: 4;
    pub csync, set_csync: 3;
    pub d3, set_d3: 2;
    pub d2, set_d2: 1;
    pub d1, set_d1: 0;
    pub data, set_data: 2, 0;
}

impl OutputWord {
    /// Wrap a raw bus word.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw word.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for OutputWord {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "OutputWord({=u16:#06x})", self.0);
    }
}

const LAST_STAGE: usize = STAGES - 1;

/// Number of output words generated from a template of `template_len` words.
///
/// Always even, and independent of the nozzle data, so buffers can be sized
/// once per template.
#[must_use]
pub const fn waveform_len(template_len: usize) -> usize {
    (STAGES * (template_len + IDLE_WORDS) + 1) & !1
}

// words are output in the order 1, 0, 3, 2, ...
#[cfg(feature = "esp32-ordering")]
#[inline(always)]
const fn map_index(index: usize) -> usize {
    index ^ 1
}

#[cfg(not(feature = "esp32-ordering"))]
#[inline(always)]
const fn map_index(index: usize) -> usize {
    index
}

/// Generate the waveform for one row of nozzle data.
///
/// `out` must be zeroed by the caller: the idle words after every stage are
/// skipped, not written. Returns the number of words that make up the
/// waveform, `waveform_len(template.len())`.
///
/// # Panics
///
/// Panics if `out` is shorter than `waveform_len(template.len())`.
pub fn generate(out: &mut [u16], template: &Template<'_>, nozzles: &NozzleData) -> usize {
    let len = template.waveform_len();
    assert!(
        out.len() >= len,
        "waveform needs {len} words, buffer has {}",
        out.len()
    );

    if nozzles.is_empty() {
        let mut pos = 0;
        for _ in 0..STAGES {
            for _ in 0..template.len() {
                out[map_index(pos)] = 0;
                pos += 1;
            }
            pos += IDLE_WORDS;
        }
        return len;
    }

    let mut pos = 0;
    for stage in 0..STAGES {
        let [d1, d2, d3] = nozzles.stage(stage);
        let power = d1 | d2 | d3;
        let f3_enable = power & 0x0f != 0;
        let f5_enable = power & 0xf0 != 0;
        let last_stage = stage == LAST_STAGE;

        let mut toggles = 0;
        let mut bit: u8 = 0;
        for word in template.iter() {
            if word.toggles() != toggles {
                // a full byte wraps back to the first bit
                bit = if bit == 0 { 1 } else { bit << 1 };
                toggles = word.toggles();
            }

            let mut output = OutputWord(word.raw());
            output.set_data(0);
            output.set_csync(false);
            if !f3_enable {
                output.set_f3(false);
            }
            if !f5_enable {
                output.set_f5(false);
            }
            if toggles != 0 {
                output.set_d1(d1 & bit == 0);
                output.set_d2(d2 & bit == 0);
                output.set_d3(d3 & bit == 0);
            }
            if word.csync(last_stage) {
                output.set_csync(true);
            }

            out[map_index(pos)] = output.raw();
            pos += 1;
        }
        pos += IDLE_WORDS;
    }

    debug_assert_eq!(waveform_len(template.len()), (pos + 1) & !1);
    len
}

/// DMA-compatible buffer holding one generated waveform.
///
/// `WORDS` must be at least [`waveform_len`] of every template rendered into
/// it. The whole buffer is handed to DMA; words past [`WaveformBuffer::len`]
/// are zero, i.e. idle.
///
/// # Example
/// ```rust
/// use printspider::encoder::{waveform_len, WaveformBuffer};
/// use printspider::nozzle::{BlackRow, NozzleData};
/// use printspider::template::{Template, TemplateKind};
///
/// const WORDS: usize = waveform_len(27);
///
/// let template = Template::get(TemplateKind::BlackB);
/// let mut nozzles = NozzleData::new();
/// nozzles.set_black(30, BlackRow::First);
///
/// let mut buffer = WaveformBuffer::<WORDS>::new();
/// let len = buffer.render(&template, &nozzles);
/// assert_eq!(buffer.words().len(), len);
/// ```
#[derive(Clone, Copy)]
#[repr(C)]
#[repr(align(4))]
pub struct WaveformBuffer<const WORDS: usize> {
    words: [u16; WORDS],
    len: usize,
}

impl<const WORDS: usize> Default for WaveformBuffer<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const WORDS: usize> WaveformBuffer<WORDS> {
    /// An idle buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [0; WORDS],
            len: 0,
        }
    }

    /// Capacity in words.
    #[must_use]
    pub const fn capacity() -> usize {
        WORDS
    }

    /// `true` if waveforms from `template` fit.
    #[must_use]
    pub const fn fits(template: &Template<'_>) -> bool {
        template.waveform_len() <= WORDS
    }

    /// This returns the size of the DMA buffer in bytes.  Its used to calculate
    /// the number of DMA descriptors needed for `esp-hal`.
    #[cfg(feature = "esp-dma")]
    #[must_use]
    pub const fn dma_buffer_size_bytes() -> usize {
        core::mem::size_of::<[u16; WORDS]>()
    }

    /// Zero every word.
    pub fn clear(&mut self) {
        self.words.fill(0);
        self.len = 0;
    }

    /// Replace the contents with the waveform for `nozzles`.
    ///
    /// # Panics
    ///
    /// Panics if the waveform does not fit, see [`WaveformBuffer::fits`].
    pub fn render(&mut self, template: &Template<'_>, nozzles: &NozzleData) -> usize {
        self.words.fill(0);
        self.len = generate(&mut self.words, template, nozzles);
        self.len
    }

    /// Replace the contents with the idle pattern for `template`: the same
    /// length as a real row, every word zero.
    ///
    /// # Panics
    ///
    /// Panics if the waveform does not fit, see [`WaveformBuffer::fits`].
    pub fn render_idle(&mut self, template: &Template<'_>) -> usize {
        let len = template.waveform_len();
        assert!(len <= WORDS, "waveform needs {len} words, buffer has {WORDS}");
        self.words.fill(0);
        self.len = len;
        len
    }

    /// Words of the last rendered waveform, in bus order.
    #[must_use]
    pub fn words(&self) -> &[u16] {
        &self.words[..self.len]
    }

    /// Word `index` of the last rendered waveform, in generation order.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[must_use]
    pub fn word(&self, index: usize) -> OutputWord {
        assert!(index < self.len, "word {index} past waveform end {}", self.len);
        OutputWord(self.words[map_index(index)])
    }

    /// Length of the last rendered waveform.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// `true` if nothing has been rendered since the last clear.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

unsafe impl<const WORDS: usize> ReadBuffer for WaveformBuffer<WORDS> {
    #[cfg(not(feature = "esp-dma"))]
    type Word = u16;

    #[cfg(not(feature = "esp-dma"))]
    unsafe fn read_buffer(&self) -> (*const u16, usize) {
        (self.words.as_ptr(), WORDS)
    }

    #[cfg(feature = "esp-dma")]
    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        let ptr = self.words.as_ptr().cast::<u8>();
        let len = core::mem::size_of_val(&self.words);
        (ptr, len)
    }
}

unsafe impl<const WORDS: usize> ReadBuffer for &mut WaveformBuffer<WORDS> {
    #[cfg(not(feature = "esp-dma"))]
    type Word = u16;

    #[cfg(not(feature = "esp-dma"))]
    unsafe fn read_buffer(&self) -> (*const u16, usize) {
        (self.words.as_ptr(), WORDS)
    }

    #[cfg(feature = "esp-dma")]
    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        let ptr = self.words.as_ptr().cast::<u8>();
        let len = core::mem::size_of_val(&self.words);
        (ptr, len)
    }
}

impl<const WORDS: usize> core::fmt::Debug for WaveformBuffer<WORDS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WaveformBuffer")
            .field("capacity", &WORDS)
            .field("len", &self.len)
            .field("size", &core::mem::size_of_val(&self.words))
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<const WORDS: usize> defmt::Format for WaveformBuffer<WORDS> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "WaveformBuffer<{}>", WORDS);
        defmt::write!(f, " len: {}", self.len);
        defmt::write!(f, " size: {}", core::mem::size_of_val(&self.words));
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::format;
    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::nozzle::{BlackRow, InkColor};
    use crate::template::TemplateKind;

    const WORDS: usize = waveform_len(27);

    // one data bit per stage, sync on every stage but the last
    const SINGLE_TOGGLE: [u16; 3] = [0x0, 0x8001, 0x0];

    fn render(template: &Template<'_>, nozzles: &NozzleData) -> (Vec<OutputWord>, usize) {
        let mut out = vec![0u16; template.waveform_len()];
        let len = generate(&mut out, template, nozzles);
        let words = (0..out.len())
            .map(|i| OutputWord::new(out[map_index(i)]))
            .collect();
        (words, len)
    }

    // position of word `i` of stage `stage`
    fn at(template: &Template<'_>, stage: usize, i: usize) -> usize {
        stage * (template.len() + IDLE_WORDS) + i
    }

    fn pattern(seed: u32) -> NozzleData {
        let mut state = seed;
        let mut bytes = [0u8; crate::NOZZLE_DATA_SIZE];
        for byte in &mut bytes {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            *byte = (state >> 16) as u8;
        }
        NozzleData::from_bytes(bytes)
    }

    #[test]
    fn test_waveform_len() {
        assert_eq!(waveform_len(27), 490);
        assert_eq!(waveform_len(0), 112);
        assert_eq!(waveform_len(3), 154);
        for len in 0..64 {
            assert_eq!(waveform_len(len) % 2, 0);
            assert!(waveform_len(len) >= STAGES * (len + IDLE_WORDS));
        }
    }

    #[test]
    fn test_output_word_fields() {
        let mut word = OutputWord::default();
        word.set_data(0b111);
        assert!(word.d1() && word.d2() && word.d3());
        word.set_csync(true);
        word.set_dclk(true);
        assert_eq!(word.raw(), 0x10f);
        word.set_d2(false);
        assert_eq!(word.data(), 0b101);
        assert!(OutputWord::new(0xc00).f3());
        assert!(OutputWord::new(0xc00).f5());
    }

    #[test]
    fn test_empty_row_is_all_zero() {
        let nozzles = NozzleData::new();
        for kind in TemplateKind::ALL {
            let template = Template::get(kind);
            let mut out = vec![0xffffu16; template.waveform_len()];
            let len = generate(&mut out, &template, &nozzles);
            assert_eq!(len, template.waveform_len());
            for stage in 0..STAGES {
                for i in 0..template.len() {
                    assert_eq!(out[map_index(at(&template, stage, i))], 0, "{kind:?}");
                }
            }
        }
    }

    #[test]
    fn test_empty_row_on_zeroed_buffer() {
        let nozzles = NozzleData::new();
        for kind in TemplateKind::ALL {
            let template = Template::get(kind);
            let (words, len) = render(&template, &nozzles);
            assert_eq!(len, 490);
            assert!(words[..len].iter().all(|w| w.raw() == 0));
        }
    }

    #[test]
    fn test_length_is_independent_of_data() {
        for kind in TemplateKind::ALL {
            let template = Template::get(kind);
            for seed in 0..16 {
                let (_, len) = render(&template, &pattern(seed));
                assert_eq!(len, template.waveform_len());
            }
        }
    }

    #[test]
    fn test_single_color_nozzle() {
        let template = Template::new(&SINGLE_TOGGLE);
        let mut nozzles = NozzleData::new();
        nozzles.set_color(0, InkColor::Cyan); // byte 8, bit 0
        let (words, _) = render(&template, &nozzles);

        for stage in 0..STAGES {
            let word = words[at(&template, stage, 1)];
            assert_eq!(word.d1(), stage != 8, "stage {stage}");
            assert!(word.d2(), "stage {stage}");
            assert!(word.d3(), "stage {stage}");
            // no toggle, no data
            assert_eq!(words[at(&template, stage, 0)].data(), 0);
            assert_eq!(words[at(&template, stage, 2)].data(), 0);
        }
    }

    #[test]
    fn test_full_color_row() {
        let template = Template::get(TemplateKind::ColorA);
        let mut nozzles = NozzleData::new();
        for p in 0..112 {
            nozzles.set_color(p, InkColor::Cyan);
        }
        let (words, _) = render(&template, &nozzles);

        let mut data_words = 0;
        for stage in 0..STAGES {
            for (i, tw) in template.iter().enumerate() {
                let word = words[at(&template, stage, i)];
                if tw.toggles() != 0 {
                    data_words += 1;
                    assert!(!word.d1(), "stage {stage} word {i}");
                    assert!(word.d2(), "stage {stage} word {i}");
                    assert!(word.d3(), "stage {stage} word {i}");
                } else {
                    assert_eq!(word.data(), 0, "stage {stage} word {i}");
                }
            }
        }
        assert_eq!(data_words, STAGES * 17);
    }

    #[test]
    fn test_bit_order_follows_toggles() {
        // four toggle edges select bits 0..=3
        let words = [0x0, 0x1, 0x2, 0x1, 0x2, 0x0];
        let template = Template::new(&words);
        let mut bytes = [0u8; crate::NOZZLE_DATA_SIZE];
        bytes[0] = 0b0101; // D1 stage 0: bits 0 and 2 fire
        let (out, _) = render(&template, &NozzleData::from_bytes(bytes));

        let d1: Vec<bool> = (1..5).map(|i| out[at(&template, 0, i)].d1()).collect();
        assert_eq!(d1, [false, true, false, true]);
    }

    #[test]
    fn test_bit_selector_resets_every_stage() {
        let words = [0x1, 0x2];
        let template = Template::new(&words);
        let mut bytes = [0u8; crate::NOZZLE_DATA_SIZE];
        bytes[0] = 0b01;
        bytes[1] = 0b01;
        let (out, _) = render(&template, &NozzleData::from_bytes(bytes));
        for stage in 0..2 {
            assert!(!out[at(&template, stage, 0)].d1(), "stage {stage}");
            assert!(out[at(&template, stage, 1)].d1(), "stage {stage}");
        }
    }

    #[test]
    fn test_strobes_pass_through() {
        let template = Template::get(TemplateKind::BlackB);
        let (words, _) = render(&template, &pattern(7));
        let mask = 0x03f0; // S1-S5, DCLK
        for stage in 0..STAGES {
            for (i, tw) in template.iter().enumerate() {
                let word = words[at(&template, stage, i)];
                assert_eq!(word.raw() & mask, tw.raw() & mask);
                assert_eq!(word.raw() & 0xc000, tw.raw() & 0xc000);
            }
        }
    }

    #[test]
    fn test_csync_selection() {
        let template = Template::new(&SINGLE_TOGGLE);
        let (words, _) = render(&template, &pattern(1));
        for stage in 0..STAGES {
            assert_eq!(words[at(&template, stage, 1)].csync(), stage != 13);
            assert!(!words[at(&template, stage, 0)].csync());
        }

        let last_only = [0x0, 0x4001, 0x0];
        let template = Template::new(&last_only);
        let (words, _) = render(&template, &pattern(1));
        for stage in 0..STAGES {
            assert_eq!(words[at(&template, stage, 1)].csync(), stage == 13);
        }
    }

    #[test]
    fn test_power_line_suppression() {
        let template = Template::get(TemplateKind::ColorA);
        let mut bytes = [0u8; crate::NOZZLE_DATA_SIZE];
        bytes[0] = 0xf0; // stage 0: high nibble only
        bytes[14 + 1] = 0x0f; // stage 1: low nibble only
        bytes[28 + 2] = 0x81; // stage 2: both
        let (words, _) = render(&template, &NozzleData::from_bytes(bytes));
        let words = &words;

        let stage_words = |stage: usize| {
            (0..template.len()).map(move |i| (template.word(i), words[at(&template, stage, i)]))
        };
        for (tw, word) in stage_words(0) {
            assert!(!word.f3());
            assert_eq!(word.f5(), tw.f5());
        }
        for (tw, word) in stage_words(1) {
            assert_eq!(word.f3(), tw.f3());
            assert!(!word.f5());
        }
        for (tw, word) in stage_words(2) {
            assert_eq!(word.f3(), tw.f3());
            assert_eq!(word.f5(), tw.f5());
        }
        for stage in 3..STAGES {
            for (_, word) in stage_words(stage) {
                assert!(!word.f3() && !word.f5(), "stage {stage}");
            }
        }
        // the template really drives both lines
        assert!(template.iter().any(|w| w.f3()));
        assert!(template.iter().any(|w| w.f5()));
    }

    #[test]
    fn test_idle_words_untouched() {
        let template = Template::get(TemplateKind::ColorB);
        let mut out = vec![0u16; template.waveform_len()];
        generate(&mut out, &template, &pattern(3));
        for stage in 0..STAGES {
            for i in template.len()..template.len() + IDLE_WORDS {
                assert_eq!(out[map_index(at(&template, stage, i))], 0);
            }
        }
    }

    #[test]
    fn test_black_nozzle_reaches_its_line() {
        let template = Template::new(&SINGLE_TOGGLE);
        let mut nozzles = NozzleData::new();
        // p = 13 -> j = 0, k = 0: group 2, bit 0, byte 13
        nozzles.set_black(13, BlackRow::First);
        let (words, _) = render(&template, &nozzles);
        for stage in 0..STAGES {
            let word = words[at(&template, stage, 1)];
            assert!(word.d1() && word.d2());
            assert_eq!(word.d3(), stage != 13, "stage {stage}");
        }
    }

    #[test]
    #[should_panic]
    fn test_undersized_buffer_panics() {
        let template = Template::get(TemplateKind::ColorA);
        let mut out = [0u16; 100];
        generate(&mut out, &template, &NozzleData::new());
    }

    #[test]
    fn test_buffer_render() {
        let template = Template::get(TemplateKind::ColorB);
        let mut buffer = WaveformBuffer::<WORDS>::new();
        assert!(buffer.is_empty());
        assert!(WaveformBuffer::<WORDS>::fits(&template));
        assert!(!WaveformBuffer::<100>::fits(&template));
        assert_eq!(WaveformBuffer::<WORDS>::capacity(), 490);

        let nozzles = pattern(11);
        let len = buffer.render(&template, &nozzles);
        assert_eq!(len, 490);
        assert_eq!(buffer.len(), 490);

        let (expected, _) = render(&template, &nozzles);
        for (i, word) in expected.iter().enumerate() {
            assert_eq!(buffer.word(i), *word);
        }
    }

    #[test]
    fn test_buffer_render_clears_previous_row() {
        let template = Template::get(TemplateKind::BlackA);
        let mut buffer = WaveformBuffer::<WORDS>::new();
        buffer.render(&template, &pattern(5));
        buffer.render(&template, &NozzleData::new());
        assert!(buffer.words().iter().all(|&w| w == 0));

        buffer.render(&template, &pattern(5));
        buffer.render_idle(&template);
        assert_eq!(buffer.len(), 490);
        assert!(buffer.words().iter().all(|&w| w == 0));

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.words().is_empty());
    }

    #[test]
    fn test_buffer_read_buffer() {
        let buffer = WaveformBuffer::<WORDS>::new();
        let (ptr, len) = unsafe { buffer.read_buffer() };
        assert!(!ptr.is_null());
        #[cfg(not(feature = "esp-dma"))]
        assert_eq!(len, WORDS);
        #[cfg(feature = "esp-dma")]
        assert_eq!(len, WORDS * 2);
        assert_eq!(ptr as usize % 4, 0);
    }

    #[test]
    fn test_buffer_debug() {
        let buffer = WaveformBuffer::<WORDS>::new();
        let debug = format!("{buffer:?}");
        assert!(debug.contains("WaveformBuffer"));
        assert!(debug.contains("capacity: 490"));
        assert!(debug.contains("len: 0"));
    }

    #[cfg(feature = "esp32-ordering")]
    #[test]
    fn test_esp32_ordering_swaps_pairs() {
        let template = Template::new(&SINGLE_TOGGLE);
        let mut out = vec![0u16; template.waveform_len()];
        generate(&mut out, &template, &pattern(2));
        // word 1 of stage 0 carries CSYNC and lands at index 0
        assert!(OutputWord::new(out[0]).csync());
        assert!(!OutputWord::new(out[1]).csync());
    }
}
