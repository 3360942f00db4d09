//! Waveform templates.
//!
//! A template is the image-independent part of the signal sent for one stage
//! of the shift registers: strobes, data clock, power lines and the sync
//! select, one 16-bit [`TemplateWord`] per output clock. The encoder replays
//! the template once per stage and fills in the data lines.
//!
//! Bits 0 and 1 are not sent to the cartridge. They form a toggle pair whose
//! transitions mark where the next data bit starts; while either is set the
//! word carries a data bit.
//!
//! The built-in templates were authored against real cartridges and must stay
//! bit-exact:
//!
//! | kind | cartridge |
//! |---|---|
//! | [`TemplateKind::ColorA`] | older colour cartridges; duplicates lines on newer ones |
//! | [`TemplateKind::ColorB`] | newer colour cartridges |
//! | [`TemplateKind::BlackA`] | older black cartridges |
//! | [`TemplateKind::BlackB`] | newer black cartridges |

use bitfield::bitfield;

use crate::encoder::waveform_len;

bitfield! {
    /// 16-bit word of a waveform template.
    ///
    /// The bit layout is as follows:
    /// - Bit 15: Sync select for every stage but the last
    /// - Bit 14: Sync select for the last stage
    /// - Bit 11: F5 power line
    /// - Bit 10: F3 power line
    /// - Bit 9: Strobe S3
    /// - Bit 8: Data clock
    /// - Bit 7: Strobe S5
    /// - Bit 6: Strobe S1
    /// - Bit 5: Strobe S4
    /// - Bit 4: Strobe S2
    /// - Bits 1-0: Data toggle pair
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct TemplateWord(u16);
    impl Debug;
    pub csync_normal, set_csync_normal: 15;
    pub csync_last, set_csync_last: 14;
    pub f5, set_f5: 11;
    pub f3, set_f3: 10;
    pub s3, set_s3: 9;
    pub dclk, set_dclk: 8;
    pub s5, set_s5: 7;
    pub s1, set_s1: 6;
    pub s4, set_s4: 5;
    pub s2, set_s2: 4;
    pub toggles, set_toggles: 1, 0;
}

impl TemplateWord {
    /// Wrap a raw template word.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw word.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Sync select for the given stage position.
    #[must_use]
    pub fn csync(self, last_stage: bool) -> bool {
        if last_stage {
            self.csync_last()
        } else {
            self.csync_normal()
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TemplateWord {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "TemplateWord({=u16:#06x})", self.0);
    }
}

// Authored with an external waveform editor; regenerate rather than hand-edit.
#[rustfmt::skip]
const COLOR_A: [u16; 27] = [
    0x0,    0xc001, 0xc101, 0xc142, 0x42,   0x4001, 0x4101, 0x4112, 0x12,
    0x4001, 0x4101, 0x4302, 0x602,  0x4401, 0x4501, 0x4522, 0x422,  0x402,
    0x4000, 0x4000, 0x4080, 0x880,  0x800,  0x800,  0x800,  0x800,  0x800,
];

#[rustfmt::skip]
const COLOR_B: [u16; 27] = [
    0x0,    0xc000, 0xc101, 0xc141, 0x42,   0x2,    0x4101, 0x4111, 0x12,
    0x4002, 0x4101, 0x4301, 0x602,  0x4402, 0x4501, 0x4521, 0x422,  0x402,
    0x4000, 0x4000, 0x4080, 0x880,  0x800,  0x800,  0x800,  0x800,  0x800,
];

#[rustfmt::skip]
const BLACK_A: [u16; 27] = [
    0x0,    0xc001, 0xc101, 0xc142, 0x42,  0xc001, 0xc101, 0xc112, 0x12,
    0x4001, 0x4101, 0x4302, 0x602,  0x401, 0x501,  0x522,  0x422,  0x402,
    0x4000, 0x4000, 0x4080, 0x880,  0x800, 0x800,  0x800,  0x800,  0x800,
];

#[rustfmt::skip]
const BLACK_B: [u16; 27] = [
    0x0,    0xc000, 0xc101, 0xc141, 0x42,  0x2,   0xc101, 0xc111, 0x12,
    0x4002, 0x4101, 0x4301, 0x602,  0x402, 0x501, 0x521,  0x422,  0x402,
    0x4002, 0x4000, 0x4080, 0x880,  0x800, 0x800, 0x800,  0x800,  0x800,
];

/// Selects one of the built-in templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TemplateKind {
    /// Older colour cartridges
    ColorA = 0,
    /// Newer colour cartridges
    #[default]
    ColorB = 1,
    /// Older black cartridges
    BlackA = 2,
    /// Newer black cartridges
    BlackB = 3,
}

impl TemplateKind {
    /// Every built-in template kind.
    pub const ALL: [TemplateKind; 4] = [
        TemplateKind::ColorA,
        TemplateKind::ColorB,
        TemplateKind::BlackA,
        TemplateKind::BlackB,
    ];

    /// `true` for templates meant for black cartridges.
    #[must_use]
    pub const fn is_black(self) -> bool {
        matches!(self, TemplateKind::BlackA | TemplateKind::BlackB)
    }

    /// The template for this kind.
    #[must_use]
    pub const fn template(self) -> Template<'static> {
        Template::get(self)
    }
}

/// An immutable waveform template.
///
/// # Example
/// ```rust
/// use printspider::template::{Template, TemplateKind};
///
/// let template = Template::get(TemplateKind::BlackB);
/// assert_eq!(template.len(), 27);
/// assert_eq!(template.waveform_len(), 490);
///
/// // Hand-authored templates work the same way.
/// let custom = Template::new(&[0x0, 0x8101, 0x0]);
/// assert!(custom.word(1).csync_normal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Template<'a> {
    words: &'a [u16],
}

impl<'a> Template<'a> {
    /// Wrap a hand-authored template.
    #[must_use]
    pub const fn new(words: &'a [u16]) -> Self {
        Self { words }
    }

    /// Look up a built-in template.
    #[must_use]
    pub const fn get(kind: TemplateKind) -> Template<'static> {
        let words: &'static [u16] = match kind {
            TemplateKind::ColorA => &COLOR_A,
            TemplateKind::ColorB => &COLOR_B,
            TemplateKind::BlackA => &BLACK_A,
            TemplateKind::BlackB => &BLACK_B,
        };
        Template { words }
    }

    /// Raw template words.
    #[must_use]
    pub const fn words(&self) -> &'a [u16] {
        self.words
    }

    /// Number of words in one stage.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.words.len()
    }

    /// `true` if the template has no words.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word `i` of the template.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    #[must_use]
    pub const fn word(&self, i: usize) -> TemplateWord {
        TemplateWord(self.words[i])
    }

    /// Iterate over the template words.
    pub fn iter(&self) -> impl Iterator<Item = TemplateWord> + 'a {
        let words: &'a [u16] = self.words;
        words.iter().copied().map(TemplateWord)
    }

    /// Number of output words generated from this template.
    #[must_use]
    pub const fn waveform_len(&self) -> usize {
        waveform_len(self.words.len())
    }

    /// Number of data bits each stage shifts out, i.e. toggle edges that
    /// leave the toggle pair non-zero.
    #[must_use]
    pub fn data_bits(&self) -> usize {
        let mut previous = 0;
        let mut bits = 0;
        for word in self.iter() {
            let toggles = word.toggles();
            if toggles != previous && toggles != 0 {
                bits += 1;
            }
            previous = toggles;
        }
        bits
    }
}

impl From<TemplateKind> for Template<'static> {
    fn from(kind: TemplateKind) -> Self {
        Template::get(kind)
    }
}
