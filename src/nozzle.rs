//! Nozzle addressing for colour and black cartridges.
//!
//! Both cartridge families are driven through the same three shift-register
//! data lines (D1, D2, D3). Each line is 14 stages of 8 bits, so one row of
//! nozzle data is always [`NOZZLE_DATA_SIZE`] bytes: bytes `0..14` feed D1,
//! `14..28` feed D2 and `28..42` feed D3. Only the meaning of a bit differs
//! between the two families:
//!
//! - **Colour** cartridges have one nozzle row per ink. Each ink owns one data
//!   line, and the nozzles of a row are scattered over its 14 bytes in a fixed
//!   wiring order (the three orders are rotations of each other).
//! - **Black** cartridges have two rows offset by half a nozzle pitch. Their
//!   336 theoretical positions are interleaved over all three lines. The first
//!   and last [`BLACK_DEAD_NOZZLES`] of each row are not connected.
//!
//! Addressing outside a row is silently ignored, so callers can map image
//! coordinates straight onto nozzles without clipping first.
//!
//! # Example
//! ```rust
//! use printspider::nozzle::{BlackRow, InkColor, NozzleData};
//!
//! let mut row = NozzleData::new();
//! row.set_color(0, InkColor::Cyan);
//! row.set_black(10, BlackRow::Second);
//! row.set_color(-1, InkColor::Cyan); // ignored
//! assert_eq!(row.fired_count(), 2);
//! ```

use core::convert::Infallible;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{OriginDimensions, Point, Size};
use embedded_graphics::Pixel;

use crate::{NOZZLE_DATA_SIZE, STAGES};

/// Number of data lines (one shift register each).
pub const DATA_LINES: usize = 3;

/// Number of addressable nozzles per colour row.
pub const COLOR_ROW_SLOTS: usize = STAGES * 8;

/// Nozzles per colour row that actually sit on the printed swath.
pub const COLOR_NOZZLES_IN_ROW: usize = 84;

/// The first usable colour nozzle; lower indices are above the swath.
pub const COLOR_VERTICAL_OFFSET: i32 = 14;

/// Distance, in image rows, between two neighbouring ink rows of a colour
/// cartridge.
pub const COLOR_ROW_OFFSET: i32 = 16;

/// Nozzles per black row, including the dead ones.
pub const BLACK_NOZZLES_IN_ROW: usize = 168;

/// Distance, in image rows, between the two rows of a black cartridge.
pub const BLACK_ROW_OFFSET: i32 = 10;

/// Unconnected nozzles at each end of a black row.
pub const BLACK_DEAD_NOZZLES: usize = 2;

// Byte of each colour group that receives nozzle `p`, indexed by `p % 14`.
const COLOR_BYTE_ORDER: [[u8; STAGES]; DATA_LINES] = [
    [8, 13, 4, 9, 0, 5, 10, 1, 6, 11, 2, 7, 12, 3],
    [11, 2, 7, 12, 3, 8, 13, 4, 9, 0, 5, 10, 1, 6],
    [0, 5, 10, 1, 6, 11, 2, 7, 12, 3, 8, 13, 4, 9],
];

// Byte within a group for black nozzles, indexed by wiring order and then by
// `13 - p % 14`.
const BLACK_BYTE_ORDER: [[u8; STAGES]; 2] = [
    [4, 12, 10, 2, 8, 0, 6, 13, 7, 1, 9, 3, 11, 5],
    [13, 7, 1, 9, 3, 11, 5, 4, 12, 10, 2, 8, 0, 6],
];

/// Where a block of 14 black nozzles lands: data group, bit and wiring order.
#[derive(Clone, Copy)]
struct BlackNozzleInfo {
    group: u8,
    bit: u8,
    order: u8,
}

const fn info(group: u8, bit: u8, order: u8) -> BlackNozzleInfo {
    BlackNozzleInfo { group, bit, order }
}

#[rustfmt::skip]
const BLACK_NOZZLE_INFO: [BlackNozzleInfo; 2 * BLACK_NOZZLES_IN_ROW / STAGES] = [
    info(2, 0, 1), info(2, 1, 1), info(1, 0, 1), info(1, 1, 1), info(0, 0, 1), info(0, 1, 1),
    info(2, 4, 1), info(2, 5, 1), info(1, 4, 1), info(1, 5, 1), info(0, 4, 1), info(0, 5, 1),
    info(2, 2, 0), info(2, 3, 0), info(1, 2, 0), info(1, 3, 0), info(0, 2, 0), info(0, 3, 0),
    info(2, 6, 0), info(2, 7, 0), info(1, 6, 0), info(1, 7, 0), info(0, 6, 0), info(0, 7, 0),
];

/// Ink of a colour cartridge row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InkColor {
    /// Cyan, addressed through D1
    Cyan = 0,
    /// Magenta, addressed through D2
    Magenta = 1,
    /// Yellow, addressed through D3
    Yellow = 2,
}

impl InkColor {
    /// All inks in data line order.
    pub const ALL: [InkColor; 3] = [InkColor::Cyan, InkColor::Magenta, InkColor::Yellow];

    /// Map a data group index to its ink.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(InkColor::Cyan),
            1 => Some(InkColor::Magenta),
            2 => Some(InkColor::Yellow),
            _ => None,
        }
    }

    /// Image column printed by this ink while the cartridge is at `pos`.
    ///
    /// The ink rows sit [`COLOR_ROW_OFFSET`] columns apart, so magenta and
    /// yellow trail cyan.
    #[must_use]
    pub const fn image_column(self, pos: i32) -> i32 {
        pos - self as i32 * COLOR_ROW_OFFSET
    }
}

/// Physical row of a black cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlackRow {
    /// Leading row
    First = 0,
    /// Trailing row, offset by half a nozzle pitch
    Second = 1,
}

impl BlackRow {
    /// Map a row index to its row.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(BlackRow::First),
            1 => Some(BlackRow::Second),
            _ => None,
        }
    }

    /// Image column printed by this row while the cartridge is at `pos`.
    #[must_use]
    pub const fn image_column(self, pos: i32) -> i32 {
        pos + self as i32 * BLACK_ROW_OFFSET
    }
}

/// One of the three shift-register data lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataLine {
    /// First data line (bytes `0..14`)
    D1 = 0,
    /// Second data line (bytes `14..28`)
    D2 = 1,
    /// Third data line (bytes `28..42`)
    D3 = 2,
}

/// Fire bits for one printed row.
///
/// A set bit means "fire this nozzle". The buffer starts cleared; call
/// [`NozzleData::clear`] before reusing it for the next row.
///
/// The layout is the wire layout: one 14-byte group per data line, stage `j`
/// of every line at index `j` of its group.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NozzleData([[u8; STAGES]; DATA_LINES]);

impl Default for NozzleData {
    fn default() -> Self {
        Self::new()
    }
}

impl NozzleData {
    /// A cleared row: no nozzle fires.
    #[must_use]
    pub const fn new() -> Self {
        Self([[0; STAGES]; DATA_LINES])
    }

    /// Build a row from raw bytes in data line order, e.g. produced by another
    /// addresser.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; NOZZLE_DATA_SIZE]) -> Self {
        let mut lines = [[0; STAGES]; DATA_LINES];
        let mut i = 0;
        while i < NOZZLE_DATA_SIZE {
            lines[i / STAGES][i % STAGES] = bytes[i];
            i += 1;
        }
        Self(lines)
    }

    /// Raw bytes in data line order.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_flattened()
    }

    /// Stop every nozzle from firing.
    pub fn clear(&mut self) {
        self.0 = [[0; STAGES]; DATA_LINES];
    }

    /// `true` if no nozzle fires.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }

    /// Number of nozzles that fire.
    #[must_use]
    pub fn fired_count(&self) -> u32 {
        self.as_bytes().iter().map(|b| b.count_ones()).sum()
    }

    /// The 14 stage bytes of one data line.
    #[must_use]
    pub const fn line(&self, line: DataLine) -> &[u8; STAGES] {
        &self.0[line as usize]
    }

    /// The byte each data line shifts out at `stage`.
    ///
    /// # Panics
    ///
    /// Panics if `stage >= STAGES`.
    #[must_use]
    pub const fn stage(&self, stage: usize) -> [u8; DATA_LINES] {
        [self.0[0][stage], self.0[1][stage], self.0[2][stage]]
    }

    /// Fire colour nozzle `p` (counted from the top) of the row for `color`.
    ///
    /// Indices outside `0..=112` are ignored. Index 112 passes the range check
    /// but selects a ninth bit that does not exist, so it also sets nothing.
    pub fn set_color(&mut self, p: i32, color: InkColor) {
        if p < 0 || p > COLOR_ROW_SLOTS as i32 {
            return;
        }
        let p = p as usize;
        let group = color as usize;
        let byte = usize::from(COLOR_BYTE_ORDER[group][p % STAGES]);
        if let Some(mask) = 1u8.checked_shl((p / STAGES) as u32) {
            self.0[group][byte] |= mask;
        }
    }

    /// Fire black nozzle `p` (counted from the top) of `row`.
    ///
    /// Indices outside `0..168` are ignored. The dead nozzles at both ends of
    /// a row still have bit cells; setting them is harmless.
    pub fn set_black(&mut self, p: i32, row: BlackRow) {
        if p < 0 || p >= BLACK_NOZZLES_IN_ROW as i32 {
            return;
        }
        let p = p as usize + row as usize * BLACK_NOZZLES_IN_ROW;
        let info = BLACK_NOZZLE_INFO[p / STAGES];
        let k = STAGES - 1 - p % STAGES;
        let byte = usize::from(BLACK_BYTE_ORDER[usize::from(info.order)][k]);
        self.0[usize::from(info.group)][byte] |= 1 << info.bit;
    }

    /// Drawing surface addressing the colour rows: `x` is the ink
    /// (0 = cyan, 1 = magenta, 2 = yellow), `y` the image row on the swath.
    /// Canvas row `y` fires nozzle `y + COLOR_VERTICAL_OFFSET`.
    pub fn color_canvas(&mut self) -> ColorCanvas<'_> {
        ColorCanvas { nozzles: self }
    }

    /// Drawing surface addressing the black rows: `x` is the row, `y` the
    /// nozzle index.
    pub fn black_canvas(&mut self) -> BlackCanvas<'_> {
        BlackCanvas { nozzles: self }
    }
}

impl core::fmt::Debug for NozzleData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NozzleData")
            .field("d1", &self.0[0])
            .field("d2", &self.0[1])
            .field("d3", &self.0[2])
            .field("fired", &self.fired_count())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for NozzleData {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "NozzleData {{ lines: {:02x}, fired: {} }}",
            self.0,
            self.fired_count()
        );
    }
}

impl From<[u8; NOZZLE_DATA_SIZE]> for NozzleData {
    fn from(bytes: [u8; NOZZLE_DATA_SIZE]) -> Self {
        Self::from_bytes(bytes)
    }
}

/// The printed swath of the colour rows seen as a 3 × 84 monochrome canvas.
///
/// Drawing [`BinaryColor::On`] fires the nozzle; `Off` leaves it untouched,
/// so draw into a cleared row. Nozzles above and below the swath cannot be
/// reached from here; use [`NozzleData::set_color`] for those.
#[derive(Debug)]
pub struct ColorCanvas<'a> {
    nozzles: &'a mut NozzleData,
}

impl OriginDimensions for ColorCanvas<'_> {
    fn size(&self) -> Size {
        Size::new(DATA_LINES as u32, COLOR_NOZZLES_IN_ROW as u32)
    }
}

impl embedded_graphics::draw_target::DrawTarget for ColorCanvas<'_> {
    type Color = BinaryColor;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if color.is_off() || x < 0 || y < 0 || y >= COLOR_NOZZLES_IN_ROW as i32 {
                continue;
            }
            if let Some(ink) = InkColor::from_index(x as usize) {
                self.nozzles.set_color(y + COLOR_VERTICAL_OFFSET, ink);
            }
        }
        Ok(())
    }
}

/// Black nozzle rows seen as a 2 × 168 monochrome canvas.
///
/// Drawing [`BinaryColor::On`] fires the nozzle; `Off` leaves it untouched.
#[derive(Debug)]
pub struct BlackCanvas<'a> {
    nozzles: &'a mut NozzleData,
}

impl OriginDimensions for BlackCanvas<'_> {
    fn size(&self) -> Size {
        Size::new(2, BLACK_NOZZLES_IN_ROW as u32)
    }
}

impl embedded_graphics::draw_target::DrawTarget for BlackCanvas<'_> {
    type Color = BinaryColor;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if color.is_off() || x < 0 {
                continue;
            }
            if let Some(row) = BlackRow::from_index(x as usize) {
                self.nozzles.set_black(y, row);
            }
        }
        Ok(())
    }
}
