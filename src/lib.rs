//! Waveform generation for parallel inkjet cartridges.
//!
//! ## How the Cartridges Work
//!
//! The cartridges are thermal inkjet heads with no intelligence of their own.
//! Every nozzle has a heater resistor; a short current pulse boils a bubble of
//! ink that pushes a droplet out. Which heaters get that pulse is decided by
//! three shift registers inside the head, loaded over a handful of parallel
//! lines.
//!
//! ### Signal names
//! - **D1 D2 D3** – Serial nozzle data, one shift register each. Active LOW:
//!   a nozzle fires when its bit is clocked in as 0
//! - **DCLK** – Data clock; every edge shifts one bit into all three registers
//! - **CSYNC** – Marks the stage boundary so the head can tell the last stage
//!   of a row from the others
//! - **S1 … S5** – Address strobes selecting which group of heaters is pulsed
//! - **F3 / F5** – Heater power for the low and high halves of a stage
//!
//! ### Row workflow
//! 1. A row is 14 *stages*. Each stage replays a short timing *template* that
//!    toggles DCLK and the strobes in a fixed pattern.
//! 2. During a stage, eight data bits are shifted into each register, one per
//!    change of the template's toggle pair.
//! 3. The strobes and F3/F5 then pulse the selected heaters. F3 and F5 are
//!    left low when nothing in their half of the stage fires.
//! 4. Eight idle (all zero) words follow each stage before the next one starts.
//!
//! ### Implications for drivers
//! - A row is a stream of [`STAGES`] × (template + [`IDLE_WORDS`]) 16-bit words
//!   that must leave the MCU at a steady rate. Microcontrollers use I²S or
//!   LCD-style parallel peripherals fed by DMA.
//! - The peripheral never pauses. When no row is ready the filler streams the
//!   idle pattern, which keeps every heater off.
//!
//! ## Pipeline
//!
//! 1. [`nozzle::NozzleData`] – set nozzles by position and ink; also an
//!    `embedded-graphics` canvas for drawing a row.
//! 2. [`queue::FiringQueue`] – one-slot hand-off from the producer to the
//!    output path.
//! 3. [`filler::BufferFiller`] – non-blocking DMA buffer callback; encodes the
//!    pending row with [`encoder::generate`] or writes idle.
//! 4. [`bus::Printhead`] – the synchronous alternative, clocking a
//!    [`encoder::WaveformBuffer`] out through any [`bus::WordSink`].
//!
//! The waveform shape comes from [`template::Template`]; four tuned templates
//! for colour and black cartridges are built in.
//!
//! ## Available Feature Flags
//!
//! ### `esp-dma` Feature (required when using `esp-hal`)
//! Switches the `ReadBuffer` implementation of [`encoder::WaveformBuffer`]
//! from `embedded-dma` to `esp-hal::dma`.
//!
//! ```toml
//! [dependencies]
//! printspider = { version = "0.1.0", features = ["esp-dma"] }
//! ```
//!
//! ### `esp32-ordering` Feature (required for original ESP32 only)
//! Stores every pair of output words swapped to match the original ESP32's I²S
//! peripheral in 16-bit mode. ESP32-S3, C6 and other variants do **not** need
//! this feature.
//!
//! ### `esp32`, `esp32s3`, `esp32c6` Features
//! Select the `esp-hal` chip and enable `esp-dma`. `esp32` also enables
//! `esp32-ordering`.
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types and logs from the buffer
//! filler.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod bus;
pub mod encoder;
pub mod filler;
pub mod nozzle;
pub mod queue;
pub mod template;

pub use bus::{GpioBus, PrintError, Printhead, WordSink};
pub use encoder::{generate, waveform_len, WaveformBuffer};
pub use filler::{BufferFiller, Fill};
pub use nozzle::{BlackRow, InkColor, NozzleData};
pub use queue::FiringQueue;
pub use template::{Template, TemplateKind};

/// Stages in one row; each shifts one byte into every data line.
pub const STAGES: usize = 14;

/// Bytes of nozzle data per row: one byte per stage for each of the three
/// data lines.
pub const NOZZLE_DATA_SIZE: usize = 42;

/// Zero words appended after every stage.
pub const IDLE_WORDS: usize = 8;
