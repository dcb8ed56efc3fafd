/*
 *  matrix/command.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Wire encoding for LED matrix module commands
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

//! Frame format:
//! - MAGIC (2 bytes): 0x32 0xAC
//! - OPCODE (1 byte): command identifier
//! - PARAMS (0..n bytes): command specific, fixed per opcode
//!
//! There is no length field and no checksum, the module knows how many
//! parameter bytes each opcode takes.

/// Frame preamble
pub const MAGIC: [u8; 2] = [0x32, 0xAC];

/// Size of the preamble plus opcode
pub const HEADER_LEN: usize = MAGIC.len() + 1;

/// Payload of a full bitmap draw, one bit per LED (9x34 = 306 bits)
pub const BITMAP_LEN: usize = 39;

/// Pixels per column when staging greyscale columns
pub const COLUMN_LEN: usize = 34;

/// Bytes in a version reply
pub const VERSION_RESPONSE_LEN: usize = 3;

/// Command identifiers understood by the matrix firmware
pub mod opcode {
    pub const BRIGHTNESS: u8 = 0x00;
    pub const PATTERN: u8 = 0x01;
    pub const ANIMATE: u8 = 0x04;
    pub const DRAW_BITMAP: u8 = 0x06;
    pub const STAGE_COLUMN: u8 = 0x07;
    pub const FLUSH_COLUMNS: u8 = 0x08;
    pub const VERSION: u8 = 0x20;
}

/// Built-in patterns selectable with the pattern opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Pattern {
    /// Fill the matrix bottom-up to a percentage
    Percentage = 0x00,
    Gradient = 0x01,
    ZigZag = 0x04,
    FullBright = 0x05,
}

/// A single command, encoded on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    opcode: u8,
    params: Vec<u8>,
}

impl Command {
    pub fn new(opcode: u8, params: &[u8]) -> Self {
        Self { opcode, params: params.to_vec() }
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn params(&self) -> &[u8] {
        &self.params
    }

    /// Wire bytes for this command
    pub fn encode(&self) -> Vec<u8> {
        encode(self.opcode, &self.params)
    }

    /// Global brightness, 0 is dark and 255 is full
    pub fn brightness(level: u8) -> Self {
        Self::new(opcode::BRIGHTNESS, &[level])
    }

    /// Select a built-in pattern with no argument
    pub fn pattern(pattern: Pattern) -> Self {
        Self::new(opcode::PATTERN, &[pattern as u8])
    }

    /// Select a built-in pattern that takes a numeric argument
    pub fn pattern_with(pattern: Pattern, value: u8) -> Self {
        Self::new(opcode::PATTERN, &[pattern as u8, value])
    }

    /// Percentage bar, the caller keeps `percent` within 0..=100
    pub fn percentage(percent: u8) -> Self {
        Self::pattern_with(Pattern::Percentage, percent)
    }

    pub fn animate(enabled: bool) -> Self {
        Self::new(opcode::ANIMATE, &[enabled as u8])
    }

    pub fn draw_bitmap(bitmap: &[u8; BITMAP_LEN]) -> Self {
        Self::new(opcode::DRAW_BITMAP, bitmap)
    }

    pub fn stage_column(column: u8, pixels: &[u8; COLUMN_LEN]) -> Self {
        let mut params = Vec::with_capacity(1 + COLUMN_LEN);
        params.push(column);
        params.extend_from_slice(pixels);
        Self { opcode: opcode::STAGE_COLUMN, params }
    }

    /// Latch all staged columns onto the matrix
    pub fn flush_columns() -> Self {
        Self::new(opcode::FLUSH_COLUMNS, &[])
    }

    pub fn version() -> Self {
        Self::new(opcode::VERSION, &[])
    }
}

/// Encode an opcode and its parameters into a frame.
///
/// No validation is done here, any byte is legal in any position.
pub fn encode(opcode: u8, params: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + params.len());
    frame.extend_from_slice(&MAGIC);
    frame.push(opcode);
    frame.extend_from_slice(params);
    frame
}
