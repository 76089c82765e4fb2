//! tag36h11 pattern store
//!
//! Every tag is a 10x10 grid of cells:
//! - Outer WHITE ring: index 0 and 9
//! - Inner BLACK ring: index 1 and 8
//! - Data area: 6x6 bits (indices 2-7)
//!
//! The grids are built once from the official codewords and never change.

use std::fmt;
use std::sync::LazyLock;

use crate::codes::{TAG36H11_CODES, TAG_COUNT};
use crate::error::{Result, TagError};

/// Cells along one side of a tag pattern, white ring included
pub const PATTERN_CELLS: usize = 10;

/// Cells along one side of the data area
const DATA_CELLS: usize = 6;

/// Official tag36h11 bit position mapping from the reference C implementation.
/// Maps bit index to (x, y) coordinates in the 6x6 data region (1-based).
pub const BIT_X: [u32; 36] = [
    1, 2, 3, 4, 5, 2, 3, 4, 3, 6,  // bits 0-9
    6, 6, 6, 6, 5, 5, 5, 4, 6, 5,  // bits 10-19
    4, 3, 2, 5, 4, 3, 4, 1, 1, 1,  // bits 20-29
    1, 1, 2, 2, 2, 3,              // bits 30-35
];

pub const BIT_Y: [u32; 36] = [
    1, 1, 1, 1, 1, 2, 2, 2, 3, 1,  // bits 0-9
    2, 3, 4, 5, 2, 3, 4, 3, 6, 6,  // bits 10-19
    6, 6, 6, 5, 5, 5, 4, 6, 5, 4,  // bits 20-29
    3, 2, 5, 4, 3, 4,              // bits 30-35
];

/// One tag's 10x10 cell grid. `true` means the cell renders black.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPattern {
    id: u32,
    cells: [[bool; PATTERN_CELLS]; PATTERN_CELLS],
}

impl TagPattern {
    fn from_codeword(id: u32, codeword: u64) -> Self {
        let mut cells = [[false; PATTERN_CELLS]; PATTERN_CELLS];

        // Inner black ring
        for i in 1..PATTERN_CELLS - 1 {
            cells[1][i] = true;
            cells[PATTERN_CELLS - 2][i] = true;
            cells[i][1] = true;
            cells[i][PATTERN_CELLS - 2] = true;
        }

        // Data area. Bit index 0 is codeword bit 35, and a set bit is WHITE,
        // matching apriltag_to_image() in the reference implementation.
        let nbits = DATA_CELLS * DATA_CELLS;
        for i in 0..nbits {
            let white = (codeword >> (nbits - 1 - i)) & 1 == 1;
            let row = BIT_Y[i] as usize + 1;
            let col = BIT_X[i] as usize + 1;
            cells[row][col] = !white;
        }

        Self { id, cells }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Whether the cell at `(row, col)` is black. Row 0 is the top row.
    ///
    /// Panics if either index is 10 or more.
    pub fn is_black(&self, row: usize, col: usize) -> bool {
        self.cells[row][col]
    }

    pub fn rows(&self) -> &[[bool; PATTERN_CELLS]; PATTERN_CELLS] {
        &self.cells
    }

    /// Black cells as `(row, col)` pairs, row-major
    pub fn black_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|&(_, &black)| black)
                .map(move |(c, _)| (r, c))
        })
    }
}

impl fmt::Display for TagPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            for &black in row {
                write!(f, "{}", if black { '#' } else { '.' })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

static PATTERNS: LazyLock<Vec<TagPattern>> = LazyLock::new(|| {
    TAG36H11_CODES
        .iter()
        .enumerate()
        .map(|(id, &code)| TagPattern::from_codeword(id as u32, code))
        .collect()
});

/// Highest valid tag id
pub const MAX_TAG_ID: u32 = TAG_COUNT as u32 - 1;

/// Look up the pattern for a tag id
pub fn lookup(tag_id: u32) -> Result<&'static TagPattern> {
    PATTERNS
        .get(tag_id as usize)
        .ok_or(TagError::UnknownTagId { id: tag_id, max: MAX_TAG_ID })
}

/// Raw 36-bit codeword for a tag id
pub fn codeword(tag_id: u32) -> Result<u64> {
    TAG36H11_CODES
        .get(tag_id as usize)
        .copied()
        .ok_or(TagError::UnknownTagId { id: tag_id, max: MAX_TAG_ID })
}
