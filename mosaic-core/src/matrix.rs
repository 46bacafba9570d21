//! Symbol matrices: the 2D world patterns and scenes live in.
//!
//! A matrix is a rectangular grid of single-character symbols where `' '`
//! marks the absence of a pixel. The text format (consumed at the
//! boundary, never produced by the engines) is: first line = concept or
//! scene name, remaining lines = rows, width = longest line, ragged lines
//! padded with blanks.

use crate::grid::Coord;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The blank symbol.
pub const BLANK: char = ' ';

/// A 2D matrix of discrete symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMatrix {
    cells: Vec<Vec<char>>,
}

impl SymbolMatrix {
    /// Create an empty (all-blank) matrix.
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            cells: vec![vec![BLANK; cols]; rows],
        }
    }

    /// Build from rows of characters. Ragged rows are padded with blanks.
    pub fn from_rows(rows: Vec<Vec<char>>) -> Self {
        let cols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let cells = rows
            .into_iter()
            .map(|mut r| {
                r.resize(cols, BLANK);
                r
            })
            .collect();
        Self { cells }
    }

    /// Build from string rows (test convenience).
    pub fn from_lines(lines: &[&str]) -> Self {
        Self::from_rows(lines.iter().map(|l| l.chars().collect()).collect())
    }

    /// Parse the named text format: first line is the concept/scene name.
    pub fn parse_named(text: &str) -> (String, SymbolMatrix) {
        let mut lines = text.lines().map(|l| l.trim_end_matches(['\r']));
        let name = lines.next().unwrap_or("").trim().to_string();
        let rows: Vec<Vec<char>> = lines.map(|l| l.chars().collect()).collect();
        (name, Self::from_rows(rows))
    }

    /// Create a random matrix populated with `symbol` at `density`.
    pub fn random<R: Rng>(rows: usize, cols: usize, density: f64, symbol: char, rng: &mut R) -> Self {
        let mut mat = Self::empty(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                if rng.gen::<f64>() < density {
                    mat.cells[i][j] = symbol;
                }
            }
        }
        mat
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cells.first().map_or(0, |r| r.len())
    }

    /// Symbol at `coord`, or `None` off-grid.
    pub fn get(&self, coord: Coord) -> Option<char> {
        if coord.row < 0 || coord.col < 0 {
            return None;
        }
        self.cells
            .get(coord.row as usize)
            .and_then(|r| r.get(coord.col as usize))
            .copied()
    }

    /// Whether `coord` is on the grid.
    pub fn contains(&self, coord: Coord) -> bool {
        self.get(coord).is_some()
    }

    /// Whether `coord` is off-grid or blank.
    pub fn is_blank(&self, coord: Coord) -> bool {
        self.get(coord).map_or(true, |c| c == BLANK)
    }

    pub fn set(&mut self, coord: Coord, symbol: char) {
        if coord.row >= 0 && coord.col >= 0 {
            if let Some(cell) = self
                .cells
                .get_mut(coord.row as usize)
                .and_then(|r| r.get_mut(coord.col as usize))
            {
                *cell = symbol;
            }
        }
    }

    /// First non-blank coordinate in read order, if any.
    pub fn first_non_blank(&self) -> Option<Coord> {
        self.non_blank().into_iter().next()
    }

    /// All non-blank coordinates in read order.
    pub fn non_blank(&self) -> Vec<Coord> {
        let mut coords = Vec::new();
        for (i, row) in self.cells.iter().enumerate() {
            for (j, &c) in row.iter().enumerate() {
                if c != BLANK {
                    coords.push(Coord::new(i as i32, j as i32));
                }
            }
        }
        coords
    }

    /// Coverage predicate: does `fields` include every non-blank cell?
    pub fn covered_by(&self, fields: &BTreeSet<Coord>) -> bool {
        self.non_blank().iter().all(|c| fields.contains(c))
    }

    /// Row-major text rendering with newline separators (the encoding used
    /// for pattern attributes at the persistence boundary).
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for row in &self.cells {
            out.extend(row.iter());
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for SymbolMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}
