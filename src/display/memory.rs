use std::collections::VecDeque;

use super::{check_bounds, CharDisplay, COLS, ROWS};
use crate::Result;

const HISTORY_LIMIT: usize = 512;

/// One positioned write, as seen by the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub row: u8,
    pub col: u8,
    pub text: String,
}

/// In-memory 20x4 grid used for headless runs and tests.
#[derive(Debug, Clone)]
pub struct MemoryDisplay {
    cells: [[char; COLS]; ROWS],
    writes: VecDeque<WriteRecord>,
    clears: usize,
    closed: bool,
}

impl Default for MemoryDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self {
            cells: [[' '; COLS]; ROWS],
            writes: VecDeque::new(),
            clears: 0,
            closed: false,
        }
    }

    pub fn line(&self, row: usize) -> String {
        self.cells
            .get(row)
            .map(|cells| cells.iter().collect())
            .unwrap_or_default()
    }

    pub fn lines(&self) -> Vec<String> {
        (0..ROWS).map(|row| self.line(row)).collect()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<char> {
        self.cells.get(row).and_then(|cells| cells.get(col)).copied()
    }

    /// Most recent writes, oldest first (bounded).
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.iter().cloned().collect()
    }

    pub fn clear_count(&self) -> usize {
        self.clears
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl CharDisplay for MemoryDisplay {
    fn clear(&mut self) -> Result<()> {
        self.cells = [[' '; COLS]; ROWS];
        self.clears += 1;
        Ok(())
    }

    fn write_at(&mut self, row: u8, col: u8, text: &str) -> Result<()> {
        check_bounds(row, col)?;
        let cells = &mut self.cells[row as usize];
        for (slot, ch) in cells[col as usize..].iter_mut().zip(text.chars()) {
            *slot = ch;
        }
        if self.writes.len() == HISTORY_LIMIT {
            self.writes.pop_front();
        }
        self.writes.push_back(WriteRecord {
            row,
            col,
            text: text.to_string(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn snapshot(&self) -> Option<Vec<String>> {
        Some(self.lines())
    }
}
