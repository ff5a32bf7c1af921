//! Character-display capability and the fixed-width line writer.

use std::sync::{Arc, Mutex, PoisonError};

use crate::{Error, Result};

pub mod lcd;
pub mod memory;

pub use lcd::Lcd;
pub use memory::MemoryDisplay;

pub const COLS: usize = 20;
pub const ROWS: usize = 4;

/// A text grid addressed by (row, column), both zero-based.
pub trait CharDisplay {
    fn clear(&mut self) -> Result<()>;

    /// Write `text` starting at `(row, col)` without touching other cells.
    fn write_at(&mut self, row: u8, col: u8, text: &str) -> Result<()>;

    /// Release the hardware; the screen contents stay as they are.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Current screen contents, when the backend can report them.
    fn snapshot(&self) -> Option<Vec<String>> {
        None
    }
}

/// Pad `text` to a full display row.
///
/// Shorter than `COLS - 1` is centered, `COLS - 1` gets a trailing space,
/// `COLS` passes through and anything longer is rejected.
pub fn fit_line(text: &str) -> Result<String> {
    let len = text.chars().count();
    if len < COLS - 1 {
        Ok(format!("{text:^width$}", width = COLS))
    } else if len == COLS - 1 {
        Ok(format!("{text} "))
    } else if len == COLS {
        Ok(text.to_string())
    } else {
        Err(Error::LineTooLong { len, max: COLS })
    }
}

/// Write a full row, optionally clearing the screen first.
pub fn write_line<D: CharDisplay + ?Sized>(
    display: &mut D,
    row: u8,
    text: &str,
    clear: bool,
) -> Result<()> {
    let line = fit_line(text)?;
    if clear {
        display.clear()?;
    }
    display.write_at(row, 0, &line)
}

/// Cloneable handle so the signal handler can reach the poll loop's display.
///
/// The lock is held for one call at a time, so writes never interleave.
pub struct SharedDisplay<D> {
    inner: Arc<Mutex<D>>,
}

impl<D> Clone for SharedDisplay<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D> SharedDisplay<D> {
    pub fn new(display: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(display)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}

impl<D: CharDisplay> CharDisplay for SharedDisplay<D> {
    fn clear(&mut self) -> Result<()> {
        self.with(|d| d.clear())
    }

    fn write_at(&mut self, row: u8, col: u8, text: &str) -> Result<()> {
        self.with(|d| d.write_at(row, col, text))
    }

    fn close(&mut self) -> Result<()> {
        self.with(|d| d.close())
    }

    fn snapshot(&self) -> Option<Vec<String>> {
        self.with(|d| d.snapshot())
    }
}

pub(crate) fn check_bounds(row: u8, col: u8) -> Result<()> {
    if row as usize >= ROWS || col as usize >= COLS {
        return Err(Error::InvalidArgs(format!(
            "position ({row}, {col}) out of bounds for a {COLS}x{ROWS} display"
        )));
    }
    Ok(())
}
