//! Blinking liveness indicator on the banner row.

use std::time::Duration;

use crate::{clock::Sleeper, display::CharDisplay, render::BANNER_ROW, Result};

pub const BLANK_PAUSE: Duration = Duration::from_millis(100);
pub const GLYPH_PAUSE: Duration = Duration::from_millis(900);

/// Cell and glyph that blink; a pure function of the alarm flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatStyle {
    pub col: u8,
    pub glyph: char,
}

impl HeartbeatStyle {
    pub const ALARM: Self = Self { col: 12, glyph: '!' };
    pub const NORMAL: Self = Self { col: 14, glyph: ':' };

    pub fn for_alarm(in_alarm: bool) -> Self {
        if in_alarm {
            Self::ALARM
        } else {
            Self::NORMAL
        }
    }
}

/// Blink for `seconds` seconds.
///
/// Write errors do not cut the wait short; the last one is returned once
/// the full duration has elapsed.
pub fn beat<D, S>(display: &mut D, sleeper: &mut S, seconds: u32, in_alarm: bool) -> Result<()>
where
    D: CharDisplay + ?Sized,
    S: Sleeper + ?Sized,
{
    let style = HeartbeatStyle::for_alarm(in_alarm);
    let mut buf = [0u8; 4];
    let glyph: &str = style.glyph.encode_utf8(&mut buf);
    let mut last_err = None;
    for _ in 0..seconds {
        if let Err(err) = display.write_at(BANNER_ROW, style.col, " ") {
            last_err = Some(err);
        }
        sleeper.sleep(BLANK_PAUSE);
        if let Err(err) = display.write_at(BANNER_ROW, style.col, glyph) {
            last_err = Some(err);
        }
        sleeper.sleep(GLYPH_PAUSE);
    }
    last_err.map_or(Ok(()), Err)
}
