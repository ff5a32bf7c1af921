//! Maps a telemetry snapshot onto the four display rows.
//!
//! Each operation touches only its own row so the others keep their content
//! between polls.

use std::fmt;

use chrono::NaiveDateTime;

use crate::{
    config::DisplayConfig,
    display::{write_line, CharDisplay},
    telemetry::{Reading, TelemetrySnapshot},
    Error, Result,
};

pub const BANNER_ROW: u8 = 0;
pub const LIGHT_ROW: u8 = 1;
pub const TEMPERATURE_ROW: u8 = 2;
pub const HUMIDITY_ROW: u8 = 3;

pub const BANNER_TIME_FORMAT: &str = "%a, %b %d %I:%M %p";
pub const ALERT_TEXT: &str = "ALERT!";
pub const SHUTDOWN_TEXT: &str = "Please Wait...";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Darkness readings below this count as lights on.
    pub darkness_threshold: f64,
    pub temperature_unit: char,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from(&DisplayConfig::default())
    }
}

impl From<&DisplayConfig> for RenderSettings {
    fn from(cfg: &DisplayConfig) -> Self {
        Self {
            darkness_threshold: cfg.darkness_threshold,
            temperature_unit: cfg.temperature_unit,
        }
    }
}

/// Row 1: wall-clock time, or the alert banner.
pub fn render_banner<D: CharDisplay + ?Sized>(
    display: &mut D,
    snapshot: &TelemetrySnapshot,
    now: NaiveDateTime,
) -> Result<()> {
    if snapshot.has_alarms {
        write_line(display, BANNER_ROW, ALERT_TEXT, false)
    } else {
        let stamp = now.format(BANNER_TIME_FORMAT).to_string();
        write_line(display, BANNER_ROW, &stamp, false)
    }
}

pub fn light_text(snapshot: &TelemetrySnapshot, settings: &RenderSettings) -> String {
    let state = if snapshot.darkness.as_f64() < settings.darkness_threshold {
        "ON"
    } else {
        "OFF"
    };
    format!("Lights {state} ({}/100)", snapshot.light_scale)
}

/// Row 2: light state and scale.
pub fn render_light<D: CharDisplay + ?Sized>(
    display: &mut D,
    snapshot: &TelemetrySnapshot,
    settings: &RenderSettings,
) -> Result<()> {
    write_line(display, LIGHT_ROW, &light_text(snapshot, settings), false)
}

/// Row 3: temperature and trend, both suffixed with degree and unit.
pub fn render_temperature<D: CharDisplay + ?Sized>(
    display: &mut D,
    snapshot: &TelemetrySnapshot,
    settings: &RenderSettings,
) -> Result<()> {
    let unit = settings.temperature_unit;
    display.write_at(TEMPERATURE_ROW, 0, "Tmp:")?;
    display.write_at(
        TEMPERATURE_ROW,
        4,
        &format!("{}°{unit}", right_justify(&snapshot.temp_c, 6)),
    )?;
    display.write_at(
        TEMPERATURE_ROW,
        12,
        &format!("{}°{unit}", right_justify(&snapshot.temp_trend, 6)),
    )
}

/// Row 4: humidity and trend as percentages.
pub fn render_humidity<D: CharDisplay + ?Sized>(
    display: &mut D,
    snapshot: &TelemetrySnapshot,
) -> Result<()> {
    display.write_at(HUMIDITY_ROW, 0, "Hum:")?;
    display.write_at(
        HUMIDITY_ROW,
        4,
        &format!("{}%", right_justify(&snapshot.humidity, 6)),
    )?;
    display.write_at(
        HUMIDITY_ROW,
        11,
        &format!("{}% ", right_justify(&snapshot.humidity_trend, 7)),
    )
}

fn right_justify(value: &Reading, width: usize) -> String {
    format!("{:>width$}", value.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Banner,
    Light,
    Temperature,
    Humidity,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Region::Banner => "banner",
            Region::Light => "light",
            Region::Temperature => "temperature",
            Region::Humidity => "humidity",
        })
    }
}

#[derive(Debug)]
pub struct RenderFailure {
    pub region: Region,
    pub error: Error,
}

/// Run all four row renders; a failing row does not stop the others.
pub fn render_snapshot<D: CharDisplay + ?Sized>(
    display: &mut D,
    snapshot: &TelemetrySnapshot,
    now: NaiveDateTime,
    settings: &RenderSettings,
) -> Vec<RenderFailure> {
    let results = [
        (Region::Banner, render_banner(display, snapshot, now)),
        (Region::Light, render_light(display, snapshot, settings)),
        (
            Region::Temperature,
            render_temperature(display, snapshot, settings),
        ),
        (Region::Humidity, render_humidity(display, snapshot)),
    ];
    results
        .into_iter()
        .filter_map(|(region, result)| result.err().map(|error| RenderFailure { region, error }))
        .collect()
}

/// Final message shown while the process winds down.
pub fn render_shutdown<D: CharDisplay + ?Sized>(display: &mut D) -> Result<()> {
    write_line(display, LIGHT_ROW, SHUTDOWN_TEXT, true)
}
