//! HD44780 controller driven through a PCF8574 I2C backpack in 4-bit mode.

use std::time::Duration;

use crate::Result;

pub mod pcf8574;

/// Byte-wide I2C writes; swapped for a mock in tests.
pub trait I2cBus {
    fn write_byte(&mut self, addr: u8, byte: u8) -> Result<()>;
}

// PCF8574 pin mapping on the common backpacks.
const PIN_RS: u8 = 0x01;
const PIN_E: u8 = 0x04;
const PIN_BACKLIGHT: u8 = 0x08;
const DATA_SHIFT: u8 = 4;

const CMD_CLEAR: u8 = 0x01;
const CMD_HOME: u8 = 0x02;
const CMD_ENTRY_MODE: u8 = 0x04;
const ENTRY_INCREMENT: u8 = 0x02;
const CMD_DISPLAY_CTRL: u8 = 0x08;
const DISPLAY_ON: u8 = 0x04;
const CMD_FUNCTION: u8 = 0x20;
const FUNCTION_TWO_LINES: u8 = 0x08;
const FUNCTION_RESET: u8 = 0x30;
const CMD_SET_DDRAM: u8 = 0x80;

/// DDRAM start address of each row on a 20x4 module.
pub const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

pub struct Hd44780<B: I2cBus> {
    bus: B,
    addr: u8,
    backlight: bool,
}

impl<B: I2cBus> Hd44780<B> {
    /// Run the 4-bit init sequence and switch the display on with the backlight lit.
    pub fn new(bus: B, addr: u8) -> Result<Self> {
        let mut driver = Self {
            bus,
            addr,
            backlight: true,
        };

        driver.bus.write_byte(addr, 0)?;
        pause_ms(20);
        for delay in [5, 1, 1] {
            driver.pulse_nibble(FUNCTION_RESET, false)?;
            pause_ms(delay);
        }
        // Drop into 4-bit mode before the first full command.
        driver.pulse_nibble(CMD_FUNCTION, false)?;
        pause_ms(1);

        driver.command(CMD_FUNCTION | FUNCTION_TWO_LINES)?;
        driver.command(CMD_DISPLAY_CTRL)?;
        driver.clear()?;
        driver.command(CMD_ENTRY_MODE | ENTRY_INCREMENT)?;
        driver.command(CMD_DISPLAY_CTRL | DISPLAY_ON)?;
        Ok(driver)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.command(CMD_CLEAR)
    }

    pub fn home(&mut self) -> Result<()> {
        self.command(CMD_HOME)
    }

    pub fn move_to(&mut self, row: u8, col: u8) -> Result<()> {
        let base = ROW_OFFSETS[row as usize % ROW_OFFSETS.len()];
        self.command(CMD_SET_DDRAM | base.wrapping_add(col))
    }

    /// Write one character code at the cursor.
    pub fn write_data(&mut self, code: u8) -> Result<()> {
        self.pulse_nibble(code, true)?;
        self.pulse_nibble(code << 4, true)
    }

    pub fn set_backlight(&mut self, on: bool) -> Result<()> {
        self.backlight = on;
        let level = if on { PIN_BACKLIGHT } else { 0 };
        self.bus.write_byte(self.addr, level)
    }

    pub fn backlight(&self) -> bool {
        self.backlight
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    fn command(&mut self, cmd: u8) -> Result<()> {
        self.pulse_nibble(cmd, false)?;
        self.pulse_nibble(cmd << 4, false)?;
        if cmd == CMD_CLEAR || cmd == CMD_HOME {
            pause_ms(5);
        }
        Ok(())
    }

    /// Latch the high nibble of `value` by toggling the enable pin.
    fn pulse_nibble(&mut self, value: u8, data: bool) -> Result<()> {
        let mut byte = ((value >> 4) & 0x0f) << DATA_SHIFT;
        if self.backlight {
            byte |= PIN_BACKLIGHT;
        }
        if data {
            byte |= PIN_RS;
        }
        self.bus.write_byte(self.addr, byte | PIN_E)?;
        self.bus.write_byte(self.addr, byte)
    }
}

fn pause_ms(ms: u64) {
    std::thread::sleep(Duration::from_millis(ms));
}
