use super::{check_bounds, CharDisplay, COLS};
use crate::{
    config::Pcf8574Addr,
    lcd_driver::{pcf8574::RppalBus, Hd44780, I2cBus},
    Result,
};

/// Character code of the degree sign in the HD44780 A00/A02 ROMs.
pub const DEGREE_CODE: u8 = 0xDF;

/// HD44780 20x4 character LCD behind a PCF8574 backpack.
pub struct Lcd<B: I2cBus = RppalBus> {
    driver: Hd44780<B>,
}

impl Lcd<RppalBus> {
    pub fn open(i2c_bus: u8, addr: &Pcf8574Addr) -> Result<Self> {
        let mut bus = RppalBus::open(i2c_bus)?;
        let addr = bus.resolve(addr);
        Self::with_bus(bus, addr)
    }
}

impl<B: I2cBus> Lcd<B> {
    pub fn with_bus(bus: B, addr: u8) -> Result<Self> {
        let driver = Hd44780::new(bus, addr)?;
        Ok(Self { driver })
    }

    pub fn driver(&self) -> &Hd44780<B> {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut Hd44780<B> {
        &mut self.driver
    }
}

impl<B: I2cBus> CharDisplay for Lcd<B> {
    fn clear(&mut self) -> Result<()> {
        self.driver.clear()
    }

    fn write_at(&mut self, row: u8, col: u8, text: &str) -> Result<()> {
        check_bounds(row, col)?;
        self.driver.move_to(row, col)?;
        for ch in text.chars().take(COLS - col as usize) {
            self.driver.write_data(char_code(ch))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.driver.home()
    }
}

/// Map a char onto the LCD character ROM.
pub fn char_code(ch: char) -> u8 {
    match ch {
        '°' => DEGREE_CODE,
        ' '..='}' => ch as u8,
        _ => b'?',
    }
}
