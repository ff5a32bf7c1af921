use crate::{config::Pcf8574Addr, lcd_driver::I2cBus, Error, Result};

/// Backpack addresses probed when the config says `auto`.
pub const PROBE_ADDRESSES: [u8; 8] = [0x27, 0x26, 0x25, 0x24, 0x23, 0x22, 0x21, 0x20];
pub const FALLBACK_ADDRESS: u8 = 0x27;

#[cfg(target_os = "linux")]
fn map_i2c_err(err: rppal::i2c::Error) -> Error {
    Error::Display(format!("i2c: {err}"))
}

/// Linux I2C bus through rppal.
#[cfg(target_os = "linux")]
pub struct RppalBus {
    inner: rppal::i2c::I2c,
    selected: Option<u8>,
}

#[cfg(target_os = "linux")]
impl RppalBus {
    /// Open `/dev/i2c-<bus>`.
    pub fn open(bus: u8) -> Result<Self> {
        let inner = rppal::i2c::I2c::with_bus(bus).map_err(map_i2c_err)?;
        Ok(Self {
            inner,
            selected: None,
        })
    }

    /// Resolve the backpack address, probing when set to auto.
    pub fn resolve(&mut self, addr: &Pcf8574Addr) -> u8 {
        match addr {
            Pcf8574Addr::Addr(a) => *a,
            Pcf8574Addr::Auto => PROBE_ADDRESSES
                .iter()
                .copied()
                .find(|&candidate| self.write_byte(candidate, 0).is_ok())
                .unwrap_or(FALLBACK_ADDRESS),
        }
    }
}

#[cfg(target_os = "linux")]
impl I2cBus for RppalBus {
    fn write_byte(&mut self, addr: u8, byte: u8) -> Result<()> {
        if self.selected != Some(addr) {
            self.inner
                .set_slave_address(addr.into())
                .map_err(map_i2c_err)?;
            self.selected = Some(addr);
        }
        self.inner.write(&[byte]).map_err(map_i2c_err)?;
        Ok(())
    }
}

/// Non-Linux stub so the crate builds on dev hosts; fails at runtime.
#[cfg(not(target_os = "linux"))]
pub struct RppalBus;

#[cfg(not(target_os = "linux"))]
impl RppalBus {
    pub fn open(_bus: u8) -> Result<Self> {
        Err(Error::Display(
            "I2C LCD is only available on Linux; use --headless".into(),
        ))
    }

    pub fn resolve(&mut self, addr: &Pcf8574Addr) -> u8 {
        match addr {
            Pcf8574Addr::Addr(a) => *a,
            Pcf8574Addr::Auto => FALLBACK_ADDRESS,
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl I2cBus for RppalBus {
    fn write_byte(&mut self, _addr: u8, _byte: u8) -> Result<()> {
        Err(Error::Display(
            "I2C LCD is only available on Linux".into(),
        ))
    }
}
