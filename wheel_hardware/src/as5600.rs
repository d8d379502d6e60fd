//! AS5600 12-bit magnetic rotary position sensor on I2C.

use std::time::Duration;

use rppal::i2c::I2c;
use wheel_traits::{Encoder, HwResult};

use crate::error::{HwError, Result};
use crate::util::retry_transient;

pub const DEFAULT_ADDRESS: u16 = 0x36;

const REG_STATUS: u8 = 0x0B;
const REG_RAW_ANGLE: u8 = 0x0C;
const STATUS_MAGNET_DETECTED: u8 = 0x20;
const RESOLUTION: u16 = 4096;
const READ_ATTEMPTS: u32 = 3;

pub struct As5600 {
    i2c: I2c,
    offset_deg: f32,
    available: bool,
    reads: u32,
    errors: u32,
}

impl As5600 {
    /// Open `bus` and probe the sensor. A missing magnet is not fatal here;
    /// the sensor is then reported as unavailable.
    pub fn new(bus: u8, address: u16) -> Result<Self> {
        let mut i2c = I2c::with_bus(bus).map_err(|e| HwError::I2c(e.to_string()))?;
        i2c.set_slave_address(address)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        let mut dev = Self {
            i2c,
            offset_deg: 0.0,
            available: false,
            reads: 0,
            errors: 0,
        };
        dev.available = match dev.magnet_detected() {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!("as5600 responded but no magnet detected");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "as5600 not responding");
                false
            }
        };
        Ok(dev)
    }

    fn read_register(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        let i2c = &mut self.i2c;
        retry_transient(READ_ATTEMPTS, Duration::from_millis(2), || {
            i2c.write_read(&[reg], &mut *buf)
                .map_err(|e| HwError::I2c(e.to_string()))
        })
    }

    pub fn magnet_detected(&mut self) -> Result<bool> {
        let mut buf = [0u8; 1];
        self.read_register(REG_STATUS, &mut buf)?;
        Ok(buf[0] & STATUS_MAGNET_DETECTED != 0)
    }

    fn read_raw(&mut self) -> Result<u16> {
        if !self.available {
            return Err(HwError::MagnetNotDetected);
        }
        self.reads = self.reads.saturating_add(1);
        let mut buf = [0u8; 2];
        match self.read_register(REG_RAW_ANGLE, &mut buf) {
            Ok(()) => Ok(u16::from_be_bytes(buf) & 0x0FFF),
            Err(e) => {
                self.errors = self.errors.saturating_add(1);
                Err(e)
            }
        }
    }
}

fn normalize(deg: f32) -> f32 {
    let d = deg.rem_euclid(360.0);
    if d >= 360.0 { 0.0 } else { d }
}

impl Encoder for As5600 {
    fn is_available(&self) -> bool {
        self.available
    }

    fn angle(&mut self) -> HwResult<f32> {
        let raw = self.read_raw()?;
        Ok(normalize(
            f32::from(raw) * 360.0 / f32::from(RESOLUTION) - self.offset_deg,
        ))
    }

    fn raw_value(&mut self) -> HwResult<u16> {
        Ok(self.read_raw()?)
    }

    fn resolution(&self) -> u16 {
        RESOLUTION
    }

    fn set_angle_offset(&mut self, offset_deg: f32) {
        self.offset_deg = normalize(offset_deg);
    }

    fn angle_offset(&self) -> f32 {
        self.offset_deg
    }

    fn is_healthy(&self) -> bool {
        self.available && self.errors.saturating_mul(10) <= self.reads
    }

    fn encoder_type(&self) -> &str {
        "AS5600"
    }
}
