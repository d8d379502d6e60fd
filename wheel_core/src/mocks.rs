//! Test and helper doubles for wheel_core.

use std::cell::RefCell;
use std::rc::Rc;

use wheel_traits::{Encoder, HwResult, Store};

/// Placeholder encoder for wheels without one; never available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEncoder;

impl Encoder for NoEncoder {
    fn is_available(&self) -> bool {
        false
    }
    fn angle(&mut self) -> HwResult<f32> {
        Err(Box::new(std::io::Error::other("no encoder fitted")))
    }
    fn raw_value(&mut self) -> HwResult<u16> {
        Err(Box::new(std::io::Error::other("no encoder fitted")))
    }
    fn resolution(&self) -> u16 {
        0
    }
    fn set_angle_offset(&mut self, _offset_deg: f32) {}
    fn angle_offset(&self) -> f32 {
        0.0
    }
    fn is_healthy(&self) -> bool {
        false
    }
    fn encoder_type(&self) -> &str {
        "none"
    }
}

/// Values held by a [`MemoryStore`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StoredValues {
    pub filter_count: Option<u8>,
    pub current_slot: Option<u8>,
    pub angle_offset: Option<f32>,
    pub steps_per_revolution: Option<u32>,
    pub backlash_steps: Option<u32>,
    pub calibrated: bool,
    /// Number of successful saves.
    pub saves: u32,
    /// When set, every save fails.
    pub fail_saves: bool,
}

/// In-memory store. Clones share the same values, so a test can keep a
/// handle after moving one into the wheel.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Rc<RefCell<StoredValues>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: StoredValues) -> Self {
        Self {
            inner: Rc::new(RefCell::new(values)),
        }
    }

    pub fn values(&self) -> StoredValues {
        self.inner.borrow().clone()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.borrow_mut().fail_saves = fail;
    }

    fn save(&self, f: impl FnOnce(&mut StoredValues)) -> HwResult<()> {
        let mut v = self.inner.borrow_mut();
        if v.fail_saves {
            return Err(Box::new(std::io::Error::other("store write failed")));
        }
        f(&mut v);
        v.saves += 1;
        Ok(())
    }
}

impl Store for MemoryStore {
    fn load_filter_count(&mut self) -> HwResult<Option<u8>> {
        Ok(self.inner.borrow().filter_count)
    }
    fn save_filter_count(&mut self, count: u8) -> HwResult<()> {
        self.save(|v| v.filter_count = Some(count))
    }
    fn load_current_slot(&mut self) -> HwResult<Option<u8>> {
        Ok(self.inner.borrow().current_slot)
    }
    fn save_current_slot(&mut self, slot: u8) -> HwResult<()> {
        self.save(|v| v.current_slot = Some(slot))
    }
    fn load_angle_offset(&mut self) -> HwResult<Option<f32>> {
        Ok(self.inner.borrow().angle_offset)
    }
    fn save_angle_offset(&mut self, offset_deg: f32) -> HwResult<()> {
        self.save(|v| v.angle_offset = Some(offset_deg))
    }
    fn load_steps_per_revolution(&mut self) -> HwResult<Option<u32>> {
        Ok(self.inner.borrow().steps_per_revolution)
    }
    fn save_steps_per_revolution(&mut self, steps: u32) -> HwResult<()> {
        self.save(|v| v.steps_per_revolution = Some(steps))
    }
    fn load_backlash_steps(&mut self) -> HwResult<Option<u32>> {
        Ok(self.inner.borrow().backlash_steps)
    }
    fn save_backlash_steps(&mut self, steps: u32) -> HwResult<()> {
        self.save(|v| v.backlash_steps = Some(steps))
    }
    fn load_calibrated(&mut self) -> HwResult<bool> {
        Ok(self.inner.borrow().calibrated)
    }
    fn save_calibrated(&mut self, calibrated: bool) -> HwResult<()> {
        self.save(|v| v.calibrated = calibrated)
    }
}
