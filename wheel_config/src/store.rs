//! File-backed persistent store for the wheel's calibration and position.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wheel_traits::{HwResult, Store};

use crate::atomic::write_atomic;

/// Everything the engine persists. `None` means "never saved".
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub filter_count: Option<u8>,
    pub current_slot: Option<u8>,
    pub angle_offset_deg: Option<f32>,
    pub steps_per_revolution: Option<u32>,
    pub backlash_steps: Option<u32>,
    pub calibrated: bool,
}

/// [`Store`] over a single TOML document.
///
/// Every save rewrites the whole file atomically, so a successful save is
/// durable before the next load and a crash never leaves a half-written file.
#[derive(Debug)]
pub struct TomlStore {
    path: PathBuf,
    state: PersistedState,
}

impl TomlStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> eyre::Result<Self> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str::<PersistedState>(&text)
                .map_err(|e| eyre::eyre!("parse state file {:?}: {}", path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PersistedState::default(),
            Err(e) => eyre::bail!("read state file {:?}: {}", path, e),
        };
        tracing::debug!(path = %path.display(), ?state, "opened state file");
        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    fn update(&mut self, f: impl FnOnce(&mut PersistedState)) -> HwResult<()> {
        let mut next = self.state.clone();
        f(&mut next);
        let text = toml::to_string(&next)?;
        write_atomic(&self.path, text.as_bytes())?;
        self.state = next;
        Ok(())
    }
}

impl Store for TomlStore {
    fn load_filter_count(&mut self) -> HwResult<Option<u8>> {
        Ok(self.state.filter_count)
    }

    fn save_filter_count(&mut self, count: u8) -> HwResult<()> {
        self.update(|s| s.filter_count = Some(count))
    }

    fn load_current_slot(&mut self) -> HwResult<Option<u8>> {
        Ok(self.state.current_slot)
    }

    fn save_current_slot(&mut self, slot: u8) -> HwResult<()> {
        self.update(|s| s.current_slot = Some(slot))
    }

    fn load_angle_offset(&mut self) -> HwResult<Option<f32>> {
        Ok(self.state.angle_offset_deg)
    }

    fn save_angle_offset(&mut self, offset_deg: f32) -> HwResult<()> {
        self.update(|s| s.angle_offset_deg = Some(offset_deg))
    }

    fn load_steps_per_revolution(&mut self) -> HwResult<Option<u32>> {
        Ok(self.state.steps_per_revolution)
    }

    fn save_steps_per_revolution(&mut self, steps: u32) -> HwResult<()> {
        self.update(|s| s.steps_per_revolution = Some(steps))
    }

    fn load_backlash_steps(&mut self) -> HwResult<Option<u32>> {
        Ok(self.state.backlash_steps)
    }

    fn save_backlash_steps(&mut self, steps: u32) -> HwResult<()> {
        self.update(|s| s.backlash_steps = Some(steps))
    }

    fn load_calibrated(&mut self) -> HwResult<bool> {
        Ok(self.state.calibrated)
    }

    fn save_calibrated(&mut self, calibrated: bool) -> HwResult<()> {
        self.update(|s| s.calibrated = calibrated)
    }
}
