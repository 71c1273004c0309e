// SPDX-License-Identifier: MIT
//
// Terminal-mode store — the two copies of terminal state.
//
// `original` is captured once when the session starts and is never written
// again; it is the only thing `Session::defaults` restores from. `working`
// is re-captured every time raw mode is entered and is what a plain
// `restore_terminal` puts back.

use crate::device::{Attributes, DescriptorFlags, Device};
use crate::error::{Error, Result};

/// Line discipline plus stdin descriptor flags, read at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Terminal attributes (termios).
    pub attributes: Attributes,
    /// Stdin status flags (blocking or not).
    pub flags: DescriptorFlags,
}

impl Snapshot {
    /// Read the device's current state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Os`] if either query fails.
    pub fn read(device: &impl Device) -> Result<Self> {
        let attributes = device
            .attributes()
            .map_err(|e| Error::os("can't get terminal attributes", e))?;
        let flags = device
            .flags()
            .map_err(|e| Error::os("can't get stdin flags", e))?;
        Ok(Self { attributes, flags })
    }

    /// Write this state back to the device: attributes first, then flags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Os`] if either update fails.
    pub fn apply(&self, device: &mut impl Device) -> Result<()> {
        device
            .set_attributes(&self.attributes)
            .map_err(|e| Error::os("can't set terminal attributes", e))?;
        device
            .set_flags(self.flags)
            .map_err(|e| Error::os("can't set stdin flags", e))
    }
}

/// The `original` / `working` pair.
#[derive(Debug, Clone)]
pub struct ModeStore {
    original: Snapshot,
    working: Snapshot,
}

impl ModeStore {
    /// Capture the device's state as both the original and the working copy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Os`] if the device can't be queried.
    pub fn capture(device: &impl Device) -> Result<Self> {
        let original = Snapshot::read(device)?;
        Ok(Self {
            original,
            working: original,
        })
    }

    /// State at session start.
    #[inline]
    #[must_use]
    pub const fn original(&self) -> &Snapshot {
        &self.original
    }

    /// State saved by the most recent capture or reset.
    #[inline]
    #[must_use]
    pub const fn working(&self) -> &Snapshot {
        &self.working
    }

    /// Re-read the device into `working`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Os`] if the device can't be queried. `working` is
    /// left untouched in that case.
    pub fn recapture(&mut self, device: &impl Device) -> Result<()> {
        self.working = Snapshot::read(device)?;
        Ok(())
    }

    /// Replace `working` with a snapshot taken elsewhere.
    pub fn set_working(&mut self, snapshot: Snapshot) {
        self.working = snapshot;
    }

    /// Forget any intermediate state: `working` becomes `original` again.
    pub fn reset_working(&mut self) {
        self.working = self.original;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
