// SPDX-License-Identifier: GPL-3.0-only
//! Layout policy consumed by the configuration task
//!
//! A [`DisplayLayoutManager`] turns the connected displays plus a desired
//! multi-display state and power state into concrete per-display modeset
//! requests. It also reports the state the hardware is believed to be in and
//! exposes two optional capabilities: a [`SoftwareMirroringController`] used
//! when hardware mirroring fails, and a [`StateController`] that decides
//! between mirror and extended mode for a pair of displays.
//!
//! Absent capabilities mean "feature unavailable"; callers take the
//! conservative branch instead of failing.

mod planner;

use std::sync::Arc;

use crate::display::{
    DisplayConfigureRequest, DisplayId, DisplayPowerState, DisplaySnapshot, MultipleDisplayState,
    Size,
};

pub use planner::{VERTICAL_GAP, plan_layout};

/// Per-display requests plus the framebuffer spanning all of them
#[derive(Debug, Clone, Default)]
pub struct DisplayLayout {
    pub requests: Vec<DisplayConfigureRequest>,
    pub framebuffer_size: Size,
}

pub trait DisplayLayoutManager: Send + Sync {
    /// Compute the modeset plan for `new_display_state` under
    /// `new_power_state`. Returns `None` when the combination cannot be laid
    /// out with these displays.
    fn get_display_layout(
        &self,
        displays: &[Arc<DisplaySnapshot>],
        new_display_state: MultipleDisplayState,
        new_power_state: DisplayPowerState,
    ) -> Option<DisplayLayout>;

    /// Multi-display state the hardware is currently in
    fn get_display_state(&self) -> MultipleDisplayState;

    /// Power state the hardware is currently in
    fn get_power_state(&self) -> DisplayPowerState;

    fn get_software_mirroring_controller(&self) -> Option<&dyn SoftwareMirroringController>;

    fn get_state_controller(&self) -> Option<&dyn StateController>;
}

/// Mirrors the desktop in software when the hardware cannot
pub trait SoftwareMirroringController: Send + Sync {
    fn set_software_mirroring(&self, enabled: bool);

    fn software_mirroring_enabled(&self) -> bool;
}

/// User policy for a set of connected displays
pub trait StateController: Send + Sync {
    /// Mirror-vs-extend choice for the displays with these ids, in snapshot
    /// order
    fn get_state_for_display_ids(&self, display_ids: &[DisplayId]) -> MultipleDisplayState;

    /// Resolution the user picked for a display, if any
    fn get_resolution_for_display_id(&self, _display_id: DisplayId) -> Option<Size> {
        None
    }
}
